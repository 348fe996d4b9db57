pub mod cancel;
pub mod grading_flow;
pub mod job_ctx;
pub mod pacing;

pub use cancel::{sleep_cancellable, CancelHandle};
pub use grading_flow::{grade_with_retry, RetryPolicy};
pub use job_ctx::JobCtx;
pub use pacing::PacingGate;
