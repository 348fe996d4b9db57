pub mod api_log;
pub mod grading;
pub mod job;
pub mod loaders;
pub mod progress;
pub mod student;

pub use api_log::{tagged_sink, ApiLogEntry, LogDirection, LogSink, TokenUsage};
pub use grading::{normalize_grading_result, Comments, GradingResult, GradingResultApi};
pub use job::{EncodedImage, Job, PayloadSource};
pub use loaders::load_roster;
pub use progress::{now_millis, ProgressEvent};
pub use student::{Student, StudentStatus};
