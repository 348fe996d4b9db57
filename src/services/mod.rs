//! 业务能力层
//!
//! 每个服务只处理单个学生或单条日志，不关心批处理流程。

pub mod api_log_writer;
pub mod prompt_builder;
pub mod response_parser;
pub mod roster_state;

pub use api_log_writer::ApiLogWriter;
pub use prompt_builder::build_grading_prompt;
pub use response_parser::{extract_json_text, parse_grading_response};
pub use roster_state::RosterState;
