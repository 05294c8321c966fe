mod ffprobe_info;
mod path_validator;
mod process_runner;
mod worker_pool;

pub use ffprobe_info::{parse_ffprobe_output, probe_video};
pub use path_validator::{highlight_output_path, validate_input_file};
pub use process_runner::{ProcessOutput, RunError, run_with_limits};
pub use worker_pool::WorkerPool;
