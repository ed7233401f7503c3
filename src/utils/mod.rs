//! Utility modules.

pub mod file;
pub mod retry;

pub use file::{read_file_content, read_input, read_stdin};
pub use retry::{RetryConfig, Retryable, with_retry};
