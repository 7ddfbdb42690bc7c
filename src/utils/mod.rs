// Retry and logging helpers

pub mod logger;
pub mod retry;

pub use logger::{init_logger, DEFAULT_LOG_FILTER};
pub use retry::{with_retry, RetryPolicy};
