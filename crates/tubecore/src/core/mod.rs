//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod rate_limiter;
pub mod utils;
pub mod web_server;

// Re-exports for convenience
pub use config::Settings;
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_cookies_configuration};
pub use rate_limiter::RateLimiter;
pub use utils::{escape_markdown_v2, extract_retry_after};
