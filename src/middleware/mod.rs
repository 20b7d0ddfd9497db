pub mod auth;
pub mod exception;
pub mod https;
pub mod logging;
pub mod profiling;
pub mod response;

pub use auth::{authenticate, authorize, AuthState, PolicyGuard};
pub use exception::{ExceptionHandlingLayer, UNEXPECTED_ERROR_MESSAGE};
pub use https::redirect_to_https;
pub use logging::{HttpContextLoggingHandler, HttpObjectConverter, LoggingLayer, LoggingService, HTTP_LOG_TARGET};
pub use profiling::server_timing;
pub use response::{ApiResponse, ApiResult};
