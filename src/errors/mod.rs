pub mod app_error;
pub mod auth_error;
pub mod proxy_error;

pub use app_error::{AppError, AppResult};
pub use auth_error::{AuthError, AuthResult};
pub use proxy_error::{CloseReason, ProxyError, close_codes};
