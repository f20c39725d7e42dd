pub mod client;
pub mod models;
pub mod session;

pub use client::{ApiClient, ApiError, Result};
pub use models::ApiConfig;
pub use session::{CookieSession, SiteSession};
