pub mod auth;
pub mod rate_limit;

pub use auth::{require_bearer, AuthUser};
pub use rate_limit::{enforce as enforce_rate_limit, RateLimiter};
