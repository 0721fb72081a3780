//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (no framing, no sniffing, no caching)
//! 5. Rate limiting (governor, sign-in and reset routes only)
//!
//! Authentication is not a layer: handlers ask for it with the
//! [`RequireAuth`], [`RequireCustomer`] or [`RequireSeller`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{CurrentAccount, RequireAuth, RequireCustomer, RequireSeller, require_role};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
