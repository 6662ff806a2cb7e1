//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Gate (redirect anonymous and non-admin requests on protected paths)
//! 6. Rate limiting (governor, auth routes only; 429s rewritten to the error envelope)

pub mod auth;
pub mod gate;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{RequireAdmin, RequireUser, clear_session, session_user, set_current_user};
pub use gate::gate_middleware;
pub use rate_limit::{auth_rate_limiter, rate_limit_envelope};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
