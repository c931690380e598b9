//! HTTP+WebSocket front end for the codeck daemon: auth middleware,
//! trusted-proxy IP derivation, the operator/internal WS frame protocols,
//! and the multi-session PTY relay built on top of them.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod auth_middleware;
pub mod error;
pub mod http;
pub mod prelude;
pub mod proxy_ip;
pub mod rate_limit;
pub mod router;
pub mod state;
pub mod ws;

pub use error::{GatewayError, GatewayResult};
pub use router::build_router;
pub use state::{AppState, SharedState};
