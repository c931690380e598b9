//! Convenience re-exports for consumers of this crate.

pub use crate::error::{GatewayError, GatewayResult};
pub use crate::router::build_router;
pub use crate::state::{AppState, SharedState};
