//! Convenience re-exports for consumers of this crate.

pub use crate::error::{AuthError, AuthResult};
pub use crate::oauth::{OAuthFlow, OAuthPhase, OAuthProviderConfig};
pub use crate::plane::AuthPlane;
pub use crate::session::{SessionData, SessionStore, DEFAULT_SESSION_TTL};
pub use crate::ticket::TicketStore;
