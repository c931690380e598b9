//! Interactive and headless PTY session management for the codeck daemon:
//! clean-environment spawn, resume-policy-aware conversation discovery,
//! multi-client fan-out with buffered replay, and crash-safe snapshot
//! persistence.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod discovery;
pub mod error;
pub mod manager;
pub mod prelude;
pub mod ring;
pub mod session;
pub mod snapshot;
pub mod types;

pub use error::{PtyError, PtyResult};
pub use manager::PtyManager;
