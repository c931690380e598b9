//! codeck-core - foundation types shared by every crate in the codeck workspace.
//!
//! This crate provides:
//! - The shared [`error::CodeckError`] taxonomy
//! - The `.codeck/` directory layout ([`dirs::CodeckWorkspace`])
//! - Atomic, crash-safe file writes ([`atomic`])
//! - Content-derived identifiers ([`ids`])
//! - The clean-environment policy for spawned children ([`env_policy`])

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod atomic;
pub mod dirs;
pub mod env_policy;
pub mod error;
pub mod ids;
pub mod prelude;

#[cfg(feature = "testing")]
pub mod testing;
