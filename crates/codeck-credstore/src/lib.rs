//! Encrypted credential and password storage for the codeck daemon.
//!
//! Owns two kinds of secrets for a single workspace: the operator's login
//! password record ([`password`]) and the upstream OAuth credential
//! ([`store`]), the latter encrypted at rest with a key resolved by
//! [`crypto`]. [`watcher`] keeps the primary credential file self-healing
//! against accidental deletion.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod crypto;
pub mod error;
pub mod password;
pub mod prelude;
pub mod store;
pub mod types;
pub mod watcher;

pub use error::{CredStoreError, CredStoreResult};
pub use store::CredStore;
