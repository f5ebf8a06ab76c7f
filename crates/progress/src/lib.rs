//! Progress persistence
//!
//! Per-user hunt progress, the user directory it is keyed by, and
//! storage-key derivation.

#![warn(missing_docs)]

pub mod store;
pub mod users;
pub mod key;

pub use store::ProgressStore;
pub use users::{UserProvider, UserDirectory, UserError};
pub use key::{normalize_user_name, progress_key};
