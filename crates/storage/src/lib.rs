//! Storage abstraction and implementations for the hunt engine.
//!
//! This crate provides a trait-based key-value interface with a JSON file
//! backend for durable use and an in-memory backend for hosts and tests.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;
pub mod keys;

pub use trait_::{KeyValueStore, StorageError, Result, load_json, save_json};
pub use json_storage::JsonFileStore;
pub use memory::MemoryStore;
