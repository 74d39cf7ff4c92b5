//! Storage abstraction and implementations for GourdWatch.
//!
//! This crate provides trait-based record and taxonomy stores with a
//! JSON-file reference implementation and an in-memory backend.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;

pub use trait_::{ConcurrencyMode, RecordStore, Result, Storage, StorageError, TaxonomyStore};
pub use json_storage::JsonStorage;
pub use memory::InMemoryStorage;
