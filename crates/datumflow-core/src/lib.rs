//! Core domain types and contracts for the datumflow pipeline worker.
//!
//! This crate contains:
//! - Datum inputs and job identifiers
//! - The `DatumHasher` trait and the default SHA-256 hasher
//! - The `DatumIterator` and `JobData` contracts consumed by the scheduler
//! - Shard addressing
//! - Configuration types

pub mod address;
pub mod config;
pub mod datum;
pub mod error;
pub mod hasher;
pub mod id;
pub mod input;
pub mod job;

pub use error::{Error, Result};
pub use id::JobId;
pub use input::Input;
