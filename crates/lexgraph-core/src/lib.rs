//! # lexgraph-core
//!
//! Core types, traits, and abstractions for the lexgraph document pipeline.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other lexgraph crates depend on, plus the pure
//! entity network builder.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod network;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use network::{build_network, entity_detail};
pub use traits::*;
pub use uuid_utils::{extract_timestamp, new_v7};
