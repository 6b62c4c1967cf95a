//! Facade over the uitree crates.
//!
//! `uitree_core` holds the model and protocol, `uitree_client` the HTTP
//! store. Most callers only need this crate.

pub mod telemetry;

pub use uitree_client::{ClientConfig, HttpTreeStore};
pub use uitree_core::*;
