//! HTTP client for the remote UI schema store.
//! Implements `uitree_core::RemoteTreeStore`; the core never depends on this crate.

pub mod config;
pub mod http;

pub use config::ClientConfig;
pub use http::HttpTreeStore;
