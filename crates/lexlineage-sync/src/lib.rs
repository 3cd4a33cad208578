//! Sync layer: pull statutes from an upstream HTTP store and push finished
//! statute groups downstream.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{HttpStatuteSource, SyncClient, SyncError};
