//! Core types and trait definitions for the confstore configuration service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::VersionStore`]; transports drive the
//! [`service::VersioningService`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod auth;
pub mod cache;
pub mod error;
pub mod record;
pub mod schema;
pub mod service;
pub mod store;

pub use error::{Error, Result};
