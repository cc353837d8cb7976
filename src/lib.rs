//! Collaborative documents with layered sharing and background linting.
//!
//! Documents are shared through a default access level plus per-user and
//! per-group overrides, resolved by [`access::AccessResolver`]. Every create
//! or edit queues the document into the [`pipeline`], which runs the
//! registered [`lint`] capability and writes the verdict back without
//! holding up the request.

pub mod access;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod lint;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod service;
pub mod store;

pub use error::{Error, Result};
