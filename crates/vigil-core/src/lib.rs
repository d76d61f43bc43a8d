//! Core types and services for the Vigil intel store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; storage is reached only through the
//! [`store::IntelStore`] and [`store::CredentialStore`] traits.

pub mod canonical;
pub mod diff;
pub mod dispatch;
pub mod error;
pub mod plugin;
pub mod record;
pub mod registry;
pub mod resource;
pub mod resources;
pub mod results;
pub mod store;
pub mod updates;
pub mod view;

pub use error::{Error, Result};
