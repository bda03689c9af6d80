//! Haris Core Library
//!
//! Shared types, capability traits, configuration, and errors for the Haris
//! composite realm.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::RealmConfig;
pub use error::{Backend, Error, Result};

/// Haris version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
