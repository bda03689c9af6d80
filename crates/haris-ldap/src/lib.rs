//! Directory authentication for Haris
//!
//! Validates username/secret pairs against an LDAP directory, either by
//! binding a DN formatted from a pattern or by searching for the user and
//! binding as the found entry.

mod client;
mod types;

pub use client::DirectoryAuthenticator;
pub use types::{DirectoryServerInfo, TestConnectionResponse};
