//! Error types for Haris

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which backend a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// The LDAP directory used for primary authentication.
    Directory,
    /// The relational datastore used for roles and fallback authentication.
    Datastore,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Directory => write!(f, "directory"),
            Backend::Datastore => write!(f, "datastore"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors are fatal at start and block the Started transition.
    #[error("Invalid realm configuration: {0}")]
    Configuration(String),

    // A backend could not be reached or failed mid-protocol. Surfaces to the
    // container as an authentication failure or deny, never as a crash.
    #[error("{backend} backend unavailable: {reason}")]
    BackendUnavailable { backend: Backend, reason: String },

    #[error("Illegal lifecycle transition: {0}")]
    Lifecycle(String),

    #[error("Internal realm error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn directory_unavailable(reason: impl Into<String>) -> Self {
        Error::BackendUnavailable {
            backend: Backend::Directory,
            reason: reason.into(),
        }
    }

    pub fn datastore_unavailable(reason: impl Into<String>) -> Self {
        Error::BackendUnavailable {
            backend: Backend::Datastore,
            reason: reason.into(),
        }
    }

    /// True for errors the composite treats as "try the other backend".
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Error::BackendUnavailable { .. })
    }
}
