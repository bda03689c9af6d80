//! Diagnostic types for the directory backend

use serde::{Deserialize, Serialize};

/// Root DSE details reported by the directory server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryServerInfo {
    pub vendor: Option<String>,
    pub version: Option<String>,
    pub naming_contexts: Vec<String>,
    pub supported_ldap_version: Vec<String>,
}

/// Result of a connection probe against the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
    pub server_info: Option<DirectoryServerInfo>,
}
