//! Security-constraint surface shared with the hosting container
//!
//! The container hands the realm the constraints it matched for a request;
//! the realm only decides whether the identity's roles satisfy them. Pattern
//! forms follow the servlet conventions: exact, path prefix (`/prefix/*`),
//! extension (`*.ext`), and the default pattern `/`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::policy::AllRolesMode;

/// The slice of an incoming request the realm needs for a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub path: String,
    pub method: String,
}

impl RequestContext {
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
        }
    }
}

/// A container-level rule mapping resource patterns to required roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConstraint {
    /// URL patterns this constraint covers.
    pub patterns: Vec<String>,

    /// HTTP methods this constraint covers. Empty means all methods.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Roles that satisfy this constraint. `*` is interpreted according to
    /// the realm's `AllRolesMode`.
    pub roles: Vec<String>,
}

impl SecurityConstraint {
    pub fn new(
        patterns: impl IntoIterator<Item = String>,
        roles: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            patterns: patterns.into_iter().collect(),
            methods: Vec::new(),
            roles: roles.into_iter().collect(),
        }
    }

    /// Whether this constraint covers the given request.
    pub fn applies_to(&self, request: &RequestContext) -> bool {
        let method_ok =
            self.methods.is_empty() || self.methods.iter().any(|m| m == &request.method);
        method_ok
            && self
                .patterns
                .iter()
                .any(|p| pattern_matches(p, &request.path))
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    if pattern == path {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix("/*") {
        return prefix.is_empty() || path == prefix || path.starts_with(&format!("{prefix}/"));
    }
    if let Some(ext) = pattern.strip_prefix("*.") {
        return path.ends_with(&format!(".{ext}"));
    }
    // Default pattern: covers any request not matched more specifically.
    pattern == "/"
}

/// Whether a role set satisfies at least one of the given constraints.
///
/// `*` in a constraint's role list is interpreted per `mode`; named roles
/// never match in `StrictAuthOnly` mode. The caller has already established
/// that every constraint in `applicable` covers the request and that the
/// subject is authenticated.
pub fn roles_satisfy(
    roles: &BTreeSet<String>,
    applicable: &[&SecurityConstraint],
    mode: AllRolesMode,
) -> bool {
    for constraint in applicable {
        for required in &constraint.roles {
            let granted = if required == "*" {
                match mode {
                    AllRolesMode::Strict => !roles.is_empty(),
                    AllRolesMode::AuthOnly | AllRolesMode::StrictAuthOnly => true,
                }
            } else {
                mode != AllRolesMode::StrictAuthOnly && roles.contains(required)
            };
            if granted {
                return true;
            }
        }
    }
    false
}

/// The realm's answer to a constrained request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Granted,
    Denied,
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(path: &str, method: &str) -> RequestContext {
        RequestContext::new(path, method)
    }

    #[test]
    fn exact_pattern() {
        let c = SecurityConstraint::new(
            vec!["/admin/index".to_string()],
            vec!["admin".to_string()],
        );
        assert!(c.applies_to(&req("/admin/index", "GET")));
        assert!(!c.applies_to(&req("/admin/other", "GET")));
    }

    #[test]
    fn prefix_pattern() {
        let c = SecurityConstraint::new(vec!["/admin/*".to_string()], vec!["admin".to_string()]);
        assert!(c.applies_to(&req("/admin", "GET")));
        assert!(c.applies_to(&req("/admin/users", "GET")));
        assert!(!c.applies_to(&req("/administrator", "GET")));
        assert!(!c.applies_to(&req("/public", "GET")));
    }

    #[test]
    fn extension_pattern() {
        let c = SecurityConstraint::new(vec!["*.jsp".to_string()], vec!["viewer".to_string()]);
        assert!(c.applies_to(&req("/pages/home.jsp", "GET")));
        assert!(!c.applies_to(&req("/pages/home.html", "GET")));
    }

    #[test]
    fn default_pattern_covers_everything() {
        let c = SecurityConstraint::new(vec!["/".to_string()], vec!["user".to_string()]);
        assert!(c.applies_to(&req("/anything/at/all", "GET")));
    }

    #[test]
    fn method_list_restricts() {
        let mut c = SecurityConstraint::new(vec!["/admin/*".to_string()], vec!["admin".to_string()]);
        c.methods = vec!["POST".to_string(), "DELETE".to_string()];
        assert!(c.applies_to(&req("/admin/users", "POST")));
        assert!(!c.applies_to(&req("/admin/users", "GET")));
    }
}
