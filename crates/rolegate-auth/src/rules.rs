//! Path-level and operation-level authorization rules.
//!
//! Path rules are evaluated in declaration order and the first matching
//! pattern wins, so specific patterns must be declared before broader
//! catch-alls. A path that matches no rule requires authentication.
//!
//! Patterns use Ant-style wildcards:
//! - `?` matches one character within a segment
//! - `*` matches zero or more characters within a segment
//! - `**` matches zero or more whole segments
//!
//! `/admin/**` therefore matches `/admin`, `/admin/` and `/admin/a/b`.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::Role;

// =============================================================================
// Authorization Requirement
// =============================================================================

/// What a path or an operation demands from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationRequirement {
    /// No identity needed; identity resolution is skipped.
    Public,
    /// Any verified identity is enough.
    #[serde(rename = "authenticated")]
    AuthenticatedOnly,
    /// A verified identity holding a role that dominates the given one.
    #[serde(rename = "role")]
    RequiresRole(Role),
}

impl AuthorizationRequirement {
    /// Shorthand for `RequiresRole`.
    #[must_use]
    pub fn role(name: impl Into<Role>) -> Self {
        Self::RequiresRole(name.into())
    }

    /// Returns `true` for `Public`.
    #[must_use]
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }

    /// Returns the required role, if any.
    #[must_use]
    pub fn required_role(&self) -> Option<&Role> {
        match self {
            Self::RequiresRole(role) => Some(role),
            _ => None,
        }
    }
}

impl fmt::Display for AuthorizationRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::AuthenticatedOnly => write!(f, "authenticated"),
            Self::RequiresRole(role) => write!(f, "role:{role}"),
        }
    }
}

// =============================================================================
// Path Pattern
// =============================================================================

/// A compiled Ant-style path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    regex: Regex,
}

impl PathPattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the pattern is empty or does not
    /// compile.
    pub fn new(pattern: impl Into<String>) -> AuthResult<Self> {
        let raw = pattern.into();
        if raw.trim().is_empty() {
            return Err(AuthError::configuration("path pattern must not be empty"));
        }

        let regex = Regex::new(&ant_to_regex(&raw)).map_err(|e| {
            AuthError::configuration(format!("invalid path pattern '{raw}': {e}"))
        })?;

        Ok(Self { raw, regex })
    }

    /// Returns the pattern as declared.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if the (already normalized) path matches.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

fn ant_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    for (i, segment) in pattern.split('/').enumerate() {
        if segment == "**" {
            out.push_str(if i == 0 { ".*" } else { "(?:/.*)?" });
            continue;
        }
        if i > 0 {
            out.push('/');
        }
        for c in segment.chars() {
            match c {
                '*' => out.push_str("[^/]*"),
                '?' => out.push_str("[^/]"),
                other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
    }
    out.push('$');
    out
}

/// Collapses repeated slashes and resolves `.` / `..` segments.
///
/// Matching always happens on the normalized form so that `/api/../admin/x`
/// cannot slip past a rule written for `/admin/**`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in &segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() || (path.ends_with('/') && !segments.is_empty()) {
        normalized.push('/');
    }
    normalized
}

/// Returns `true` if the path is already in normalized form.
///
/// The router dispatches on the raw path, so a path that normalization
/// would change must not be authorized against the rules at all.
#[must_use]
pub fn is_canonical_path(path: &str) -> bool {
    let raw = path.split(['?', '#']).next().unwrap_or_default();
    normalize_path(raw) == raw
}

// =============================================================================
// Path Rules
// =============================================================================

/// One `(pattern, requirement)` entry.
#[derive(Debug, Clone)]
pub struct PathRule {
    /// The compiled pattern.
    pub pattern: PathPattern,
    /// The requirement applied when the pattern matches.
    pub requirement: AuthorizationRequirement,
}

impl PathRule {
    /// Creates a rule, compiling the pattern.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the pattern is invalid.
    pub fn new(pattern: &str, requirement: AuthorizationRequirement) -> AuthResult<Self> {
        Ok(Self {
            pattern: PathPattern::new(pattern)?,
            requirement,
        })
    }
}

/// Ordered path rules, first-declared-wins.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<PathRule>,
}

/// Requirement applied to paths no rule matches.
pub static DEFAULT_REQUIREMENT: AuthorizationRequirement =
    AuthorizationRequirement::AuthenticatedOnly;

impl RuleTable {
    /// Creates an empty table (every path requires authentication).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule; later rules only apply where earlier ones don't match.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the pattern is invalid.
    pub fn push(&mut self, pattern: &str, requirement: AuthorizationRequirement) -> AuthResult<()> {
        self.rules.push(PathRule::new(pattern, requirement)?);
        Ok(())
    }

    /// Builder-style variant of [`RuleTable::push`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the pattern is invalid.
    pub fn with_rule(
        mut self,
        pattern: &str,
        requirement: AuthorizationRequirement,
    ) -> AuthResult<Self> {
        self.push(pattern, requirement)?;
        Ok(self)
    }

    /// Returns the first rule matching the path, if any.
    #[must_use]
    pub fn matching_rule(&self, path: &str) -> Option<&PathRule> {
        let normalized = normalize_path(path);
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(&normalized))
    }

    /// Returns the requirement for the path, falling back to authentication.
    #[must_use]
    pub fn requirement_for(&self, path: &str) -> &AuthorizationRequirement {
        self.matching_rule(path)
            .map_or(&DEFAULT_REQUIREMENT, |rule| &rule.requirement)
    }

    /// Iterates over the rules in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &PathRule> {
        self.rules.iter()
    }

    /// Number of declared rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no rules are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// =============================================================================
// Operation Rules
// =============================================================================

/// Method-level requirements keyed by operation id.
///
/// An operation without an entry carries no second-level check: only the
/// path rule applies to it.
#[derive(Debug, Clone, Default)]
pub struct OperationPolicy {
    requirements: HashMap<String, AuthorizationRequirement>,
}

impl OperationPolicy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a requirement to an operation, replacing any previous one.
    #[must_use]
    pub fn with_operation(
        mut self,
        operation: impl Into<String>,
        requirement: AuthorizationRequirement,
    ) -> Self {
        self.requirements.insert(operation.into(), requirement);
        self
    }

    /// Returns the requirement attached to the operation.
    #[must_use]
    pub fn requirement_for(&self, operation: &str) -> Option<&AuthorizationRequirement> {
        self.requirements.get(operation)
    }

    /// Number of operations with a requirement.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Returns `true` if no operation carries a requirement.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

impl FromIterator<(String, AuthorizationRequirement)> for OperationPolicy {
    fn from_iter<T: IntoIterator<Item = (String, AuthorizationRequirement)>>(iter: T) -> Self {
        Self {
            requirements: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_rules() -> RuleTable {
        RuleTable::new()
            .with_rule("/actuator/prometheus", AuthorizationRequirement::Public)
            .unwrap()
            .with_rule("/admin/**", AuthorizationRequirement::role("admin"))
            .unwrap()
            .with_rule("/**", AuthorizationRequirement::AuthenticatedOnly)
            .unwrap()
    }

    #[test]
    fn test_exact_pattern() {
        let p = PathPattern::new("/actuator/prometheus").unwrap();
        assert!(p.matches("/actuator/prometheus"));
        assert!(!p.matches("/actuator/prometheus/x"));
        assert!(!p.matches("/actuator"));
    }

    #[test]
    fn test_double_star_pattern() {
        let p = PathPattern::new("/admin/**").unwrap();
        assert!(p.matches("/admin"));
        assert!(p.matches("/admin/"));
        assert!(p.matches("/admin/test"));
        assert!(p.matches("/admin/a/b/c"));
        assert!(!p.matches("/administrator"));
        assert!(!p.matches("/api/admin"));
    }

    #[test]
    fn test_single_star_and_question_mark() {
        let p = PathPattern::new("/users/*/profile").unwrap();
        assert!(p.matches("/users/alice/profile"));
        assert!(!p.matches("/users/alice/bob/profile"));

        let p = PathPattern::new("/api/test?iew").unwrap();
        assert!(p.matches("/api/testView"));
        assert!(!p.matches("/api/testVVView"));
    }

    #[test]
    fn test_middle_double_star() {
        let p = PathPattern::new("/a/**/z").unwrap();
        assert!(p.matches("/a/z"));
        assert!(p.matches("/a/b/c/z"));
        assert!(!p.matches("/a/b/c"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = PathPattern::new("/files/a.b+(c)").unwrap();
        assert!(p.matches("/files/a.b+(c)"));
        assert!(!p.matches("/files/axb+(c)"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(PathPattern::new("  ").is_err());
    }

    #[test]
    fn test_first_declared_wins() {
        let rules = demo_rules();
        assert_eq!(
            rules.requirement_for("/actuator/prometheus"),
            &AuthorizationRequirement::Public
        );
        assert_eq!(
            rules.requirement_for("/admin/test"),
            &AuthorizationRequirement::role("admin")
        );
        assert_eq!(
            rules.requirement_for("/api/testView"),
            &AuthorizationRequirement::AuthenticatedOnly
        );

        // Catch-all declared first shadows everything after it.
        let shadowed = RuleTable::new()
            .with_rule("/**", AuthorizationRequirement::AuthenticatedOnly)
            .unwrap()
            .with_rule("/admin/**", AuthorizationRequirement::role("admin"))
            .unwrap();
        assert_eq!(
            shadowed.requirement_for("/admin/test"),
            &AuthorizationRequirement::AuthenticatedOnly
        );
    }

    #[test]
    fn test_unmatched_path_requires_authentication() {
        let rules = RuleTable::new()
            .with_rule("/public/**", AuthorizationRequirement::Public)
            .unwrap();
        assert_eq!(
            rules.requirement_for("/anything/else"),
            &AuthorizationRequirement::AuthenticatedOnly
        );
        assert!(rules.matching_rule("/anything/else").is_none());
        assert_eq!(
            RuleTable::new().requirement_for("/"),
            &AuthorizationRequirement::AuthenticatedOnly
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("//admin///test"), "/admin/test");
        assert_eq!(normalize_path("/api/../admin/test"), "/admin/test");
        assert_eq!(normalize_path("/./api/./testView"), "/api/testView");
        assert_eq!(normalize_path("/../../etc"), "/etc");
        assert_eq!(normalize_path("/admin/"), "/admin/");
        assert_eq!(normalize_path("/api/testView?remember-me=true"), "/api/testView");
    }

    #[test]
    fn test_is_canonical_path() {
        for path in ["/", "/api/testView", "/admin/", "/api/testView?remember-me=true"] {
            assert!(is_canonical_path(path), "{path}");
        }
        for path in [
            "",
            "/files/../actuator/prometheus",
            "/./api/testView",
            "/api/testView/.",
            "//admin/test",
            "/admin//test",
        ] {
            assert!(!is_canonical_path(path), "{path}");
        }
    }

    #[test]
    fn test_dot_segments_cannot_bypass_rules() {
        let rules = demo_rules();
        assert_eq!(
            rules.requirement_for("/actuator/prometheus/../../admin/test"),
            &AuthorizationRequirement::role("admin")
        );
    }

    #[test]
    fn test_operation_policy() {
        let ops = OperationPolicy::new()
            .with_operation("api.testView", AuthorizationRequirement::role("userView"))
            .with_operation("api.testEdit", AuthorizationRequirement::role("userEdit"));
        assert_eq!(ops.len(), 2);
        assert_eq!(
            ops.requirement_for("api.testEdit"),
            Some(&AuthorizationRequirement::role("userEdit"))
        );
        assert!(ops.requirement_for("api.testUnsecured").is_none());
    }

    #[test]
    fn test_requirement_serde() {
        let parsed: Vec<AuthorizationRequirement> =
            serde_json::from_str(r#"["public", "authenticated", {"role": "admin"}]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                AuthorizationRequirement::Public,
                AuthorizationRequirement::AuthenticatedOnly,
                AuthorizationRequirement::role("admin"),
            ]
        );
        assert_eq!(AuthorizationRequirement::role("admin").to_string(), "role:admin");
    }
}
