//! Static role hierarchy with precomputed reachability.
//!
//! The hierarchy is declared once at startup, either as explicit
//! `(superior, subordinate)` edges or as lines in the `a > b > c` notation:
//!
//! ```
//! use rolegate_auth::hierarchy::RoleHierarchy;
//!
//! let hierarchy = RoleHierarchy::parse(
//!     ["admin", "userEdit", "userView"],
//!     "admin > userEdit\nuserEdit > userView",
//! )
//! .unwrap();
//!
//! assert!(hierarchy.dominates("admin", "userView"));
//! assert!(!hierarchy.dominates("userView", "userEdit"));
//! ```
//!
//! Construction fails with a configuration error when an edge references an
//! undeclared role or when the edges form a cycle. Queries are answered from
//! a transitive closure computed at construction, so `dominates` is a single
//! set lookup.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::Role;

/// Immutable partial order over roles.
#[derive(Debug, Clone)]
pub struct RoleHierarchy {
    /// For every declared role, the roles it reaches (itself excluded).
    reachable: HashMap<Role, HashSet<Role>>,
}

impl RoleHierarchy {
    /// Builds a hierarchy from declared roles and dominance edges.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if an edge references an undeclared
    /// role, a role dominates itself, or the edges contain a cycle.
    pub fn new<R, E>(roles: R, edges: E) -> AuthResult<Self>
    where
        R: IntoIterator,
        R::Item: Into<Role>,
        E: IntoIterator<Item = (Role, Role)>,
    {
        let declared: BTreeSet<Role> = roles.into_iter().map(Into::into).collect();
        let mut children: BTreeMap<Role, BTreeSet<Role>> = declared
            .iter()
            .map(|role| (role.clone(), BTreeSet::new()))
            .collect();

        for (superior, subordinate) in edges {
            for role in [&superior, &subordinate] {
                if !declared.contains(role) {
                    return Err(AuthError::configuration(format!(
                        "role hierarchy references undeclared role '{role}'"
                    )));
                }
            }
            if superior == subordinate {
                return Err(AuthError::configuration(format!(
                    "role '{superior}' cannot dominate itself"
                )));
            }
            if let Some(set) = children.get_mut(&superior) {
                set.insert(subordinate);
            }
        }

        detect_cycle(&children)?;

        let reachable = declared
            .iter()
            .map(|role| (role.clone(), closure_of(role, &children)))
            .collect();

        Ok(Self { reachable })
    }

    /// Builds a hierarchy from `a > b` / `a > b > c` lines.
    ///
    /// Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` for malformed lines and for every
    /// condition rejected by [`RoleHierarchy::new`].
    pub fn parse<R>(roles: R, spec: &str) -> AuthResult<Self>
    where
        R: IntoIterator,
        R::Item: Into<Role>,
    {
        Self::new(roles, parse_edges(spec.lines())?)
    }

    /// Returns `true` if `a == b` or `a` reaches `b` through one or more edges.
    ///
    /// An undeclared role dominates only itself.
    #[must_use]
    pub fn dominates(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        self.reachable
            .get(a)
            .is_some_and(|subordinates| subordinates.contains(b))
    }

    /// Returns `true` if any of `roles` dominates `required`.
    #[must_use]
    pub fn any_dominates<'a>(
        &self,
        roles: impl IntoIterator<Item = &'a Role>,
        required: &Role,
    ) -> bool {
        roles
            .into_iter()
            .any(|role| self.dominates(role.as_str(), required.as_str()))
    }

    /// Returns `true` if the role was declared.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.reachable.contains_key(role)
    }

    /// Returns every role reachable from `roles`, including the roles themselves.
    #[must_use]
    pub fn reachable_roles<'a>(
        &self,
        roles: impl IntoIterator<Item = &'a Role>,
    ) -> BTreeSet<Role> {
        let mut result = BTreeSet::new();
        for role in roles {
            result.insert(role.clone());
            if let Some(subordinates) = self.reachable.get(role) {
                result.extend(subordinates.iter().cloned());
            }
        }
        result
    }
}

/// Parses hierarchy lines into `(superior, subordinate)` edges.
///
/// # Errors
///
/// Returns `AuthError::Configuration` if a line has an empty role name or
/// fewer than two roles.
pub fn parse_edges<'a>(lines: impl IntoIterator<Item = &'a str>) -> AuthResult<Vec<(Role, Role)>> {
    let mut edges = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let chain: Vec<&str> = line.split('>').map(str::trim).collect();
        if chain.len() < 2 || chain.iter().any(|name| name.is_empty()) {
            return Err(AuthError::configuration(format!(
                "malformed role hierarchy line '{line}', expected 'superior > subordinate'"
            )));
        }

        for pair in chain.windows(2) {
            edges.push((Role::new(pair[0]), Role::new(pair[1])));
        }
    }
    Ok(edges)
}

fn detect_cycle(children: &BTreeMap<Role, BTreeSet<Role>>) -> AuthResult<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        role: &'a Role,
        children: &'a BTreeMap<Role, BTreeSet<Role>>,
        marks: &mut HashMap<&'a Role, Mark>,
        path: &mut Vec<&'a Role>,
    ) -> AuthResult<()> {
        match marks.get(role) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|r| *r == role).unwrap_or(0);
                let cycle: Vec<&str> = path[start..]
                    .iter()
                    .map(|r| r.as_str())
                    .chain(std::iter::once(role.as_str()))
                    .collect();
                return Err(AuthError::configuration(format!(
                    "role hierarchy contains a cycle: {}",
                    cycle.join(" > ")
                )));
            }
            None => {}
        }

        marks.insert(role, Mark::Visiting);
        path.push(role);
        if let Some(next) = children.get(role) {
            for child in next {
                visit(child, children, marks, path)?;
            }
        }
        path.pop();
        marks.insert(role, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut path = Vec::new();
    for role in children.keys() {
        visit(role, children, &mut marks, &mut path)?;
    }
    Ok(())
}

fn closure_of(role: &Role, children: &BTreeMap<Role, BTreeSet<Role>>) -> HashSet<Role> {
    let mut seen = HashSet::new();
    let mut stack: Vec<&Role> = children.get(role).into_iter().flatten().collect();
    while let Some(next) = stack.pop() {
        if seen.insert(next.clone()) {
            stack.extend(children.get(next).into_iter().flatten());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> RoleHierarchy {
        RoleHierarchy::parse(
            ["admin", "userEdit", "userView"],
            "admin > userEdit\nuserEdit > userView",
        )
        .unwrap()
    }

    #[test]
    fn test_transitive_dominance() {
        let h = demo();
        assert!(h.dominates("admin", "userEdit"));
        assert!(h.dominates("userEdit", "userView"));
        assert!(h.dominates("admin", "userView"));
    }

    #[test]
    fn test_reflexive_dominance() {
        let h = demo();
        for role in ["admin", "userEdit", "userView"] {
            assert!(h.dominates(role, role));
        }
    }

    #[test]
    fn test_dominance_is_not_symmetric() {
        let h = demo();
        assert!(!h.dominates("userView", "userEdit"));
        assert!(!h.dominates("userEdit", "admin"));
        assert!(!h.dominates("userView", "admin"));
    }

    #[test]
    fn test_undeclared_role_dominates_only_itself() {
        let h = demo();
        assert!(h.dominates("guest", "guest"));
        assert!(!h.dominates("guest", "userView"));
        assert!(!h.dominates("admin", "guest"));
        assert!(!h.contains("guest"));
    }

    #[test]
    fn test_chain_notation() {
        let h = RoleHierarchy::parse(["a", "b", "c", "d"], "a > b > c\n\n  c > d  ").unwrap();
        assert!(h.dominates("a", "d"));
        assert!(h.dominates("b", "d"));
        assert!(!h.dominates("d", "a"));
    }

    #[test]
    fn test_diamond_hierarchy() {
        let h = RoleHierarchy::parse(
            ["root", "left", "right", "leaf"],
            "root > left > leaf\nroot > right > leaf",
        )
        .unwrap();
        assert!(h.dominates("root", "leaf"));
        assert!(h.dominates("left", "leaf"));
        assert!(!h.dominates("left", "right"));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = RoleHierarchy::parse(["a", "b", "c"], "a > b\nb > c\nc > a").unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_self_edge_rejected() {
        let err = RoleHierarchy::parse(["a"], "a > a").unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn test_undeclared_role_in_edge_rejected() {
        let err = RoleHierarchy::parse(["admin"], "admin > ghost").unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_malformed_line_rejected() {
        assert!(RoleHierarchy::parse(["admin"], "admin").is_err());
        assert!(RoleHierarchy::parse(["admin", "b"], "admin > ").is_err());
    }

    #[test]
    fn test_any_dominates_and_reachable_roles() {
        let h = demo();
        let roles = [Role::new("userEdit")];
        assert!(h.any_dominates(&roles, &Role::new("userView")));
        assert!(!h.any_dominates(&roles, &Role::new("admin")));

        let reachable = h.reachable_roles(&roles);
        assert!(reachable.contains("userEdit"));
        assert!(reachable.contains("userView"));
        assert!(!reachable.contains("admin"));
    }
}
