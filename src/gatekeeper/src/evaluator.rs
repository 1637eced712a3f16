//! Authorization evaluation

use crate::pattern::CompiledPattern;
use crate::resolver::PolicyTable;
use crate::types::RoleSet;
use std::collections::HashSet;

/// Union of the patterns of every role in `roles` that has a policy entry.
///
/// Patterns shared between roles appear once.
pub fn effective_patterns<'a>(roles: &RoleSet, table: &'a PolicyTable) -> Vec<&'a CompiledPattern> {
    let mut seen = HashSet::new();
    roles
        .iter()
        .filter_map(|role| table.patterns_for(role))
        .flatten()
        .filter(|pattern| seen.insert(pattern.source()))
        .collect()
}

/// First pattern of the effective set that admits `path`
pub fn matching_pattern<'a>(
    roles: &RoleSet,
    table: &'a PolicyTable,
    path: &str,
) -> Option<&'a CompiledPattern> {
    effective_patterns(roles, table)
        .into_iter()
        .find(|pattern| pattern.matches(path))
}

/// Whether any of the caller's roles admits `path`.
///
/// An empty role set or an empty effective pattern set always denies.
pub fn is_allowed(roles: &RoleSet, table: &PolicyTable, path: &str) -> bool {
    matching_pattern(roles, table, path).is_some()
}
