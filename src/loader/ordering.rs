//! Parent-first ordering of description entries
//!
//! Roles and resources are ordered independently so that every parent is
//! inserted before its children, whatever the input order.

use crate::error::{LoadError, LoadResult};
use crate::loader::types::{ResourceEntry, RoleEntry};
use std::collections::HashSet;

/// An entry that names its parents
pub trait ParentLinked {
    /// Entry kind used in error messages
    const KIND: &'static str;

    fn name(&self) -> &str;
    fn parents(&self) -> &[String];
}

impl ParentLinked for RoleEntry {
    const KIND: &'static str = "role";

    fn name(&self) -> &str {
        &self.name
    }

    fn parents(&self) -> &[String] {
        RoleEntry::parents(self)
    }
}

impl ParentLinked for ResourceEntry {
    const KIND: &'static str = "resource";

    fn name(&self) -> &str {
        &self.name
    }

    fn parents(&self) -> &[String] {
        ResourceEntry::parents(self)
    }
}

/// Order entries parents first
///
/// Works in rounds: each round takes, in input order, every pending entry
/// whose parents are all resolved. A round that resolves nothing means the
/// pending entries form a cycle.
pub fn order_by_parent<T: ParentLinked>(entries: &[T]) -> LoadResult<Vec<&T>> {
    let names: HashSet<&str> = entries.iter().map(ParentLinked::name).collect();

    for entry in entries {
        if let Some(parent) = entry.parents().iter().find(|p| !names.contains(p.as_str())) {
            return Err(LoadError::UnresolvedParent {
                kind: T::KIND,
                name: entry.name().to_string(),
                parent: parent.clone(),
            });
        }
    }

    let mut resolved: HashSet<&str> = HashSet::with_capacity(entries.len());
    let mut ordered = Vec::with_capacity(entries.len());
    let mut pending: Vec<&T> = entries.iter().collect();

    while !pending.is_empty() {
        let (ready, blocked): (Vec<&T>, Vec<&T>) = pending
            .into_iter()
            .partition(|entry| entry.parents().iter().all(|p| resolved.contains(p.as_str())));

        if ready.is_empty() {
            return Err(LoadError::CycleDetected {
                kind: T::KIND,
                entries: blocked.iter().map(|e| e.name().to_string()).collect(),
            });
        }

        resolved.extend(ready.iter().map(|&entry| entry.name()));
        ordered.extend(ready);
        pending = blocked;
    }

    Ok(ordered)
}
