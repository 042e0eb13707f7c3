//! Role registry
//!
//! Owns the role inheritance DAG. Roles live in a dense table and refer to
//! each other by index, so removing a role can sever both directions of
//! every edge it takes part in. The table is compacted on removal; a
//! [`RoleId`] is only meaningful until the next removal.
//!
//! Parents are kept in insertion order, which is also their priority order:
//! the parent added last has the highest priority when inherited rules
//! conflict.

use crate::acl::types::{Role, RoleRef};
use crate::error::{AclError, AclResult};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Index of a role in the registry table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleId(usize);

#[derive(Debug, Clone)]
struct RoleNode {
    role: Role,
    parents: Vec<RoleId>,
    children: Vec<RoleId>,
}

/// Registry of roles and their inheritance edges
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    nodes: Vec<Option<RoleNode>>,
    index: HashMap<String, RoleId>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role without parents
    pub fn add(&mut self, role: impl Into<RoleRef>) -> AclResult<&mut Self> {
        self.add_with_parents(role, std::iter::empty::<RoleRef>())
    }

    /// Add a role inheriting directly from `parents`
    ///
    /// Every parent must already be registered. Parents are prioritized in
    /// the order given, the last one winning conflicts.
    pub fn add_with_parents<P>(
        &mut self,
        role: impl Into<RoleRef>,
        parents: impl IntoIterator<Item = P>,
    ) -> AclResult<&mut Self>
    where
        P: Into<RoleRef>,
    {
        let role = role.into().into_role();

        if role.id().is_empty() {
            return Err(AclError::InvalidRoleArgument(
                "role identifier must not be empty".to_string(),
            ));
        }

        if self.has(role.id()) {
            return Err(AclError::DuplicateRole {
                role: role.id().to_string(),
            });
        }

        let mut parent_ids = Vec::new();
        for parent in parents {
            let parent_id = self.resolve(&parent.into())?;
            if !parent_ids.contains(&parent_id) {
                parent_ids.push(parent_id);
            }
        }

        let id = RoleId(self.nodes.len());
        for parent_id in &parent_ids {
            if let Some(parent) = self.node_mut(*parent_id) {
                parent.children.push(id);
            }
        }

        trace!(role = role.id(), parents = parent_ids.len(), "Registered role");

        self.index.insert(role.id().to_string(), id);
        self.nodes.push(Some(RoleNode {
            role,
            parents: parent_ids,
            children: Vec::new(),
        }));

        Ok(self)
    }

    /// Get a registered role
    pub fn get(&self, role: impl Into<RoleRef>) -> AclResult<&Role> {
        let id = self.resolve(&role.into())?;
        self.role(id)
            .ok_or_else(|| AclError::role_not_found(format!("#{}", id.0)))
    }

    /// Check if a role is registered
    pub fn has(&self, role: impl Into<RoleRef>) -> bool {
        self.index.contains_key(role.into().id())
    }

    /// Direct parents of a role, lowest priority first
    pub fn get_parents(&self, role: impl Into<RoleRef>) -> AclResult<Vec<&Role>> {
        let id = self.resolve(&role.into())?;
        Ok(self.roles_at(self.parent_ids(id)))
    }

    /// Direct children of a role, in the order they were added
    pub fn get_children(&self, role: impl Into<RoleRef>) -> AclResult<Vec<&Role>> {
        let id = self.resolve(&role.into())?;
        let children = self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[]);
        Ok(self.roles_at(children))
    }

    /// Check if `role` inherits from `ancestor`
    ///
    /// With `direct_only`, only direct parents count. Otherwise the whole DAG
    /// above `role` is searched; each role is visited once, so cyclic graphs
    /// terminate.
    pub fn inherits(
        &self,
        role: impl Into<RoleRef>,
        ancestor: impl Into<RoleRef>,
        direct_only: bool,
    ) -> AclResult<bool> {
        let role_id = self.resolve(&role.into())?;
        let ancestor_id = self.resolve(&ancestor.into())?;

        let parents = self.parent_ids(role_id);
        if parents.contains(&ancestor_id) {
            return Ok(true);
        }
        if direct_only {
            return Ok(false);
        }

        let mut visited = HashSet::from([role_id]);
        let mut stack = parents.to_vec();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let parents = self.parent_ids(current);
            if parents.contains(&ancestor_id) {
                return Ok(true);
            }
            stack.extend_from_slice(parents);
        }

        Ok(false)
    }

    /// Remove a role and every edge referencing it
    pub fn remove(&mut self, role: impl Into<RoleRef>) -> AclResult<Role> {
        let id = self.resolve(&role.into())?;
        let node = self
            .nodes
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| AclError::role_not_found(format!("#{}", id.0)))?;

        for child_id in &node.children {
            if let Some(child) = self.node_mut(*child_id) {
                child.parents.retain(|p| *p != id);
            }
        }
        for parent_id in &node.parents {
            if let Some(parent) = self.node_mut(*parent_id) {
                parent.children.retain(|c| *c != id);
            }
        }

        self.index.remove(node.role.id());
        self.compact();
        Ok(node.role)
    }

    /// Remove every role
    pub fn remove_all(&mut self) {
        self.nodes.clear();
        self.index.clear();
    }

    /// All registered roles, in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.nodes.iter().flatten().map(|node| &node.role)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub(crate) fn resolve(&self, role: &RoleRef) -> AclResult<RoleId> {
        self.index
            .get(role.id())
            .copied()
            .ok_or_else(|| AclError::role_not_found(role.id()))
    }

    pub(crate) fn role(&self, id: RoleId) -> Option<&Role> {
        self.node(id).map(|node| &node.role)
    }

    pub(crate) fn parent_ids(&self, id: RoleId) -> &[RoleId] {
        self.node(id).map(|n| n.parents.as_slice()).unwrap_or(&[])
    }

    /// Drop vacated slots and renumber the remaining roles
    fn compact(&mut self) {
        let mut remap = Vec::with_capacity(self.nodes.len());
        let mut next = 0;
        for node in &self.nodes {
            remap.push(node.as_ref().map(|_| {
                next += 1;
                RoleId(next - 1)
            }));
        }
        if next == self.nodes.len() {
            return;
        }

        let renumber = |id: RoleId| remap.get(id.0).copied().flatten();

        self.nodes.retain(Option::is_some);
        for node in self.nodes.iter_mut().flatten() {
            node.parents = node.parents.iter().filter_map(|id| renumber(*id)).collect();
            node.children = node.children.iter().filter_map(|id| renumber(*id)).collect();
        }
        self.index.retain(|_, id| match renumber(*id) {
            Some(new) => {
                *id = new;
                true
            }
            None => false,
        });
    }

    fn roles_at(&self, ids: &[RoleId]) -> Vec<&Role> {
        ids.iter().filter_map(|id| self.role(*id)).collect()
    }

    fn node(&self, id: RoleId) -> Option<&RoleNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: RoleId) -> Option<&mut RoleNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }
}
