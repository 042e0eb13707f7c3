//! Resource tree
//!
//! Resources form a forest: each resource has at most one parent and tracks
//! its direct children. Like the role registry, nodes are stored in a dense
//! table, linked by index and compacted on removal.

use crate::acl::types::{Resource, ResourceRef};
use crate::error::{AclError, AclResult};
use std::collections::HashMap;
use tracing::trace;

/// Index of a resource in the tree table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(usize);

#[derive(Debug, Clone)]
struct ResourceNode {
    resource: Resource,
    parent: Option<ResourceId>,
    children: Vec<ResourceId>,
}

/// Forest of resources
#[derive(Debug, Clone, Default)]
pub struct ResourceTree {
    nodes: Vec<Option<ResourceNode>>,
    index: HashMap<String, ResourceId>,
}

impl ResourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, optionally under an existing parent
    pub fn add(
        &mut self,
        resource: impl Into<ResourceRef>,
        parent: Option<ResourceRef>,
    ) -> AclResult<()> {
        let resource = resource.into().into_resource();

        if resource.id().is_empty() {
            return Err(AclError::InvalidResourceArgument(
                "resource identifier must not be empty".to_string(),
            ));
        }

        if self.has(resource.id()) {
            return Err(AclError::DuplicateResource {
                resource: resource.id().to_string(),
            });
        }

        let parent = parent.map(|p| self.resolve(&p)).transpose()?;

        let id = ResourceId(self.nodes.len());
        if let Some(parent_id) = parent
            && let Some(parent) = self.node_mut(parent_id)
        {
            parent.children.push(id);
        }

        trace!(resource = resource.id(), has_parent = parent.is_some(), "Registered resource");

        self.index.insert(resource.id().to_string(), id);
        self.nodes.push(Some(ResourceNode {
            resource,
            parent,
            children: Vec::new(),
        }));

        Ok(())
    }

    pub fn get(&self, resource: impl Into<ResourceRef>) -> AclResult<&Resource> {
        let id = self.resolve(&resource.into())?;
        self.resource(id)
            .ok_or_else(|| AclError::resource_not_found(format!("#{}", id.0)))
    }

    pub fn has(&self, resource: impl Into<ResourceRef>) -> bool {
        self.index.contains_key(resource.into().id())
    }

    /// Parent of a resource, if any
    pub fn get_parent(&self, resource: impl Into<ResourceRef>) -> AclResult<Option<&Resource>> {
        let id = self.resolve(&resource.into())?;
        Ok(self.parent_of(id).and_then(|p| self.resource(p)))
    }

    /// Check if `resource` descends from `ancestor`
    ///
    /// With `direct_only`, only the direct parent counts.
    pub fn inherits(
        &self,
        resource: impl Into<ResourceRef>,
        ancestor: impl Into<ResourceRef>,
        direct_only: bool,
    ) -> AclResult<bool> {
        let resource_id = self.resolve(&resource.into())?;
        let ancestor_id = self.resolve(&ancestor.into())?;

        let mut current = self.parent_of(resource_id);
        while let Some(parent) = current {
            if parent == ancestor_id {
                return Ok(true);
            }
            if direct_only {
                return Ok(false);
            }
            current = self.parent_of(parent);
        }

        Ok(false)
    }

    /// All descendants of a resource, depth first
    pub fn descendants(&self, resource: impl Into<ResourceRef>) -> AclResult<Vec<&Resource>> {
        let id = self.resolve(&resource.into())?;
        Ok(self
            .subtree(id)
            .into_iter()
            .skip(1)
            .filter_map(|id| self.resource(id))
            .collect())
    }

    /// Remove a resource together with its whole subtree
    ///
    /// Returns the removed resources, the requested one first.
    pub fn remove(&mut self, resource: impl Into<ResourceRef>) -> AclResult<Vec<Resource>> {
        let id = self.resolve(&resource.into())?;

        if let Some(parent_id) = self.parent_of(id)
            && let Some(parent) = self.node_mut(parent_id)
        {
            parent.children.retain(|c| *c != id);
        }

        let mut removed = Vec::new();
        for node_id in self.subtree(id) {
            if let Some(node) = self.nodes.get_mut(node_id.0).and_then(Option::take) {
                self.index.remove(node.resource.id());
                removed.push(node.resource);
            }
        }
        self.compact();

        Ok(removed)
    }

    /// Remove every resource, returning them in registration order
    pub fn remove_all(&mut self) -> Vec<Resource> {
        self.index.clear();
        self.nodes
            .drain(..)
            .flatten()
            .map(|node| node.resource)
            .collect()
    }

    /// All registered resources, in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.nodes.iter().flatten().map(|node| &node.resource)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub(crate) fn resolve(&self, resource: &ResourceRef) -> AclResult<ResourceId> {
        self.index
            .get(resource.id())
            .copied()
            .ok_or_else(|| AclError::resource_not_found(resource.id()))
    }

    pub(crate) fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.node(id).map(|node| &node.resource)
    }

    pub(crate) fn parent_of(&self, id: ResourceId) -> Option<ResourceId> {
        self.node(id).and_then(|node| node.parent)
    }

    /// `id` followed by its descendants in depth-first pre-order
    fn subtree(&self, id: ResourceId) -> Vec<ResourceId> {
        let mut ordered = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            ordered.push(current);
            if let Some(node) = self.node(current) {
                stack.extend(node.children.iter().rev());
            }
        }
        ordered
    }

    /// Drop vacated slots and renumber the remaining resources
    fn compact(&mut self) {
        let mut remap = Vec::with_capacity(self.nodes.len());
        let mut next = 0;
        for node in &self.nodes {
            remap.push(node.as_ref().map(|_| {
                next += 1;
                ResourceId(next - 1)
            }));
        }
        if next == self.nodes.len() {
            return;
        }

        let renumber = |id: ResourceId| remap.get(id.0).copied().flatten();

        self.nodes.retain(Option::is_some);
        for node in self.nodes.iter_mut().flatten() {
            node.parent = node.parent.and_then(renumber);
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

    fn node(&self, id: ResourceId) -> Option<&ResourceNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: ResourceId) -> Option<&mut ResourceNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ResourceTree {
        let mut tree = ResourceTree::new();
        tree.add("a", None).unwrap();
        tree.add("b", Some("a".into())).unwrap();
        tree.add("c", Some("b".into())).unwrap();
        tree.add("d", Some("a".into())).unwrap();
        tree.add("e", None).unwrap();
        tree
    }

    fn ids(resources: Vec<&Resource>) -> Vec<&str> {
        resources.into_iter().map(Resource::id).collect()
    }

    #[test]
    fn test_add_failures() {
        let mut tree = tree();
        assert!(matches!(
            tree.add("a", None),
            Err(AclError::DuplicateResource { .. })
        ));
        assert!(matches!(
            tree.add("x", Some("missing".into())),
            Err(AclError::ResourceNotFound { .. })
        ));
        assert!(matches!(
            tree.add("", None),
            Err(AclError::InvalidResourceArgument(_))
        ));
        assert!(!tree.has("x"));
    }

    #[test]
    fn test_descendants_are_transitive() {
        let tree = tree();
        assert_eq!(ids(tree.descendants("a").unwrap()), vec!["b", "c", "d"]);
        assert_eq!(ids(tree.descendants("b").unwrap()), vec!["c"]);
        assert!(tree.descendants("e").unwrap().is_empty());
        assert!(tree.descendants("missing").is_err());
    }

    #[test]
    fn test_inherits() {
        let tree = tree();
        assert!(tree.inherits("b", "a", true).unwrap());
        assert!(tree.inherits("c", "a", false).unwrap());
        assert!(!tree.inherits("c", "a", true).unwrap());
        assert!(!tree.inherits("a", "b", false).unwrap());
        assert!(!tree.inherits("e", "a", false).unwrap());
    }

    #[test]
    fn test_get_parent() {
        let tree = tree();
        assert_eq!(tree.get_parent("c").unwrap().map(Resource::id), Some("b"));
        assert_eq!(tree.get_parent("a").unwrap(), None);
    }

    #[test]
    fn test_remove_takes_subtree() {
        let mut tree = tree();
        let removed = tree.remove("b").unwrap();
        let removed: Vec<&str> = removed.iter().map(Resource::id).collect();
        assert_eq!(removed, vec!["b", "c"]);

        assert!(!tree.has("b"));
        assert!(!tree.has("c"));
        assert_eq!(ids(tree.descendants("a").unwrap()), vec!["d"]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_removed_slots_are_reclaimed() {
        let mut tree = tree();
        for _ in 0..50 {
            tree.add("tmp", Some("a".into())).unwrap();
            tree.add("tmp_child", Some("tmp".into())).unwrap();
            tree.remove("tmp").unwrap();
        }
        assert_eq!(tree.nodes.len(), 5);

        tree.remove("b").unwrap();
        tree.add("f", Some("d".into())).unwrap();
        assert_eq!(ids(tree.descendants("a").unwrap()), vec!["d", "f"]);
        assert_eq!(tree.get_parent("f").unwrap().map(Resource::id), Some("d"));
        assert_eq!(ids(tree.iter().collect()), vec!["a", "d", "e", "f"]);
    }

    #[test]
    fn test_remove_all() {
        let mut tree = tree();
        assert_eq!(tree.remove_all().len(), 5);
        assert!(tree.is_empty());
        assert!(tree.remove_all().is_empty());
    }
}
