//! ACL engine
//!
//! Ties the role registry, the resource tree and the rule store together and
//! implements rule mutation and access resolution.
//!
//! Resolution order for a query (role, resource, privilege):
//! 1. Depth-first search over the role and its ancestors for a rule at the
//!    current resource. The parent added last is explored first, and the
//!    first conclusive rule wins.
//! 2. The all-roles bucket at the current resource.
//! 3. The parent resource, repeating from step 1.
//!
//! Nothing applicable anywhere means the query is denied.

use crate::acl::registry::{RoleId, RoleRegistry};
use crate::acl::resources::ResourceTree;
use crate::acl::rules::{Assertion, Rule, RuleStore};
use crate::acl::types::{
    Operation, PrivilegeScope, Privileges, Resource, ResourceRef, ResourceScope, Resources, Role,
    RoleRef, RoleScope, Roles, Scope, Targets, Verdict,
};
use crate::error::AclResult;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// In-memory access control list
#[derive(Debug, Clone, Default)]
pub struct Acl {
    roles: RoleRegistry,
    resources: ResourceTree,
    rules: RuleStore,
}

impl Acl {
    /// Create an empty ACL that denies everything
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub fn add_role(&mut self, role: impl Into<RoleRef>) -> AclResult<&mut Self> {
        self.roles.add(role)?;
        Ok(self)
    }

    /// Add a role inheriting from `parents`, the last parent having the
    /// highest priority
    pub fn add_role_with_parents<P>(
        &mut self,
        role: impl Into<RoleRef>,
        parents: impl IntoIterator<Item = P>,
    ) -> AclResult<&mut Self>
    where
        P: Into<RoleRef>,
    {
        self.roles.add_with_parents(role, parents)?;
        Ok(self)
    }

    pub fn get_role(&self, role: impl Into<RoleRef>) -> AclResult<&Role> {
        self.roles.get(role)
    }

    pub fn has_role(&self, role: impl Into<RoleRef>) -> bool {
        self.roles.has(role)
    }

    pub fn inherits_role(
        &self,
        role: impl Into<RoleRef>,
        ancestor: impl Into<RoleRef>,
        direct_only: bool,
    ) -> AclResult<bool> {
        self.roles.inherits(role, ancestor, direct_only)
    }

    /// Remove a role and every rule keyed to it
    pub fn remove_role(&mut self, role: impl Into<RoleRef>) -> AclResult<&mut Self> {
        let removed = self.roles.remove(role)?;
        let purged = self.rules.purge_role(removed.id());
        debug!(role = removed.id(), purged, "Removed role");
        Ok(self)
    }

    /// Remove all roles and every role-specific rule
    pub fn remove_role_all(&mut self) -> &mut Self {
        self.roles.remove_all();
        self.rules.purge_all_roles();
        debug!("Removed all roles");
        self
    }

    /// Identifiers of all roles, in registration order
    pub fn roles(&self) -> Vec<&str> {
        self.roles.iter().map(Role::id).collect()
    }

    pub fn role_registry(&self) -> &RoleRegistry {
        &self.roles
    }

    // =========================================================================
    // Resources
    // =========================================================================

    pub fn add_resource(&mut self, resource: impl Into<ResourceRef>) -> AclResult<&mut Self> {
        self.resources.add(resource, None)?;
        Ok(self)
    }

    pub fn add_resource_with_parent(
        &mut self,
        resource: impl Into<ResourceRef>,
        parent: impl Into<ResourceRef>,
    ) -> AclResult<&mut Self> {
        self.resources.add(resource, Some(parent.into()))?;
        Ok(self)
    }

    pub fn get_resource(&self, resource: impl Into<ResourceRef>) -> AclResult<&Resource> {
        self.resources.get(resource)
    }

    pub fn has_resource(&self, resource: impl Into<ResourceRef>) -> bool {
        self.resources.has(resource)
    }

    pub fn get_resource_parent(
        &self,
        resource: impl Into<ResourceRef>,
    ) -> AclResult<Option<&Resource>> {
        self.resources.get_parent(resource)
    }

    pub fn inherits_resource(
        &self,
        resource: impl Into<ResourceRef>,
        ancestor: impl Into<ResourceRef>,
        direct_only: bool,
    ) -> AclResult<bool> {
        self.resources.inherits(resource, ancestor, direct_only)
    }

    /// Remove a resource, its descendants, and every rule keyed to them
    pub fn remove_resource(&mut self, resource: impl Into<ResourceRef>) -> AclResult<&mut Self> {
        let removed = self.resources.remove(resource)?;
        for resource in &removed {
            self.rules.purge_resource(resource.id());
        }
        debug!(removed = removed.len(), "Removed resource subtree");
        Ok(self)
    }

    /// Remove all resources and their rules
    ///
    /// Rules on all resources are kept.
    pub fn remove_resource_all(&mut self) -> &mut Self {
        for resource in self.resources.remove_all() {
            self.rules.purge_resource(resource.id());
        }
        debug!("Removed all resources");
        self
    }

    /// Every descendant of a resource, not just its direct children
    pub fn get_child_resources(
        &self,
        resource: impl Into<ResourceRef>,
    ) -> AclResult<Vec<&Resource>> {
        self.resources.descendants(resource)
    }

    /// Identifiers of all resources, in registration order
    pub fn resources(&self) -> Vec<&str> {
        self.resources.iter().map(Resource::id).collect()
    }

    // =========================================================================
    // Rules
    // =========================================================================

    pub fn allow(
        &mut self,
        roles: impl Into<Roles>,
        resources: impl Into<Resources>,
        privileges: impl Into<Privileges>,
    ) -> AclResult<&mut Self> {
        self.set_rule(Operation::Add, Verdict::Allow, roles, resources, privileges, None)
    }

    pub fn deny(
        &mut self,
        roles: impl Into<Roles>,
        resources: impl Into<Resources>,
        privileges: impl Into<Privileges>,
    ) -> AclResult<&mut Self> {
        self.set_rule(Operation::Add, Verdict::Deny, roles, resources, privileges, None)
    }

    /// Like [`Acl::allow`], with an assertion attached to every rule written
    pub fn allow_with(
        &mut self,
        roles: impl Into<Roles>,
        resources: impl Into<Resources>,
        privileges: impl Into<Privileges>,
        assertion: Arc<dyn Assertion>,
    ) -> AclResult<&mut Self> {
        self.set_rule(
            Operation::Add,
            Verdict::Allow,
            roles,
            resources,
            privileges,
            Some(assertion),
        )
    }

    pub fn deny_with(
        &mut self,
        roles: impl Into<Roles>,
        resources: impl Into<Resources>,
        privileges: impl Into<Privileges>,
        assertion: Arc<dyn Assertion>,
    ) -> AclResult<&mut Self> {
        self.set_rule(
            Operation::Add,
            Verdict::Deny,
            roles,
            resources,
            privileges,
            Some(assertion),
        )
    }

    pub fn remove_allow(
        &mut self,
        roles: impl Into<Roles>,
        resources: impl Into<Resources>,
        privileges: impl Into<Privileges>,
    ) -> AclResult<&mut Self> {
        self.set_rule(Operation::Remove, Verdict::Allow, roles, resources, privileges, None)
    }

    pub fn remove_deny(
        &mut self,
        roles: impl Into<Roles>,
        resources: impl Into<Resources>,
        privileges: impl Into<Privileges>,
    ) -> AclResult<&mut Self> {
        self.set_rule(Operation::Remove, Verdict::Deny, roles, resources, privileges, None)
    }

    /// Add or remove rules over the cross product of roles and resources
    ///
    /// Wildcard roles mean all roles. Wildcard resources mean all resources
    /// and, when any are registered, each registered resource individually
    /// as well. An empty resource list addresses the all-resources bucket
    /// alone. Every listed resource also stands for all of its current
    /// descendants. Wildcard privileges address the all-privileges slot.
    pub fn set_rule(
        &mut self,
        operation: Operation,
        verdict: Verdict,
        roles: impl Into<Roles>,
        resources: impl Into<Resources>,
        privileges: impl Into<Privileges>,
        assertion: Option<Arc<dyn Assertion>>,
    ) -> AclResult<&mut Self> {
        let roles = self.expand_roles(roles.into())?;
        let resources = self.expand_resources(resources.into())?;
        let privileges = privileges.into().into_list();

        debug!(
            operation = %operation,
            verdict = %verdict,
            roles = ?roles,
            resources = ?resources,
            privileges = ?privileges,
            "Setting rule"
        );

        for resource in &resources {
            for role in &roles {
                let (resource, role) = (resource.as_deref(), role.as_deref());
                match operation {
                    Operation::Add => {
                        let bucket = self.rules.bucket_or_insert(resource, role);
                        match &privileges {
                            None => bucket.set_all(Rule::new(verdict, assertion.clone())),
                            Some(list) => {
                                for privilege in list {
                                    bucket.set_privilege(
                                        privilege.as_str(),
                                        Rule::new(verdict, assertion.clone()),
                                    );
                                }
                            }
                        }
                    }
                    Operation::Remove => self.remove_rules(resource, role, verdict, &privileges),
                }
            }
        }

        Ok(self)
    }

    fn remove_rules(
        &mut self,
        resource: Option<&str>,
        role: Option<&str>,
        verdict: Verdict,
        privileges: &Option<Vec<String>>,
    ) {
        let is_root = resource.is_none() && role.is_none();
        let Some(bucket) = self.rules.bucket_mut(resource, role) else {
            return;
        };

        match privileges {
            None if is_root => {
                if bucket.all_privileges().map(Rule::verdict) == Some(verdict) {
                    self.rules.reset_root();
                }
            }
            None => {
                bucket.remove_all_matching(verdict);
            }
            Some(list) => {
                for privilege in list {
                    bucket.remove_privilege_matching(privilege, verdict);
                }
            }
        }
    }

    /// Role identifiers a rule applies to; `None` is every role
    fn expand_roles(&self, roles: Roles) -> AclResult<Vec<Option<String>>> {
        match roles.into_list() {
            None => Ok(vec![None]),
            Some(list) => list
                .into_iter()
                .map(|role| self.roles.get(role).map(|role| Some(role.id().to_string())))
                .collect(),
        }
    }

    /// Resource identifiers a rule applies to; `None` is every resource
    fn expand_resources(&self, resources: Resources) -> AclResult<Vec<Option<String>>> {
        let mut expanded: Vec<Option<String>> = Vec::new();
        let mut push = |scope: Option<&str>| {
            let scope = scope.map(str::to_string);
            if !expanded.contains(&scope) {
                expanded.push(scope);
            }
        };

        match resources {
            Targets::All => {
                push(None);
                for resource in self.resources.iter() {
                    push(Some(resource.id()));
                }
            }
            Targets::List(list) if list.is_empty() => push(None),
            Targets::List(list) => {
                for resource in list {
                    let resource = self.resources.get(resource)?;
                    push(Some(resource.id()));
                    for child in self.resources.descendants(resource)? {
                        push(Some(child.id()));
                    }
                }
            }
        }

        Ok(expanded)
    }

    /// Read-only view of the rule store
    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Check whether `role` holds `privilege` on `resource`
    ///
    /// A wildcard privilege asks whether the role holds every privilege.
    /// Concrete roles and resources must be registered.
    pub fn is_allowed(
        &self,
        role: impl Into<RoleScope>,
        resource: impl Into<ResourceScope>,
        privilege: impl Into<PrivilegeScope>,
    ) -> AclResult<bool> {
        let role = role.into();
        let resource = resource.into();
        let privilege = match privilege.into() {
            Scope::Only(privilege) if !privilege.is_empty() => Some(privilege),
            _ => None,
        };

        debug!(
            role = role.as_only().map(RoleRef::id),
            resource = resource.as_only().map(ResourceRef::id),
            privilege = privilege.as_deref(),
            "Checking access"
        );

        let role = role
            .as_only()
            .map(|role| self.roles.resolve(role))
            .transpose()?;
        let mut current = resource
            .as_only()
            .map(|resource| self.resources.resolve(resource))
            .transpose()?;

        loop {
            let resource = current
                .and_then(|id| self.resources.resource(id))
                .map(Resource::id);
            let parent = current.and_then(|id| self.resources.parent_of(id));

            let decision = match privilege.as_deref() {
                None => self.all_privileges_at(role, resource)?,
                Some(privilege) => {
                    self.one_privilege_at(role, resource, privilege, parent.is_some())?
                }
            };

            if let Some(allowed) = decision {
                debug!(allowed, resource, "Access resolved");
                return Ok(allowed);
            }

            match parent {
                Some(parent) => current = Some(parent),
                None => break,
            }
        }

        debug!("No applicable rule, denying");
        Ok(false)
    }

    /// Decision at one resource level for a query on every privilege
    fn all_privileges_at(
        &self,
        role: Option<RoleId>,
        resource: Option<&str>,
    ) -> AclResult<Option<bool>> {
        let role_decision = |role: &str| match self.rules.bucket(resource, Some(role)) {
            Some(bucket) => bucket.all_privileges_decision(),
            None => Ok(None),
        };

        if let Some(role) = role
            && let Some(allowed) = self.role_dfs(role, role_decision)?
        {
            return Ok(Some(allowed));
        }

        match self.rules.bucket(resource, None) {
            Some(bucket) => {
                let decision = bucket.all_privileges_decision()?;
                if let Some(allowed) = decision {
                    trace!(allowed, "Matched all-roles rule");
                }
                Ok(decision)
            }
            None => Ok(None),
        }
    }

    /// Decision at one resource level for a single privilege
    ///
    /// A DENY from the all-roles, all-privileges rule is only final when
    /// there is no parent resource left to consult.
    fn one_privilege_at(
        &self,
        role: Option<RoleId>,
        resource: Option<&str>,
        privilege: &str,
        has_parent: bool,
    ) -> AclResult<Option<bool>> {
        let role_decision = |role: &str| -> AclResult<Option<bool>> {
            let verdict = match self.rules.verdict(resource, Some(role), Some(privilege))? {
                Some(verdict) => Some(verdict),
                None => self.rules.verdict(resource, Some(role), None)?,
            };
            Ok(verdict.map(|v| v.is_allow()))
        };

        if let Some(role) = role
            && let Some(allowed) = self.role_dfs(role, role_decision)?
        {
            return Ok(Some(allowed));
        }

        if let Some(verdict) = self.rules.verdict(resource, None, Some(privilege))? {
            trace!(verdict = %verdict, "Matched all-roles privilege rule");
            return Ok(Some(verdict.is_allow()));
        }

        if let Some(verdict) = self.rules.verdict(resource, None, None)? {
            let allowed = verdict.is_allow();
            if allowed || !has_parent {
                trace!(verdict = %verdict, "Matched all-roles rule");
                return Ok(Some(allowed));
            }
            trace!("All-roles deny deferred to parent resource");
        }

        Ok(None)
    }

    /// Depth-first search from `start` through its ancestors
    ///
    /// Parents are pushed in priority order, so the most recently added
    /// parent is popped, and checked, first. Each role is checked once.
    fn role_dfs<F>(&self, start: RoleId, mut visit: F) -> AclResult<Option<bool>>
    where
        F: FnMut(&str) -> AclResult<Option<bool>>,
    {
        let mut visited = HashSet::new();
        let mut stack = vec![start];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(role) = self.roles.role(current) else {
                continue;
            };
            if let Some(allowed) = visit(role.id())? {
                trace!(role = role.id(), allowed, "Matched role rule");
                return Ok(Some(allowed));
            }
            stack.extend_from_slice(self.roles.parent_ids(current));
        }

        Ok(None)
    }
}
