//! Permission loader
//!
//! Builds roles, resources and rules from a [`PermissionsDescription`].
//! Roles and resources are checked for empty or duplicate names, ordered and
//! checked for cycles before anything is inserted. Rules are applied in order; a bad rule stops the load and
//! leaves the earlier rules in place.

pub mod ordering;
pub mod types;

pub use ordering::{ParentLinked, order_by_parent};
pub use types::{OneOrMany, PermissionsDescription, ResourceEntry, RoleEntry, RuleEntry};

use crate::acl::Acl;
use crate::acl::types::{Privileges, Resources, Roles, Targets, Verdict};
use crate::error::{AclError, LoadError, LoadResult};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

impl Acl {
    /// Create an ACL from a permissions description
    pub fn from_description(description: &PermissionsDescription) -> LoadResult<Self> {
        let mut acl = Acl::new();
        acl.load(description)?;
        Ok(acl)
    }

    /// Apply a permissions description to this ACL
    pub fn load(&mut self, description: &PermissionsDescription) -> LoadResult<&mut Self> {
        self.check_new_entries(description)?;
        let roles = order_by_parent(&description.roles)?;
        let resources = order_by_parent(&description.resources)?;

        for role in &roles {
            self.add_role_with_parents(role.name.as_str(), role.parents())?;
        }

        for resource in &resources {
            match &resource.parent {
                Some(parent) => self.add_resource_with_parent(resource.name.as_str(), parent)?,
                None => self.add_resource(resource.name.as_str())?,
            };
        }

        for (index, rule) in description.rules.iter().enumerate() {
            self.apply_rule_entry(index, rule)?;
        }

        info!(
            roles = roles.len(),
            resources = resources.len(),
            rules = description.rules.len(),
            "Loaded permissions"
        );

        Ok(self)
    }

    /// Reject empty names and names already taken, in the description or here
    fn check_new_entries(&self, description: &PermissionsDescription) -> LoadResult<()> {
        let mut seen = HashSet::new();
        for role in &description.roles {
            let name = role.name.as_str();
            if name.is_empty() {
                return Err(AclError::InvalidRoleArgument(
                    "role identifier must not be empty".to_string(),
                )
                .into());
            }
            if !seen.insert(name) || self.has_role(name) {
                return Err(AclError::DuplicateRole {
                    role: name.to_string(),
                }
                .into());
            }
        }

        let mut seen = HashSet::new();
        for resource in &description.resources {
            let name = resource.name.as_str();
            if name.is_empty() {
                return Err(AclError::InvalidResourceArgument(
                    "resource identifier must not be empty".to_string(),
                )
                .into());
            }
            if !seen.insert(name) || self.has_resource(name) {
                return Err(AclError::DuplicateResource {
                    resource: name.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    fn apply_rule_entry(&mut self, index: usize, rule: &RuleEntry) -> LoadResult<()> {
        let malformed = |field| LoadError::MalformedRule { index, field };

        let access = rule.access.as_deref().ok_or_else(|| malformed("access"))?;
        let role = rule.role.clone().ok_or_else(|| malformed("role"))?;
        let privileges = rule.privileges.clone().ok_or_else(|| malformed("privileges"))?;
        let resources = rule.resources.clone().ok_or_else(|| malformed("resources"))?;

        let verdict = match access {
            "allow" => Verdict::Allow,
            "deny" => Verdict::Deny,
            other => {
                return Err(LoadError::UnknownAccessType {
                    index,
                    access: other.to_string(),
                });
            }
        };

        debug!(index, access, "Applying rule entry");

        let roles: Roles = targets(role);
        let resources: Resources = targets(resources);
        let privileges: Privileges = targets(privileges);

        match verdict {
            Verdict::Allow => self.allow(roles, resources, privileges)?,
            Verdict::Deny => self.deny(roles, resources, privileges)?,
        };

        Ok(())
    }
}

/// Rule field value as targets; `null` and `""` both mean every entry
fn targets<T: From<String>>(value: Option<OneOrMany>) -> Targets<T> {
    match value {
        None => Targets::All,
        Some(OneOrMany::One(name)) if name.is_empty() => Targets::All,
        Some(names) => names.into(),
    }
}

/// Build an ACL from a JSON permissions description
pub fn load_permissions_from_str(json: &str) -> LoadResult<Acl> {
    let description: PermissionsDescription = serde_json::from_str(json)?;
    Acl::from_description(&description)
}

/// Build an ACL from an already parsed JSON value
pub fn load_permissions_from_value(value: serde_json::Value) -> LoadResult<Acl> {
    let description: PermissionsDescription = serde_json::from_value(value)?;
    Acl::from_description(&description)
}

/// Read a permissions description from a JSON file
pub fn read_permissions_file(path: impl AsRef<Path>) -> LoadResult<PermissionsDescription> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Reading permissions file");
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Build an ACL from a JSON permissions file
pub fn load_permissions_file(path: impl AsRef<Path>) -> LoadResult<Acl> {
    Acl::from_description(&read_permissions_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::types::Scope;
    use serde_json::json;

    #[test]
    fn test_missing_fields_checked_in_order() {
        let cases = [
            (json!({}), "access"),
            (json!({ "access": "allow" }), "role"),
            (json!({ "access": "allow", "role": null }), "privileges"),
            (
                json!({ "access": "allow", "role": null, "privileges": null }),
                "resources",
            ),
        ];

        for (rule, expected) in cases {
            let result = load_permissions_from_value(json!({ "rules": [rule] }));
            assert!(
                matches!(result, Err(LoadError::MalformedRule { index: 0, field }) if field == expected),
                "expected missing {expected}"
            );
        }
    }

    #[test]
    fn test_access_is_case_sensitive() {
        let result = load_permissions_from_value(json!({
            "rules": [
                { "access": "Allow", "role": null, "privileges": null, "resources": null }
            ]
        }));
        assert!(matches!(
            result,
            Err(LoadError::UnknownAccessType { index: 0, ref access }) if access == "Allow"
        ));
    }

    #[test]
    fn test_null_role_is_wildcard() {
        let acl = load_permissions_from_value(json!({
            "roles": [{ "name": "guest" }],
            "rules": [
                { "access": "allow", "role": null, "privileges": "read", "resources": null }
            ]
        }))
        .unwrap();

        assert!(acl.is_allowed("guest", Scope::All, "read").unwrap());
        assert!(!acl.is_allowed("guest", Scope::All, "write").unwrap());
    }

    #[test]
    fn test_rule_role_forms() {
        let acl = load_permissions_from_value(json!({
            "roles": [{ "name": "guest" }, { "name": "member" }, { "name": "staff" }],
            "resources": [{ "name": "post" }],
            "rules": [
                { "access": "allow", "role": "", "privileges": "read", "resources": null },
                { "access": "allow", "role": ["member", "staff"], "privileges": "edit", "resources": "post" },
                { "access": "allow", "role": [], "privileges": "list", "resources": "" }
            ]
        }))
        .unwrap();

        assert!(acl.is_allowed("guest", "post", "read").unwrap());
        assert!(acl.is_allowed("staff", "post", "edit").unwrap());
        assert!(acl.is_allowed("member", "post", "edit").unwrap());
        assert!(!acl.is_allowed("guest", "post", "edit").unwrap());
        assert!(acl.is_allowed("guest", "post", "list").unwrap());
        assert!(acl.rules().bucket(Some("post"), None).is_some());
    }

    #[test]
    fn test_empty_resource_list_skips_registered_resources() {
        let acl = load_permissions_from_value(json!({
            "roles": [{ "name": "guest" }],
            "resources": [{ "name": "post" }],
            "rules": [
                { "access": "allow", "role": "guest", "privileges": "read", "resources": [] }
            ]
        }))
        .unwrap();

        assert!(acl.is_allowed("guest", Scope::All, "read").unwrap());
        assert!(!acl.is_allowed("guest", "post", "read").unwrap());
    }

    #[test]
    fn test_unknown_rule_role_fails() {
        let result = load_permissions_from_value(json!({
            "rules": [
                { "access": "deny", "role": "ghost", "privileges": null, "resources": null }
            ]
        }));
        assert!(matches!(
            result,
            Err(LoadError::Acl(AclError::RoleNotFound { .. }))
        ));
    }

    #[test]
    fn test_load_into_existing_acl() {
        let mut acl = Acl::new();
        acl.add_role("guest").unwrap();

        let description: PermissionsDescription = serde_json::from_value(json!({
            "roles": [{ "name": "member" }],
            "rules": [
                { "access": "allow", "role": "guest", "privileges": "read", "resources": null }
            ]
        }))
        .unwrap();

        acl.load(&description).unwrap();
        assert_eq!(acl.roles(), vec!["guest", "member"]);
        assert!(acl.is_allowed("guest", Scope::All, "read").unwrap());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_permissions_from_str("{ roles: "),
            Err(LoadError::Parse(_))
        ));
    }
}
