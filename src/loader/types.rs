//! Permissions description types
//!
//! Serde model of the declarative description consumed by the loader:
//!
//! ```json
//! {
//!   "roles":     [{ "name": "member", "parent": "guest" }],
//!   "resources": [{ "name": "comment", "parent": "post" }],
//!   "rules": [
//!     { "access": "allow", "role": "guest", "resources": null, "privileges": ["read"] }
//!   ]
//! }
//! ```

use crate::acl::types::Targets;
use serde::{Deserialize, Deserializer, Serialize};

/// Root of a permissions description
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionsDescription {
    pub roles: Vec<RoleEntry>,
    pub resources: Vec<ResourceEntry>,
    pub rules: Vec<RuleEntry>,
}

/// A role and its parents, lowest priority first
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RoleEntry {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<OneOrMany>,
}

impl RoleEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent = Some(OneOrMany::Many(parents.into_iter().map(Into::into).collect()));
        self
    }

    /// Parent names in priority order
    pub fn parents(&self) -> &[String] {
        self.parent.as_ref().map(OneOrMany::as_slice).unwrap_or(&[])
    }
}

/// A resource and its optional parent
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResourceEntry {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl ResourceEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn parents(&self) -> &[String] {
        self.parent.as_slice()
    }
}

/// A rule entry
///
/// Every key must be present. The outer `Option` records whether the key was
/// given at all; the inner one whether it was `null`, which stands for the
/// wildcard. An empty string is read as the wildcard too.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RuleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,

    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<Option<OneOrMany>>,

    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub resources: Option<Option<OneOrMany>>,

    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub privileges: Option<Option<OneOrMany>>,
}

/// Marks a key as present even when its value is `null`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A single name or a list of names
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn as_slice(&self) -> &[String] {
        match self {
            OneOrMany::One(name) => std::slice::from_ref(name),
            OneOrMany::Many(names) => names,
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(name) => vec![name],
            OneOrMany::Many(names) => names,
        }
    }
}

impl<T: From<String>> From<OneOrMany> for Targets<T> {
    fn from(names: OneOrMany) -> Self {
        Targets::List(names.into_vec().into_iter().map(T::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_null_keys_differ() {
        let rule: RuleEntry = serde_json::from_value(json!({
            "access": "allow",
            "role": null,
            "resources": null,
        }))
        .unwrap();

        assert_eq!(rule.access.as_deref(), Some("allow"));
        assert_eq!(rule.role, Some(None));
        assert_eq!(rule.resources, Some(None));
        assert_eq!(rule.privileges, None);
    }

    #[test]
    fn test_one_or_many() {
        let rule: RuleEntry = serde_json::from_value(json!({
            "access": "deny",
            "role": "guest",
            "resources": "post",
            "privileges": ["read", "write"],
        }))
        .unwrap();

        assert_eq!(rule.role, Some(Some(OneOrMany::One("guest".to_string()))));
        assert_eq!(
            rule.resources,
            Some(Some(OneOrMany::One("post".to_string())))
        );
        assert_eq!(
            rule.privileges.flatten().map(OneOrMany::into_vec),
            Some(vec!["read".to_string(), "write".to_string()])
        );
    }

    #[test]
    fn test_sections_default_to_empty() {
        let description: PermissionsDescription =
            serde_json::from_value(json!({ "roles": [{ "name": "guest" }] })).unwrap();

        assert_eq!(description.roles, vec![RoleEntry::new("guest")]);
        assert!(description.resources.is_empty());
        assert!(description.rules.is_empty());
    }

    #[test]
    fn test_non_string_name_is_rejected() {
        let result = serde_json::from_value::<PermissionsDescription>(json!({
            "roles": [{ "name": { "id": "guest" } }]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_role_parents() {
        let role: RoleEntry =
            serde_json::from_value(json!({ "name": "c", "parent": ["a", "b"] })).unwrap();
        assert_eq!(role.parents(), ["a", "b"]);

        let role: RoleEntry = serde_json::from_value(json!({ "name": "b", "parent": "a" })).unwrap();
        assert_eq!(role.parents(), ["a"]);
        assert!(RoleEntry::new("a").parents().is_empty());
    }
}
