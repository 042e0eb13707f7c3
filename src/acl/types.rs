//! ACL types
//!
//! Identifiers, references and the sum types used at the engine's API
//! boundary.

use crate::error::AclError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A subject taking part in the role inheritance DAG
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role {
    id: String,
}

impl Role {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Get the role identifier
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// An object taking part in the single-parent resource tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    id: String,
}

impl Resource {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Get the resource identifier
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// A role given either as a handle or as a bare identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleRef {
    Handle(Role),
    Id(String),
}

impl RoleRef {
    pub fn id(&self) -> &str {
        match self {
            RoleRef::Handle(role) => role.id(),
            RoleRef::Id(id) => id,
        }
    }

    /// Turn the reference into a handle without consulting a registry
    pub fn into_role(self) -> Role {
        match self {
            RoleRef::Handle(role) => role,
            RoleRef::Id(id) => Role::new(id),
        }
    }
}

impl From<&str> for RoleRef {
    fn from(id: &str) -> Self {
        RoleRef::Id(id.to_string())
    }
}

impl From<String> for RoleRef {
    fn from(id: String) -> Self {
        RoleRef::Id(id)
    }
}

impl From<&String> for RoleRef {
    fn from(id: &String) -> Self {
        RoleRef::Id(id.clone())
    }
}

impl From<Role> for RoleRef {
    fn from(role: Role) -> Self {
        RoleRef::Handle(role)
    }
}

impl From<&Role> for RoleRef {
    fn from(role: &Role) -> Self {
        RoleRef::Handle(role.clone())
    }
}

/// A resource given either as a handle or as a bare identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Handle(Resource),
    Id(String),
}

impl ResourceRef {
    pub fn id(&self) -> &str {
        match self {
            ResourceRef::Handle(resource) => resource.id(),
            ResourceRef::Id(id) => id,
        }
    }

    pub fn into_resource(self) -> Resource {
        match self {
            ResourceRef::Handle(resource) => resource,
            ResourceRef::Id(id) => Resource::new(id),
        }
    }
}

impl From<&str> for ResourceRef {
    fn from(id: &str) -> Self {
        ResourceRef::Id(id.to_string())
    }
}

impl From<String> for ResourceRef {
    fn from(id: String) -> Self {
        ResourceRef::Id(id)
    }
}

impl From<&String> for ResourceRef {
    fn from(id: &String) -> Self {
        ResourceRef::Id(id.clone())
    }
}

impl From<Resource> for ResourceRef {
    fn from(resource: Resource) -> Self {
        ResourceRef::Handle(resource)
    }
}

impl From<&Resource> for ResourceRef {
    fn from(resource: &Resource) -> Self {
        ResourceRef::Handle(resource.clone())
    }
}

/// The outcome a rule asserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub const fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::Deny => "deny",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Verdict::Allow),
            "deny" => Ok(Verdict::Deny),
            _ => Err(AclError::UnsupportedRuleType(s.to_string())),
        }
    }
}

/// Whether a rule mutation adds or removes rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Remove,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Remove => "remove",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operation {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(Operation::Add),
            "remove" => Ok(Operation::Remove),
            _ => Err(AclError::UnsupportedOperation(s.to_string())),
        }
    }
}

/// A single query dimension: everything, or one specific entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope<T> {
    #[default]
    All,
    Only(T),
}

impl<T> Scope<T> {
    pub fn is_all(&self) -> bool {
        matches!(self, Scope::All)
    }

    pub fn as_only(&self) -> Option<&T> {
        match self {
            Scope::All => None,
            Scope::Only(value) => Some(value),
        }
    }
}

impl<T, R: Into<T>> From<Option<R>> for Scope<T> {
    fn from(value: Option<R>) -> Self {
        match value {
            Some(value) => Scope::Only(value.into()),
            None => Scope::All,
        }
    }
}

/// A rule dimension: everything, or a list of specific entries
///
/// For roles and privileges an empty list means the same as `All`. For
/// resources it addresses the all-resources bucket without the copies
/// `All` writes to each registered resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Targets<T> {
    #[default]
    All,
    List(Vec<T>),
}

impl<T> Targets<T> {
    pub fn is_all(&self) -> bool {
        match self {
            Targets::All => true,
            Targets::List(list) => list.is_empty(),
        }
    }

    /// The listed entries, or `None` for the wildcard
    pub fn into_list(self) -> Option<Vec<T>> {
        match self {
            Targets::List(list) if !list.is_empty() => Some(list),
            _ => None,
        }
    }
}

impl<T, R: Into<T>> From<Vec<R>> for Targets<T> {
    fn from(list: Vec<R>) -> Self {
        Targets::List(list.into_iter().map(Into::into).collect())
    }
}

impl<T, R: Into<T>, const N: usize> From<[R; N]> for Targets<T> {
    fn from(list: [R; N]) -> Self {
        Targets::List(list.into_iter().map(Into::into).collect())
    }
}

impl<T, R: Into<T>> From<Option<R>> for Targets<T> {
    fn from(value: Option<R>) -> Self {
        match value {
            Some(value) => Targets::List(vec![value.into()]),
            None => Targets::All,
        }
    }
}

macro_rules! impl_single_conversions {
    ($target:ty => $($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for Scope<$target> {
                fn from(value: $source) -> Self {
                    Scope::Only(value.into())
                }
            }

            impl From<$source> for Targets<$target> {
                fn from(value: $source) -> Self {
                    Targets::List(vec![value.into()])
                }
            }
        )+
    };
}

impl_single_conversions!(RoleRef => &str, String, &String, Role, &Role);
impl_single_conversions!(ResourceRef => &str, String, &String, Resource, &Resource);
impl_single_conversions!(String => &str, String, &String);

pub type RoleScope = Scope<RoleRef>;
pub type ResourceScope = Scope<ResourceRef>;
pub type PrivilegeScope = Scope<String>;

pub type Roles = Targets<RoleRef>;
pub type Resources = Targets<ResourceRef>;
pub type Privileges = Targets<String>;
