//! Error types for tanuki-acl
//!
//! This module defines the error hierarchy used throughout the crate.
//! Every failure is a typed fault raised where it is detected; nothing is
//! retried or defaulted silently. The binary converts these into `anyhow`
//! errors at the boundary.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("ACL error: {0}")]
    Acl(#[from] AclError),

    #[error("Permission load error: {0}")]
    Load(#[from] LoadError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the ACL engine itself
#[derive(Error, Debug)]
pub enum AclError {
    #[error("Role '{role}' not found")]
    RoleNotFound { role: String },

    #[error("Resource '{resource}' not found")]
    ResourceNotFound { resource: String },

    #[error("Role id '{role}' already exists in the registry")]
    DuplicateRole { role: String },

    #[error("Resource id '{resource}' already exists in the ACL")]
    DuplicateResource { resource: String },

    #[error("Invalid role argument: {0}")]
    InvalidRoleArgument(String),

    #[error("Invalid resource argument: {0}")]
    InvalidResourceArgument(String),

    #[error("Unsupported rule type '{0}'; must be either 'allow' or 'deny'")]
    UnsupportedRuleType(String),

    #[error("Unsupported operation '{0}'; must be either 'add' or 'remove'")]
    UnsupportedOperation(String),

    #[error("ACL assertions are not implemented")]
    AssertionNotSupported,
}

impl AclError {
    pub fn role_not_found(role: impl Into<String>) -> Self {
        AclError::RoleNotFound { role: role.into() }
    }

    pub fn resource_not_found(resource: impl Into<String>) -> Self {
        AclError::ResourceNotFound {
            resource: resource.into(),
        }
    }

    /// Whether this error reports a missing role or resource
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AclError::RoleNotFound { .. } | AclError::ResourceNotFound { .. }
        )
    }
}

/// Errors raised while loading a permissions description
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Cycle detected among {kind} parents: {}", entries.join(", "))]
    CycleDetected {
        kind: &'static str,
        entries: Vec<String>,
    },

    #[error("Parent '{parent}' of {kind} '{name}' does not exist")]
    UnresolvedParent {
        kind: &'static str,
        name: String,
        parent: String,
    },

    #[error("Rule #{index} is malformed: '{field}' cannot be undefined")]
    MalformedRule { index: usize, field: &'static str },

    #[error("Rule #{index} has unknown access '{access}'")]
    UnknownAccessType { index: usize, access: String },

    #[error("Invalid permissions description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Acl(#[from] AclError),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for engine operations
pub type AclResult<T> = std::result::Result<T, AclError>;

/// Result type alias for permission loading
pub type LoadResult<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_constructors() {
        let err = AclError::role_not_found("ghost");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Role 'ghost' not found");

        let err = AclError::resource_not_found("page");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("page"));

        assert!(!AclError::AssertionNotSupported.is_not_found());
    }

    #[test]
    fn test_cycle_message_lists_entries() {
        let err = LoadError::CycleDetected {
            kind: "role",
            entries: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "Cycle detected among role parents: a, b");
    }

    #[test]
    fn test_app_error_from_acl() {
        let err: AppError = AclError::DuplicateRole {
            role: "admin".into(),
        }
        .into();
        assert!(matches!(err, AppError::Acl(AclError::DuplicateRole { .. })));
    }
}
