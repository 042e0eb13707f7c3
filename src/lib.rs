//! Tanuki ACL
//!
//! An in-memory access control list with role inheritance, resource trees
//! and wildcard rules.
//!
//! ## Model
//!
//! - **Roles** form a DAG. A role may have several parents; the parent added
//!   last has the highest priority when inherited rules conflict.
//! - **Resources** form a forest. A query on a resource falls back to its
//!   ancestors when nothing applies at the resource itself.
//! - **Rules** allow or deny a privilege for a (role, resource) pair. Any of
//!   the three may be a wildcard. Everything is denied until allowed.
//!
//! ## Example
//!
//! ```
//! use tanuki_acl::{Acl, Privileges, Resources};
//!
//! let mut acl = Acl::new();
//! acl.add_role("visitor")?
//!     .add_role_with_parents("member", ["visitor"])?
//!     .add_resource("post")?;
//!
//! acl.allow("visitor", "post", "view")?
//!     .allow("member", Resources::All, Privileges::All)?;
//!
//! assert!(acl.is_allowed("member", "post", "edit")?);
//! assert!(!acl.is_allowed("visitor", "post", "edit")?);
//! # Ok::<(), tanuki_acl::AclError>(())
//! ```
//!
//! ## Permissions description
//!
//! [`loader`] builds an [`Acl`] from a JSON document listing roles,
//! resources and rules, ordering parents before children and rejecting
//! cycles.

pub mod acl;
pub mod config;
pub mod error;
pub mod loader;

// Re-export main types
pub use acl::{
    Acl, Assertion, Operation, PrivilegeScope, Privileges, Resource, ResourceRef, ResourceScope,
    Resources, Role, RoleRef, RoleScope, Roles, Scope, Targets, Verdict,
};
pub use config::{AppConfig, load_config};
pub use error::{AclError, AclResult, AppError, LoadError, LoadResult, Result};
pub use loader::{
    PermissionsDescription, load_permissions_file, load_permissions_from_str,
    load_permissions_from_value,
};
