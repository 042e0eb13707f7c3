//! Access control list
//!
//! Roles form a DAG with ordered parents, resources form a forest, and rules
//! are keyed by (resource, role, privilege) where each dimension can be a
//! wildcard. See [`engine`] for how a query is resolved.

pub mod engine;
pub mod registry;
pub mod resources;
pub mod rules;
pub mod types;

pub use engine::Acl;
pub use registry::{RoleId, RoleRegistry};
pub use resources::{ResourceId, ResourceTree};
pub use rules::{Assertion, Rule, RuleBucket, RuleStore};
pub use types::*;
