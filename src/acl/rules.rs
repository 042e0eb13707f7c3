//! Rule store
//!
//! Rules are kept in a tree keyed first by resource scope, then by role
//! scope. Each (resource, role) pair owns a [`RuleBucket`] holding an
//! "all privileges" rule and any number of per-privilege rules.
//!
//! Throughout this module `None` as a resource or role key stands for the
//! wildcard ("all resources" / "all roles").
//!
//! The root bucket (all resources, all roles) always exists and starts out
//! as a single DENY rule, so the engine fails closed.

use crate::acl::engine::Acl;
use crate::acl::types::{Resource, Role, Verdict};
use crate::error::{AclError, AclResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Conditional hook attached to a rule
///
/// Assertions can be attached to rules, but evaluating a rule that carries
/// one fails with [`AclError::AssertionNotSupported`].
pub trait Assertion: fmt::Debug + Send + Sync {
    /// Whether the rule applies to this query
    fn assert(
        &self,
        acl: &Acl,
        role: Option<&Role>,
        resource: Option<&Resource>,
        privilege: Option<&str>,
    ) -> bool;
}

/// A verdict plus an optional assertion
#[derive(Debug, Clone)]
pub struct Rule {
    verdict: Verdict,
    assertion: Option<Arc<dyn Assertion>>,
}

impl Rule {
    pub fn new(verdict: Verdict, assertion: Option<Arc<dyn Assertion>>) -> Self {
        Self { verdict, assertion }
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn has_assertion(&self) -> bool {
        self.assertion.is_some()
    }

    /// The verdict this rule yields at query time
    pub fn evaluate(&self) -> AclResult<Verdict> {
        if self.assertion.is_some() {
            return Err(AclError::AssertionNotSupported);
        }
        Ok(self.verdict)
    }
}

/// Rules attached to one (resource scope, role scope) pair
#[derive(Debug, Clone, Default)]
pub struct RuleBucket {
    all_privileges: Option<Rule>,
    by_privilege: HashMap<String, Rule>,
}

impl RuleBucket {
    /// The fail-closed root bucket
    fn root() -> Self {
        Self {
            all_privileges: Some(Rule::new(Verdict::Deny, None)),
            by_privilege: HashMap::new(),
        }
    }

    pub fn all_privileges(&self) -> Option<&Rule> {
        self.all_privileges.as_ref()
    }

    pub fn privilege(&self, privilege: &str) -> Option<&Rule> {
        self.by_privilege.get(privilege)
    }

    pub fn privileges(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.by_privilege.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.all_privileges.is_none() && self.by_privilege.is_empty()
    }

    /// Set the all-privileges rule, discarding per-privilege rules
    pub(crate) fn set_all(&mut self, rule: Rule) {
        self.all_privileges = Some(rule);
        self.by_privilege.clear();
    }

    pub(crate) fn set_privilege(&mut self, privilege: impl Into<String>, rule: Rule) {
        self.by_privilege.insert(privilege.into(), rule);
    }

    /// Drop the all-privileges rule if it carries `verdict`
    pub(crate) fn remove_all_matching(&mut self, verdict: Verdict) -> bool {
        if self.all_privileges.as_ref().map(Rule::verdict) == Some(verdict) {
            self.all_privileges = None;
            return true;
        }
        false
    }

    /// Drop a per-privilege rule if it carries `verdict`
    pub(crate) fn remove_privilege_matching(&mut self, privilege: &str, verdict: Verdict) -> bool {
        if self.privilege(privilege).map(Rule::verdict) == Some(verdict) {
            self.by_privilege.remove(privilege);
            return true;
        }
        false
    }

    /// Decision of this bucket for a query on every privilege
    ///
    /// Any per-privilege DENY refuses the whole query; otherwise the
    /// all-privileges rule decides, if present. Every per-privilege rule is
    /// evaluated first, so an assertion anywhere in the bucket is an error.
    pub(crate) fn all_privileges_decision(&self) -> AclResult<Option<bool>> {
        let mut denied = false;
        for rule in self.by_privilege.values() {
            denied |= rule.evaluate()? == Verdict::Deny;
        }
        if denied {
            return Ok(Some(false));
        }
        self.all_privileges
            .as_ref()
            .map(|rule| rule.evaluate().map(|v| v.is_allow()))
            .transpose()
    }
}

#[derive(Debug, Clone, Default)]
struct ResourceRules {
    all_roles: Option<RuleBucket>,
    by_role: HashMap<String, RuleBucket>,
}

impl ResourceRules {
    fn bucket(&self, role: Option<&str>) -> Option<&RuleBucket> {
        match role {
            None => self.all_roles.as_ref(),
            Some(role) => self.by_role.get(role),
        }
    }

    fn bucket_mut(&mut self, role: Option<&str>) -> Option<&mut RuleBucket> {
        match role {
            None => self.all_roles.as_mut(),
            Some(role) => self.by_role.get_mut(role),
        }
    }

    fn bucket_or_insert(&mut self, role: Option<&str>) -> &mut RuleBucket {
        match role {
            None => self.all_roles.get_or_insert_with(RuleBucket::default),
            Some(role) => self.by_role.entry(role.to_string()).or_default(),
        }
    }
}

/// Tree-shaped map from (resource scope, role scope) to rule buckets
#[derive(Debug, Clone)]
pub struct RuleStore {
    all_resources: ResourceRules,
    by_resource: HashMap<String, ResourceRules>,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self {
            all_resources: ResourceRules {
                all_roles: Some(RuleBucket::root()),
                by_role: HashMap::new(),
            },
            by_resource: HashMap::new(),
        }
    }
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(&self, resource: Option<&str>, role: Option<&str>) -> Option<&RuleBucket> {
        self.resource_rules(resource)?.bucket(role)
    }

    pub(crate) fn bucket_mut(
        &mut self,
        resource: Option<&str>,
        role: Option<&str>,
    ) -> Option<&mut RuleBucket> {
        let rules = match resource {
            None => &mut self.all_resources,
            Some(resource) => self.by_resource.get_mut(resource)?,
        };
        rules.bucket_mut(role)
    }

    pub(crate) fn bucket_or_insert(
        &mut self,
        resource: Option<&str>,
        role: Option<&str>,
    ) -> &mut RuleBucket {
        let rules = match resource {
            None => &mut self.all_resources,
            Some(resource) => self.by_resource.entry(resource.to_string()).or_default(),
        };
        rules.bucket_or_insert(role)
    }

    /// Put the root bucket back to its single default DENY rule
    pub(crate) fn reset_root(&mut self) {
        self.all_resources.all_roles = Some(RuleBucket::root());
    }

    /// Verdict of the rule at (resource, role, privilege)
    ///
    /// `privilege == None` reads the all-privileges slot.
    pub fn verdict(
        &self,
        resource: Option<&str>,
        role: Option<&str>,
        privilege: Option<&str>,
    ) -> AclResult<Option<Verdict>> {
        let Some(bucket) = self.bucket(resource, role) else {
            return Ok(None);
        };
        let rule = match privilege {
            None => bucket.all_privileges(),
            Some(privilege) => bucket.privilege(privilege),
        };
        rule.map(Rule::evaluate).transpose()
    }

    /// Drop every bucket keyed to `role`, returning how many were dropped
    pub(crate) fn purge_role(&mut self, role: &str) -> usize {
        std::iter::once(&mut self.all_resources)
            .chain(self.by_resource.values_mut())
            .filter_map(|rules| rules.by_role.remove(role))
            .count()
    }

    /// Drop every role-specific bucket, keeping all-roles buckets
    pub(crate) fn purge_all_roles(&mut self) {
        self.all_resources.by_role.clear();
        for rules in self.by_resource.values_mut() {
            rules.by_role.clear();
        }
    }

    /// Drop every bucket keyed to `resource`
    pub(crate) fn purge_resource(&mut self, resource: &str) -> bool {
        self.by_resource.remove(resource).is_some()
    }

    fn resource_rules(&self, resource: Option<&str>) -> Option<&ResourceRules> {
        match resource {
            None => Some(&self.all_resources),
            Some(resource) => self.by_resource.get(resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct AlwaysTrue;

    impl Assertion for AlwaysTrue {
        fn assert(
            &self,
            _acl: &Acl,
            _role: Option<&Role>,
            _resource: Option<&Resource>,
            _privilege: Option<&str>,
        ) -> bool {
            true
        }
    }

    #[test]
    fn test_default_is_fail_closed() {
        let store = RuleStore::new();
        assert_eq!(store.verdict(None, None, None).unwrap(), Some(Verdict::Deny));
        assert_eq!(store.verdict(None, None, Some("read")).unwrap(), None);
        assert_eq!(store.verdict(Some("page"), None, None).unwrap(), None);
        assert!(store.bucket(None, Some("guest")).is_none());
    }

    #[test]
    fn test_set_all_clears_privileges() {
        let mut store = RuleStore::new();
        let bucket = store.bucket_or_insert(Some("page"), Some("guest"));
        bucket.set_privilege("read", Rule::new(Verdict::Allow, None));
        bucket.set_all(Rule::new(Verdict::Deny, None));

        let bucket = store.bucket(Some("page"), Some("guest")).unwrap();
        assert!(bucket.privilege("read").is_none());
        assert_eq!(bucket.all_privileges().map(Rule::verdict), Some(Verdict::Deny));
    }

    #[test]
    fn test_remove_only_matching_verdict() {
        let mut bucket = RuleBucket::default();
        bucket.set_privilege("read", Rule::new(Verdict::Deny, None));
        bucket.set_all(Rule::new(Verdict::Allow, None));
        bucket.set_privilege("read", Rule::new(Verdict::Deny, None));

        assert!(!bucket.remove_privilege_matching("read", Verdict::Allow));
        assert!(bucket.remove_privilege_matching("read", Verdict::Deny));
        assert!(!bucket.remove_all_matching(Verdict::Deny));
        assert!(bucket.remove_all_matching(Verdict::Allow));
        assert!(bucket.is_empty());
    }

    #[test]
    fn test_all_privileges_decision() {
        let mut bucket = RuleBucket::default();
        assert_eq!(bucket.all_privileges_decision().unwrap(), None);

        bucket.set_all(Rule::new(Verdict::Allow, None));
        assert_eq!(bucket.all_privileges_decision().unwrap(), Some(true));

        bucket.set_privilege("delete", Rule::new(Verdict::Deny, None));
        assert_eq!(bucket.all_privileges_decision().unwrap(), Some(false));
    }

    #[test]
    fn test_all_privileges_decision_with_assertion_is_stable() {
        let mut bucket = RuleBucket::default();
        for privilege in ["a", "b", "c", "d", "e", "f", "g", "h"] {
            bucket.set_privilege(privilege, Rule::new(Verdict::Deny, None));
        }
        bucket.set_privilege("guarded", Rule::new(Verdict::Allow, Some(Arc::new(AlwaysTrue))));

        for _ in 0..16 {
            assert!(matches!(
                bucket.clone().all_privileges_decision(),
                Err(AclError::AssertionNotSupported)
            ));
        }
    }

    #[test]
    fn test_assertion_fails_on_evaluation() {
        let mut store = RuleStore::new();
        store
            .bucket_or_insert(None, Some("guest"))
            .set_privilege("read", Rule::new(Verdict::Allow, Some(Arc::new(AlwaysTrue))));

        let rule = store.bucket(None, Some("guest")).unwrap().privilege("read").unwrap();
        assert!(rule.has_assertion());
        assert_eq!(rule.verdict(), Verdict::Allow);
        assert!(matches!(
            store.verdict(None, Some("guest"), Some("read")),
            Err(AclError::AssertionNotSupported)
        ));
    }

    #[test]
    fn test_purges() {
        let mut store = RuleStore::new();
        store.bucket_or_insert(None, Some("guest"));
        store.bucket_or_insert(Some("page"), Some("guest"));
        store.bucket_or_insert(Some("page"), None);
        store.bucket_or_insert(Some("post"), Some("admin"));

        assert_eq!(store.purge_role("guest"), 2);
        assert!(store.bucket(Some("page"), None).is_some());

        store.purge_all_roles();
        assert!(store.bucket(Some("post"), Some("admin")).is_none());

        assert!(store.purge_resource("page"));
        assert!(!store.purge_resource("page"));
        assert!(store.bucket(None, None).is_some());
    }

    #[test]
    fn test_reset_root() {
        let mut store = RuleStore::new();
        store
            .bucket_or_insert(None, None)
            .set_all(Rule::new(Verdict::Allow, None));
        store.reset_root();
        assert_eq!(store.verdict(None, None, None).unwrap(), Some(Verdict::Deny));
    }
}
