//! Security policy for sandboxed execution.
//!
//! A policy bundles the host-interop gate (which host classes and methods a
//! script may touch), the stdio switch, and the resource budgets enforced by
//! [`crate::resource::ExecutionTracker`]. Policies are immutable once handed
//! to an interpreter; child interpreters share their parent's policy.

use std::time::Duration;

use ahash::AHashSet;

use crate::{
    error::NovaError,
    resource::Budgets,
};

/// Permission and budget bundle for one interpreter family.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    /// Master switch for the host-interop bridge.
    pub allow_host_interop: bool,
    /// Package prefixes whose classes are loadable (e.g. `java.util`).
    allowed_packages: Vec<String>,
    /// Exact class names that are always denied; overrides every allow rule.
    denied_classes: AHashSet<String>,
    /// Exact class names allowed in addition to the package prefixes.
    allowed_classes: AHashSet<String>,
    /// Denied methods keyed `class::method`.
    denied_methods: AHashSet<String>,
    /// Whether `println`/`print`/`readLine`/`input` are registered at all.
    pub allow_stdio: bool,
    /// Resource budgets applied per outermost eval.
    pub budgets: Budgets,
}

impl SecurityPolicy {
    /// Everything allowed, no budgets.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self {
            allow_host_interop: true,
            allowed_packages: vec![String::new()],
            denied_classes: AHashSet::new(),
            allowed_classes: AHashSet::new(),
            denied_methods: AHashSet::new(),
            allow_stdio: true,
            budgets: Budgets::unlimited(),
        }
    }

    /// Host collections and language basics, dangerous classes denied,
    /// modest budgets.
    #[must_use]
    pub fn standard() -> Self {
        let mut policy = Self {
            allow_host_interop: true,
            allowed_packages: vec!["java.util".into(), "java.lang".into()],
            denied_classes: AHashSet::new(),
            allowed_classes: AHashSet::new(),
            denied_methods: AHashSet::new(),
            allow_stdio: true,
            budgets: Budgets {
                max_execution_time: Some(Duration::from_secs(10)),
                max_recursion_depth: Some(512),
                max_loop_iterations: Some(10_000_000),
            },
        };
        policy = policy
            .deny_class("java.lang.Runtime")
            .deny_class("java.lang.ProcessBuilder")
            .deny_method("java.lang.System", "exit")
            .deny_method("java.lang.System", "load")
            .deny_method("java.lang.System", "loadLibrary");
        policy
    }

    /// No host interop at all, stdio still allowed, tight budgets.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            allow_host_interop: false,
            allowed_packages: Vec::new(),
            denied_classes: AHashSet::new(),
            allowed_classes: AHashSet::new(),
            denied_methods: AHashSet::new(),
            allow_stdio: true,
            budgets: Budgets {
                max_execution_time: Some(Duration::from_secs(2)),
                max_recursion_depth: Some(128),
                max_loop_iterations: Some(100_000),
            },
        }
    }

    // --- Builder-style adjustments ---

    /// Allows loading classes under the given package prefix.
    #[must_use]
    pub fn allow_package(mut self, prefix: impl Into<String>) -> Self {
        self.allowed_packages.push(prefix.into());
        self
    }

    /// Allows one exact class, regardless of package rules.
    #[must_use]
    pub fn allow_class(mut self, fqn: impl Into<String>) -> Self {
        self.allowed_classes.insert(fqn.into());
        self
    }

    /// Denies one exact class; overrides every allow rule.
    #[must_use]
    pub fn deny_class(mut self, fqn: impl Into<String>) -> Self {
        self.denied_classes.insert(fqn.into());
        self
    }

    /// Denies one method on one class.
    #[must_use]
    pub fn deny_method(mut self, fqn: impl Into<String>, method: impl Into<String>) -> Self {
        self.denied_methods.insert(format!("{}::{}", fqn.into(), method.into()));
        self
    }

    /// Disables the stdio builtins.
    #[must_use]
    pub fn without_stdio(mut self) -> Self {
        self.allow_stdio = false;
        self
    }

    /// Replaces the resource budgets.
    #[must_use]
    pub fn with_budgets(mut self, budgets: Budgets) -> Self {
        self.budgets = budgets;
        self
    }

    // --- Enforcement queries ---

    /// Whether the given host class may be loaded.
    #[must_use]
    pub fn is_class_allowed(&self, fqn: &str) -> bool {
        if !self.allow_host_interop || self.denied_classes.contains(fqn) {
            return false;
        }
        if self.allowed_classes.contains(fqn) {
            return true;
        }
        self.allowed_packages
            .iter()
            .any(|prefix| prefix.is_empty() || fqn.starts_with(prefix.as_str()))
    }

    /// Whether the given host method may be invoked.
    #[must_use]
    pub fn is_method_allowed(&self, fqn: &str, method: &str) -> bool {
        self.is_class_allowed(fqn) && !self.denied_methods.contains(&format!("{fqn}::{method}"))
    }

    /// Checks class access, failing with an uncatchable policy error.
    pub fn check_class(&self, fqn: &str) -> Result<(), NovaError> {
        if self.is_class_allowed(fqn) {
            Ok(())
        } else {
            Err(NovaError::security_denied(format!("access to class {fqn}")))
        }
    }

    /// Checks method access, failing with an uncatchable policy error.
    pub fn check_method(&self, fqn: &str, method: &str) -> Result<(), NovaError> {
        if self.is_method_allowed(fqn, method) {
            Ok(())
        } else {
            Err(NovaError::security_denied(format!("call to {fqn}::{method}")))
        }
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::unrestricted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_allows_everything() {
        let policy = SecurityPolicy::unrestricted();
        assert!(policy.is_class_allowed("java.lang.Runtime"));
        assert!(policy.is_method_allowed("java.lang.System", "exit"));
    }

    #[test]
    fn standard_denies_runtime_but_allows_collections() {
        let policy = SecurityPolicy::standard();
        assert!(!policy.is_class_allowed("java.lang.Runtime"));
        assert!(!policy.is_class_allowed("java.io.File"));
        assert!(!policy.is_class_allowed("java.net.Socket"));
        assert!(policy.is_class_allowed("java.util.ArrayList"));
        assert!(policy.is_class_allowed("java.lang.Math"));
        assert!(!policy.is_method_allowed("java.lang.System", "exit"));
        assert!(policy.is_method_allowed("java.lang.System", "currentTimeMillis"));
    }

    #[test]
    fn strict_disables_interop_entirely() {
        let policy = SecurityPolicy::strict();
        assert!(!policy.is_class_allowed("java.util.ArrayList"));
        assert!(policy.allow_stdio);
        assert!(policy.budgets.max_recursion_depth.is_some());
    }

    #[test]
    fn exact_allow_overrides_packages_but_not_deny() {
        let policy = SecurityPolicy::strict();
        // strict has interop off; flipping the pieces on manually shows precedence
        let mut policy = policy;
        policy.allow_host_interop = true;
        let policy = policy.allow_class("com.example.Widget").deny_class("com.example.Widget");
        assert!(!policy.is_class_allowed("com.example.Widget"));
    }
}
