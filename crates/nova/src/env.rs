use std::sync::{Arc, PoisonError, RwLock};

use ahash::AHashMap;

use crate::{
    error::{NovaError, RunResult},
    value::Value,
};

/// One binding slot: the value and whether it was declared with `val`.
#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    immutable: bool,
}

#[derive(Debug)]
struct EnvInner {
    parent: Option<Env>,
    // Coarse per-level read-write lock: the only shared mutable state between
    // interpreter threads is the global environment chain.
    slots: RwLock<AHashMap<String, Slot>>,
}

/// A lexically-scoped binding table.
///
/// Environments are shared handles (`Arc` internally): a child scope keeps
/// its parent alive, and a lambda's captured environment is simply a clone of
/// the handle that was active at its definition site. Name lookup walks the
/// parent chain; defining a name in a child shadows the ancestor without
/// touching it.
#[derive(Debug, Clone)]
pub struct Env(Arc<EnvInner>);

impl Env {
    /// Creates a root scope with no parent.
    #[must_use]
    pub fn root() -> Self {
        Self(Arc::new(EnvInner {
            parent: None,
            slots: RwLock::new(AHashMap::new()),
        }))
    }

    /// Creates a child scope of this one.
    #[must_use]
    pub fn child(&self) -> Self {
        Self(Arc::new(EnvInner {
            parent: Some(self.clone()),
            slots: RwLock::new(AHashMap::new()),
        }))
    }

    /// Whether two handles refer to the same scope.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn read_slots(&self) -> std::sync::RwLockReadGuard<'_, AHashMap<String, Slot>> {
        self.0.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slots(&self) -> std::sync::RwLockWriteGuard<'_, AHashMap<String, Slot>> {
        self.0.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn define(&self, name: &str, value: Value, immutable: bool, repl_mode: bool) -> RunResult<()> {
        let mut slots = self.write_slots();
        if !repl_mode && slots.contains_key(name) {
            return Err(NovaError::already_defined(name));
        }
        slots.insert(name.to_owned(), Slot { value, immutable });
        Ok(())
    }

    /// Defines an immutable binding in *this* scope.
    ///
    /// Fails when the name already exists in this scope (not a parent),
    /// unless `repl_mode` permits redefinition.
    pub fn define_val(&self, name: &str, value: Value, repl_mode: bool) -> RunResult<()> {
        self.define(name, value, true, repl_mode)
    }

    /// Defines a mutable binding in *this* scope; same duplicate rules as
    /// [`Self::define_val`].
    pub fn define_var(&self, name: &str, value: Value, repl_mode: bool) -> RunResult<()> {
        self.define(name, value, false, repl_mode)
    }

    /// Unconditional local overwrite; used by the host to inject builtins.
    pub fn redefine(&self, name: &str, value: Value) {
        self.write_slots().insert(
            name.to_owned(),
            Slot {
                value,
                immutable: false,
            },
        );
    }

    /// Assigns to an existing binding, walking the parent chain.
    ///
    /// A child assigning to an ancestor's `var` mutates the ancestor's slot.
    pub fn assign(&self, name: &str, value: Value) -> RunResult<()> {
        let mut scope = Some(self.clone());
        while let Some(env) = scope {
            {
                let mut slots = env.write_slots();
                if let Some(slot) = slots.get_mut(name) {
                    if slot.immutable {
                        return Err(NovaError::type_error(format!("Cannot reassign val '{name}'")));
                    }
                    slot.value = value;
                    return Ok(());
                }
            }
            scope = env.0.parent.clone();
        }
        Err(NovaError::undefined_variable(name))
    }

    /// Looks a name up, walking the parent chain.
    pub fn get(&self, name: &str) -> RunResult<Value> {
        self.get_opt(name).ok_or_else(|| NovaError::undefined_variable(name))
    }

    /// Non-failing lookup.
    #[must_use]
    pub fn get_opt(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self.clone());
        while let Some(env) = scope {
            if let Some(slot) = env.read_slots().get(name) {
                return Some(slot.value.clone());
            }
            scope = env.0.parent.clone();
        }
        None
    }

    /// Whether the name resolves anywhere in the chain.
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.get_opt(name).is_some()
    }

    /// Whether the name is defined in this scope itself.
    #[must_use]
    pub fn is_defined_locally(&self, name: &str) -> bool {
        self.read_slots().contains_key(name)
    }

    /// Whether the nearest binding of the name is immutable.
    #[must_use]
    pub fn is_val(&self, name: &str) -> bool {
        let mut scope = Some(self.clone());
        while let Some(env) = scope {
            if let Some(slot) = env.read_slots().get(name) {
                return slot.immutable;
            }
            scope = env.0.parent.clone();
        }
        false
    }

    /// Names defined in this scope itself, unordered.
    #[must_use]
    pub fn local_names(&self) -> Vec<String> {
        self.read_slots().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_shadowing_leaves_parent_untouched() {
        let parent = Env::root();
        parent.define_var("x", Value::Int(1), false).unwrap();
        let child = parent.child();
        child.define_val("x", Value::Int(2), false).unwrap();
        assert_eq!(child.get("x").unwrap(), Value::Int(2));
        assert_eq!(parent.get("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn assign_walks_to_ancestor_slot() {
        let parent = Env::root();
        parent.define_var("x", Value::Int(1), false).unwrap();
        let child = parent.child();
        child.assign("x", Value::Int(5)).unwrap();
        assert_eq!(parent.get("x").unwrap(), Value::Int(5));
    }

    #[test]
    fn val_rejects_reassignment() {
        let env = Env::root();
        env.define_val("x", Value::Int(1), false).unwrap();
        assert!(env.assign("x", Value::Int(2)).is_err());
        assert!(env.is_val("x"));
    }

    #[test]
    fn duplicate_definition_fails_outside_repl_mode() {
        let env = Env::root();
        env.define_val("x", Value::Int(1), false).unwrap();
        let err = env.define_val("x", Value::Int(2), false).unwrap_err();
        assert!(err.message.contains("already defined"));
        env.define_val("x", Value::Int(3), true).unwrap();
        assert_eq!(env.get("x").unwrap(), Value::Int(3));
    }

    #[test]
    fn lookup_failures_name_the_variable() {
        let env = Env::root();
        let err = env.get("missing").unwrap_err();
        assert!(err.message.contains("Undefined variable 'missing'"));
        assert!(env.assign("missing", Value::Null).is_err());
    }

    #[test]
    fn shadowing_can_change_mutability() {
        let parent = Env::root();
        parent.define_val("x", Value::Int(1), false).unwrap();
        let child = parent.child();
        child.define_var("x", Value::Int(2), false).unwrap();
        child.assign("x", Value::Int(3)).unwrap();
        assert_eq!(child.get("x").unwrap(), Value::Int(3));
        assert_eq!(parent.get("x").unwrap(), Value::Int(1));
    }
}
