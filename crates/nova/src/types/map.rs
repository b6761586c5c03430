use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use crate::value::Value;

/// The insertion-ordered map value.
///
/// Keys are arbitrary `Value`s compared with the runtime's structural
/// equality rules (so `Int(3)` and `Long(3)` address the same entry). Maps
/// are shared by reference like lists.
#[derive(Debug, Default)]
pub struct MapValue {
    entries: RwLock<IndexMap<Value, Value>>,
}

impl MapValue {
    #[must_use]
    pub fn new(entries: IndexMap<Value, Value>) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(entries),
        })
    }

    #[must_use]
    pub fn empty() -> Arc<Self> {
        Self::new(IndexMap::new())
    }

    pub fn read(&self) -> RwLockReadGuard<'_, IndexMap<Value, Value>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, IndexMap<Value, Value>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Inserts or overwrites, preserving insertion order for existing keys.
    pub fn insert(&self, key: Value, value: Value) {
        self.write().insert(key, value);
    }

    pub fn remove(&self, key: &Value) -> Option<Value> {
        self.write().shift_remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.read().contains_key(key)
    }

    /// Snapshot of entries in insertion order; used for iteration.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Value, Value)> {
        self.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_type_numeric_keys_collide() {
        let map = MapValue::empty();
        map.insert(Value::Int(3), Value::from_str_slice("a"));
        map.insert(Value::Long(3), Value::from_str_slice("b"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&Value::Int(3)), Some(Value::from_str_slice("b")));
    }

    #[test]
    fn insertion_order_is_preserved() {
        let map = MapValue::empty();
        map.insert(Value::from_str_slice("z"), Value::Int(1));
        map.insert(Value::from_str_slice("a"), Value::Int(2));
        let keys: Vec<_> = map.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Value::from_str_slice("z"), Value::from_str_slice("a")]);
    }
}
