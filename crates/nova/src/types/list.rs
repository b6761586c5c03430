use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    error::{NovaError, RunResult},
    value::Value,
};

/// The ordered, mutable list value.
///
/// Lists are shared by reference: cloning the `Value` clones the handle, not
/// the storage. Negative indices count from the back.
#[derive(Debug, Default)]
pub struct ListValue {
    items: RwLock<Vec<Value>>,
}

impl ListValue {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            items: RwLock::new(items),
        })
    }

    #[must_use]
    pub fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Value>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Clones out the current items; used for snapshot iteration so a loop
    /// body mutating the list does not invalidate the traversal.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.read().clone()
    }

    /// Normalises an index, interpreting negatives from the back.
    pub fn resolve_index(&self, index: i64) -> RunResult<usize> {
        let len = self.len();
        resolve_index(index, len)
    }

    /// `list[i]` with negative indexing.
    pub fn get(&self, index: i64) -> RunResult<Value> {
        let items = self.read();
        let at = resolve_index(index, items.len())?;
        Ok(items[at].clone())
    }

    /// `list[i] = v` with negative indexing.
    pub fn set(&self, index: i64, value: Value) -> RunResult<()> {
        let mut items = self.write();
        let len = items.len();
        let at = resolve_index(index, len)?;
        items[at] = value;
        Ok(())
    }

    pub fn push(&self, value: Value) {
        self.write().push(value);
    }

    pub fn remove_at(&self, index: i64) -> RunResult<Value> {
        let mut items = self.write();
        let len = items.len();
        let at = resolve_index(index, len)?;
        Ok(items.remove(at))
    }

    /// Extracts `list[range]` as a new list.
    pub fn slice(&self, from: usize, to: usize) -> Vec<Value> {
        self.read()[from..to].to_vec()
    }
}

/// Normalises `index` against `len`, interpreting negatives from the back.
pub(crate) fn resolve_index(index: i64, len: usize) -> RunResult<usize> {
    let adjusted = if index < 0 { index + len as i64 } else { index };
    if adjusted < 0 || adjusted >= len as i64 {
        return Err(NovaError::index_out_of_bounds(index, len));
    }
    Ok(adjusted as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_indexing_counts_from_back() {
        let list = ListValue::new(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(list.get(-1).unwrap(), Value::Int(3));
        assert_eq!(list.get(-3).unwrap(), Value::Int(1));
        assert!(list.get(-4).is_err());
        assert!(list.get(3).is_err());
    }

    #[test]
    fn set_overwrites_in_place() {
        let list = ListValue::new(vec![Value::Int(1), Value::Int(2)]);
        list.set(-1, Value::Int(9)).unwrap();
        assert_eq!(list.get(1).unwrap(), Value::Int(9));
    }
}
