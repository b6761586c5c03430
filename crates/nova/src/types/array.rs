use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    error::RunResult,
    types::list::resolve_index,
    value::Value,
};

/// Element type of a typed array, determining the default fill value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemKind {
    Int,
    Long,
    Float,
    Double,
    Bool,
    String,
    Any,
}

impl ElemKind {
    /// Maps a type name from `Array<T>(n)` to an element kind.
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "Int" => Self::Int,
            "Long" => Self::Long,
            "Float" => Self::Float,
            "Double" => Self::Double,
            "Bool" | "Boolean" => Self::Bool,
            "String" => Self::String,
            _ => Self::Any,
        }
    }

    /// The per-element-type default initialiser.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Int => Value::Int(0),
            Self::Long => Value::Long(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::Bool => Value::Bool(false),
            Self::String => Value::from_str_slice(""),
            Self::Any => Value::Null,
        }
    }
}

/// A typed, fixed-size sequence created by `Array<T>(n)`.
///
/// The size never changes after construction; only elements are mutable.
#[derive(Debug)]
pub struct ArrayValue {
    pub elem: ElemKind,
    items: RwLock<Vec<Value>>,
}

impl ArrayValue {
    /// Creates an array of `len` elements, each the kind's default.
    #[must_use]
    pub fn filled(elem: ElemKind, len: usize) -> Arc<Self> {
        Arc::new(Self {
            elem,
            items: RwLock::new(vec![elem.default_value(); len]),
        })
    }

    /// Creates an array from pre-computed elements (initialiser lambda path).
    #[must_use]
    pub fn from_values(elem: ElemKind, items: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            elem,
            items: RwLock::new(items),
        })
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

    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.read().clone()
    }

    pub fn get(&self, index: i64) -> RunResult<Value> {
        let items = self.read();
        let at = resolve_index(index, items.len())?;
        Ok(items[at].clone())
    }

    pub fn set(&self, index: i64, value: Value) -> RunResult<()> {
        let mut items = self.write();
        let len = items.len();
        let at = resolve_index(index, len)?;
        items[at] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_defaults() {
        assert_eq!(ArrayValue::filled(ElemKind::Int, 2).get(0).unwrap(), Value::Int(0));
        assert_eq!(
            ArrayValue::filled(ElemKind::String, 1).get(0).unwrap(),
            Value::from_str_slice("")
        );
        assert_eq!(ArrayValue::filled(ElemKind::Any, 1).get(0).unwrap(), Value::Null);
    }
}
