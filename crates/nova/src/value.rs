use std::{
    borrow::Cow,
    cmp::Ordering,
    fmt::{self, Write as _},
    hash::{Hash, Hasher},
    sync::Arc,
};

use indexmap::IndexMap;

use crate::{
    class::{ClassRef, Instance},
    error::{ErrorKind, NovaError, RunResult},
    future::{FutureValue, TaskValue},
    host::HostObject,
    types::{ArrayValue, FunctionValue, ListValue, MapValue, PairValue, RangeValue, ResultValue},
};

/// Maximum nesting rendered when displaying cyclic or very deep collections.
const DISPLAY_DEPTH_LIMIT: usize = 16;

/// Primary value type representing Nova objects at runtime.
///
/// Small immediate values (numbers, bools, chars, ranges) are stored inline;
/// collections, instances, and callables are shared behind `Arc` handles so a
/// cloned `Value` aliases the same storage. Mutability lives only inside
/// `List`, `Map`, `Array`, and `Instance` field slots — the variant tag of a
/// value never changes.
///
/// `Unit` is a distinct non-null value representing "no value produced";
/// `Unit != null` always holds.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Unit,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Str(Arc<str>),
    List(Arc<ListValue>),
    Map(Arc<MapValue>),
    Pair(Arc<PairValue>),
    Range(RangeValue),
    Result(Arc<ResultValue>),
    Function(Arc<FunctionValue>),
    /// A runtime class descriptor handle (also covers interfaces, enums,
    /// annotation classes, and not-yet-materialised singleton objects).
    Class(ClassRef),
    /// An instance of a user class; enum entries and singleton objects are
    /// instances whose class kind distinguishes them.
    Instance(Arc<Instance>),
    /// An opaque host-provided object, proxied through the interop bridge.
    External(Arc<dyn HostObject>),
    Task(Arc<TaskValue>),
    Future(Arc<FutureValue>),
    Array(Arc<ArrayValue>),
}

impl Value {
    /// Builds a string value from a borrowed slice.
    #[must_use]
    pub fn from_str_slice(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }

    /// Builds a string value from an owned string.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self::Str(Arc::from(s))
    }

    /// Chooses `Int` when the value fits in 32 bits, `Long` otherwise.
    #[must_use]
    pub fn from_i64(v: i64) -> Self {
        match i32::try_from(v) {
            Ok(small) => Self::Int(small),
            Err(_) => Self::Long(v),
        }
    }

    /// Wraps a list of values.
    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(ListValue::new(items))
    }

    /// Wraps map entries.
    #[must_use]
    pub fn map(entries: IndexMap<Self, Self>) -> Self {
        Self::Map(MapValue::new(entries))
    }

    /// Wraps a pair.
    #[must_use]
    pub fn pair(first: Self, second: Self) -> Self {
        Self::Pair(Arc::new(PairValue::new(first, second)))
    }

    /// Wraps a `Result.Ok`.
    #[must_use]
    pub fn ok(value: Self) -> Self {
        Self::Result(Arc::new(ResultValue::Ok(value)))
    }

    /// Wraps a `Result.Err`.
    #[must_use]
    pub fn err(value: Self) -> Self {
        Self::Result(Arc::new(ResultValue::Err(value)))
    }

    /// The user-visible type name, as reported by `typeof` and used for
    /// extension-function dispatch.
    #[must_use]
    pub fn type_name(&self) -> Cow<'static, str> {
        match self {
            Self::Null => Cow::Borrowed("Null"),
            Self::Unit => Cow::Borrowed("Unit"),
            Self::Bool(_) => Cow::Borrowed("Bool"),
            Self::Int(_) => Cow::Borrowed("Int"),
            Self::Long(_) => Cow::Borrowed("Long"),
            Self::Float(_) => Cow::Borrowed("Float"),
            Self::Double(_) => Cow::Borrowed("Double"),
            Self::Char(_) => Cow::Borrowed("Char"),
            Self::Str(_) => Cow::Borrowed("String"),
            Self::List(_) => Cow::Borrowed("List"),
            Self::Map(_) => Cow::Borrowed("Map"),
            Self::Pair(_) => Cow::Borrowed("Pair"),
            Self::Range(_) => Cow::Borrowed("Range"),
            Self::Result(_) => Cow::Borrowed("Result"),
            Self::Function(_) => Cow::Borrowed("Function"),
            Self::Class(class) => Cow::Owned(class.name.to_string()),
            Self::Instance(instance) => Cow::Owned(instance.class_name.to_string()),
            Self::External(object) => Cow::Owned(object.type_name().to_owned()),
            Self::Task(_) => Cow::Borrowed("Task"),
            Self::Future(_) => Cow::Borrowed("Future"),
            Self::Array(_) => Cow::Borrowed("Array"),
        }
    }

    /// Truthiness: `null` and `false` are falsy, empty strings, lists, and
    /// maps are falsy, everything else is truthy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Str(s) => !s.is_empty(),
            Self::List(list) => !list.is_empty(),
            Self::Map(map) => !map.is_empty(),
            _ => true,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Self::Int(_) | Self::Long(_) | Self::Float(_) | Self::Double(_)
        )
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_) | Self::Array(_) | Self::Range(_))
    }

    /// Whether this value has no fractional part (integral numerics only).
    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Long(_))
    }

    // --- Coercions ---

    /// Coerces to a 64-bit integer: numerics truncate, `Bool` maps to 0/1,
    /// `Char` yields its code point, `String` parses.
    pub fn as_long(&self) -> RunResult<i64> {
        match self {
            Self::Int(v) => Ok(i64::from(*v)),
            Self::Long(v) => Ok(*v),
            Self::Float(v) => Ok(*v as i64),
            Self::Double(v) => Ok(*v as i64),
            Self::Bool(v) => Ok(i64::from(*v)),
            Self::Char(c) => Ok(i64::from(u32::from(*c))),
            Self::Str(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| NovaError::type_error(format!("Cannot convert '{s}' to an integer"))),
            other => Err(NovaError::type_error(format!(
                "Cannot convert {} to an integer",
                other.type_name()
            ))),
        }
    }

    /// Coerces to a 32-bit integer; see [`Self::as_long`].
    pub fn as_int(&self) -> RunResult<i32> {
        let wide = self.as_long()?;
        Ok(wide as i32)
    }

    /// Coerces to a 64-bit float.
    pub fn as_double(&self) -> RunResult<f64> {
        match self {
            Self::Int(v) => Ok(f64::from(*v)),
            Self::Long(v) => Ok(*v as f64),
            Self::Float(v) => Ok(f64::from(*v)),
            Self::Double(v) => Ok(*v),
            Self::Bool(v) => Ok(f64::from(u8::from(*v))),
            Self::Str(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| NovaError::type_error(format!("Cannot convert '{s}' to a number"))),
            other => Err(NovaError::type_error(format!(
                "Cannot convert {} to a number",
                other.type_name()
            ))),
        }
    }

    /// Coerces to a 32-bit float; see [`Self::as_double`].
    pub fn as_float(&self) -> RunResult<f32> {
        Ok(self.as_double()? as f32)
    }

    /// Requires a string receiver.
    pub fn expect_str(&self, context: &str) -> RunResult<Arc<str>> {
        match self {
            Self::Str(s) => Ok(Arc::clone(s)),
            other => Err(NovaError::type_error(format!(
                "{context} expects a String, got {}",
                other.type_name()
            ))),
        }
    }

    /// The canonical string form, identical to what `toString`/interpolation
    /// produce.
    #[must_use]
    pub fn display(&self) -> String {
        let mut out = String::new();
        fmt_value(&mut out, self, 0);
        out
    }

    // --- Built-in operator semantics ---

    /// Built-in `+`: numeric addition with promotion, string concatenation,
    /// list concatenation, and map merge (right wins).
    pub fn op_add(&self, other: &Self) -> RunResult<Self> {
        if let Self::Str(s) = self {
            let mut combined = String::with_capacity(s.len() + 8);
            combined.push_str(s);
            combined.push_str(&other.display());
            return Ok(Self::from_string(combined));
        }
        if let (Self::List(a), Self::List(b)) = (self, other) {
            let mut items = a.snapshot();
            items.extend(b.snapshot());
            return Ok(Self::list(items));
        }
        if let (Self::Map(a), Self::Map(b)) = (self, other) {
            let mut merged = a.read().clone();
            for (k, v) in b.snapshot() {
                merged.insert(k, v);
            }
            return Ok(Self::map(merged));
        }
        numeric_binary(self, other, "+", i64::checked_add, i64::wrapping_add, |a, b| a + b)
    }

    /// Built-in `-`.
    pub fn op_sub(&self, other: &Self) -> RunResult<Self> {
        numeric_binary(self, other, "-", i64::checked_sub, i64::wrapping_sub, |a, b| a - b)
    }

    /// Built-in `*`: numeric multiply; also `String * Int` repetition.
    pub fn op_mul(&self, other: &Self) -> RunResult<Self> {
        if let (Self::Str(s), Self::Int(n)) = (self, other) {
            let n = usize::try_from(*n).unwrap_or(0);
            return Ok(Self::from_string(s.repeat(n)));
        }
        numeric_binary(self, other, "*", i64::checked_mul, i64::wrapping_mul, |a, b| a * b)
    }

    /// Built-in `/`: integer division fails on zero, float division follows
    /// IEEE-754.
    pub fn op_div(&self, other: &Self) -> RunResult<Self> {
        match promote(self, other) {
            Some(NumPair::Long(a, b)) => {
                if b == 0 {
                    Err(NovaError::division_by_zero())
                } else {
                    Ok(narrow_int(self, other, a.wrapping_div(b)))
                }
            }
            Some(NumPair::Float(a, b)) => Ok(Self::Float(a / b)),
            Some(NumPair::Double(a, b)) => Ok(Self::Double(a / b)),
            None => Err(binary_type_error(self, other, "/")),
        }
    }

    /// Built-in `%` with truncation-toward-zero sign semantics.
    pub fn op_rem(&self, other: &Self) -> RunResult<Self> {
        match promote(self, other) {
            Some(NumPair::Long(a, b)) => {
                if b == 0 {
                    Err(NovaError::division_by_zero())
                } else {
                    Ok(narrow_int(self, other, a.wrapping_rem(b)))
                }
            }
            Some(NumPair::Float(a, b)) => Ok(Self::Float(a % b)),
            Some(NumPair::Double(a, b)) => Ok(Self::Double(a % b)),
            None => Err(binary_type_error(self, other, "%")),
        }
    }

    /// Built-in unary `-`.
    pub fn op_neg(&self) -> RunResult<Self> {
        match self {
            Self::Int(v) => Ok(v
                .checked_neg()
                .map_or_else(|| Self::Long(-(i64::from(*v))), Self::Int)),
            Self::Long(v) => Ok(Self::Long(v.wrapping_neg())),
            Self::Float(v) => Ok(Self::Float(-v)),
            Self::Double(v) => Ok(Self::Double(-v)),
            other => Err(NovaError::type_error(format!(
                "Cannot negate {}",
                other.type_name()
            ))),
        }
    }

    /// Built-in ordering for `<`/`<=`/`>`/`>=`: numerics through the widest
    /// type, strings lexicographically, chars by code point. Returns `None`
    /// when the operands need a user `compareTo`.
    #[must_use]
    pub fn builtin_compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.as_ref().cmp(b.as_ref())),
            (Self::Char(a), Self::Char(b)) => Some(a.cmp(b)),
            _ => match promote(self, other)? {
                NumPair::Long(a, b) => Some(a.cmp(&b)),
                NumPair::Float(a, b) => a.partial_cmp(&b),
                NumPair::Double(a, b) => a.partial_cmp(&b),
            },
        }
    }
}

/// Promoted numeric operand pair, following the lattice
/// `Int < Long < Float < Double`.
enum NumPair {
    /// Both operands integral (covers Int/Int, Int/Long, Long/Long).
    Long(i64, i64),
    Float(f32, f32),
    Double(f64, f64),
}

fn promote(a: &Value, b: &Value) -> Option<NumPair> {
    use Value::{Double, Float, Int, Long};
    Some(match (a, b) {
        (Double(x), _) => NumPair::Double(*x, b.as_double().ok()?),
        (_, Double(y)) => NumPair::Double(a.as_double().ok()?, *y),
        (Float(x), Float(y)) => NumPair::Float(*x, *y),
        (Float(x), Int(y)) => NumPair::Float(*x, *y as f32),
        (Int(x), Float(y)) => NumPair::Float(*x as f32, *y),
        (Float(x), Long(y)) => NumPair::Float(*x, *y as f32),
        (Long(x), Float(y)) => NumPair::Float(*x as f32, *y),
        (Int(x), Int(y)) => NumPair::Long(i64::from(*x), i64::from(*y)),
        (Int(x), Long(y)) => NumPair::Long(i64::from(*x), *y),
        (Long(x), Int(y)) => NumPair::Long(*x, i64::from(*y)),
        (Long(x), Long(y)) => NumPair::Long(*x, *y),
        _ => return None,
    })
}

/// Applies an integral-or-float binary operation after promotion.
///
/// `Int op Int` stays `Int` unless the 32-bit result overflows, in which case
/// it widens to `Long`; `Long` arithmetic wraps.
fn numeric_binary(
    a: &Value,
    b: &Value,
    op: &str,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    wrap_op: impl Fn(i64, i64) -> i64,
    float_op: impl Fn(f64, f64) -> f64,
) -> RunResult<Value> {
    match promote(a, b) {
        Some(NumPair::Long(x, y)) => {
            // Int operands can never overflow the 64-bit computation; only
            // Long operands reach the wrapping fallback.
            let wide = int_op(x, y).unwrap_or_else(|| wrap_op(x, y));
            Ok(narrow_int(a, b, wide))
        }
        Some(NumPair::Float(x, y)) => Ok(Value::Float(float_op(f64::from(x), f64::from(y)) as f32)),
        Some(NumPair::Double(x, y)) => Ok(Value::Double(float_op(x, y))),
        None => Err(binary_type_error(a, b, op)),
    }
}

/// Chooses Int vs Long for an integral result: both-Int operands narrow back
/// to `Int` when the result fits, otherwise the result widens to `Long`.
fn narrow_int(a: &Value, b: &Value, result: i64) -> Value {
    if matches!(a, Value::Int(_)) && matches!(b, Value::Int(_)) {
        Value::from_i64(result)
    } else {
        Value::Long(result)
    }
}

fn binary_type_error(a: &Value, b: &Value, op: &str) -> NovaError {
    NovaError::new(
        ErrorKind::TypeError,
        format!("Operator '{op}' not defined for {} and {}", a.type_name(), b.type_name()),
    )
}

// --- Equality and hashing ---

/// Canonical numeric form used for cross-type equality and hashing.
enum Numeric {
    Integral(i64),
    Real(f64),
}

fn numeric_form(v: &Value) -> Option<Numeric> {
    match v {
        Value::Int(x) => Some(Numeric::Integral(i64::from(*x))),
        Value::Long(x) => Some(Numeric::Integral(*x)),
        Value::Float(x) => Some(float_form(f64::from(*x))),
        Value::Double(x) => Some(float_form(*x)),
        _ => None,
    }
}

fn float_form(x: f64) -> Numeric {
    // A float with an exact integral value participates in integer equality,
    // so it must also hash like that integer.
    if x.is_finite() && x.fract() == 0.0 && x >= i64::MIN as f64 && x <= i64::MAX as f64 {
        Numeric::Integral(x as i64)
    } else {
        Numeric::Real(x)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (numeric_form(self), numeric_form(other)) {
            return match (a, b) {
                (Numeric::Integral(x), Numeric::Integral(y)) => x == y,
                (Numeric::Real(x), Numeric::Real(y)) => x == y,
                (Numeric::Integral(x), Numeric::Real(y)) | (Numeric::Real(y), Numeric::Integral(x)) => {
                    x as f64 == y
                }
            };
        }
        match (self, other) {
            (Self::Null, Self::Null) | (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            (Self::Pair(a), Self::Pair(b)) => a == b,
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Result(a), Self::Result(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            (Self::Class(a), Self::Class(b)) => a.id == b.id,
            (Self::Instance(a), Self::Instance(b)) => Arc::ptr_eq(a, b),
            (Self::External(a), Self::External(b)) => Arc::ptr_eq(a, b),
            (Self::Task(a), Self::Task(b)) => Arc::ptr_eq(a, b),
            (Self::Future(a), Self::Future(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// Required for map keys. NaN keys are never equal to themselves, matching
// float semantics; such keys are simply unfindable.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(num) = numeric_form(self) {
            match num {
                Numeric::Integral(x) => {
                    state.write_u8(1);
                    x.hash(state);
                }
                Numeric::Real(x) => {
                    state.write_u8(2);
                    x.to_bits().hash(state);
                }
            }
            return;
        }
        match self {
            Self::Null => state.write_u8(3),
            Self::Unit => state.write_u8(4),
            Self::Bool(b) => {
                state.write_u8(5);
                b.hash(state);
            }
            Self::Char(c) => {
                state.write_u8(6);
                c.hash(state);
            }
            Self::Str(s) => {
                state.write_u8(7);
                s.hash(state);
            }
            Self::List(list) => {
                state.write_u8(8);
                for item in list.read().iter() {
                    item.hash(state);
                }
            }
            Self::Array(array) => {
                state.write_u8(8);
                for item in array.read().iter() {
                    item.hash(state);
                }
            }
            Self::Map(map) => {
                state.write_u8(9);
                for (k, v) in map.read().iter() {
                    k.hash(state);
                    v.hash(state);
                }
            }
            Self::Pair(pair) => {
                state.write_u8(10);
                pair.first.hash(state);
                pair.second.hash(state);
            }
            Self::Range(range) => {
                state.write_u8(11);
                range.hash(state);
            }
            Self::Result(result) => {
                state.write_u8(12);
                result.is_ok().hash(state);
                result.inner().hash(state);
            }
            Self::Function(f) => {
                state.write_u8(13);
                (Arc::as_ptr(f) as usize).hash(state);
            }
            Self::Class(class) => {
                state.write_u8(14);
                class.id.hash(state);
            }
            Self::Instance(instance) => {
                state.write_u8(15);
                (Arc::as_ptr(instance) as usize).hash(state);
            }
            Self::External(object) => {
                state.write_u8(16);
                (Arc::as_ptr(object).cast::<()>() as usize).hash(state);
            }
            Self::Task(task) => {
                state.write_u8(17);
                (Arc::as_ptr(task) as usize).hash(state);
            }
            Self::Future(future) => {
                state.write_u8(18);
                (Arc::as_ptr(future) as usize).hash(state);
            }
            Self::Int(_) | Self::Long(_) | Self::Float(_) | Self::Double(_) => unreachable!("handled above"),
        }
    }
}

// --- Display ---

fn fmt_value(out: &mut String, value: &Value, depth: usize) {
    if depth > DISPLAY_DEPTH_LIMIT {
        out.push_str("...");
        return;
    }
    match value {
        Value::Null => out.push_str("null"),
        Value::Unit => out.push_str("Unit"),
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Int(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Long(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Float(v) => out.push_str(ryu::Buffer::new().format(*v)),
        Value::Double(v) => out.push_str(ryu::Buffer::new().format(*v)),
        Value::Char(c) => out.push(*c),
        Value::Str(s) => out.push_str(s),
        Value::List(list) => {
            out.push('[');
            for (i, item) in list.snapshot().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                fmt_value(out, item, depth + 1);
            }
            out.push(']');
        }
        Value::Array(array) => {
            out.push('[');
            for (i, item) in array.snapshot().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                fmt_value(out, item, depth + 1);
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            for (i, (k, v)) in map.snapshot().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                fmt_value(out, k, depth + 1);
                out.push_str(": ");
                fmt_value(out, v, depth + 1);
            }
            out.push('}');
        }
        Value::Pair(pair) => {
            out.push('(');
            fmt_value(out, &pair.first, depth + 1);
            out.push_str(", ");
            fmt_value(out, &pair.second, depth + 1);
            out.push(')');
        }
        Value::Range(range) => {
            let _ = write!(out, "{range}");
        }
        Value::Result(result) => {
            out.push_str(if result.is_ok() { "Ok(" } else { "Err(" });
            fmt_value(out, result.inner(), depth + 1);
            out.push(')');
        }
        Value::Function(f) => out.push_str(&f.describe()),
        Value::Class(class) => {
            let _ = write!(out, "<class {}>", class.name);
        }
        Value::Instance(instance) => out.push_str(&instance.default_display(depth)),
        Value::External(object) => out.push_str(&object.to_display()),
        Value::Task(task) => out.push_str(&task.display()),
        Value::Future(future) => out.push_str(&future.display()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

// --- Host-facing conversions ---

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Self::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::from_str_slice(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::from_string(v)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_is_not_null() {
        assert_ne!(Value::Unit, Value::Null);
        assert!(Value::Unit.truthy());
        assert!(!Value::Null.truthy());
    }

    #[test]
    fn numeric_cross_type_equality() {
        assert_eq!(Value::Int(3), Value::Long(3));
        assert_eq!(Value::Int(3), Value::Double(3.0));
        assert_eq!(Value::Long(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::Double(3.5));
    }

    #[test]
    fn truthiness_table() {
        assert!(!Value::from_str_slice("").truthy());
        assert!(Value::from_str_slice("x").truthy());
        assert!(!Value::list(vec![]).truthy());
        assert!(Value::list(vec![Value::Int(1)]).truthy());
        assert!(!Value::map(IndexMap::new()).truthy());
        assert!(Value::Int(0).truthy());
        assert!(Value::Double(0.0).truthy());
    }

    #[test]
    fn int_overflow_widens_to_long() {
        let sum = Value::Int(i32::MAX).op_add(&Value::Int(1)).unwrap();
        assert_eq!(sum, Value::Long(i64::from(i32::MAX) + 1));
        let product = Value::Int(1 << 20).op_mul(&Value::Int(1 << 20)).unwrap();
        assert_eq!(product, Value::Long(1_i64 << 40));
    }

    #[test]
    fn int_division_by_zero_fails_float_does_not() {
        assert_eq!(
            Value::Int(1).op_div(&Value::Int(0)).unwrap_err().kind,
            ErrorKind::DivisionByZero
        );
        let inf = Value::Double(1.0).op_div(&Value::Double(0.0)).unwrap();
        assert_eq!(inf, Value::Double(f64::INFINITY));
    }

    #[test]
    fn modulo_truncates_toward_zero() {
        assert_eq!(Value::Int(-7).op_rem(&Value::Int(3)).unwrap(), Value::Int(-1));
        assert_eq!(Value::Int(7).op_rem(&Value::Int(-3)).unwrap(), Value::Int(1));
    }

    #[test]
    fn string_concat_uses_canonical_display() {
        let joined = Value::from_str_slice("n=").op_add(&Value::Int(3)).unwrap();
        assert_eq!(joined, Value::from_str_slice("n=3"));
        let with_null = Value::from_str_slice("x:").op_add(&Value::Null).unwrap();
        assert_eq!(with_null, Value::from_str_slice("x:null"));
    }

    #[test]
    fn list_concat_and_map_merge() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = Value::list(vec![Value::Int(2)]);
        assert_eq!(a.op_add(&b).unwrap(), Value::list(vec![Value::Int(1), Value::Int(2)]));

        let mut left = IndexMap::new();
        left.insert(Value::from_str_slice("a"), Value::Int(1));
        left.insert(Value::from_str_slice("b"), Value::Int(2));
        let mut right = IndexMap::new();
        right.insert(Value::from_str_slice("b"), Value::Int(9));
        let merged = Value::map(left).op_add(&Value::map(right)).unwrap();
        let Value::Map(m) = merged else { panic!("expected map") };
        assert_eq!(m.get(&Value::from_str_slice("b")), Some(Value::Int(9)));
    }

    #[test]
    fn comparison_covers_numbers_strings_chars() {
        assert_eq!(
            Value::Int(2).builtin_compare(&Value::Double(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::from_str_slice("abc").builtin_compare(&Value::from_str_slice("abd")),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Char('a').builtin_compare(&Value::Char('b')), Some(Ordering::Less));
        assert_eq!(Value::list(vec![]).builtin_compare(&Value::Int(1)), None);
    }

    #[test]
    fn double_display_keeps_trailing_zero() {
        assert_eq!(Value::Double(3.0).display(), "3.0");
        assert_eq!(Value::Float(1.5).display(), "1.5");
    }

    #[test]
    fn hash_matches_cross_type_equality() {
        use std::collections::hash_map::DefaultHasher;
        let hash = |v: &Value| {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&Value::Int(3)), hash(&Value::Long(3)));
        assert_eq!(hash(&Value::Int(3)), hash(&Value::Double(3.0)));
    }
}
