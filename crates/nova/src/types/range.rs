use crate::{
    error::{NovaError, RunResult},
    value::Value,
};

/// An integer range value: `a..b` (inclusive) or `a..<b` (exclusive).
///
/// Ranges are iterable, sized, and support O(1) containment checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeValue {
    pub start: i64,
    pub end: i64,
    pub inclusive: bool,
}

impl RangeValue {
    #[must_use]
    pub fn new(start: i64, end: i64, inclusive: bool) -> Self {
        Self { start, end, inclusive }
    }

    /// The last value produced by iteration, or `None` when empty.
    #[must_use]
    pub fn last(&self) -> Option<i64> {
        let last = if self.inclusive { self.end } else { self.end - 1 };
        (self.start <= last).then_some(last)
    }

    /// Number of values the range produces.
    #[must_use]
    pub fn len(&self) -> usize {
        match self.last() {
            Some(last) => usize::try_from(last - self.start + 1).unwrap_or(0),
            None => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last().is_none()
    }

    /// O(1) membership test against an integral value.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        match self.last() {
            Some(last) => value >= self.start && value <= last,
            None => false,
        }
    }

    /// Iterates the produced values in order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + use<> {
        let last = self.last();
        let start = self.start;
        (start..).take_while(move |v| last.is_some_and(|l| *v <= l))
    }

    /// Materialises the range as a list of `Value`s.
    #[must_use]
    pub fn to_values(&self) -> Vec<Value> {
        self.iter().map(Value::from_i64).collect()
    }

    /// Resolves this range against a sequence length for slicing, honouring
    /// negative indices from the back.
    ///
    /// Returns the half-open byte/element window `(from, to)`.
    pub fn slice_bounds(&self, len: usize) -> RunResult<(usize, usize)> {
        let len_i = len as i64;
        let norm = |idx: i64| if idx < 0 { idx + len_i } else { idx };
        let from = norm(self.start);
        let raw_to = norm(self.end) + i64::from(self.inclusive);
        if from < 0 || raw_to < from || raw_to > len_i {
            return Err(NovaError::index_out_of_bounds(self.start, len));
        }
        Ok((from as usize, raw_to as usize))
    }
}

impl std::fmt::Display for RangeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.inclusive {
            write!(f, "{}..{}", self.start, self.end)
        } else {
            write!(f, "{}..<{}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusive_and_exclusive_sizes() {
        assert_eq!(RangeValue::new(1, 5, true).len(), 5);
        assert_eq!(RangeValue::new(1, 5, false).len(), 4);
        assert_eq!(RangeValue::new(5, 1, true).len(), 0);
    }

    #[test]
    fn contains_is_inclusive_aware() {
        assert!(RangeValue::new(1, 5, true).contains(5));
        assert!(!RangeValue::new(1, 5, false).contains(5));
        assert!(RangeValue::new(1, 5, false).contains(1));
    }

    #[test]
    fn slice_bounds_handle_negatives() {
        // "hello"[1..3] inclusive -> elements 1..=3
        let (from, to) = RangeValue::new(1, 3, true).slice_bounds(5).unwrap();
        assert_eq!((from, to), (1, 4));
        let (from, to) = RangeValue::new(0, -1, true).slice_bounds(5).unwrap();
        assert_eq!((from, to), (0, 5));
        assert!(RangeValue::new(0, 9, true).slice_bounds(5).is_err());
    }
}
