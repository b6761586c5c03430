use crate::value::Value;

/// The `Result` value: `Ok(value)` or `Err(error)`.
///
/// Interacts with the postfix `?` propagation operator and the
/// `Ok`/`Err`/`runCatching` builtins.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Ok(Value),
    Err(Value),
}

impl ResultValue {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    #[must_use]
    pub fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }

    /// The wrapped value, whichever side it is on.
    #[must_use]
    pub fn inner(&self) -> &Value {
        match self {
            Self::Ok(v) | Self::Err(v) => v,
        }
    }
}
