use crate::blank_node::{is_name_char, is_name_start_char};
use std::fmt;

/// A query variable, identified by its name.
///
/// The default string formatter is returning a SPARQL compatible representation:
/// ```
/// use oxterm::{Variable, VariableNameParseError};
///
/// assert_eq!("?foo", Variable::new("foo")?.to_string());
/// # Result::<_,VariableNameParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash)]
pub struct Variable {
    name: String,
}

impl Variable {
    /// Creates a variable name from a unique identifier.
    ///
    /// The variable identifier must be valid according to the SPARQL grammar.
    pub fn new(name: impl Into<String>) -> Result<Self, VariableNameParseError> {
        let name = name.into();
        validate_variable_identifier(&name)?;
        Ok(Self::new_unchecked(name))
    }

    /// Creates a variable name from a unique identifier without validation.
    ///
    /// It is the caller's responsibility to ensure that `name` is a valid variable name
    /// according to the SPARQL grammar.
    ///
    /// [`Variable::new()`] is a safe version of this constructor and should be used for untrusted data.
    #[inline]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.name
    }
}

impl fmt::Display for Variable {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}

fn validate_variable_identifier(id: &str) -> Result<(), VariableNameParseError> {
    let mut chars = id.chars();
    let front = chars.next().ok_or(VariableNameParseError)?;
    if !(front.is_ascii_digit() || is_name_start_char(front)) {
        return Err(VariableNameParseError);
    }
    if chars.all(|c| c != '-' && is_name_char(c)) {
        Ok(())
    } else {
        Err(VariableNameParseError)
    }
}

/// An error raised during [`Variable`] name validation.
#[derive(Debug, thiserror::Error)]
#[error("The variable name is invalid")]
pub struct VariableNameParseError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        Variable::new("s").unwrap();
        Variable::new("1x").unwrap();
        Variable::new("_").unwrap();
        Variable::new("").unwrap_err();
        Variable::new("a-b").unwrap_err();
        Variable::new("?a").unwrap_err();
    }
}
