//! Typed configuration values and raw-string coercion.
//!
//! Every raw string coerces to *some* [`Value`]; whether that value is legal
//! for a particular key is the scope validator's concern, not the parser's.

use std::fmt;

/// A typed configuration value.
///
/// Configuration trees are dynamically typed containers; leaves are one of
/// these four scalar classes.
///
/// # Examples
///
/// ```
/// use strata::Value;
///
/// assert_eq!(Value::parse("yes"), Value::Bool(true));
/// assert_eq!(Value::parse("8"), Value::Int(8));
/// assert_eq!(Value::parse("x86_64"), Value::Str("x86_64".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A boolean value.
    Bool(bool),
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
    /// A string value.
    Str(String),
}

/// Aliases accepted as boolean true, matched case-insensitively.
const TRUE_ALIASES: &[&str] = &["true", "yes", "on", "enable", "enabled"];

/// Aliases accepted as boolean false, matched case-insensitively.
const FALSE_ALIASES: &[&str] = &["false", "no", "off", "disable", "disabled"];

impl Value {
    /// Coerce a raw string into a typed value.
    ///
    /// First match wins: boolean alias table, then integer, then float,
    /// then the original string unchanged. Every input parses to something;
    /// there is no error path.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata::Value;
    ///
    /// assert_eq!(Value::parse("ON"), Value::Bool(true));
    /// assert_eq!(Value::parse("disabled"), Value::Bool(false));
    /// assert_eq!(Value::parse("2.5"), Value::Float(2.5));
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        if TRUE_ALIASES.contains(&lowered.as_str()) {
            return Self::Bool(true);
        }
        if FALSE_ALIASES.contains(&lowered.as_str()) {
            return Self::Bool(false);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Self::Float(f);
        }
        Self::Str(raw.to_string())
    }

    /// Name of this value's type class, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Float(_) => "number",
            Self::Str(_) => "string",
        }
    }

    /// Returns the boolean payload, if this is a boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer value.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    // The display form is also the stringified form used for pattern checks.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_true_aliases() {
        for alias in ["true", "yes", "on", "enable", "enabled"] {
            assert_eq!(Value::parse(alias), Value::Bool(true), "alias: {alias}");
        }
    }

    #[test]
    fn test_parse_false_aliases() {
        for alias in ["false", "no", "off", "disable", "disabled"] {
            assert_eq!(Value::parse(alias), Value::Bool(false), "alias: {alias}");
        }
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(Value::parse("TRUE"), Value::Bool(true));
        assert_eq!(Value::parse("Yes"), Value::Bool(true));
        assert_eq!(Value::parse("OFF"), Value::Bool(false));
        assert_eq!(Value::parse("Disabled"), Value::Bool(false));
    }

    #[test]
    fn test_parse_integer_before_float() {
        assert_eq!(Value::parse("8"), Value::Int(8));
        assert_eq!(Value::parse("-3"), Value::Int(-3));
        assert_eq!(Value::parse("0"), Value::Int(0));
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(Value::parse("2.5"), Value::Float(2.5));
        assert_eq!(Value::parse("-0.25"), Value::Float(-0.25));
    }

    #[test]
    fn test_parse_string_fallback() {
        assert_eq!(Value::parse("x86_64"), Value::Str("x86_64".to_string()));
        assert_eq!(Value::parse(""), Value::Str(String::new()));
        assert_eq!(Value::parse("maybe"), Value::Str("maybe".to_string()));
    }

    #[test]
    fn test_numeric_strings_are_not_booleans() {
        // "1"/"0" are not in the alias table; they parse as integers.
        assert_eq!(Value::parse("1"), Value::Int(1));
        assert_eq!(Value::parse("0"), Value::Int(0));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::Bool(true).kind_name(), "boolean");
        assert_eq!(Value::Int(1).kind_name(), "number");
        assert_eq!(Value::Float(1.5).kind_name(), "number");
        assert_eq!(Value::Str("s".into()).kind_name(), "string");
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for v in [
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(42),
            Value::Str("plain".into()),
        ] {
            assert_eq!(Value::parse(&v.to_string()), v);
        }
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::Str("a".into()).as_str(), Some("a"));
        assert_eq!(Value::Int(7).as_bool(), None);
    }
}
