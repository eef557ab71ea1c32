use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Runtime attributes a flag is evaluated against.
///
/// Keys are attribute names referenced by [`Rule`](crate::Rule) keys. A key that is missing from
/// the map is *absent*, which is different from a key mapped to [`ContextValue::Null`] only for
/// the purpose of [`Context::get`]; every operator treats both the same way.
///
/// # Examples
/// ```
/// # use flagrules::{Context, ContextValue};
/// let context = [
///     ("age".to_owned(), 30.0.into()),
///     ("beta".to_owned(), true.into()),
///     ("country".to_owned(), "FR".into()),
///     ("groups".to_owned(), vec!["staff".to_owned()].into()),
/// ].into_iter().collect::<Context>();
/// assert_eq!(context.get("country"), Some(&ContextValue::from("FR")));
/// ```
pub type Context = HashMap<String, ContextValue>;

/// Dynamically-typed value of a context attribute.
///
/// Operators pattern-match on this type and silently fail (evaluate to `false`) on variants they do
/// not support.
#[derive(Debug, Serialize, Deserialize, PartialEq, From, Clone)]
#[serde(untagged)]
pub enum ContextValue {
    /// A string value.
    String(String),
    /// A numerical value.
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// An explicit null.
    Null,
    /// An array of strings.
    Array(Vec<String>),
    /// Any other JSON value (objects, arrays holding non-strings). No operator matches it except
    /// the emptiness check, which reports it as non-empty.
    Object(serde_json::Value),
}

impl ContextValue {
    /// Returns the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        if let ContextValue::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    /// Returns the number if this is a numerical value.
    pub fn as_f64(&self) -> Option<f64> {
        if let ContextValue::Number(n) = self {
            Some(*n)
        } else {
            None
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}
