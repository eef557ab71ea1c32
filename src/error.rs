use std::sync::Arc;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an evaluation.
///
/// A context value that is absent, `null` or of the wrong type for an operator is *not* an error:
/// the rule simply does not match. Errors here indicate a flag definition that this version of the
/// evaluator cannot interpret, so re-evaluating the same input always fails the same way.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Rule carries an operator tag this evaluator does not know about. The flag definition is
    /// either corrupted or produced by a newer authoring system.
    #[error("unsupported operator {operator:?}")]
    UnsupportedOperator {
        /// Operator tag as found in the flag definition.
        operator: String,
    },

    /// Operator is known but the rule payload does not match its shape (missing or mistyped
    /// fields).
    #[error("malformed {operator} rule")]
    MalformedRule {
        /// Operator of the malformed rule.
        operator: String,
    },

    /// `REGEXP` rule pattern failed to compile as an ECMAScript regular expression.
    #[error("invalid regular expression {pattern:?}: {reason}")]
    InvalidRegex {
        /// The offending pattern.
        pattern: String,
        /// Compilation error reported by the regex engine.
        reason: String,
    },

    /// The requested flag is not part of the flag set.
    #[error("flag not found")]
    FlagNotFound,

    /// The requested flag is part of the flag set but its definition could not be parsed.
    #[error("error parsing flag definition")]
    FlagParseError,

    /// Input is not valid JSON for the requested structure.
    #[error(transparent)]
    // serde_json::Error is not clonable, so we're wrapping it in an Arc.
    InvalidJson(Arc<serde_json::Error>),
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidJson(Arc::new(value))
    }
}
