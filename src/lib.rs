//! Deterministic local evaluation of feature flags.
//!
//! # Overview
//!
//! A [`Flag`] is an ordered list of [`Condition`]s plus a default [`Variation`]. Each condition is
//! a conjunction of typed [`Rule`]s over the attributes of a [`Context`]. Evaluating a flag returns
//! the variation of the first condition whose rules all hold, or the default variation when none
//! does.
//!
//! Evaluation is pure: the same context and flag always produce the same result, and no I/O happens
//! during evaluation. Flags are plain data, normally parsed from JSON produced by a flag-management
//! system ([`Flag::from_json`], [`FlagConfig::from_json`]).
//!
//! An evaluation result is `Option<&serde_json::Value>`: `None` means the selected variation is
//! inactive ("not served"), which is different from serving a JSON `null`.
//!
//! ```
//! # use flagrules::{eval_flag, Context, Flag};
//! use serde_json::json;
//!
//! let flag = Flag::from_json(r#"{
//!     "conditions": [{
//!         "rules": [
//!             {"key": "appVersion", "operator": "SEMVER_GTE", "version": [2, 10, 0]},
//!             {"key": "userId", "operator": "PERCENTAGE", "seed": 7, "rangeStart": 0, "rangeEnd": 1}
//!         ],
//!         "variation": {"active": true, "value": "new-checkout"}
//!     }],
//!     "defaultVariation": {"active": false, "value": null}
//! }"#)?;
//!
//! let context: Context = [
//!     ("appVersion".to_owned(), "2.9.1".into()),
//!     ("userId".to_owned(), "user-42".into()),
//! ].into_iter().collect();
//! assert_eq!(eval_flag(&context, &flag)?, None);
//!
//! let context: Context = [
//!     ("appVersion".to_owned(), "2.10.3".into()),
//!     ("userId".to_owned(), "user-42".into()),
//! ].into_iter().collect();
//! assert_eq!(eval_flag(&context, &flag)?, Some(&json!("new-checkout")));
//! # Ok::<(), flagrules::Error>(())
//! ```
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. A context value that is missing or has the wrong
//! type for an operator is not an error: the rule simply does not hold. Errors indicate a flag
//! definition the evaluator cannot interpret (an unknown operator, a malformed rule or an invalid
//! regular expression) and abort the whole evaluation.
//!
//! Rules that fail to parse are kept as [`TryParse::ParseFailed`], so that parsing a flag never
//! fails because of them. The error is reported only if evaluation reaches such a rule.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages, with
//! the `flagrules` target. Consider integrating a `log`-compatible logger implementation for better
//! visibility into evaluation.
//!
//! # Configuration
//!
//! The free functions ([`eval_flag`], [`eval_rules`], [`eval_rule`], [`eval_flag_details`]) compile
//! `REGEXP` patterns on every call. Use [`EvaluatorConfig`] to build an [`Evaluator`] that caches
//! them. Patterns use ECMAScript `RegExp` syntax and semantics.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod eval;
mod eval_details;
mod eval_visitor;
mod evaluator;
mod js_number;
mod models;
mod regex_cache;
mod rules;
pub mod sharder;

pub use config::EvaluatorConfig;
pub use context::{Context, ContextValue};
pub use error::{Error, Result};
pub use eval::{eval_flag, eval_flag_details, eval_rule, eval_rules};
pub use eval_details::{EvalConditionDetails, EvalFlagDetails, EvalRuleDetails};
pub use evaluator::Evaluator;
pub use models::{
    Condition, DateRule, Flag, FlagConfig, NumberRule, Operator, PercentageRule, PresenceRule,
    Rule, StringListRule, StringRule, TryParse, Variation, VersionRule,
};
