use std::{borrow::Cow, cmp::Ordering};

use crate::{
    js_number::{format_number, parse_number},
    models::{DateRule, Operator, Rule, StringListRule, TryParse, VersionRule},
    regex_cache::RegexSource,
    sharder::bucket,
    ContextValue, Error, Result,
};

/// Numeric timestamps below this value (January 1990 in epoch milliseconds) are read as seconds.
const MILLISECONDS_THRESHOLD: f64 = 631_152_000_000.0;

/// Partial date strings are completed from these templates, so that a bare date is treated as the
/// end of that day by `DATE_AFTER` and as its start by `DATE_BEFORE`.
const DATE_AFTER_TEMPLATE: &str = "2000-01-01T23:59:59";
const DATE_BEFORE_TEMPLATE: &str = "2000-01-01T00:00:00";

impl TryParse<Rule> {
    /// Returns the parsed rule, or the error evaluating an unparseable rule must abort with.
    pub(crate) fn parsed(&self) -> Result<&Rule> {
        match self {
            TryParse::Parsed(rule) => Ok(rule),
            TryParse::ParseFailed(json) => Err(rule_parse_error(json)),
        }
    }
}

fn rule_parse_error(json: &serde_json::Value) -> Error {
    match json.get("operator") {
        Some(serde_json::Value::String(tag)) if Operator::from_tag(tag).is_some() => {
            Error::MalformedRule {
                operator: tag.clone(),
            }
        }
        Some(serde_json::Value::String(tag)) => Error::UnsupportedOperator {
            operator: tag.clone(),
        },
        Some(other) => Error::UnsupportedOperator {
            operator: other.to_string(),
        },
        None => Error::UnsupportedOperator {
            operator: "null".to_owned(),
        },
    }
}

#[derive(Debug, Clone, Copy)]
enum VersionComparison {
    Eq,
    Gte,
    Lte,
}

impl Rule {
    /// Apply the rule to the context value it reads (`None` when the key is absent).
    ///
    /// A value of the wrong type never matches, whatever `negate` says. `EMPTY` and `TRUE` are the
    /// only operators with their own notion of what a missing value means.
    pub(crate) fn eval(
        &self,
        value: Option<&ContextValue>,
        regexes: &impl RegexSource,
    ) -> Result<bool> {
        let result = match self {
            Rule::Empty(rule) => {
                let is_empty = matches!(value, None | Some(ContextValue::Null))
                    || value.and_then(ContextValue::as_str) == Some("");
                is_empty != rule.negate
            }

            Rule::True(rule) => {
                matches!(value, Some(ContextValue::Boolean(b)) if *b != rule.negate)
            }

            Rule::StrEqual(rule) => match_string(value, rule, |s, v| s == v),
            Rule::StrStartsWith(rule) => match_string(value, rule, |s, v| s.starts_with(v)),
            Rule::StrEndsWith(rule) => match_string(value, rule, |s, v| s.ends_with(v)),
            Rule::StrContains(rule) => match_string(value, rule, |s, v| s.contains(v)),

            Rule::StrEqualSoft(rule) => {
                let s = match value {
                    Some(ContextValue::String(s)) => s.to_lowercase(),
                    Some(ContextValue::Number(n)) => format_number(*n).to_lowercase(),
                    _ => return Ok(false),
                };
                rule.values.iter().any(|v| v.to_lowercase() == s) != rule.negate
            }

            Rule::StrBefore(rule) => {
                let Some(s) = as_string(value) else {
                    return Ok(false);
                };
                (s <= rule.value.as_str()) != rule.negate
            }

            Rule::StrAfter(rule) => {
                let Some(s) = as_string(value) else {
                    return Ok(false);
                };
                (s >= rule.value.as_str()) != rule.negate
            }

            Rule::RegExp(rule) => {
                let Some(s) = as_string(value) else {
                    return Ok(false);
                };
                let regex = regexes.get_regex(&rule.value)?;
                regex.find(s).is_some() != rule.negate
            }

            Rule::Eq(rule) | Rule::Lt(rule) | Rule::Gt(rule) => {
                let Some(n) = value.and_then(ContextValue::as_f64) else {
                    return Ok(false);
                };
                let matches = match self {
                    Rule::Lt(_) => n < rule.value,
                    Rule::Gt(_) => n > rule.value,
                    _ => n == rule.value,
                };
                matches != rule.negate
            }

            Rule::ArrOverlap(rule) => {
                let Some(ContextValue::Array(items)) = value else {
                    return Ok(false);
                };
                items.iter().any(|item| rule.values.contains(item)) != rule.negate
            }

            Rule::DateAfter(rule) => eval_date(value, rule, DATE_AFTER_TEMPLATE, Ordering::Less),
            Rule::DateBefore(rule) => {
                eval_date(value, rule, DATE_BEFORE_TEMPLATE, Ordering::Greater)
            }

            Rule::SemverEq(rule) => eval_version(value, rule, VersionComparison::Eq),
            Rule::SemverGte(rule) => eval_version(value, rule, VersionComparison::Gte),
            Rule::SemverLte(rule) => eval_version(value, rule, VersionComparison::Lte),

            Rule::Percentage(rule) => {
                let input = match value {
                    Some(ContextValue::String(s)) => Cow::Borrowed(s.as_str()),
                    Some(ContextValue::Number(n)) => Cow::Owned(format_number(*n)),
                    _ => return Ok(false),
                };
                let point = bucket(input.as_bytes(), rule.seed);
                (rule.range_start <= point && point < rule.range_end) != rule.negate
            }
        };

        Ok(result)
    }
}

fn as_string(value: Option<&ContextValue>) -> Option<&str> {
    value.and_then(ContextValue::as_str)
}

fn match_string(
    value: Option<&ContextValue>,
    rule: &StringListRule,
    predicate: impl Fn(&str, &str) -> bool,
) -> bool {
    as_string(value)
        .is_some_and(|s| rule.values.iter().any(|v| predicate(s, v)) != rule.negate)
}

/// `boundary_side` is where the rule boundary must sit relative to the value (or be equal) for the
/// rule to match: `Less` for `DATE_AFTER`, `Greater` for `DATE_BEFORE`.
fn eval_date(
    value: Option<&ContextValue>,
    rule: &DateRule,
    template: &str,
    boundary_side: Ordering,
) -> bool {
    let ordering = match value {
        Some(ContextValue::String(s)) => Some(rule.iso.as_str().cmp(overlay(s, template).as_str())),
        Some(ContextValue::Number(n)) => {
            let millis = if *n < MILLISECONDS_THRESHOLD {
                n * 1000.0
            } else {
                *n
            };
            rule.timestamp.partial_cmp(&millis)
        }
        _ => return false,
    };

    let matches = ordering.is_some_and(|o| o == boundary_side || o == Ordering::Equal);
    matches != rule.negate
}

/// Keep the leading characters of `value` and fill the rest from `template`; the result is cut to
/// the template length.
fn overlay(value: &str, template: &str) -> String {
    let supplied = value.chars().count();
    value
        .chars()
        .take(template.len())
        .chain(template.chars().skip(supplied))
        .collect()
}

fn eval_version(
    value: Option<&ContextValue>,
    rule: &VersionRule,
    comparison: VersionComparison,
) -> bool {
    let Some(s) = as_string(value) else {
        return false;
    };
    let components: Vec<f64> = s.split('.').map(parse_number).collect();

    for (index, expected) in rule.version.iter().enumerate() {
        let Some(actual) = components.get(index) else {
            // Missing component: the version is underspecified.
            return rule.negate;
        };

        match (comparison, actual.partial_cmp(expected)) {
            (VersionComparison::Eq, Some(Ordering::Equal)) => {}
            (VersionComparison::Eq, _) => return rule.negate,

            (VersionComparison::Gte, Some(Ordering::Greater))
            | (VersionComparison::Lte, Some(Ordering::Less)) => return !rule.negate,

            (VersionComparison::Gte, Some(Ordering::Less))
            | (VersionComparison::Lte, Some(Ordering::Greater)) => return rule.negate,

            // Tie (or NaN, which never orders): decided by the next component.
            _ => {}
        }
    }

    !rule.negate
}
