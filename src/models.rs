use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// A named set of flags, as delivered by the flag-management system.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct FlagConfig {
    /// Flags by key.
    ///
    /// Value is wrapped in `TryParse` so that if we fail to parse one flag (e.g., a newer
    /// authoring format), we can still serve the other flags.
    pub flags: HashMap<String, TryParse<Flag>>,
}

impl FlagConfig {
    /// Parse a flag set from its JSON representation.
    pub fn from_json(json: &str) -> Result<FlagConfig> {
        let config: FlagConfig = serde_json::from_str(json)?;

        for (flag_key, flag) in &config.flags {
            if let TryParse::ParseFailed(_) = flag {
                log::debug!(target: "flagrules",
                            flag_key:display = flag_key;
                            "failed to parse flag definition");
            }
        }

        Ok(config)
    }
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
///
/// This isolates errors in a subtree: a flag holding an unknown rule still parses, and the error
/// surfaces only if evaluation actually reaches that rule.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed.
    Parsed(T),
    /// Parsing failed.
    ParseFailed(serde_json::Value),
}
impl<T> From<T> for TryParse<T> {
    fn from(value: T) -> Self {
        TryParse::Parsed(value)
    }
}

/// Ordered conditions plus the fallback outcome.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    /// Conditions in evaluation order. The first matching condition wins.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Outcome used when no condition matches.
    pub default_variation: Variation,
}

impl Flag {
    /// Parse a single flag from its JSON representation.
    pub fn from_json(json: &str) -> Result<Flag> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A conjunction of rules paired with the outcome to produce when all of them hold.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Rules, implicitly ANDed. An empty list always matches.
    #[serde(default)]
    pub rules: Vec<TryParse<Rule>>,
    #[allow(missing_docs)]
    pub variation: Variation,
}

impl Condition {
    #[allow(missing_docs)]
    pub fn new(rules: impl IntoIterator<Item = Rule>, variation: Variation) -> Condition {
        Condition {
            rules: rules.into_iter().map(TryParse::from).collect(),
            variation,
        }
    }
}

/// Outcome descriptor.
///
/// `active == false` means the outcome contributes no value, which is different from an active
/// outcome whose value is `null`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    #[allow(missing_docs)]
    pub active: bool,
    #[allow(missing_docs)]
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Variation {
    /// An active variation serving `value`.
    pub fn served(value: impl Into<serde_json::Value>) -> Variation {
        Variation {
            active: true,
            value: value.into(),
        }
    }

    /// An inactive variation.
    pub fn not_served() -> Variation {
        Variation {
            active: false,
            value: serde_json::Value::Null,
        }
    }

    /// The served value, or `None` if the variation is inactive.
    pub fn outcome(&self) -> Option<&serde_json::Value> {
        self.active.then_some(&self.value)
    }
}

/// Fieldless catalog of supported operators.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    /// Value is absent, null or an empty string.
    Empty,
    /// Value is the boolean `true`.
    True,
    /// String value is one of `values`. Case-sensitive.
    StrEqual,
    /// String or number value is one of `values`, ignoring case.
    StrEqualSoft,
    /// String value starts with any of `values`.
    StrStartsWith,
    /// String value ends with any of `values`.
    StrEndsWith,
    /// String value contains any of `values`.
    StrContains,
    /// Hash of the value falls in a sub-range of `[0, 1)`.
    Percentage,
    /// Array value shares at least one element with `values`.
    ArrOverlap,
    /// String value matches a regular expression.
    #[serde(rename = "REGEXP")]
    RegExp,
    /// String value sorts before (or equal to) `value`.
    StrBefore,
    /// String value sorts after (or equal to) `value`.
    StrAfter,
    /// Number value equals `value`.
    Eq,
    /// Number value is less than `value`.
    Lt,
    /// Number value is greater than `value`.
    Gt,
    /// Date value is at or after the boundary.
    DateAfter,
    /// Date value is at or before the boundary.
    DateBefore,
    /// Dotted version equals `version`.
    SemverEq,
    /// Dotted version is greater than or equal to `version`.
    SemverGte,
    /// Dotted version is less than or equal to `version`.
    SemverLte,
}

impl Operator {
    /// Every supported operator.
    pub const ALL: [Operator; 20] = [
        Operator::Empty,
        Operator::True,
        Operator::StrEqual,
        Operator::StrEqualSoft,
        Operator::StrStartsWith,
        Operator::StrEndsWith,
        Operator::StrContains,
        Operator::Percentage,
        Operator::ArrOverlap,
        Operator::RegExp,
        Operator::StrBefore,
        Operator::StrAfter,
        Operator::Eq,
        Operator::Lt,
        Operator::Gt,
        Operator::DateAfter,
        Operator::DateBefore,
        Operator::SemverEq,
        Operator::SemverGte,
        Operator::SemverLte,
    ];

    /// Wire tag of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Empty => "EMPTY",
            Operator::True => "TRUE",
            Operator::StrEqual => "STR_EQUAL",
            Operator::StrEqualSoft => "STR_EQUAL_SOFT",
            Operator::StrStartsWith => "STR_STARTS_WITH",
            Operator::StrEndsWith => "STR_ENDS_WITH",
            Operator::StrContains => "STR_CONTAINS",
            Operator::Percentage => "PERCENTAGE",
            Operator::ArrOverlap => "ARR_OVERLAP",
            Operator::RegExp => "REGEXP",
            Operator::StrBefore => "STR_BEFORE",
            Operator::StrAfter => "STR_AFTER",
            Operator::Eq => "EQ",
            Operator::Lt => "LT",
            Operator::Gt => "GT",
            Operator::DateAfter => "DATE_AFTER",
            Operator::DateBefore => "DATE_BEFORE",
            Operator::SemverEq => "SEMVER_EQ",
            Operator::SemverGte => "SEMVER_GTE",
            Operator::SemverLte => "SEMVER_LTE",
        }
    }

    /// Look up an operator by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Operator> {
        Operator::ALL.into_iter().find(|op| op.as_str() == tag)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed predicate over one context attribute.
///
/// Each variant carries exactly the parameters its operator needs. `negate` defaults to `false`
/// when omitted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "operator", rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum Rule {
    Empty(PresenceRule),
    True(PresenceRule),
    StrEqual(StringListRule),
    StrEqualSoft(StringListRule),
    StrStartsWith(StringListRule),
    StrEndsWith(StringListRule),
    StrContains(StringListRule),
    Percentage(PercentageRule),
    ArrOverlap(StringListRule),
    #[serde(rename = "REGEXP")]
    RegExp(StringRule),
    StrBefore(StringRule),
    StrAfter(StringRule),
    Eq(NumberRule),
    Lt(NumberRule),
    Gt(NumberRule),
    DateAfter(DateRule),
    DateBefore(DateRule),
    SemverEq(VersionRule),
    SemverGte(VersionRule),
    SemverLte(VersionRule),
}

impl Rule {
    #[allow(missing_docs)]
    pub fn operator(&self) -> Operator {
        match self {
            Rule::Empty(_) => Operator::Empty,
            Rule::True(_) => Operator::True,
            Rule::StrEqual(_) => Operator::StrEqual,
            Rule::StrEqualSoft(_) => Operator::StrEqualSoft,
            Rule::StrStartsWith(_) => Operator::StrStartsWith,
            Rule::StrEndsWith(_) => Operator::StrEndsWith,
            Rule::StrContains(_) => Operator::StrContains,
            Rule::Percentage(_) => Operator::Percentage,
            Rule::ArrOverlap(_) => Operator::ArrOverlap,
            Rule::RegExp(_) => Operator::RegExp,
            Rule::StrBefore(_) => Operator::StrBefore,
            Rule::StrAfter(_) => Operator::StrAfter,
            Rule::Eq(_) => Operator::Eq,
            Rule::Lt(_) => Operator::Lt,
            Rule::Gt(_) => Operator::Gt,
            Rule::DateAfter(_) => Operator::DateAfter,
            Rule::DateBefore(_) => Operator::DateBefore,
            Rule::SemverEq(_) => Operator::SemverEq,
            Rule::SemverGte(_) => Operator::SemverGte,
            Rule::SemverLte(_) => Operator::SemverLte,
        }
    }

    /// Context attribute the rule reads.
    pub fn key(&self) -> &str {
        self.common().0
    }

    #[allow(missing_docs)]
    pub fn negate(&self) -> bool {
        self.common().1
    }

    fn common(&self) -> (&str, bool) {
        match self {
            Rule::Empty(r) | Rule::True(r) => (&r.key, r.negate),
            Rule::StrEqual(r)
            | Rule::StrEqualSoft(r)
            | Rule::StrStartsWith(r)
            | Rule::StrEndsWith(r)
            | Rule::StrContains(r)
            | Rule::ArrOverlap(r) => (&r.key, r.negate),
            Rule::Percentage(r) => (&r.key, r.negate),
            Rule::RegExp(r) | Rule::StrBefore(r) | Rule::StrAfter(r) => (&r.key, r.negate),
            Rule::Eq(r) | Rule::Lt(r) | Rule::Gt(r) => (&r.key, r.negate),
            Rule::DateAfter(r) | Rule::DateBefore(r) => (&r.key, r.negate),
            Rule::SemverEq(r) | Rule::SemverGte(r) | Rule::SemverLte(r) => (&r.key, r.negate),
        }
    }
}

/// Rule without parameters (`EMPTY`, `TRUE`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PresenceRule {
    pub key: String,
    #[serde(default)]
    pub negate: bool,
}

/// Rule matching against a list of strings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct StringListRule {
    pub key: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub negate: bool,
}

/// Rule with a single string parameter: a pattern for `REGEXP`, a bound for `STR_BEFORE` and
/// `STR_AFTER`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct StringRule {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub negate: bool,
}

/// Rule comparing numbers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct NumberRule {
    pub key: String,
    pub value: f64,
    #[serde(default)]
    pub negate: bool,
}

/// Rule comparing against a point in time.
///
/// The boundary is carried twice: as epoch milliseconds for numeric context values and as a
/// `YYYY-MM-DDTHH:MM:SS` string for string context values. Both must describe the same instant;
/// [`DateRule::from_datetime`] guarantees that.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct DateRule {
    pub key: String,
    pub timestamp: f64,
    pub iso: String,
    #[serde(default)]
    pub negate: bool,
}

impl DateRule {
    /// Build a non-negated rule whose boundary is `at` (sub-second precision is dropped from
    /// `iso` but kept in `timestamp`).
    pub fn from_datetime(key: impl Into<String>, at: DateTime<Utc>) -> DateRule {
        DateRule {
            key: key.into(),
            timestamp: at.timestamp_millis() as f64,
            iso: at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            negate: false,
        }
    }
}

/// Rule comparing dotted versions component by component.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct VersionRule {
    pub key: String,
    pub version: Vec<f64>,
    #[serde(default)]
    pub negate: bool,
}

/// Deterministic bucketing rule. Passes when the seeded hash of the value, normalized to `[0, 1)`,
/// falls in `[range_start, range_end)`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PercentageRule {
    pub key: String,
    pub range_start: f64,
    pub range_end: f64,
    pub seed: u32,
    #[serde(default)]
    pub negate: bool,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{
        DateRule, Flag, FlagConfig, Operator, PercentageRule, PresenceRule, Rule, StringRule,
        TryParse, Variation,
    };

    #[test]
    fn operator_tags_match_serde_names() {
        for op in Operator::ALL {
            assert_eq!(serde_json::to_value(op).unwrap(), json!(op.as_str()));
            assert_eq!(Operator::from_tag(op.as_str()), Some(op));
        }
        assert_eq!(Operator::from_tag("FOO"), None);
    }

    #[test]
    fn parse_rules_with_defaults() {
        let rule: Rule =
            serde_json::from_value(json!({"key": "foo", "operator": "STR_BEFORE", "value": "bar"}))
                .unwrap();
        assert_eq!(
            rule,
            Rule::StrBefore(StringRule {
                key: "foo".into(),
                value: "bar".into(),
                negate: false,
            })
        );
        assert_eq!(rule.operator(), Operator::StrBefore);
        assert_eq!(rule.key(), "foo");
        assert!(!rule.negate());

        let rule: Rule = serde_json::from_value(json!({
            "key": "id",
            "operator": "PERCENTAGE",
            "seed": 42,
            "rangeStart": 0.1,
            "rangeEnd": 0.7,
            "negate": true
        }))
        .unwrap();
        assert_eq!(
            rule,
            Rule::Percentage(PercentageRule {
                key: "id".into(),
                range_start: 0.1,
                range_end: 0.7,
                seed: 42,
                negate: true,
            })
        );
    }

    #[test]
    fn regexp_tag_is_not_split() {
        let rule: Rule =
            serde_json::from_value(json!({"key": "foo", "operator": "REGEXP", "value": "\\d"}))
                .unwrap();
        assert_eq!(rule.operator(), Operator::RegExp);
        assert_eq!(serde_json::to_value(&rule).unwrap()["operator"], "REGEXP");
    }

    #[test]
    fn unknown_operator_does_not_fail_flag_parsing() {
        let flag = Flag::from_json(
            r#"{
                "conditions": [
                    {
                        "rules": [
                            {"key": "foo", "operator": "EMPTY", "negate": false},
                            {"key": "foo", "operator": "FOO"}
                        ],
                        "variation": {"active": true, "value": 1}
                    }
                ],
                "defaultVariation": {"active": false, "value": null}
            }"#,
        )
        .unwrap();

        let rules = &flag.conditions[0].rules;
        assert_eq!(
            rules[0],
            TryParse::Parsed(Rule::Empty(PresenceRule {
                key: "foo".into(),
                negate: false,
            }))
        );
        assert!(matches!(rules[1], TryParse::ParseFailed(_)));
    }

    #[test]
    fn parse_flag_config_partially() {
        let config = FlagConfig::from_json(
            r#"{
                "flags": {
                    "success": {
                        "conditions": [],
                        "defaultVariation": {"active": true, "value": "on"}
                    },
                    "fail_parsing": {
                        "conditions": "not a list",
                        "defaultVariation": {"active": true, "value": "on"}
                    }
                }
            }"#,
        )
        .unwrap();
        assert!(matches!(
            config.flags.get("success").unwrap(),
            TryParse::Parsed(_)
        ));
        assert!(matches!(
            config.flags.get("fail_parsing").unwrap(),
            TryParse::ParseFailed(_)
        ));
    }

    #[test]
    fn variation_outcome() {
        assert_eq!(Variation::not_served().outcome(), None);
        assert_eq!(
            Variation::served(serde_json::Value::Null).outcome(),
            Some(&serde_json::Value::Null)
        );
        assert_eq!(Variation::served("foo").outcome(), Some(&json!("foo")));
    }

    #[test]
    fn date_rule_from_datetime() {
        let at = Utc.with_ymd_and_hms(2022, 4, 13, 10, 37, 0).unwrap();
        let rule = DateRule::from_datetime("created", at);
        assert_eq!(rule.timestamp, 1649846220000.0);
        assert_eq!(rule.iso, "2022-04-13T10:37:00");
        assert!(!rule.negate);
    }
}
