use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    eval_visitor::{EvalConditionVisitor, EvalVisitor},
    models::{Condition, Rule, TryParse, Variation},
    ContextValue, Result,
};

/// Trace of a single flag evaluation.
///
/// Only the work actually performed is recorded: conditions after the matching one are absent, and
/// a condition stops listing rules at its first failing (or erroring) rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalFlagDetails {
    /// Key of the flag, when evaluated through a [`FlagConfig`](crate::FlagConfig).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_key: Option<String>,
    /// When the evaluation happened.
    pub timestamp: DateTime<Utc>,
    /// Whether a value was served.
    pub served: bool,
    /// Served value. `None` if nothing was served or evaluation failed.
    pub value: Option<serde_json::Value>,
    /// Error that aborted the evaluation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Index of the condition that selected the variation. `None` if the default variation was
    /// used (or evaluation failed).
    pub matched_condition: Option<usize>,
    /// Conditions in the order they were evaluated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<EvalConditionDetails>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalConditionDetails {
    /// Position of the condition in the flag.
    pub index: usize,
    pub matched: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evaluated_rules: Vec<EvalRuleDetails>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalRuleDetails {
    pub rule: TryParse<Rule>,
    /// Context value the rule was applied to. `None` if the key was absent.
    pub context_value: Option<ContextValue>,
    pub matched: bool,
}

pub(crate) struct EvalFlagDetailsBuilder {
    flag_key: Option<String>,
    now: DateTime<Utc>,

    matched_condition: Option<usize>,
    variation: Option<Variation>,
    error: Option<String>,

    conditions: Vec<EvalConditionDetails>,
}

pub(crate) struct EvalConditionDetailsBuilder<'a> {
    condition_details: &'a mut EvalConditionDetails,
}

impl EvalFlagDetailsBuilder {
    pub fn new(flag_key: Option<String>, now: DateTime<Utc>) -> EvalFlagDetailsBuilder {
        EvalFlagDetailsBuilder {
            flag_key,
            now,
            matched_condition: None,
            variation: None,
            error: None,
            conditions: Vec::new(),
        }
    }

    pub fn build(self) -> EvalFlagDetails {
        // Selected variation is only meaningful if evaluation completed.
        let variation = self.variation.filter(|_| self.error.is_none());
        let served = variation.as_ref().is_some_and(|v| v.active);

        EvalFlagDetails {
            flag_key: self.flag_key,
            timestamp: self.now,
            served,
            value: variation.filter(|v| v.active).map(|v| v.value),
            error: self.error,
            matched_condition: self.matched_condition,
            conditions: self.conditions,
        }
    }
}

impl EvalVisitor for EvalFlagDetailsBuilder {
    type ConditionVisitor<'a> = EvalConditionDetailsBuilder<'a>;

    fn visit_condition<'a>(
        &'a mut self,
        index: usize,
        _condition: &Condition,
    ) -> Self::ConditionVisitor<'a> {
        self.conditions.push(EvalConditionDetails {
            index,
            matched: false,
            evaluated_rules: Vec::new(),
        });
        EvalConditionDetailsBuilder {
            condition_details: self
                .conditions
                .last_mut()
                .expect("we just inserted an element, so there must be last"),
        }
    }

    fn on_variation(&mut self, condition: Option<usize>, variation: &Variation) {
        self.matched_condition = condition;
        self.variation = Some(variation.clone());
    }

    fn on_result(&mut self, result: &Result<Option<&serde_json::Value>>) {
        self.error = result.as_ref().err().map(|err| err.to_string());
    }
}

impl<'a> EvalConditionVisitor for EvalConditionDetailsBuilder<'a> {
    fn on_rule_eval(
        &mut self,
        rule: &TryParse<Rule>,
        context_value: Option<&ContextValue>,
        result: &Result<bool>,
    ) {
        self.condition_details
            .evaluated_rules
            .push(EvalRuleDetails {
                rule: rule.clone(),
                context_value: context_value.cloned(),
                matched: matches!(result, Ok(true)),
            });
    }

    fn on_result(&mut self, matched: bool) {
        self.condition_details.matched = matched;
    }
}
