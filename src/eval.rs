use chrono::Utc;

use crate::{
    eval_details::{EvalFlagDetails, EvalFlagDetailsBuilder},
    eval_visitor::{EvalConditionVisitor, EvalVisitor, NoopEvalVisitor},
    models::{Flag, FlagConfig, Rule, TryParse, Variation},
    regex_cache::{CompileEachTime, RegexSource},
    Context, Error, Result,
};

/// Evaluate a single rule against `context`.
pub fn eval_rule(context: &Context, rule: &Rule) -> Result<bool> {
    rule.eval(context.get(rule.key()), &CompileEachTime::default())
}

/// Returns `true` iff every rule holds. An empty list holds for any context.
///
/// Evaluation stops at the first rule that does not hold, so an erroring rule placed after it is
/// never reached.
pub fn eval_rules(context: &Context, rules: &[TryParse<Rule>]) -> Result<bool> {
    eval_rules_with_visitor(
        context,
        rules,
        &CompileEachTime::default(),
        &mut NoopEvalVisitor,
    )
}

/// Evaluate `flag` against `context`.
///
/// Returns `Ok(None)` when the selected variation is inactive ("not served"), which is different
/// from `Ok(Some(&Value::Null))`.
///
/// # Examples
/// ```
/// # use flagrules::{eval_flag, Context, Flag};
/// use serde_json::json;
///
/// let flag = Flag::from_json(r#"{
///     "conditions": [{
///         "rules": [{"key": "country", "operator": "STR_EQUAL", "values": ["FR"]}],
///         "variation": {"active": true, "value": "bonjour"}
///     }],
///     "defaultVariation": {"active": true, "value": "hello"}
/// }"#)?;
///
/// let context: Context = [("country".to_owned(), "FR".into())].into_iter().collect();
/// assert_eq!(eval_flag(&context, &flag)?, Some(&json!("bonjour")));
/// assert_eq!(eval_flag(&Context::new(), &flag)?, Some(&json!("hello")));
/// # Ok::<(), flagrules::Error>(())
/// ```
pub fn eval_flag<'f>(context: &Context, flag: &'f Flag) -> Result<Option<&'f serde_json::Value>> {
    eval_flag_with_visitor(
        context,
        flag,
        None,
        &CompileEachTime::default(),
        &mut NoopEvalVisitor,
    )
}

/// Evaluate `flag` against `context` and return evaluation details alongside the result.
pub fn eval_flag_details<'f>(
    context: &Context,
    flag: &'f Flag,
) -> (Result<Option<&'f serde_json::Value>>, EvalFlagDetails) {
    eval_flag_details_with(context, flag, None, &CompileEachTime::default())
}

impl FlagConfig {
    /// Evaluate the flag named `flag_key` against `context`.
    ///
    /// Returns [`Error::FlagNotFound`] if there is no such flag and [`Error::FlagParseError`] if
    /// its definition failed to parse.
    pub fn eval_flag(
        &self,
        flag_key: &str,
        context: &Context,
    ) -> Result<Option<&serde_json::Value>> {
        self.eval_flag_with(flag_key, context, &CompileEachTime::default())
    }

    /// Evaluate the flag named `flag_key` against `context` and return evaluation details.
    pub fn eval_flag_details(
        &self,
        flag_key: &str,
        context: &Context,
    ) -> (Result<Option<&serde_json::Value>>, EvalFlagDetails) {
        self.eval_flag_details_with(flag_key, context, &CompileEachTime::default())
    }

    pub(crate) fn eval_flag_with(
        &self,
        flag_key: &str,
        context: &Context,
        regexes: &impl RegexSource,
    ) -> Result<Option<&serde_json::Value>> {
        let flag = self.get_flag(flag_key)?;
        eval_flag_with_visitor(
            context,
            flag,
            Some(flag_key),
            regexes,
            &mut NoopEvalVisitor,
        )
    }

    pub(crate) fn eval_flag_details_with(
        &self,
        flag_key: &str,
        context: &Context,
        regexes: &impl RegexSource,
    ) -> (Result<Option<&serde_json::Value>>, EvalFlagDetails) {
        match self.get_flag(flag_key) {
            Ok(flag) => eval_flag_details_with(context, flag, Some(flag_key), regexes),
            Err(err) => {
                let mut builder =
                    EvalFlagDetailsBuilder::new(Some(flag_key.to_owned()), Utc::now());
                let result: Result<Option<&serde_json::Value>> = Err(err);
                builder.on_result(&result);
                (result, builder.build())
            }
        }
    }

    fn get_flag<'a>(&'a self, flag_key: &str) -> Result<&'a Flag> {
        let flag = self.flags.get(flag_key).ok_or_else(|| {
            log::trace!(target: "flagrules", flag_key; "flag not found");
            Error::FlagNotFound
        })?;

        match flag {
            TryParse::Parsed(flag) => Ok(flag),
            TryParse::ParseFailed(_) => {
                log::warn!(target: "flagrules",
                           flag_key;
                           "evaluating a flag whose definition failed to parse");
                Err(Error::FlagParseError)
            }
        }
    }
}

pub(crate) fn eval_flag_details_with<'f>(
    context: &Context,
    flag: &'f Flag,
    flag_key: Option<&str>,
    regexes: &impl RegexSource,
) -> (Result<Option<&'f serde_json::Value>>, EvalFlagDetails) {
    let mut builder = EvalFlagDetailsBuilder::new(flag_key.map(ToOwned::to_owned), Utc::now());
    let result = eval_flag_with_visitor(context, flag, flag_key, regexes, &mut builder);
    (result, builder.build())
}

pub(crate) fn eval_flag_with_visitor<'f, V: EvalVisitor>(
    context: &Context,
    flag: &'f Flag,
    flag_key: Option<&str>,
    regexes: &impl RegexSource,
    visitor: &mut V,
) -> Result<Option<&'f serde_json::Value>> {
    visitor.on_flag(flag);

    let result = eval_flag_inner(context, flag, regexes, visitor).map(|(condition, variation)| {
        log::trace!(target: "flagrules",
                    flag_key = flag_key.unwrap_or_default(),
                    matched_condition = condition,
                    value:serde = variation.outcome();
                    "evaluated a flag");
        variation.outcome()
    });

    visitor.on_result(&result);

    if let Err(err) = &result {
        log::warn!(target: "flagrules",
                   flag_key = flag_key.unwrap_or_default();
                   "error occurred while evaluating a flag: {err}");
    }

    result
}

/// Find the variation to serve: the one of the first matching condition, or the default one.
fn eval_flag_inner<'f, V: EvalVisitor>(
    context: &Context,
    flag: &'f Flag,
    regexes: &impl RegexSource,
    visitor: &mut V,
) -> Result<(Option<usize>, &'f Variation)> {
    for (index, condition) in flag.conditions.iter().enumerate() {
        let matched = {
            let mut condition_visitor = visitor.visit_condition(index, condition);
            let matched = eval_rules_with_visitor(
                context,
                &condition.rules,
                regexes,
                &mut condition_visitor,
            )?;
            condition_visitor.on_result(matched);
            matched
        };

        if matched {
            visitor.on_variation(Some(index), &condition.variation);
            return Ok((Some(index), &condition.variation));
        }
    }

    visitor.on_variation(None, &flag.default_variation);
    Ok((None, &flag.default_variation))
}

pub(crate) fn eval_rules_with_visitor<V: EvalConditionVisitor>(
    context: &Context,
    rules: &[TryParse<Rule>],
    regexes: &impl RegexSource,
    visitor: &mut V,
) -> Result<bool> {
    for rule in rules {
        let (context_value, result) = match rule.parsed() {
            Ok(parsed) => {
                let context_value = context.get(parsed.key());
                (context_value, parsed.eval(context_value, regexes))
            }
            Err(err) => (None, Err(err)),
        };

        visitor.on_rule_eval(rule, context_value, &result);

        if !result? {
            return Ok(false);
        }
    }

    Ok(true)
}
