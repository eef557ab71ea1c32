use std::sync::Arc;

use regress::Regex;

use crate::{
    eval::{eval_flag_details_with, eval_flag_with_visitor, eval_rules_with_visitor},
    eval_details::EvalFlagDetails,
    eval_visitor::NoopEvalVisitor,
    models::{Flag, FlagConfig, Rule, TryParse},
    regex_cache::{CompileEachTime, RegexCache, RegexSource},
    Context, EvaluatorConfig, Result,
};

/// Reusable evaluator carrying an [`EvaluatorConfig`].
///
/// `Evaluator` is `Send + Sync` and can be shared between threads (e.g., in an `Arc`). The free
/// functions [`eval_flag`](crate::eval_flag) and friends behave like a default `Evaluator`.
///
/// # Examples
/// ```
/// # use flagrules::{Context, EvaluatorConfig, Flag};
/// use serde_json::json;
///
/// let evaluator = EvaluatorConfig::new().cache_regexes(true).to_evaluator();
/// let flag = Flag::from_json(r#"{
///     "conditions": [{
///         "rules": [{"key": "email", "operator": "REGEXP", "value": "@example\\.com$"}],
///         "variation": {"active": true, "value": true}
///     }],
///     "defaultVariation": {"active": true, "value": false}
/// }"#)?;
///
/// let context: Context = [("email".to_owned(), "alice@example.com".into())].into_iter().collect();
/// assert_eq!(evaluator.eval_flag(&context, &flag)?, Some(&json!(true)));
/// # Ok::<(), flagrules::Error>(())
/// ```
#[derive(Debug)]
pub struct Evaluator {
    regexes: Regexes,
}

#[derive(Debug)]
enum Regexes {
    CompileEachTime(CompileEachTime),
    Cached(RegexCache),
}

impl RegexSource for Regexes {
    fn get_regex(&self, pattern: &str) -> Result<Arc<Regex>> {
        match self {
            Regexes::CompileEachTime(source) => source.get_regex(pattern),
            Regexes::Cached(cache) => cache.get_regex(pattern),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        EvaluatorConfig::default().to_evaluator()
    }
}

impl Evaluator {
    pub(crate) fn new(config: &EvaluatorConfig) -> Evaluator {
        let regexes = if config.cache_regexes {
            Regexes::Cached(RegexCache::new())
        } else {
            Regexes::CompileEachTime(CompileEachTime)
        };
        Evaluator { regexes }
    }

    /// Evaluate a single rule against `context`.
    pub fn eval_rule(&self, context: &Context, rule: &Rule) -> Result<bool> {
        rule.eval(context.get(rule.key()), &self.regexes)
    }

    /// Returns `true` iff every rule holds. See [`eval_rules`](crate::eval_rules).
    pub fn eval_rules(&self, context: &Context, rules: &[TryParse<Rule>]) -> Result<bool> {
        eval_rules_with_visitor(context, rules, &self.regexes, &mut NoopEvalVisitor)
    }

    /// Evaluate `flag` against `context`. See [`eval_flag`](crate::eval_flag).
    pub fn eval_flag<'f>(
        &self,
        context: &Context,
        flag: &'f Flag,
    ) -> Result<Option<&'f serde_json::Value>> {
        eval_flag_with_visitor(context, flag, None, &self.regexes, &mut NoopEvalVisitor)
    }

    /// Evaluate `flag` against `context` and return evaluation details alongside the result.
    pub fn eval_flag_details<'f>(
        &self,
        context: &Context,
        flag: &'f Flag,
    ) -> (Result<Option<&'f serde_json::Value>>, EvalFlagDetails) {
        eval_flag_details_with(context, flag, None, &self.regexes)
    }

    /// Evaluate the flag named `flag_key` from `flags`. See [`FlagConfig::eval_flag`].
    pub fn eval_config_flag<'c>(
        &self,
        flags: &'c FlagConfig,
        flag_key: &str,
        context: &Context,
    ) -> Result<Option<&'c serde_json::Value>> {
        flags.eval_flag_with(flag_key, context, &self.regexes)
    }

    /// Like [`Evaluator::eval_config_flag`], also returning evaluation details.
    pub fn eval_config_flag_details<'c>(
        &self,
        flags: &'c FlagConfig,
        flag_key: &str,
        context: &Context,
    ) -> (Result<Option<&'c serde_json::Value>>, EvalFlagDetails) {
        flags.eval_flag_details_with(flag_key, context, &self.regexes)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, sync::Arc};

    use serde::Deserialize;
    use serde_json::json;

    use crate::{
        eval_flag,
        models::{Condition, Flag, FlagConfig, Rule, StringRule, Variation},
        Context, Error, Evaluator, EvaluatorConfig,
    };

    fn regexp_flag(pattern: &str) -> Flag {
        Flag {
            conditions: vec![Condition::new(
                [Rule::RegExp(StringRule {
                    key: "foo".into(),
                    value: pattern.into(),
                    negate: false,
                })],
                Variation::served("matched"),
            )],
            default_variation: Variation::not_served(),
        }
    }

    fn context(value: &str) -> Context {
        [("foo".to_owned(), value.into())].into_iter().collect()
    }

    #[test]
    fn evaluator_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Evaluator>();
    }

    #[test]
    fn cached_and_uncached_agree() {
        let plain = Evaluator::default();
        let cached = EvaluatorConfig::new().cache_regexes(true).to_evaluator();

        let flag = regexp_flag("^ba[rz]$");
        for value in ["bar", "baz", "bat", "", "xbar"] {
            let ctx = context(value);
            assert_eq!(
                plain.eval_flag(&ctx, &flag).unwrap(),
                cached.eval_flag(&ctx, &flag).unwrap()
            );
            // Second call goes through the cache.
            assert_eq!(
                cached.eval_flag(&ctx, &flag).unwrap(),
                eval_flag(&ctx, &flag).unwrap()
            );
        }
    }

    #[test]
    fn cached_evaluator_reports_invalid_regex_every_time() {
        let cached = EvaluatorConfig::new().cache_regexes(true).to_evaluator();
        let flag = regexp_flag("(");
        for _ in 0..2 {
            assert!(matches!(
                cached.eval_flag(&context("bar"), &flag),
                Err(Error::InvalidRegex { .. })
            ));
        }
    }

    #[test]
    fn cached_lookahead_pattern() {
        let cached = EvaluatorConfig::new().cache_regexes(true).to_evaluator();
        let flag = regexp_flag("^(?!admin)[a-z]+$");
        assert_eq!(
            cached.eval_flag(&context("user"), &flag).unwrap(),
            Some(&json!("matched"))
        );
        assert_eq!(cached.eval_flag(&context("admin"), &flag).unwrap(), None);
        assert_eq!(
            cached.eval_flag(&context("user"), &flag).unwrap(),
            Some(&json!("matched"))
        );
    }

    #[test]
    fn shared_between_threads() {
        let evaluator = Arc::new(EvaluatorConfig::new().cache_regexes(true).to_evaluator());
        let flag = Arc::new(regexp_flag("\\d"));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let evaluator = Arc::clone(&evaluator);
                let flag = Arc::clone(&flag);
                std::thread::spawn(move || {
                    let ctx = context(&format!("user-{i}"));
                    evaluator.eval_flag(&ctx, &flag).unwrap().cloned()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(json!("matched")));
        }
    }

    #[test]
    fn config_flag_lookup() {
        let config = FlagConfig::from_json(
            r#"{"flags": {"on": {"conditions": [], "defaultVariation": {"active": true, "value": 1}}}}"#,
        )
        .unwrap();
        let evaluator = Evaluator::default();

        assert_eq!(
            evaluator
                .eval_config_flag(&config, "on", &Context::new())
                .unwrap(),
            Some(&json!(1))
        );
        assert!(matches!(
            evaluator.eval_config_flag(&config, "off", &Context::new()),
            Err(Error::FlagNotFound)
        ));

        let (result, details) =
            evaluator.eval_config_flag_details(&config, "off", &Context::new());
        assert!(result.is_err());
        assert_eq!(details.flag_key.as_deref(), Some("off"));
        assert!(details.error.is_some());
    }

    #[derive(Debug, Deserialize)]
    struct TestCase {
        flag: Flag,
        context: Context,
    }

    #[test]
    fn cached_evaluator_on_standard_test_data() {
        let f = File::open("tests/data/standard_tests.json").unwrap();
        let cases: Vec<TestCase> = serde_json::from_reader(f).unwrap();
        let cached = EvaluatorConfig::new().cache_regexes(true).to_evaluator();

        for case in cases {
            assert_eq!(
                cached.eval_flag(&case.context, &case.flag).unwrap(),
                eval_flag(&case.context, &case.flag).unwrap()
            );
        }
    }
}
