use crate::Evaluator;

/// Configuration for [`Evaluator`].
///
/// Settings only affect how `REGEXP` patterns are compiled. Evaluation results are the same for
/// every configuration.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorConfig {
    pub(crate) cache_regexes: bool,
}

impl EvaluatorConfig {
    /// Create the default configuration: patterns are compiled on every evaluation.
    pub fn new() -> Self {
        EvaluatorConfig::default()
    }

    /// Keep compiled `REGEXP` patterns for the lifetime of the evaluator.
    ///
    /// Useful when the same flags are evaluated many times. The cache is never evicted, so only
    /// enable it for trusted flag sets.
    ///
    /// ```
    /// # use flagrules::EvaluatorConfig;
    /// let evaluator = EvaluatorConfig::new().cache_regexes(true).to_evaluator();
    /// ```
    pub fn cache_regexes(&mut self, cache_regexes: bool) -> &mut Self {
        self.cache_regexes = cache_regexes;
        self
    }

    /// Create a new [`Evaluator`] using the specified configuration.
    ///
    /// ```
    /// # use flagrules::{Evaluator, EvaluatorConfig};
    /// let evaluator: Evaluator = EvaluatorConfig::new().to_evaluator();
    /// ```
    pub fn to_evaluator(&self) -> Evaluator {
        Evaluator::new(self)
    }
}
