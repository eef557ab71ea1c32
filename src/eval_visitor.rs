use crate::{
    models::{Condition, Flag, Rule, TryParse, Variation},
    ContextValue, Result,
};

pub(crate) trait EvalVisitor {
    // Type-foo here basically means that ConditionVisitor may hold references to EvalVisitor but
    // should not outlive it.
    type ConditionVisitor<'a>: EvalConditionVisitor + 'a
    where
        Self: 'a;

    #[allow(unused_variables)]
    #[inline]
    fn on_flag(&mut self, flag: &Flag) {}

    /// Called before the rules of the condition at `index` are evaluated. Conditions after the
    /// first match are never visited.
    fn visit_condition<'a>(
        &'a mut self,
        index: usize,
        condition: &Condition,
    ) -> Self::ConditionVisitor<'a>;

    /// Called with the selected variation. `condition` is `None` when the default variation was
    /// used.
    #[allow(unused_variables)]
    #[inline]
    fn on_variation(&mut self, condition: Option<usize>, variation: &Variation) {}

    /// Called with evaluation result.
    #[allow(unused_variables)]
    #[inline]
    fn on_result(&mut self, result: &Result<Option<&serde_json::Value>>) {}
}

pub(crate) trait EvalConditionVisitor {
    #[allow(unused_variables)]
    #[inline]
    fn on_rule_eval(
        &mut self,
        rule: &TryParse<Rule>,
        context_value: Option<&ContextValue>,
        result: &Result<bool>,
    ) {
    }

    #[allow(unused_variables)]
    #[inline]
    fn on_result(&mut self, matched: bool) {}
}

/// Dummy visitor that does nothing.
///
/// It is designed so that all calls to it are optimized away (zero-cost).
pub(crate) struct NoopEvalVisitor;

impl EvalVisitor for NoopEvalVisitor {
    type ConditionVisitor<'a> = NoopEvalVisitor;

    #[inline]
    fn visit_condition<'a>(
        &'a mut self,
        _index: usize,
        _condition: &Condition,
    ) -> Self::ConditionVisitor<'a> {
        NoopEvalVisitor
    }
}

impl EvalConditionVisitor for NoopEvalVisitor {}
