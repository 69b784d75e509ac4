/// Resource limits for the multi-variable aggregators.
///
/// A context with `e` distinct entities produces `e^nofVars` grouping tuples. Text
/// records listing many entities make this fan-out explosive, so the planner passes a
/// cap; exceeding it is a precondition violation, not a truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationLimits {
    /// Upper bound on the number of grouping tuples enumerated for a single context.
    pub max_tuples_per_context: usize,
}

impl Default for AggregationLimits {
    fn default() -> Self {
        Self {
            max_tuples_per_context: 1 << 20,
        }
    }
}
