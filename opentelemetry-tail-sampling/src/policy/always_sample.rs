use crate::{Decision, PolicyEvaluator, PolicyResult, TraceData};
use opentelemetry::trace::TraceId;

/// Samples every trace, including traces evicted before their decision wait.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysSample;

impl AlwaysSample {
    /// Creates an always sample policy.
    pub fn new() -> Self {
        AlwaysSample
    }
}

impl PolicyEvaluator for AlwaysSample {
    fn evaluate(&self, _trace_id: TraceId, _trace: &TraceData) -> PolicyResult<Decision> {
        Ok(Decision::Sampled)
    }

    fn on_dropped_spans(&self, _trace_id: TraceId, _trace: &TraceData) -> PolicyResult<Decision> {
        Ok(Decision::Sampled)
    }
}
