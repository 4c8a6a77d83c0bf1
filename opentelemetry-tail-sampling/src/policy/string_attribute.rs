use crate::trace_data::present_span_count;
use crate::{Decision, PolicyEvaluator, PolicyResult, SamplingError, Span, TraceData};
use opentelemetry::trace::TraceId;
use opentelemetry::{otel_debug, Key, Value};
use std::collections::HashSet;

/// Samples traces with a span whose string attribute is one of a set of
/// values. Matching is exact.
#[derive(Clone, Debug)]
pub struct StringAttributeFilter {
    key: Key,
    values: HashSet<String>,
}

impl StringAttributeFilter {
    /// Creates a filter matching `key` against any of `values`.
    pub fn new<I, V>(key: impl Into<Key>, values: I) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let key = key.into();
        if key.as_str().is_empty() {
            return Err(SamplingError::invalid_config(
                "string attribute filter requires a key",
            ));
        }
        let values: HashSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(SamplingError::invalid_config(format!(
                "string attribute filter on {} requires at least one value",
                key.as_str()
            )));
        }

        Ok(StringAttributeFilter { key, values })
    }

    fn matches(&self, span: &Span) -> bool {
        span.attributes.iter().any(|kv| {
            kv.key == self.key
                && matches!(&kv.value, Value::String(v) if self.values.contains(v.as_str()))
        })
    }
}

impl PolicyEvaluator for StringAttributeFilter {
    fn evaluate(&self, _trace_id: TraceId, trace: &TraceData) -> PolicyResult<Decision> {
        let batches = trace.received_batches();
        let found = batches
            .iter()
            .flat_map(|batch| batch.present_spans())
            .any(|span| self.matches(span));
        Ok(Decision::from_bool(found))
    }

    fn on_late_arriving_spans(
        &self,
        earlier_decision: Decision,
        spans: &[Option<Span>],
    ) -> PolicyResult<()> {
        otel_debug!(
            name: "TailSampling.StringAttribute.LateArrivingSpans",
            key = self.key.as_str().to_owned(),
            earlier_decision = format!("{:?}", earlier_decision),
            span_count = present_span_count(spans)
        );
        Ok(())
    }

    fn evaluate_second_chance(
        &self,
        trace_id: TraceId,
        trace: &TraceData,
    ) -> PolicyResult<Decision> {
        self.evaluate(trace_id, trace)
    }
}
