use crate::trace_data::present_span_count;
use crate::{Decision, PolicyEvaluator, PolicyResult, SamplingError, Span, TraceData};
use opentelemetry::trace::TraceId;
use opentelemetry::{otel_debug, Key, Value};

/// Samples traces with a span whose integer attribute falls in a range.
///
/// The range is inclusive on both ends. Attributes of any other type are
/// ignored.
#[derive(Clone, Debug)]
pub struct NumericAttributeFilter {
    key: Key,
    min_value: i64,
    max_value: i64,
}

impl NumericAttributeFilter {
    /// Creates a filter matching `key` values in `[min_value, max_value]`.
    pub fn new(key: impl Into<Key>, min_value: i64, max_value: i64) -> PolicyResult<Self> {
        let key = key.into();
        if key.as_str().is_empty() {
            return Err(SamplingError::invalid_config(
                "numeric attribute filter requires a key",
            ));
        }
        if min_value > max_value {
            return Err(SamplingError::invalid_config(format!(
                "numeric attribute filter on {}: min_value {} is greater than max_value {}",
                key.as_str(),
                min_value,
                max_value
            )));
        }

        Ok(NumericAttributeFilter {
            key,
            min_value,
            max_value,
        })
    }

    fn matches(&self, span: &Span) -> bool {
        span.attributes.iter().any(|kv| {
            kv.key == self.key
                && matches!(kv.value, Value::I64(v) if (self.min_value..=self.max_value).contains(&v))
        })
    }
}

impl PolicyEvaluator for NumericAttributeFilter {
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
            name: "TailSampling.NumericAttribute.LateArrivingSpans",
            key = self.key.as_str().to_owned(),
            earlier_decision = format!("{:?}", earlier_decision),
            span_count = present_span_count(spans)
        );
        Ok(())
    }

    // Late spans may carry the attribute the first pass was looking for.
    fn evaluate_second_chance(
        &self,
        trace_id: TraceId,
        trace: &TraceData,
    ) -> PolicyResult<Decision> {
        self.evaluate(trace_id, trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Batch;
    use opentelemetry::KeyValue;
    use rstest::rstest;

    fn trace_with(attributes: Vec<KeyValue>) -> TraceData {
        let trace = TraceData::new();
        trace.append_batch(Batch::new(vec![
            None,
            Some(Span::new("unrelated")),
            Some(Span::new("db").with_attributes(attributes)),
        ]));
        trace
    }

    fn trace_id() -> TraceId {
        TraceId::from_bytes(11u128.to_be_bytes())
    }

    #[rstest]
    #[case(KeyValue::new("http.status_code", 499_i64), Decision::NotSampled)]
    #[case(KeyValue::new("http.status_code", 500_i64), Decision::Sampled)]
    #[case(KeyValue::new("http.status_code", 599_i64), Decision::Sampled)]
    #[case(KeyValue::new("http.status_code", 600_i64), Decision::NotSampled)]
    #[case(KeyValue::new("http.status_code", "500"), Decision::NotSampled)]
    #[case(KeyValue::new("http.method", 500_i64), Decision::NotSampled)]
    fn matches_inclusive_range(#[case] attribute: KeyValue, #[case] expected: Decision) {
        let filter = NumericAttributeFilter::new("http.status_code", 500, 599).unwrap();
        let trace = trace_with(vec![attribute]);

        assert_eq!(filter.evaluate(trace_id(), &trace).unwrap(), expected);
    }

    #[test]
    fn rejects_inverted_range_and_empty_key() {
        assert!(matches!(
            NumericAttributeFilter::new("k", 10, 1),
            Err(SamplingError::InvalidConfig(_))
        ));
        assert!(matches!(
            NumericAttributeFilter::new("", 1, 10),
            Err(SamplingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn second_chance_sees_late_spans() {
        let filter = NumericAttributeFilter::new("retries", 3, i64::MAX).unwrap();
        let trace = trace_with(vec![KeyValue::new("retries", 1_i64)]);
        assert_eq!(
            filter.evaluate(trace_id(), &trace).unwrap(),
            Decision::NotSampled
        );

        let late = vec![Some(
            Span::new("retry").with_attributes([KeyValue::new("retries", 4_i64)]),
        )];
        filter
            .on_late_arriving_spans(Decision::NotSampled, &late)
            .unwrap();
        trace.append_batch(Batch::new(late));

        assert_eq!(
            filter.evaluate_second_chance(trace_id(), &trace).unwrap(),
            Decision::Sampled
        );
        assert_eq!(
            filter.on_dropped_spans(trace_id(), &trace).unwrap(),
            Decision::NotSampled
        );
    }
}
