//! Sampling policies.
//!
//! Every policy implements [`PolicyEvaluator`]. The component that buffers
//! traces decides when each hook is called and how the decisions of several
//! policies are combined.
use crate::{Decision, PolicyResult, Span, TraceData};
use opentelemetry::trace::TraceId;
use std::fmt;

mod always_sample;
mod numeric_attribute;
mod rate_limiting;
mod span_properties;
mod string_attribute;

pub use always_sample::AlwaysSample;
pub use numeric_attribute::NumericAttributeFilter;
pub use rate_limiting::RateLimiting;
pub use span_properties::SpanPropertiesFilter;
pub use string_attribute::StringAttributeFilter;

/// The contract implemented by every tail sampling policy.
///
/// # Lifecycle
///
/// For each trace the owner of the trace buffer calls:
///
/// 1. [`evaluate`] once the decision wait for the trace has elapsed;
/// 2. [`on_late_arriving_spans`] for spans that show up after a decision;
/// 3. [`evaluate_second_chance`] when late data may reverse a
///    [`Decision::NotSampled`] verdict;
/// 4. [`on_dropped_spans`] instead of [`evaluate`] when the trace has to be
///    evicted early because of memory pressure.
///
/// Implementations must not hold the [`TraceData`] lock across a whole
/// evaluation: take a [`TraceData::received_batches`] snapshot and scan that.
/// The same policy may be evaluated for several traces in parallel, so
/// mutable state needs interior mutability.
///
/// The three secondary hooks have defaults for policies that only decide in
/// [`evaluate`]: late spans are ignored and neither a second chance nor a
/// forced eviction ever samples.
///
/// [`evaluate`]: PolicyEvaluator::evaluate
/// [`on_late_arriving_spans`]: PolicyEvaluator::on_late_arriving_spans
/// [`evaluate_second_chance`]: PolicyEvaluator::evaluate_second_chance
/// [`on_dropped_spans`]: PolicyEvaluator::on_dropped_spans
pub trait PolicyEvaluator: Send + Sync + fmt::Debug {
    /// Looks at the trace data and returns the corresponding decision.
    fn evaluate(&self, trace_id: TraceId, trace: &TraceData) -> PolicyResult<Decision>;

    /// Notifies the policy that `spans` arrived after `earlier_decision` was
    /// already taken for their trace.
    ///
    /// This gives the policy a chance to log or update internal state. Errors
    /// are reported to the caller but must not stop ingestion.
    fn on_late_arriving_spans(
        &self,
        earlier_decision: Decision,
        spans: &[Option<Span>],
    ) -> PolicyResult<()> {
        let _ = (earlier_decision, spans);
        Ok(())
    }

    /// Looks at the trace again after a [`Decision::NotSampled`] verdict and
    /// returns [`Decision::Sampled`] if it now fits.
    fn evaluate_second_chance(
        &self,
        trace_id: TraceId,
        trace: &TraceData,
    ) -> PolicyResult<Decision> {
        let _ = (trace_id, trace);
        Ok(Decision::NotSampled)
    }

    /// Called when the trace has to be dropped, due to memory pressure,
    /// before its decision wait elapsed. Returns a best effort decision on
    /// the partial data.
    fn on_dropped_spans(&self, trace_id: TraceId, trace: &TraceData) -> PolicyResult<Decision> {
        let _ = (trace_id, trace);
        Ok(Decision::NotSampled)
    }
}

impl<T: PolicyEvaluator + ?Sized> PolicyEvaluator for Box<T> {
    fn evaluate(&self, trace_id: TraceId, trace: &TraceData) -> PolicyResult<Decision> {
        (**self).evaluate(trace_id, trace)
    }

    fn on_late_arriving_spans(
        &self,
        earlier_decision: Decision,
        spans: &[Option<Span>],
    ) -> PolicyResult<()> {
        (**self).on_late_arriving_spans(earlier_decision, spans)
    }

    fn evaluate_second_chance(
        &self,
        trace_id: TraceId,
        trace: &TraceData,
    ) -> PolicyResult<Decision> {
        (**self).evaluate_second_chance(trace_id, trace)
    }

    fn on_dropped_spans(&self, trace_id: TraceId, trace: &TraceData) -> PolicyResult<Decision> {
        (**self).on_dropped_spans(trace_id, trace)
    }
}

/// A configured policy: a name used in logs and telemetry plus its evaluator.
#[derive(Debug)]
pub struct Policy {
    /// Name of the policy, unique within a configuration.
    pub name: String,
    /// The evaluator implementing the policy.
    pub evaluator: Box<dyn PolicyEvaluator>,
}

impl Policy {
    /// Creates a named policy.
    pub fn new(name: impl Into<String>, evaluator: impl PolicyEvaluator + 'static) -> Self {
        Policy {
            name: name.into(),
            evaluator: Box::new(evaluator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Batch;

    #[derive(Debug)]
    struct OnlyEvaluate;

    impl PolicyEvaluator for OnlyEvaluate {
        fn evaluate(&self, _trace_id: TraceId, _trace: &TraceData) -> PolicyResult<Decision> {
            Ok(Decision::Sampled)
        }
    }

    #[test]
    fn default_hooks_never_sample() {
        let policy = OnlyEvaluate;
        let trace = TraceData::new();
        trace.append_batch(Batch::from(vec![Span::new("a")]));
        let trace_id = TraceId::from_bytes(1u128.to_be_bytes());

        assert!(policy
            .on_late_arriving_spans(Decision::Sampled, &[Some(Span::new("late"))])
            .is_ok());
        assert_eq!(
            policy.evaluate_second_chance(trace_id, &trace).unwrap(),
            Decision::NotSampled
        );
        assert_eq!(
            policy.on_dropped_spans(trace_id, &trace).unwrap(),
            Decision::NotSampled
        );
    }

    #[test]
    fn boxed_policies_dispatch_to_inner() {
        let policy = Policy::new("only-evaluate", OnlyEvaluate);
        let trace = TraceData::new();
        let trace_id = TraceId::from_bytes(1u128.to_be_bytes());

        assert_eq!(policy.name, "only-evaluate");
        assert_eq!(
            policy.evaluator.evaluate(trace_id, &trace).unwrap(),
            Decision::Sampled
        );
    }
}
