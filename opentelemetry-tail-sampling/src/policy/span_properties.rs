use crate::timestamp::timestamp_to_micros;
use crate::{Decision, PolicyEvaluator, PolicyResult, SamplingError, Span, TraceData};
use opentelemetry::otel_debug;
use opentelemetry::trace::TraceId;
use regex::Regex;

/// Samples traces matching all of the configured span properties.
///
/// Up to three criteria can be configured, and every configured one must hold
/// for the trace to be sampled:
///
/// * an operation name pattern, matched by at least one span;
/// * a minimum duration in microseconds, measured from the earliest start to
///   the latest end across all spans of the trace;
/// * a minimum number of spans.
///
/// The criteria are evaluated over every batch received so far. Late spans,
/// second chances and forced evictions never change the verdict of this
/// policy.
#[derive(Clone, Debug)]
pub struct SpanPropertiesFilter {
    operation_re: Option<Regex>,
    min_duration_micros: Option<i64>,
    min_number_of_spans: Option<usize>,
}

impl SpanPropertiesFilter {
    /// Creates a span properties filter.
    ///
    /// Fails with [`SamplingError::InvalidPattern`] if the operation name
    /// pattern does not compile and with [`SamplingError::NoPropertyDefined`]
    /// if no criterion is set.
    pub fn new(
        operation_name_pattern: Option<&str>,
        min_duration_micros: Option<i64>,
        min_number_of_spans: Option<usize>,
    ) -> PolicyResult<Self> {
        let operation_re = operation_name_pattern.map(Regex::new).transpose()?;

        if operation_re.is_none() && min_duration_micros.is_none() && min_number_of_spans.is_none()
        {
            return Err(SamplingError::NoPropertyDefined);
        }

        otel_debug!(
            name: "TailSampling.SpanProperties.Created",
            operation_name_pattern = format!("{:?}", operation_name_pattern),
            min_duration_micros = format!("{:?}", min_duration_micros),
            min_number_of_spans = format!("{:?}", min_number_of_spans)
        );

        Ok(SpanPropertiesFilter {
            operation_re,
            min_duration_micros,
            min_number_of_spans,
        })
    }

    fn matches_operation(&self, span: &Span) -> bool {
        self.operation_re
            .as_ref()
            .is_some_and(|re| re.is_match(&span.name))
    }
}

/// What a single pass over the trace learned.
#[derive(Debug, Default)]
struct TraceSummary {
    span_count: usize,
    matching_operation_found: bool,
    // (min start, max end) in micros; `None` until a span with timing data
    // has been seen.
    bounds: Option<(i64, i64)>,
}

impl TraceSummary {
    fn widen(&mut self, start: i64, end: i64) {
        self.bounds = Some(match self.bounds {
            None => (start, end),
            Some((min_start, max_end)) => (min_start.min(start), max_end.max(end)),
        });
    }
}

impl PolicyEvaluator for SpanPropertiesFilter {
    fn evaluate(&self, _trace_id: TraceId, trace: &TraceData) -> PolicyResult<Decision> {
        let batches = trace.received_batches();

        let mut summary = TraceSummary::default();
        for span in batches.iter().flat_map(|batch| batch.present_spans()) {
            summary.span_count += 1;

            if !summary.matching_operation_found && self.matches_operation(span) {
                summary.matching_operation_found = true;
            }

            if self.min_duration_micros.is_some() {
                if let (Some(start), Some(end)) = (&span.start_time, &span.end_time) {
                    summary.widen(timestamp_to_micros(start), timestamp_to_micros(end));
                }
            }
        }

        let operation_name_condition_met =
            self.operation_re.is_none() || summary.matching_operation_found;

        let min_duration_condition_met = match self.min_duration_micros {
            None => true,
            // Sanity check on the window first
            Some(min_duration) => summary.bounds.is_some_and(|(min_start, max_end)| {
                max_end > min_start
                    && max_end
                        .checked_sub(min_start)
                        .map_or(true, |window| window >= min_duration)
            }),
        };

        let min_span_count_condition_met = self
            .min_number_of_spans
            .map_or(true, |min_spans| summary.span_count >= min_spans);

        Ok(Decision::from_bool(
            operation_name_condition_met
                && min_duration_condition_met
                && min_span_count_condition_met,
        ))
    }

    fn on_late_arriving_spans(
        &self,
        _earlier_decision: Decision,
        _spans: &[Option<Span>],
    ) -> PolicyResult<()> {
        Ok(())
    }

    fn evaluate_second_chance(
        &self,
        _trace_id: TraceId,
        _trace: &TraceData,
    ) -> PolicyResult<Decision> {
        Ok(Decision::NotSampled)
    }

    fn on_dropped_spans(&self, _trace_id: TraceId, _trace: &TraceData) -> PolicyResult<Decision> {
        Ok(Decision::NotSampled)
    }
}
