use crate::{Decision, PolicyEvaluator, PolicyResult, SamplingError, TraceData};
use opentelemetry::otel_debug;
use opentelemetry::trace::TraceId;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

/// Samples traces while the number of sampled spans per second stays under a
/// budget.
///
/// The budget is tracked per wall clock second. A trace is admitted only if
/// the spans already admitted in the current second plus its own span count
/// stay strictly below `spans_per_second`.
#[derive(Debug)]
pub struct RateLimiting {
    spans_per_second: u64,
    window: Mutex<Window>,
}

#[derive(Debug, Default)]
struct Window {
    current_second: u64,
    spans_in_current_second: u64,
}

impl RateLimiting {
    /// Creates a rate limiting policy admitting fewer than
    /// `spans_per_second` spans each second.
    pub fn new(spans_per_second: u64) -> PolicyResult<Self> {
        if spans_per_second == 0 {
            return Err(SamplingError::invalid_config(
                "rate limiting requires spans_per_second greater than zero",
            ));
        }

        Ok(RateLimiting {
            spans_per_second,
            window: Mutex::new(Window::default()),
        })
    }

    fn admit(&self, now_second: u64, span_count: u64) -> Decision {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        if window.current_second != now_second {
            window.current_second = now_second;
            window.spans_in_current_second = 0;
        }

        let spans_if_sampled = window.spans_in_current_second.saturating_add(span_count);
        if spans_if_sampled < self.spans_per_second {
            window.spans_in_current_second = spans_if_sampled;
            return Decision::Sampled;
        }

        otel_debug!(
            name: "TailSampling.RateLimiting.BudgetExhausted",
            spans_per_second = self.spans_per_second,
            spans_in_current_second = window.spans_in_current_second
        );
        Decision::NotSampled
    }
}

impl PolicyEvaluator for RateLimiting {
    fn evaluate(&self, _trace_id: TraceId, trace: &TraceData) -> PolicyResult<Decision> {
        let now_second = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0))
            .as_secs();
        Ok(self.admit(now_second, trace.span_count()))
    }
}
