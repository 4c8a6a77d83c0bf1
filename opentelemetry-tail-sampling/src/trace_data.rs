use crate::Decision;
use opentelemetry::KeyValue;
use prost_types::Timestamp;
use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

/// A single unit of work within a trace, as seen by sampling policies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Span {
    /// The operation name.
    pub name: Cow<'static, str>,
    /// When the operation started, if reported.
    pub start_time: Option<Timestamp>,
    /// When the operation ended, if reported.
    pub end_time: Option<Timestamp>,
    /// Span attributes.
    pub attributes: Vec<KeyValue>,
}

impl Span {
    /// Creates a span with the given operation name and no timing data.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Span {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the start timestamp.
    pub fn with_start_time(mut self, start_time: impl Into<Timestamp>) -> Self {
        self.start_time = Some(start_time.into());
        self
    }

    /// Sets the end timestamp.
    pub fn with_end_time(mut self, end_time: impl Into<Timestamp>) -> Self {
        self.end_time = Some(end_time.into());
        self
    }

    /// Replaces the span attributes.
    pub fn with_attributes<I>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = KeyValue>,
    {
        self.attributes = attributes.into_iter().collect();
        self
    }
}

/// A group of spans delivered together from one source.
///
/// Slots may be empty; policies skip them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    /// The spans carried by this batch.
    pub spans: Vec<Option<Span>>,
}

impl Batch {
    /// Creates a batch from possibly missing spans.
    pub fn new(spans: Vec<Option<Span>>) -> Self {
        Batch { spans }
    }

    /// Iterates over the spans that are present.
    pub fn present_spans(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().flatten()
    }
}

/// Counts the spans that are present among possibly empty slots.
pub(crate) fn present_span_count(spans: &[Option<Span>]) -> usize {
    spans.iter().flatten().count()
}

impl From<Vec<Span>> for Batch {
    fn from(spans: Vec<Span>) -> Self {
        Batch {
            spans: spans.into_iter().map(Some).collect(),
        }
    }
}

impl FromIterator<Span> for Batch {
    fn from_iter<T: IntoIterator<Item = Span>>(iter: T) -> Self {
        Batch {
            spans: iter.into_iter().map(Some).collect(),
        }
    }
}

/// The accumulated state of one trace while it waits for a decision.
///
/// Batches are only ever appended. All mutable state sits behind a single
/// lock; readers take a [`received_batches`] snapshot and scan it without
/// holding the lock, so evaluation never blocks ingestion for longer than a
/// list copy.
///
/// [`received_batches`]: TraceData::received_batches
#[derive(Debug)]
pub struct TraceData {
    arrival_time: SystemTime,
    inner: Mutex<TraceDataInner>,
}

#[derive(Debug, Default)]
struct TraceDataInner {
    received_batches: Vec<Arc<Batch>>,
    span_count: u64,
    decisions: Vec<Decision>,
    decision_time: Option<SystemTime>,
}

impl Default for TraceData {
    fn default() -> Self {
        TraceData::new()
    }
}

impl TraceData {
    /// Creates an empty aggregate stamped with the current time.
    pub fn new() -> Self {
        TraceData::with_arrival_time(SystemTime::now())
    }

    /// Creates an empty aggregate with an explicit arrival time.
    pub fn with_arrival_time(arrival_time: SystemTime) -> Self {
        TraceData {
            arrival_time,
            inner: Mutex::new(TraceDataInner::default()),
        }
    }

    // The protected state is append-only, so a panic while holding the lock
    // cannot leave it half-written.
    fn lock(&self) -> MutexGuard<'_, TraceDataInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a batch received by the ingestion path.
    pub fn append_batch(&self, batch: Batch) {
        let present = present_span_count(&batch.spans) as u64;
        let mut inner = self.lock();
        inner.span_count += present;
        inner.received_batches.push(Arc::new(batch));
    }

    /// Returns a snapshot of the batches received so far.
    ///
    /// Only the list is copied; batches are shared.
    pub fn received_batches(&self) -> Vec<Arc<Batch>> {
        self.lock().received_batches.clone()
    }

    /// Number of present spans appended so far.
    pub fn span_count(&self) -> u64 {
        self.lock().span_count
    }

    /// When the first span of this trace was ingested.
    pub fn arrival_time(&self) -> SystemTime {
        self.arrival_time
    }

    /// Records the decision of the policy at `policy_index`.
    ///
    /// Slots of policies that have not decided yet stay [`Decision::Pending`].
    pub fn set_decision(&self, policy_index: usize, decision: Decision) {
        let mut inner = self.lock();
        if inner.decisions.len() <= policy_index {
            inner.decisions.resize(policy_index + 1, Decision::Pending);
        }
        inner.decisions[policy_index] = decision;
    }

    /// Returns the decision recorded for each policy.
    pub fn decisions(&self) -> Vec<Decision> {
        self.lock().decisions.clone()
    }

    /// Records when the final decision for this trace was taken.
    pub fn set_decision_time(&self, decision_time: SystemTime) {
        self.lock().decision_time = Some(decision_time);
    }

    /// When the final decision for this trace was taken, if it was.
    pub fn decision_time(&self) -> Option<SystemTime> {
        self.lock().decision_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn append_counts_present_spans_only() {
        let trace = TraceData::new();
        trace.append_batch(Batch::new(vec![Some(Span::new("a")), None, Some(Span::new("b"))]));
        trace.append_batch(Batch::new(vec![None]));

        assert_eq!(trace.span_count(), 2);
        assert_eq!(trace.received_batches().len(), 2);
    }

    #[test]
    fn present_span_count_skips_empty_slots() {
        assert_eq!(present_span_count(&[]), 0);
        assert_eq!(present_span_count(&[None, None]), 0);
        assert_eq!(
            present_span_count(&[None, Some(Span::new("late")), None, Some(Span::new("later"))]),
            2
        );
    }

    #[test]
    fn snapshot_is_not_affected_by_later_appends() {
        let trace = TraceData::new();
        trace.append_batch(Batch::from(vec![Span::new("first")]));

        let snapshot = trace.received_batches();
        trace.append_batch(Batch::from(vec![Span::new("second")]));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(trace.received_batches().len(), 2);
        assert!(Arc::ptr_eq(&snapshot[0], &trace.received_batches()[0]));
    }

    #[test]
    fn batches_keep_arrival_order() {
        let trace = TraceData::new();
        for name in ["a", "b", "c"] {
            trace.append_batch(Batch::from(vec![Span::new(name)]));
        }
        let names: Vec<_> = trace
            .received_batches()
            .iter()
            .flat_map(|batch| batch.present_spans().map(|span| span.name.to_string()))
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn decisions_fill_missing_slots_with_pending() {
        let trace = TraceData::new();
        trace.set_decision(2, Decision::Sampled);
        assert_eq!(
            trace.decisions(),
            vec![Decision::Pending, Decision::Pending, Decision::Sampled]
        );

        trace.set_decision(0, Decision::NotSampled);
        assert_eq!(trace.decisions()[0], Decision::NotSampled);
    }

    #[test]
    fn decision_time_is_recorded() {
        let arrival = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let trace = TraceData::with_arrival_time(arrival);
        assert_eq!(trace.arrival_time(), arrival);
        assert_eq!(trace.decision_time(), None);

        let decided = arrival + Duration::from_secs(30);
        trace.set_decision_time(decided);
        assert_eq!(trace.decision_time(), Some(decided));
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let trace = Arc::new(TraceData::new());
        trace.append_batch(Batch::from(vec![Span::new("before")]));

        let poisoner = Arc::clone(&trace);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        trace.append_batch(Batch::from(vec![Span::new("after")]));
        assert_eq!(trace.span_count(), 2);
    }

    #[test]
    fn span_builder_sets_fields() {
        let span = Span::new("GET /a")
            .with_start_time(Timestamp {
                seconds: 1,
                nanos: 0,
            })
            .with_end_time(Timestamp {
                seconds: 2,
                nanos: 0,
            })
            .with_attributes([KeyValue::new("http.status_code", 200_i64)]);

        assert_eq!(span.name, "GET /a");
        assert_eq!(span.start_time.map(|ts| ts.seconds), Some(1));
        assert_eq!(span.end_time.map(|ts| ts.seconds), Some(2));
        assert_eq!(span.attributes.len(), 1);
    }
}
