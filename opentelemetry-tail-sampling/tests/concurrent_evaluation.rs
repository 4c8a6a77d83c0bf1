use opentelemetry::trace::TraceId;
use opentelemetry_tail_sampling::{
    Batch, Decision, PolicyEvaluator, Span, SpanPropertiesFilter, TraceData,
};
use prost_types::Timestamp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const BATCHES: usize = 2_000;

fn timed_span(index: usize) -> Span {
    let micros = index as i64;
    Span::new(format!("op-{}", index))
        .with_start_time(Timestamp {
            seconds: 0,
            nanos: (micros * 1_000) as i32,
        })
        .with_end_time(Timestamp {
            seconds: 0,
            nanos: ((micros + 1) * 1_000) as i32,
        })
}

#[test]
fn evaluation_while_ingesting_sees_consistent_snapshots() {
    let trace = Arc::new(TraceData::new());
    let done = Arc::new(AtomicBool::new(false));
    let trace_id = TraceId::from_bytes(0xfeedu128.to_be_bytes());

    let writer = {
        let trace = Arc::clone(&trace);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for index in 0..BATCHES {
                trace.append_batch(Batch::new(vec![Some(timed_span(index)), None]));
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let trace = Arc::clone(&trace);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let all_spans = SpanPropertiesFilter::new(None, None, Some(BATCHES)).unwrap();
                let mut evaluations = 0;
                loop {
                    let finished = done.load(Ordering::SeqCst);
                    let decision = all_spans.evaluate(trace_id, &trace).unwrap();
                    if decision == Decision::Sampled {
                        // Only possible once every batch is visible.
                        assert_eq!(trace.received_batches().len(), BATCHES);
                    }

                    // A snapshot never contains a partially appended batch.
                    for batch in trace.received_batches() {
                        assert_eq!(batch.spans.len(), 2);
                    }

                    evaluations += 1;
                    if finished {
                        assert_eq!(decision, Decision::Sampled);
                        return evaluations;
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }

    assert_eq!(trace.span_count(), BATCHES as u64);
}

#[test]
fn policies_evaluate_the_same_trace_in_parallel() {
    let trace = Arc::new(TraceData::new());
    for index in 0..100 {
        trace.append_batch(Batch::from(vec![timed_span(index)]));
    }
    let trace_id = TraceId::from_bytes(0xbeefu128.to_be_bytes());

    let policies: Vec<Arc<dyn PolicyEvaluator>> = vec![
        Arc::new(SpanPropertiesFilter::new(Some("^op-99$"), None, None).unwrap()),
        Arc::new(SpanPropertiesFilter::new(None, Some(100), None).unwrap()),
        Arc::new(SpanPropertiesFilter::new(None, Some(101), None).unwrap()),
        Arc::new(SpanPropertiesFilter::new(None, None, Some(101)).unwrap()),
    ];

    let handles: Vec<_> = policies
        .into_iter()
        .map(|policy| {
            let trace = Arc::clone(&trace);
            thread::spawn(move || policy.evaluate(trace_id, &trace).unwrap())
        })
        .collect();

    let decisions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        decisions,
        vec![
            Decision::Sampled,
            Decision::Sampled,
            Decision::NotSampled,
            Decision::NotSampled
        ]
    );
}
