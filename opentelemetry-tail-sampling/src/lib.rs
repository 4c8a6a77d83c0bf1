//! # OpenTelemetry Tail Sampling
//!
//! Decision core for tail-based trace sampling. Unlike the SDK's
//! [`ShouldSample`] samplers, which decide before a span exists, the policies
//! in this crate decide once some or all spans of a trace have been collected
//! by a pipeline, so they can look at properties only known after the fact:
//! how many spans the trace has, how long it ran end to end, whether a span
//! with a given operation name or attribute value showed up.
//!
//! The crate is organized around three pieces:
//!
//! * [`TraceData`] accumulates the [`Batch`]es received for one trace id. It
//!   is written by the ingestion path and read by evaluators concurrently.
//! * [`PolicyEvaluator`] is the contract every policy implements: a primary
//!   [`evaluate`] call plus hooks for late-arriving spans, a second chance to
//!   reverse a [`Decision::NotSampled`] verdict and forced eviction under
//!   memory pressure.
//! * [`Config`] describes a set of named policies in YAML and builds them.
//!
//! The component that buffers traces, schedules evaluation and combines the
//! decisions of several policies is not part of this crate.
//!
//! # Example
//!
//! ```
//! use opentelemetry::trace::TraceId;
//! use opentelemetry_tail_sampling::{
//!     Batch, Decision, PolicyEvaluator, Span, SpanPropertiesFilter, TraceData,
//! };
//! use prost_types::Timestamp;
//!
//! let policy = SpanPropertiesFilter::new(Some("^GET "), Some(250), None).unwrap();
//!
//! let trace = TraceData::new();
//! trace.append_batch(Batch::from(vec![Span::new("GET /users")
//!     .with_start_time(Timestamp { seconds: 1, nanos: 0 })
//!     .with_end_time(Timestamp { seconds: 1, nanos: 300_000 })]));
//!
//! let trace_id = TraceId::from_bytes(7u128.to_be_bytes());
//! assert_eq!(policy.evaluate(trace_id, &trace).unwrap(), Decision::Sampled);
//! ```
//!
//! [`ShouldSample`]: https://docs.rs/opentelemetry_sdk/latest/opentelemetry_sdk/trace/trait.ShouldSample.html
//! [`evaluate`]: PolicyEvaluator::evaluate
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

pub mod config;
mod decision;
mod error;
pub mod policy;
pub mod timestamp;
mod trace_data;

pub use config::Config;
pub use decision::Decision;
pub use error::{PolicyResult, SamplingError};
pub use policy::{
    AlwaysSample, NumericAttributeFilter, Policy, PolicyEvaluator, RateLimiting,
    SpanPropertiesFilter, StringAttributeFilter,
};
pub use trace_data::{Batch, Span, TraceData};
