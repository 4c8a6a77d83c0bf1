//! Tail sampling configuration
//!
//! Describes the decision wait, buffer sizing and the list of named policies
//! a pipeline evaluates. Configuration is usually loaded from YAML:
//!
//! ```yaml
//! decision_wait_ms: 10000
//! num_traces: 100000
//! policies:
//!   - name: slow-checkouts
//!     type: span_properties
//!     span_properties:
//!       operation_name_pattern: "^POST /checkout"
//!       min_duration_micros: 500000
//!   - name: errors
//!     type: numeric_attribute
//!     numeric_attribute:
//!       key: http.status_code
//!       min_value: 500
//!       max_value: 599
//! ```
use crate::policy::{
    AlwaysSample, NumericAttributeFilter, Policy, PolicyEvaluator, RateLimiting,
    SpanPropertiesFilter, StringAttributeFilter,
};
use crate::{PolicyResult, SamplingError};
use opentelemetry::otel_warn;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Overrides [`Config::decision_wait_ms`] in [`Config::default`].
pub const OTEL_TAIL_SAMPLING_DECISION_WAIT: &str = "OTEL_TAIL_SAMPLING_DECISION_WAIT";
/// Overrides [`Config::num_traces`] in [`Config::default`].
pub const OTEL_TAIL_SAMPLING_NUM_TRACES: &str = "OTEL_TAIL_SAMPLING_NUM_TRACES";

/// Default time to wait after the first span of a trace before deciding.
pub const OTEL_TAIL_SAMPLING_DECISION_WAIT_DEFAULT: u64 = 30_000;
/// Default number of traces kept in memory.
pub const OTEL_TAIL_SAMPLING_NUM_TRACES_DEFAULT: u64 = 50_000;

/// Tail sampling configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Milliseconds to wait after the first span of a trace before
    /// evaluating it.
    #[serde(default = "default_decision_wait_ms")]
    pub decision_wait_ms: u64,

    /// Number of traces kept in memory while waiting for a decision.
    #[serde(default = "default_num_traces")]
    pub num_traces: u64,

    /// Expected number of new traces per second, used to size internal
    /// buffers. `0` means unknown.
    #[serde(default)]
    pub expected_new_traces_per_sec: u64,

    /// Policies evaluated for every trace, in order.
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

fn default_decision_wait_ms() -> u64 {
    OTEL_TAIL_SAMPLING_DECISION_WAIT_DEFAULT
}

fn default_num_traces() -> u64 {
    OTEL_TAIL_SAMPLING_NUM_TRACES_DEFAULT
}

impl Default for Config {
    /// Create the default configuration, applying environment overrides.
    fn default() -> Self {
        let mut config = Config {
            decision_wait_ms: OTEL_TAIL_SAMPLING_DECISION_WAIT_DEFAULT,
            num_traces: OTEL_TAIL_SAMPLING_NUM_TRACES_DEFAULT,
            expected_new_traces_per_sec: 0,
            policies: Vec::new(),
        };

        if let Some(decision_wait) = env_u64(OTEL_TAIL_SAMPLING_DECISION_WAIT) {
            config.decision_wait_ms = decision_wait;
        }

        if let Some(num_traces) = env_u64(OTEL_TAIL_SAMPLING_NUM_TRACES) {
            config.num_traces = num_traces;
        }

        config
    }
}

fn env_u64(name: &'static str) -> Option<u64> {
    let value = env::var(name).ok()?;
    match u64::from_str(value.trim()) {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            otel_warn!(
                name: "TailSampling.Config.InvalidEnvValue",
                env_var = name,
                value = value.clone(),
                message = "Expected a non-negative integer. Falling back to the default value."
            );
            None
        }
    }
}

impl Config {
    /// Parses a configuration from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> PolicyResult<Self> {
        let config: Config = serde_yaml::from_str(yaml_str)?;
        Ok(config)
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> PolicyResult<Self> {
        let yaml_str = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml_str)
    }

    /// Adds a policy to the configuration.
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policies.push(policy);
        self
    }

    /// Time to wait after the first span of a trace before evaluating it.
    pub fn decision_wait(&self) -> Duration {
        Duration::from_millis(self.decision_wait_ms)
    }

    /// Checks the configuration without building any policy.
    pub fn validate(&self) -> PolicyResult<()> {
        if self.decision_wait_ms == 0 {
            return Err(SamplingError::invalid_config(
                "decision_wait_ms must be greater than zero",
            ));
        }
        if self.num_traces == 0 {
            return Err(SamplingError::invalid_config(
                "num_traces must be greater than zero",
            ));
        }

        let mut names = HashSet::with_capacity(self.policies.len());
        for policy in &self.policies {
            if policy.name.is_empty() {
                return Err(SamplingError::invalid_config("policy name must not be empty"));
            }
            if !names.insert(policy.name.as_str()) {
                return Err(SamplingError::invalid_config(format!(
                    "duplicate policy name {:?}",
                    policy.name
                )));
            }
        }

        Ok(())
    }

    /// Validates the configuration and builds every policy, in order.
    pub fn build_policies(&self) -> PolicyResult<Vec<Policy>> {
        self.validate()?;
        self.policies
            .iter()
            .map(|cfg| {
                Ok(Policy {
                    name: cfg.name.clone(),
                    evaluator: build_policy(cfg)?,
                })
            })
            .collect()
    }
}

/// The kind of a configured policy.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PolicyType {
    /// Samples every trace.
    AlwaysSample,
    /// Samples traces with an integer attribute in a range.
    NumericAttribute,
    /// Samples traces with a string attribute in a set of values.
    StringAttribute,
    /// Samples traces up to a span-per-second budget.
    RateLimiting,
    /// Samples traces by operation name, duration and span count.
    SpanProperties,
}

/// Configuration of a single named policy.
///
/// Only the section matching [`PolicyConfig::policy_type`] is read.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Name of the policy, unique within a configuration.
    pub name: String,
    /// Kind of the policy.
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    /// Parameters of a [`PolicyType::NumericAttribute`] policy.
    #[serde(default)]
    pub numeric_attribute: Option<NumericAttributeConfig>,
    /// Parameters of a [`PolicyType::StringAttribute`] policy.
    #[serde(default)]
    pub string_attribute: Option<StringAttributeConfig>,
    /// Parameters of a [`PolicyType::RateLimiting`] policy.
    #[serde(default)]
    pub rate_limiting: Option<RateLimitingConfig>,
    /// Parameters of a [`PolicyType::SpanProperties`] policy.
    #[serde(default)]
    pub span_properties: Option<SpanPropertiesConfig>,
}

impl PolicyConfig {
    /// Creates a policy configuration of the given type with no parameters.
    pub fn new(name: impl Into<String>, policy_type: PolicyType) -> Self {
        PolicyConfig {
            name: name.into(),
            policy_type,
            numeric_attribute: None,
            string_attribute: None,
            rate_limiting: None,
            span_properties: None,
        }
    }

    /// Creates a span properties policy configuration.
    pub fn span_properties(name: impl Into<String>, cfg: SpanPropertiesConfig) -> Self {
        PolicyConfig {
            span_properties: Some(cfg),
            ..PolicyConfig::new(name, PolicyType::SpanProperties)
        }
    }
}

/// Parameters of a numeric attribute policy.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NumericAttributeConfig {
    /// Attribute key to look up.
    pub key: String,
    /// Inclusive lower bound.
    pub min_value: i64,
    /// Inclusive upper bound.
    pub max_value: i64,
}

/// Parameters of a string attribute policy.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StringAttributeConfig {
    /// Attribute key to look up.
    pub key: String,
    /// Accepted values.
    pub values: Vec<String>,
}

/// Parameters of a rate limiting policy.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitingConfig {
    /// Upper bound, exclusive, of sampled spans per second.
    pub spans_per_second: u64,
}

/// Parameters of a span properties policy. At least one must be set.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SpanPropertiesConfig {
    /// Regular expression matched against span names.
    #[serde(default)]
    pub operation_name_pattern: Option<String>,
    /// Minimum trace duration in microseconds.
    #[serde(default)]
    pub min_duration_micros: Option<i64>,
    /// Minimum number of spans in the trace.
    #[serde(default)]
    pub min_number_of_spans: Option<usize>,
}

fn section<'a, T>(cfg: &PolicyConfig, params: &'a Option<T>, key: &str) -> PolicyResult<&'a T> {
    params.as_ref().ok_or_else(|| {
        SamplingError::invalid_config(format!(
            "policy {:?} of type {} is missing its `{}` section",
            cfg.name, key, key
        ))
    })
}

/// Builds the evaluator described by a policy configuration.
pub fn build_policy(cfg: &PolicyConfig) -> PolicyResult<Box<dyn PolicyEvaluator>> {
    let evaluator: Box<dyn PolicyEvaluator> = match cfg.policy_type {
        PolicyType::AlwaysSample => Box::new(AlwaysSample::new()),
        PolicyType::NumericAttribute => {
            let numeric = section(cfg, &cfg.numeric_attribute, "numeric_attribute")?;
            Box::new(NumericAttributeFilter::new(
                numeric.key.clone(),
                numeric.min_value,
                numeric.max_value,
            )?)
        }
        PolicyType::StringAttribute => {
            let string = section(cfg, &cfg.string_attribute, "string_attribute")?;
            Box::new(StringAttributeFilter::new(
                string.key.clone(),
                string.values.iter().cloned(),
            )?)
        }
        PolicyType::RateLimiting => {
            let rate = section(cfg, &cfg.rate_limiting, "rate_limiting")?;
            Box::new(RateLimiting::new(rate.spans_per_second)?)
        }
        PolicyType::SpanProperties => {
            let props = section(cfg, &cfg.span_properties, "span_properties")?;
            Box::new(SpanPropertiesFilter::new(
                props.operation_name_pattern.as_deref(),
                props.min_duration_micros,
                props.min_number_of_spans,
            )?)
        }
    };
    Ok(evaluator)
}
