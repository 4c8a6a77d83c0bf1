use thiserror::Error;

/// A specialized `Result` type for policy construction and evaluation.
pub type PolicyResult<T> = Result<T, SamplingError>;

/// Errors returned while building or running sampling policies.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SamplingError {
    /// A span properties policy was configured without any criterion.
    #[error("at least one property must be defined")]
    NoPropertyDefined,

    /// The operation name pattern is not a valid regular expression.
    #[error(transparent)]
    InvalidPattern(#[from] regex::Error),

    /// Policy or processor configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The YAML configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors raised by a policy while evaluating a trace.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl SamplingError {
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        SamplingError::InvalidConfig(msg.into())
    }
}

impl From<String> for SamplingError {
    fn from(err_msg: String) -> Self {
        SamplingError::Other(Box::new(Custom(err_msg)))
    }
}

impl From<&'static str> for SamplingError {
    fn from(err_msg: &'static str) -> Self {
        SamplingError::Other(Box::new(Custom(err_msg.into())))
    }
}

/// Wrap type for string
#[derive(Error, Debug)]
#[error("{0}")]
struct Custom(String);
