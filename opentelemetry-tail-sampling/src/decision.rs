/// The outcome of evaluating a sampling policy against a trace.
///
/// Policies only ever return [`Decision::Sampled`] or
/// [`Decision::NotSampled`]. [`Decision::Pending`] and [`Decision::Dropped`]
/// are bookkeeping states for the component that owns the trace lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Decision {
    /// No decision has been taken yet.
    #[default]
    Pending,
    /// The trace should be kept and forwarded.
    Sampled,
    /// The trace should be discarded.
    NotSampled,
    /// The trace was evicted before a decision could be taken.
    Dropped,
}

impl Decision {
    /// Returns `true` if the trace should be kept.
    pub fn is_sampled(&self) -> bool {
        matches!(self, Decision::Sampled)
    }

    /// Returns `true` once a policy has settled on a verdict.
    pub fn is_final(&self) -> bool {
        matches!(self, Decision::Sampled | Decision::NotSampled)
    }

    pub(crate) fn from_bool(sampled: bool) -> Self {
        if sampled {
            Decision::Sampled
        } else {
            Decision::NotSampled
        }
    }
}
