use std::fmt;

/// Errors this crate can actually raise as `Result::Err`.
///
/// Most of the "error kinds" named in the spec (InvalidAmount,
/// OversizedPartition, SubsetSumBudgetExceeded, ValidationFailure) are
/// *not* represented here — they are recorded, non-fatal outcomes
/// (a dropped row, a trimmed partition, a `None` search result, a
/// discarded edge set) threaded through return values and `tracing`
/// events. Only genuine misuse of this crate's interface is an `Err`.
#[derive(Debug)]
pub enum ReconError {
    /// A `Limits` override read from the environment failed to parse
    /// or fell outside its accepted range.
    ConfigValidation { var: String, value: String, reason: String },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigValidation { var, value, reason } => {
                write!(f, "invalid {var}={value:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for ReconError {}
