use crate::record::ComparisonRecord;
use crate::trial::{TrialError, TrialOutcome};
use std::fmt;

/// How the candidate's outcome compared to the control's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOutcome {
    /// Both succeeded and the simplified values match
    Match,

    /// Both succeeded but the simplified values differ
    Mismatch,

    /// The control failed and the candidate succeeded
    ControlError,

    /// The control succeeded and the candidate failed
    CandidateError,

    /// Both failed with equivalent errors
    ErrorMatch,

    /// Both failed with different errors
    ErrorMismatch,
}

impl MatchOutcome {
    pub const ALL: [MatchOutcome; 6] = [
        MatchOutcome::Match,
        MatchOutcome::Mismatch,
        MatchOutcome::ControlError,
        MatchOutcome::CandidateError,
        MatchOutcome::ErrorMatch,
        MatchOutcome::ErrorMismatch,
    ];

    /// Stable label, suitable for metrics
    pub fn as_str(self) -> &'static str {
        match self {
            MatchOutcome::Match => "match",
            MatchOutcome::Mismatch => "mismatch",
            MatchOutcome::ControlError => "control_error",
            MatchOutcome::CandidateError => "candidate_error",
            MatchOutcome::ErrorMatch => "error_match",
            MatchOutcome::ErrorMismatch => "error_mismatch",
        }
    }

    /// A sentence describing the outcome for humans
    pub fn description(self) -> &'static str {
        match self {
            MatchOutcome::Match => "candidate and control both executed successfully and match",
            MatchOutcome::Mismatch => {
                "candidate and control both executed successfully, but the responses don't match"
            }
            MatchOutcome::ControlError => {
                "the candidate executed successfully but the control threw an exception"
            }
            MatchOutcome::CandidateError => {
                "the control executed successfully but the candidate threw an exception"
            }
            MatchOutcome::ErrorMatch => {
                "candidate and control both threw exceptions, and the exceptions match"
            }
            MatchOutcome::ErrorMismatch => {
                "candidate and control both threw exceptions, but the exceptions don't match"
            }
        }
    }

    /// Whether the candidate behaved like the control
    pub fn is_match(self) -> bool {
        matches!(self, MatchOutcome::Match | MatchOutcome::ErrorMatch)
    }
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduces a trial's value to the form that gets compared
pub type Simplifier<O, M> = Box<dyn Fn(&O) -> M + Send + Sync>;

/// Decides whether two simplified values are equivalent
pub type SameWhen<M> = Box<dyn Fn(&M, &M) -> bool + Send + Sync>;

/// Decides whether two captured errors are equivalent
pub type ErrorsSameWhen = Box<dyn Fn(&TrialError, &TrialError) -> bool + Send + Sync>;

/// Errors match when both or neither are panics and they render the same
/// message. This is the default error comparison.
pub fn messages_match(a: &TrialError, b: &TrialError) -> bool {
    a.is_panic() == b.is_panic() && a.to_string() == b.to_string()
}

/// An error comparison that treats any two errors of type `E` as equivalent,
/// whatever their contents
pub fn same_error_type<E>() -> ErrorsSameWhen
where
    E: fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    Box::new(|a: &TrialError, b: &TrialError| a.is::<E>() && b.is::<E>())
}

/// Labels a control/candidate pair with a `MatchOutcome`.
///
/// The simplifier and predicates are caller code; if they panic, the panic
/// propagates out of `classify`.
pub struct Classifier<O, M> {
    simplifier: Simplifier<O, M>,
    same_when: SameWhen<M>,
    errors_same_when: ErrorsSameWhen,
}

impl<O, M> Classifier<O, M> {
    pub fn new(
        simplifier: Simplifier<O, M>,
        same_when: SameWhen<M>,
        errors_same_when: ErrorsSameWhen,
    ) -> Self {
        Self {
            simplifier,
            same_when,
            errors_same_when,
        }
    }

    pub fn classify(&self, control: &TrialOutcome<O>, candidate: &TrialOutcome<O>) -> MatchOutcome {
        let control_simplified = control.value().map(&self.simplifier);
        let candidate_simplified = candidate.value().map(&self.simplifier);

        match (control_simplified, candidate_simplified) {
            (Some(control), Some(candidate)) => {
                if (self.same_when)(&control, &candidate) {
                    MatchOutcome::Match
                } else {
                    MatchOutcome::Mismatch
                }
            }
            (None, Some(_)) => MatchOutcome::ControlError,
            (Some(_), None) => MatchOutcome::CandidateError,
            (None, None) => match (control.error(), candidate.error()) {
                (Some(control), Some(candidate)) if (self.errors_same_when)(control, candidate) => {
                    MatchOutcome::ErrorMatch
                }
                _ => MatchOutcome::ErrorMismatch,
            },
        }
    }

    /// Classifies a record, or returns `None` when its candidate did not run
    pub fn classify_record(&self, record: &ComparisonRecord<O>) -> Option<MatchOutcome> {
        record
            .candidate()
            .map(|candidate| self.classify(record.control(), candidate))
    }
}
