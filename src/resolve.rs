//! Policies deciding what an experiment invocation hands back to its caller.
//!
//! A policy sees the whole `ComparisonRecord` and must be a pure function of
//! it. When the candidate was sampled out the record has no candidate
//! outcome, and every built-in policy falls back to the control.

use crate::record::ComparisonRecord;
use crate::trial::TrialError;

pub trait ResolutionPolicy<O>: Send + Sync {
    fn resolve(&self, record: &ComparisonRecord<O>) -> Result<O, TrialError>;
}

impl<O, F> ResolutionPolicy<O> for F
where
    F: Fn(&ComparisonRecord<O>) -> Result<O, TrialError> + Send + Sync,
{
    fn resolve(&self, record: &ComparisonRecord<O>) -> Result<O, TrialError> {
        self(record)
    }
}

/// Return whatever the control returned, including its error. This makes
/// an experiment indistinguishable from calling the control directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysControl;

impl<O: Clone> ResolutionPolicy<O> for AlwaysControl {
    fn resolve(&self, record: &ComparisonRecord<O>) -> Result<O, TrialError> {
        record.control().result().clone()
    }
}

/// Return whatever the candidate returned
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysCandidate;

impl<O: Clone> ResolutionPolicy<O> for AlwaysCandidate {
    fn resolve(&self, record: &ComparisonRecord<O>) -> Result<O, TrialError> {
        record
            .candidate()
            .unwrap_or_else(|| record.control())
            .result()
            .clone()
    }
}

/// Return the control's result unless the control failed, in which case the
/// candidate's result is returned instead
#[derive(Debug, Default, Clone, Copy)]
pub struct CandidateOnControlError;

impl<O: Clone> ResolutionPolicy<O> for CandidateOnControlError {
    fn resolve(&self, record: &ComparisonRecord<O>) -> Result<O, TrialError> {
        match record.candidate() {
            Some(candidate) if !record.control().is_ok() => candidate.result().clone(),
            _ => record.control().result().clone(),
        }
    }
}

/// Return the same value, or fail with the same error, every time
#[derive(Debug, Clone)]
pub struct Fixed<O>(Result<O, TrialError>);

impl<O> Fixed<O> {
    pub fn value(value: O) -> Self {
        Self(Ok(value))
    }

    pub fn error(error: TrialError) -> Self {
        Self(Err(error))
    }
}

impl<O: Clone + Send + Sync> ResolutionPolicy<O> for Fixed<O> {
    fn resolve(&self, _record: &ComparisonRecord<O>) -> Result<O, TrialError> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::{TrialOutcome, TrialType};
    use chrono::Utc;
    use std::time::Duration;

    fn outcome(trial_type: TrialType, result: Result<&'static str, TrialError>) -> TrialOutcome<&'static str> {
        TrialOutcome::new(trial_type, Duration::from_millis(1), result)
    }

    fn record(
        control: Result<&'static str, TrialError>,
        candidate: Result<&'static str, TrialError>,
    ) -> ComparisonRecord<&'static str> {
        ComparisonRecord::new(
            "resolve",
            Utc::now(),
            outcome(TrialType::Control, control),
            outcome(TrialType::Candidate, candidate),
        )
    }

    #[test]
    fn always_control_returns_control_value_or_error() {
        assert_eq!(AlwaysControl.resolve(&record(Ok("A"), Ok("B"))).unwrap(), "A");

        let failed = record(Err(TrialError::msg("control failed")), Ok("B"));
        let error = AlwaysControl.resolve(&failed).unwrap_err();
        assert_eq!(error.to_string(), "control failed");
    }

    #[test]
    fn always_candidate_falls_back_to_control_when_skipped() {
        assert_eq!(AlwaysCandidate.resolve(&record(Ok("A"), Ok("B"))).unwrap(), "B");

        let skipped = ComparisonRecord::control_only("resolve", Utc::now(), outcome(TrialType::Control, Ok("A")));
        assert_eq!(AlwaysCandidate.resolve(&skipped).unwrap(), "A");
    }

    #[test]
    fn candidate_only_replaces_a_failed_control() {
        assert_eq!(CandidateOnControlError.resolve(&record(Ok("A"), Ok("B"))).unwrap(), "A");

        let failed = record(Err(TrialError::msg("control failed")), Ok("B"));
        assert_eq!(CandidateOnControlError.resolve(&failed).unwrap(), "B");

        let skipped = ComparisonRecord::control_only(
            "resolve",
            Utc::now(),
            outcome(TrialType::Control, Err(TrialError::msg("control failed"))),
        );
        assert!(CandidateOnControlError.resolve(&skipped).is_err());
    }

    #[test]
    fn fixed_ignores_the_record() {
        let record = record(Ok("A"), Ok("B"));

        assert_eq!(Fixed::value("default").resolve(&record).unwrap(), "default");
        let error = Fixed::error(TrialError::msg("forced")).resolve(&record).unwrap_err();
        assert_eq!(error.to_string(), "forced");
    }

    #[test]
    fn closures_are_policies() {
        let policy = |record: &ComparisonRecord<&'static str>| -> Result<&'static str, TrialError> {
            Ok(if record.is_comparison() { "compared" } else { "skipped" })
        };

        assert_eq!(policy.resolve(&record(Ok("A"), Ok("B"))).unwrap(), "compared");
    }

    #[test]
    fn resolution_is_repeatable() {
        let record = record(Err(TrialError::msg("control failed")), Ok("B"));

        let first = AlwaysControl.resolve(&record).unwrap_err().to_string();
        let second = AlwaysControl.resolve(&record).unwrap_err().to_string();
        assert_eq!(first, second);
        assert_eq!(
            AlwaysCandidate.resolve(&record).unwrap(),
            AlwaysCandidate.resolve(&record).unwrap()
        );
    }
}
