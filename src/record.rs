use crate::trial::{TrialOutcome, TrialType};
use chrono::{DateTime, Utc};

/// The trial outcomes of a single experiment invocation.
///
/// A record holds exactly one control outcome. It holds a candidate outcome
/// unless the invocation was sampled out, in which case nothing was compared
/// and the record exists only so the control result can be resolved.
#[derive(Debug, Clone)]
pub struct ComparisonRecord<O> {
    name: String,
    observed_at: DateTime<Utc>,
    control: TrialOutcome<O>,
    candidate: Option<TrialOutcome<O>>,
}

impl<O> ComparisonRecord<O> {
    /// A two-sided record.
    ///
    /// # Panics
    ///
    /// If either outcome is labeled with the wrong trial type.
    pub fn new(
        name: impl Into<String>,
        observed_at: DateTime<Utc>,
        control: TrialOutcome<O>,
        candidate: TrialOutcome<O>,
    ) -> Self {
        assert_eq!(control.trial_type(), TrialType::Control);
        assert_eq!(candidate.trial_type(), TrialType::Candidate);

        Self {
            name: name.into(),
            observed_at,
            control,
            candidate: Some(candidate),
        }
    }

    /// A record for an invocation where the candidate did not run
    pub fn control_only(
        name: impl Into<String>,
        observed_at: DateTime<Utc>,
        control: TrialOutcome<O>,
    ) -> Self {
        assert_eq!(control.trial_type(), TrialType::Control);

        Self {
            name: name.into(),
            observed_at,
            control,
            candidate: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the invocation started, before either trial ran
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn control(&self) -> &TrialOutcome<O> {
        &self.control
    }

    pub fn candidate(&self) -> Option<&TrialOutcome<O>> {
        self.candidate.as_ref()
    }

    pub fn get(&self, trial_type: TrialType) -> Option<&TrialOutcome<O>> {
        match trial_type {
            TrialType::Control => Some(&self.control),
            TrialType::Candidate => self.candidate.as_ref(),
        }
    }

    /// Whether both sides ran
    pub fn is_comparison(&self) -> bool {
        self.candidate.is_some()
    }

    /// The outcomes present in this record, candidate first
    pub fn outcomes(&self) -> impl Iterator<Item = &TrialOutcome<O>> {
        self.candidate.iter().chain(std::iter::once(&self.control))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outcome(trial_type: TrialType, value: &'static str) -> TrialOutcome<&'static str> {
        TrialOutcome::new(trial_type, Duration::from_millis(1), Ok(value))
    }

    #[test]
    fn lookup_by_trial_type() {
        let record = ComparisonRecord::new(
            "example",
            Utc::now(),
            outcome(TrialType::Control, "a"),
            outcome(TrialType::Candidate, "b"),
        );

        assert!(record.is_comparison());
        assert_eq!(record.get(TrialType::Control).and_then(|o| o.value()), Some(&"a"));
        assert_eq!(record.get(TrialType::Candidate).and_then(|o| o.value()), Some(&"b"));
        assert_eq!(
            record.outcomes().map(|o| o.trial_type()).collect::<Vec<_>>(),
            vec![TrialType::Candidate, TrialType::Control]
        );
    }

    #[test]
    fn control_only_has_no_candidate() {
        let record = ComparisonRecord::control_only("example", Utc::now(), outcome(TrialType::Control, "a"));

        assert!(!record.is_comparison());
        assert!(record.get(TrialType::Candidate).is_none());
        assert_eq!(record.outcomes().count(), 1);
    }

    #[test]
    #[should_panic]
    fn swapped_outcomes_are_rejected() {
        ComparisonRecord::new(
            "example",
            Utc::now(),
            outcome(TrialType::Candidate, "b"),
            outcome(TrialType::Control, "a"),
        );
    }
}
