use crate::classify::MatchOutcome;
use crate::record::ComparisonRecord;
use crate::trial::TrialOutcome;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

/// Receives the outcome of every invocation in which the candidate ran
pub trait Publisher<O>: Send + Sync {
    fn publish(&self, outcome: MatchOutcome, record: &ComparisonRecord<O>);
}

impl<O, F> Publisher<O> for F
where
    F: Fn(MatchOutcome, &ComparisonRecord<O>) + Send + Sync,
{
    fn publish(&self, outcome: MatchOutcome, record: &ComparisonRecord<O>) {
        self(outcome, record)
    }
}

/// Publishes without letting a panicking publisher reach the caller
pub(crate) fn publish_isolated<O>(
    publisher: &dyn Publisher<O>,
    outcome: MatchOutcome,
    record: &ComparisonRecord<O>,
) {
    let published = panic::catch_unwind(AssertUnwindSafe(|| publisher.publish(outcome, record)));

    if published.is_err() {
        tracing::warn!(
            experiment = record.name(),
            %outcome,
            "publisher panicked; outcome dropped"
        );
    }
}

/// Records outcome counters and trial duration histograms through `metrics`,
/// and logs every outcome through `tracing`. This is the default publisher.
#[derive(Debug, Default, Clone, Copy)]
pub struct MeasuringPublisher;

impl MeasuringPublisher {
    fn record_duration<O>(name: &str, trial: &TrialOutcome<O>) {
        metrics::histogram!(
            "counterpart_trial_duration_seconds",
            "name" => name.to_owned(),
            "trial" => trial.trial_type().as_str()
        )
        .record(trial.duration().as_secs_f64());
    }
}

impl<O> Publisher<O> for MeasuringPublisher {
    fn publish(&self, outcome: MatchOutcome, record: &ComparisonRecord<O>) {
        metrics::counter!(
            "counterpart_experiment_outcome",
            "name" => record.name().to_owned(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        for trial in record.outcomes() {
            Self::record_duration(record.name(), trial);
        }

        let control_duration = record.control().duration();
        let candidate_duration = record.candidate().map(|c| c.duration());

        if outcome.is_match() {
            tracing::debug!(
                experiment = record.name(),
                %outcome,
                ?control_duration,
                ?candidate_duration,
                "{}",
                outcome.description()
            );
        } else {
            tracing::warn!(
                experiment = record.name(),
                %outcome,
                ?control_duration,
                ?candidate_duration,
                "{}",
                outcome.description()
            );
        }
    }
}

/// Writes a human-readable report of every outcome, one line per trial
/// followed by a line naming the outcome:
///
/// ```text
/// candidate took 1 millis to execute
/// control took 1 millis to execute
/// example: candidate and control both executed successfully and match
/// ```
#[derive(Debug)]
pub struct WriterPublisher<W> {
    out: Mutex<W>,
}

impl<W: Write> WriterPublisher<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_report<O>(out: &mut W, outcome: MatchOutcome, record: &ComparisonRecord<O>) -> std::io::Result<()> {
        for trial in record.outcomes() {
            writeln!(
                out,
                "{} took {} millis to execute",
                trial.trial_type(),
                trial.duration().as_millis()
            )?;
        }
        writeln!(out, "{}: {}", record.name(), outcome.description())?;
        out.flush()
    }
}

impl WriterPublisher<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<O, W: Write + Send> Publisher<O> for WriterPublisher<W> {
    fn publish(&self, outcome: MatchOutcome, record: &ComparisonRecord<O>) {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Err(error) = Self::write_report(&mut *out, outcome, record) {
            tracing::warn!(experiment = record.name(), %error, "failed to write experiment report");
        }
    }
}

/// Drops every outcome
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl<O> Publisher<O> for Discard {
    fn publish(&self, _outcome: MatchOutcome, _record: &ComparisonRecord<O>) {}
}
