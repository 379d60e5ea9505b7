use crate::classify::{self, Classifier, ErrorsSameWhen, MatchOutcome, SameWhen, Simplifier};
use crate::clock::{Clock, SystemClock};
use crate::coordinator;
use crate::error::ConfigError;
use crate::gate::{Gate, Mode};
use crate::publish::{self, MeasuringPublisher, Publisher};
use crate::record::ComparisonRecord;
use crate::registry::Named;
use crate::resolve::{AlwaysControl, ResolutionPolicy};
use crate::trial::{Trial, TrialError, TrialType};
use rayon::ThreadPool;
use std::fmt;
use std::sync::Arc;

/// Everything an experiment needs apart from the control and candidate
/// themselves.
///
/// Start from [`ExperimentConfig::simple`] or [`ExperimentConfig::named`] and
/// override fields with struct update syntax:
///
/// ```
/// use counterpart::{ExperimentConfig, publish::Discard};
///
/// let config = ExperimentConfig::<i32> {
///     serially: Box::new(true),
///     publisher: Box::new(Discard),
///     ..ExperimentConfig::simple("serial experiment")
/// };
/// # let _ = config;
/// ```
pub struct ExperimentConfig<O, M = O> {
    /// Identifies the experiment in records, logs and metrics
    pub name: String,

    /// Maps each successful value to the form that gets compared. Required
    /// whenever `M` differs from `O`.
    pub simplifier: Option<Simplifier<O, M>>,

    /// Compares two simplified values; `PartialEq` by default
    pub same_when: SameWhen<M>,

    /// Compares two captured errors; [`classify::messages_match`] by default
    pub errors_same_when: ErrorsSameWhen,

    /// Whether to run the candidate at all; always by default
    pub run_candidate: Box<dyn Gate>,

    /// Whether to run control and candidate one after the other instead of
    /// concurrently; never by default
    pub serially: Box<dyn Gate>,

    /// Picks the returned value; [`AlwaysControl`] by default
    pub resolution: Box<dyn ResolutionPolicy<O>>,

    /// Receives every comparison; [`MeasuringPublisher`] by default
    pub publisher: Box<dyn Publisher<O>>,

    /// Times the trials and stamps the records
    pub clock: Arc<dyn Clock>,

    /// Where parallel trials run; rayon's global pool when `None`.
    /// [`AsyncExperiment`](crate::AsyncExperiment) ignores it.
    pub pool: Option<Arc<ThreadPool>>,
}

impl<O, M> ExperimentConfig<O, M>
where
    O: Clone + 'static,
    M: PartialEq + 'static,
{
    /// A configuration comparing a simplified form of the output. A
    /// simplifier must be supplied before the experiment is built.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            simplifier: None,
            same_when: Box::new(|a: &M, b: &M| a == b),
            errors_same_when: Box::new(classify::messages_match),
            run_candidate: Box::new(true),
            serially: Box::new(false),
            resolution: Box::new(AlwaysControl),
            publisher: Box::new(MeasuringPublisher),
            clock: Arc::new(SystemClock),
            pool: None,
        }
    }
}

impl<O> ExperimentConfig<O, O>
where
    O: Clone + PartialEq + 'static,
{
    /// A configuration comparing outputs directly
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            simplifier: Some(Box::new(|value: &O| value.clone())),
            ..Self::named(name)
        }
    }
}

impl<O, M> ExperimentConfig<O, M> {
    pub(crate) fn validate(self) -> Result<Strategies<O, M>, ConfigError> {
        let ExperimentConfig {
            name,
            simplifier,
            same_when,
            errors_same_when,
            run_candidate,
            serially,
            resolution,
            publisher,
            clock,
            pool,
        } = self;

        if name.trim().is_empty() {
            return Err(ConfigError::BlankName);
        }

        let simplifier = match simplifier {
            Some(simplifier) => simplifier,
            None => return Err(ConfigError::MissingSimplifier(name)),
        };

        Ok(Strategies {
            name,
            classifier: Classifier::new(simplifier, same_when, errors_same_when),
            run_candidate,
            serially,
            resolution,
            publisher,
            clock,
            pool,
        })
    }
}

impl<O, M> fmt::Debug for ExperimentConfig<O, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentConfig")
            .field("name", &self.name)
            .field("has_simplifier", &self.simplifier.is_some())
            .finish_non_exhaustive()
    }
}

/// A validated configuration, shared by the blocking and async engines
pub(crate) struct Strategies<O, M> {
    pub(crate) name: String,
    classifier: Classifier<O, M>,
    run_candidate: Box<dyn Gate>,
    serially: Box<dyn Gate>,
    resolution: Box<dyn ResolutionPolicy<O>>,
    publisher: Box<dyn Publisher<O>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) pool: Option<Arc<ThreadPool>>,
}

impl<O, M> Strategies<O, M> {
    /// Consults the gates for this invocation
    pub(crate) fn mode(&self) -> Mode {
        let mode = Mode::decide(&*self.run_candidate, &*self.serially);

        metrics::counter!(
            "counterpart_experiment_run_variant",
            "name" => self.name.clone(),
            "kind" => mode.as_str()
        )
        .increment(1);

        mode
    }

    /// Classifies and publishes a record. Records without a candidate are
    /// neither classified nor published.
    pub(crate) fn conclude(&self, record: ComparisonRecord<O>) -> Observation<O> {
        let outcome = self.classifier.classify_record(&record);

        if let Some(outcome) = outcome {
            tracing::debug!(%outcome, "experiment classified");
            publish::publish_isolated(&*self.publisher, outcome, &record);
        }

        Observation { record, outcome }
    }

    pub(crate) fn resolve(&self, record: &ComparisonRecord<O>) -> Result<O, TrialError> {
        self.resolution.resolve(record)
    }
}

/// Everything one invocation produced, before resolution
#[derive(Debug, Clone)]
pub struct Observation<O> {
    pub record: ComparisonRecord<O>,

    /// `None` when the candidate was not run
    pub outcome: Option<MatchOutcome>,
}

/// Runs a candidate function alongside a control function, compares their
/// results, and hands back whatever the resolution policy picks (the
/// control's result unless configured otherwise).
///
/// An `Experiment` is immutable once built and can be shared between threads
/// and invoked concurrently.
pub struct Experiment<I, O, M = O> {
    control: Trial<I, O>,
    candidate: Trial<I, O>,
    strategies: Strategies<O, M>,
}

impl<I, O, M> Experiment<I, O, M>
where
    I: Sync,
    O: Send,
{
    /// Validates the configuration and builds the experiment
    pub fn new<C, X>(config: ExperimentConfig<O, M>, control: C, candidate: X) -> Result<Self, ConfigError>
    where
        C: Fn(&I) -> anyhow::Result<O> + Send + Sync + 'static,
        X: Fn(&I) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        let strategies = config.validate()?;

        Ok(Self {
            control: Trial::new(TrialType::Control, Box::new(control)),
            candidate: Trial::new(TrialType::Candidate, Box::new(candidate)),
            strategies,
        })
    }

    pub fn name(&self) -> &str {
        &self.strategies.name
    }

    /// Runs the experiment and returns the resolved result
    pub fn run(&self, input: &I) -> Result<O, TrialError> {
        let observation = self.observe(input);
        self.resolve(&observation.record)
    }

    /// Runs the experiment, classifying and publishing the comparison, but
    /// leaves resolution to the caller
    pub fn observe(&self, input: &I) -> Observation<O> {
        let span = tracing::debug_span!("experiment", name = %self.strategies.name);
        let _entered = span.enter();

        let clock = &*self.strategies.clock;
        let observed_at = clock.now();
        let mode = self.strategies.mode();

        let record = if mode == Mode::ControlOnly {
            let control = self.control.run(input, clock);
            ComparisonRecord::control_only(self.name(), observed_at, control)
        } else {
            let (control, candidate) = (&self.control, &self.candidate);
            let (control, candidate) = coordinator::execute_pair(
                mode == Mode::Serial,
                self.strategies.pool.as_deref(),
                || control.run(input, clock),
                || candidate.run(input, clock),
            );
            ComparisonRecord::new(self.name(), observed_at, control, candidate)
        };

        self.strategies.conclude(record)
    }

    /// Applies the configured resolution policy to a record
    pub fn resolve(&self, record: &ComparisonRecord<O>) -> Result<O, TrialError> {
        self.strategies.resolve(record)
    }
}

impl<I, O, M> Named for Experiment<I, O, M> {
    fn name(&self) -> &str {
        &self.strategies.name
    }
}

impl<I, O, M> fmt::Debug for Experiment<I, O, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.strategies.name)
            .finish_non_exhaustive()
    }
}
