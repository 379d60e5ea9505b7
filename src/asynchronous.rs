//! An experiment over async control and candidate functions.
//!
//! Behaves like [`Experiment`](crate::Experiment), except that parallel mode
//! polls both trials concurrently on the current task with `tokio::join!`
//! rather than handing them to a thread pool. [`ExperimentConfig::pool`] is
//! not used.

use crate::clock::{self, Clock};
use crate::error::ConfigError;
use crate::experiment::{ExperimentConfig, Observation, Strategies};
use crate::gate::Mode;
use crate::record::ComparisonRecord;
use crate::registry::Named;
use crate::trial::{self, TrialError, TrialOutcome, TrialType};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing_futures::Instrument;

type TrialFuture<O> = Pin<Box<dyn Future<Output = anyhow::Result<O>> + Send>>;
type AsyncTrialFn<I, O> = Box<dyn Fn(I) -> TrialFuture<O> + Send + Sync>;

/// Resolves to the trial's result, or to the panic payload if polling the
/// trial panicked
struct CatchPanic<O>(TrialFuture<O>);

impl<O> Future for CatchPanic<O> {
    type Output = std::thread::Result<anyhow::Result<O>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.0.as_mut().poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(result)) => Poll::Ready(Ok(result)),
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

struct AsyncTrial<I, O> {
    trial_type: TrialType,
    func: AsyncTrialFn<I, O>,
}

impl<I, O> AsyncTrial<I, O> {
    async fn run(&self, input: I, clock: &dyn Clock) -> TrialOutcome<O> {
        let start = clock.now();
        let ran = match panic::catch_unwind(AssertUnwindSafe(|| (self.func)(input))) {
            Ok(future) => CatchPanic(future).await,
            Err(payload) => Err(payload),
        };
        let result = trial::capture(ran);
        let duration = clock::elapsed(start, clock.now());

        trial::finish(self.trial_type, duration, result)
    }
}

/// An experiment whose control and candidate are async functions
pub struct AsyncExperiment<I, O, M = O> {
    control: AsyncTrial<I, O>,
    candidate: AsyncTrial<I, O>,
    strategies: Strategies<O, M>,
}

impl<I, O, M> AsyncExperiment<I, O, M>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    M: 'static,
{
    /// Validates the configuration and builds the experiment. Each function
    /// receives its own clone of the input.
    pub fn new<C, CF, X, XF>(
        config: ExperimentConfig<O, M>,
        control: C,
        candidate: X,
    ) -> Result<Self, ConfigError>
    where
        C: Fn(I) -> CF + Send + Sync + 'static,
        CF: Future<Output = anyhow::Result<O>> + Send + 'static,
        X: Fn(I) -> XF + Send + Sync + 'static,
        XF: Future<Output = anyhow::Result<O>> + Send + 'static,
    {
        let strategies = config.validate()?;

        Ok(Self {
            control: AsyncTrial {
                trial_type: TrialType::Control,
                func: Box::new(move |input: I| -> TrialFuture<O> { Box::pin(control(input)) }),
            },
            candidate: AsyncTrial {
                trial_type: TrialType::Candidate,
                func: Box::new(move |input: I| -> TrialFuture<O> { Box::pin(candidate(input)) }),
            },
            strategies,
        })
    }

    pub fn name(&self) -> &str {
        &self.strategies.name
    }

    /// Runs the experiment and returns the resolved result
    pub async fn run(&self, input: I) -> Result<O, TrialError> {
        let observation = self.observe(input).await;
        self.resolve(&observation.record)
    }

    /// Runs the experiment, classifying and publishing the comparison, but
    /// leaves resolution to the caller
    pub async fn observe(&self, input: I) -> Observation<O> {
        let span = tracing::debug_span!("experiment", name = %self.strategies.name);
        self.observe_in_span(input).instrument(span).await
    }

    async fn observe_in_span(&self, input: I) -> Observation<O> {
        let clock = &*self.strategies.clock;
        let observed_at = clock.now();

        let record = match self.strategies.mode() {
            Mode::ControlOnly => {
                let control = self.control.run(input, clock).await;
                ComparisonRecord::control_only(self.name(), observed_at, control)
            }
            Mode::Serial => {
                let control = self.control.run(input.clone(), clock).await;
                let candidate = self.candidate.run(input, clock).await;
                ComparisonRecord::new(self.name(), observed_at, control, candidate)
            }
            Mode::Parallel => {
                let (control, candidate) = tokio::join!(
                    self.control.run(input.clone(), clock),
                    self.candidate.run(input, clock)
                );
                ComparisonRecord::new(self.name(), observed_at, control, candidate)
            }
        };

        self.strategies.conclude(record)
    }

    /// Applies the configured resolution policy to a record
    pub fn resolve(&self, record: &ComparisonRecord<O>) -> Result<O, TrialError> {
        self.strategies.resolve(record)
    }
}

impl<I, O, M> Named for AsyncExperiment<I, O, M> {
    fn name(&self) -> &str {
        &self.strategies.name
    }
}

impl<I, O, M> fmt::Debug for AsyncExperiment<I, O, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncExperiment")
            .field("name", &self.strategies.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MatchOutcome;
    use crate::publish::Discard;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn config(serially: bool) -> ExperimentConfig<u32> {
        ExperimentConfig {
            serially: Box::new(serially),
            publisher: Box::new(Discard),
            ..ExperimentConfig::simple("async")
        }
    }

    async fn explode(_: u32) -> anyhow::Result<u32> {
        panic!("async candidate blew up")
    }

    #[tokio::test]
    async fn parallel_match() {
        let experiment = AsyncExperiment::new(
            config(false),
            |x: u32| async move { Ok::<_, anyhow::Error>(x * 2) },
            |x: u32| async move { Ok::<_, anyhow::Error>(x + x) },
        )
        .unwrap();

        let observation = experiment.observe(21).await;
        assert_eq!(observation.outcome, Some(MatchOutcome::Match));
        assert_eq!(experiment.resolve(&observation.record).unwrap(), 42);
    }

    #[tokio::test]
    async fn panicking_candidate_is_captured() {
        let experiment = AsyncExperiment::new(
            config(true),
            |x: u32| async move { Ok::<_, anyhow::Error>(x) },
            explode,
        )
        .unwrap();

        let observation = experiment.observe(7).await;
        assert_eq!(observation.outcome, Some(MatchOutcome::CandidateError));
        let candidate = observation.record.candidate().unwrap();
        assert!(candidate.error().unwrap().is_panic());
        assert_eq!(experiment.run(7).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn skipped_candidate_is_never_polled() {
        let published = Arc::new(AtomicUsize::new(0));
        let candidate_runs = Arc::new(AtomicUsize::new(0));
        let (publishes, counted) = (Arc::clone(&published), Arc::clone(&candidate_runs));
        let config = ExperimentConfig {
            run_candidate: Box::new(false),
            publisher: Box::new(move |_: MatchOutcome, _: &ComparisonRecord<u32>| {
                publishes.fetch_add(1, Ordering::SeqCst);
            }),
            ..ExperimentConfig::simple("async skip")
        };
        let experiment = AsyncExperiment::new(
            config,
            |x: u32| async move { Err::<u32, _>(anyhow::anyhow!("control failed on {}", x)) },
            move |x: u32| {
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(x)
                }
            },
        )
        .unwrap();

        let observation = experiment.observe(3).await;
        assert!(observation.outcome.is_none());
        assert!(observation.record.candidate().is_none());

        let error = experiment.run(3).await.unwrap_err();
        assert_eq!(error.to_string(), "control failed on 3");
        assert_eq!(candidate_runs.load(Ordering::SeqCst), 0);
        assert_eq!(published.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn serial_mode_finishes_control_before_candidate_starts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (control_log, candidate_log) = (Arc::clone(&log), Arc::clone(&log));
        let experiment = AsyncExperiment::new(
            config(true),
            move |x: u32| {
                let log = Arc::clone(&control_log);
                async move {
                    log.lock().unwrap().push("control start");
                    tokio::task::yield_now().await;
                    log.lock().unwrap().push("control end");
                    Ok::<_, anyhow::Error>(x)
                }
            },
            move |x: u32| {
                let log = Arc::clone(&candidate_log);
                async move {
                    log.lock().unwrap().push("candidate start");
                    tokio::task::yield_now().await;
                    log.lock().unwrap().push("candidate end");
                    Ok::<_, anyhow::Error>(x)
                }
            },
        )
        .unwrap();

        assert_eq!(experiment.run(5).await.unwrap(), 5);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["control start", "control end", "candidate start", "candidate end"]
        );
    }
}
