use crate::clock::{self, Clock};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Which side of an experiment a trial ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrialType {
    /// The trusted implementation
    Control,

    /// The implementation under evaluation
    Candidate,
}

impl TrialType {
    pub fn as_str(self) -> &'static str {
        match self {
            TrialType::Control => "control",
            TrialType::Candidate => "candidate",
        }
    }
}

impl fmt::Display for TrialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trial panicked instead of returning
#[derive(Debug, thiserror::Error)]
#[error("trial panicked: {0}")]
pub struct TrialPanic(pub String);

impl TrialPanic {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        Self(message)
    }
}

/// The failure captured from a control or candidate run.
///
/// Cloning is cheap; the underlying error is shared so that a comparison
/// record can be resolved any number of times.
#[derive(Clone)]
pub struct TrialError {
    inner: Arc<anyhow::Error>,
}

impl TrialError {
    pub fn new<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self {
            inner: Arc::new(error.into()),
        }
    }

    /// An error carrying only a message
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(anyhow::Error::msg(message))
    }

    pub fn is_panic(&self) -> bool {
        self.inner.is::<TrialPanic>()
    }

    /// Whether the captured error is of type `E`
    pub fn is<E>(&self) -> bool
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.is::<E>()
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    pub fn as_anyhow(&self) -> &anyhow::Error {
        &self.inner
    }
}

impl From<TrialPanic> for TrialError {
    fn from(panic: TrialPanic) -> Self {
        Self::new(panic)
    }
}

impl fmt::Debug for TrialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for TrialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl std::error::Error for TrialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// The result of running one side of an experiment once
#[derive(Debug, Clone)]
pub struct TrialOutcome<O> {
    trial_type: TrialType,
    duration: Duration,
    result: Result<O, TrialError>,
}

impl<O> TrialOutcome<O> {
    pub fn new(trial_type: TrialType, duration: Duration, result: Result<O, TrialError>) -> Self {
        Self {
            trial_type,
            duration,
            result,
        }
    }

    pub fn trial_type(&self) -> TrialType {
        self.trial_type
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn result(&self) -> &Result<O, TrialError> {
        &self.result
    }

    pub fn value(&self) -> Option<&O> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&TrialError> {
        self.result.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<O, TrialError> {
        self.result
    }
}

pub(crate) type TrialFn<I, O> = Box<dyn Fn(&I) -> anyhow::Result<O> + Send + Sync>;

/// A labeled implementation ready to be timed against an input
pub(crate) struct Trial<I, O> {
    trial_type: TrialType,
    func: TrialFn<I, O>,
}

impl<I, O> Trial<I, O> {
    pub(crate) fn new(trial_type: TrialType, func: TrialFn<I, O>) -> Self {
        Self { trial_type, func }
    }

    /// Runs the trial, capturing returned errors and panics alike. The
    /// duration is recorded whether or not the trial succeeded.
    pub(crate) fn run(&self, input: &I, clock: &dyn Clock) -> TrialOutcome<O> {
        let start = clock.now();
        let result = capture(panic::catch_unwind(AssertUnwindSafe(|| (self.func)(input))));
        let duration = clock::elapsed(start, clock.now());

        finish(self.trial_type, duration, result)
    }
}

/// Folds a trial's panic, error or value into the captured result
pub(crate) fn capture<O>(ran: std::thread::Result<anyhow::Result<O>>) -> Result<O, TrialError> {
    match ran {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(TrialError::new(error)),
        Err(payload) => Err(TrialPanic::from_payload(payload).into()),
    }
}

pub(crate) fn finish<O>(
    trial_type: TrialType,
    duration: Duration,
    result: Result<O, TrialError>,
) -> TrialOutcome<O> {
    tracing::trace!(
        trial = %trial_type,
        ?duration,
        ok = result.is_ok(),
        "trial finished"
    );

    TrialOutcome::new(trial_type, duration, result)
}
