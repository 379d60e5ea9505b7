use crate::error::ConfigError;
use rand::Rng;

/// A yes/no decision made fresh on every experiment invocation, such as
/// "run the candidate this time?" or "run the trials serially this time?"
pub trait Gate: Send + Sync {
    fn decide(&self) -> bool;
}

impl Gate for bool {
    fn decide(&self) -> bool {
        *self
    }
}

impl<F> Gate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn decide(&self) -> bool {
        self()
    }
}

/// The simplest sampling gate, a floating point number between 0 and 100 that
/// represents the percentage of invocations which should say yes.
#[derive(Debug, Clone, Copy)]
pub struct Percent(f64);

impl Percent {
    /// Create a new sampling Percent
    pub fn new(percent: f64) -> Self {
        Self(percent / 100.0)
    }

    /// Like `new`, but rejects percentages outside of 0..=100
    pub fn try_new(percent: f64) -> Result<Self, ConfigError> {
        if (0.0..=100.0).contains(&percent) {
            Ok(Self::new(percent))
        } else {
            Err(ConfigError::InvalidPercent(percent))
        }
    }
}

impl Gate for Percent {
    fn decide(&self) -> bool {
        let mut rng = rand::thread_rng();

        rng.gen::<f64>() < self.0
    }
}

/// How a single invocation will execute, derived from the two gates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Run only the control; nothing is compared or published
    ControlOnly,

    /// Run the control to completion, then the candidate
    Serial,

    /// Run control and candidate concurrently and wait for both
    Parallel,
}

impl Mode {
    /// Consults `run_candidate`, and `serially` only if the candidate will run
    pub(crate) fn decide(run_candidate: &dyn Gate, serially: &dyn Gate) -> Self {
        if !run_candidate.decide() {
            Mode::ControlOnly
        } else if serially.decide() {
            Mode::Serial
        } else {
            Mode::Parallel
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Mode::ControlOnly => "control_only",
            Mode::Serial => "serial",
            Mode::Parallel => "parallel",
        }
    }
}
