//! Counterpart provides the `Experiment` struct, which runs a trusted
//! "control" implementation and an experimental "candidate" implementation of
//! the same operation side by side, times both, compares their results, and
//! returns the control's result to the caller.
//!
//! Let's imagine that we already have a function called `load_from_db`, which
//! loads some data from a database. We want to refactor this to instead load
//! the same data from redis. We write a new function called `load_from_redis`
//! to accomplish the same task, and we want to know whether it behaves the
//! same way on real traffic before trusting it. We run the redis version on
//! 0.5% of requests, publish every comparison, and keep returning the DB data
//! no matter what the redis version did.
//!
//! ```
//! use counterpart::{gate::Percent, Experiment, ExperimentConfig, MatchOutcome};
//!
//! fn load_from_db(id: &i32) -> anyhow::Result<i32> { Ok(*id) }
//! fn load_from_redis(id: &i32) -> anyhow::Result<i32> { Ok(*id) }
//!
//! let config = ExperimentConfig {
//!     run_candidate: Box::new(Percent::new(0.5)),
//!     publisher: Box::new(|outcome: MatchOutcome, record: &counterpart::ComparisonRecord<i32>| {
//!         if !outcome.is_match() {
//!             eprintln!("{}: {}", record.name(), outcome.description());
//!         }
//!     }),
//!     ..ExperimentConfig::simple("redis migration")
//! };
//! let experiment = Experiment::new(config, load_from_db, load_from_redis).unwrap();
//!
//! assert_eq!(experiment.run(&4).unwrap(), 4);
//! ```
//!
//! Async control and candidate functions are supported through
//! [`AsyncExperiment`]:
//!
//! ```
//! use counterpart::{AsyncExperiment, ExperimentConfig};
//!
//! async fn load_from_db(id: i32) -> anyhow::Result<i32> { Ok(id) }
//! async fn load_from_redis(id: i32) -> anyhow::Result<i32> { Ok(id) }
//!
//! # tokio_test::block_on(async {
//! let experiment = AsyncExperiment::new(
//!     ExperimentConfig::simple("redis migration"),
//!     load_from_db,
//!     load_from_redis,
//! )
//! .unwrap();
//!
//! assert_eq!(experiment.run(4).await.unwrap(), 4);
//! # });
//! ```

pub mod asynchronous;
pub mod classify;
pub mod clock;
mod coordinator;
pub mod error;
pub mod experiment;
pub mod gate;
pub mod publish;
pub mod record;
pub mod registry;
pub mod resolve;
pub mod trial;

pub use asynchronous::AsyncExperiment;
pub use classify::MatchOutcome;
pub use error::{ConfigError, RegistryError};
pub use experiment::{Experiment, ExperimentConfig, Observation};
pub use gate::Gate;
pub use publish::Publisher;
pub use record::ComparisonRecord;
pub use registry::{Named, Registry};
pub use resolve::ResolutionPolicy;
pub use trial::{TrialError, TrialOutcome, TrialType};
