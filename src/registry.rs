//! Named experiments, built once and shared.
//!
//! Experiments are usually assembled at startup or on first use and then
//! looked up by name wherever the refactored code path is called:
//!
//! ```
//! use counterpart::{Experiment, ExperimentConfig, Registry};
//!
//! fn lookup(id: &u64) -> anyhow::Result<String> {
//!     let experiment = Registry::global()
//!         .get_or_try_init("user lookup", || {
//!             Experiment::new(
//!                 ExperimentConfig::simple("user lookup"),
//!                 |id: &u64| Ok(format!("user-{}", id)),
//!                 |id: &u64| Ok(["user-", &id.to_string()].concat()),
//!             )
//!         })?;
//!
//!     Ok(experiment.run(id)?)
//! }
//!
//! assert_eq!(lookup(&7).unwrap(), "user-7");
//! ```

use crate::error::{ConfigError, RegistryError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::{self, Any};
use std::sync::{Arc, OnceLock};

type Registered = Arc<dyn Any + Send + Sync>;

/// Something that can be registered under its own name
pub trait Named {
    fn name(&self) -> &str;
}

/// A concurrent map from names to experiments, holding at most one
/// experiment per name
#[derive(Default)]
pub struct Registry {
    experiments: DashMap<String, Registered>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    ///
    /// An `init` closure passed to [`Registry::get_or_try_init`] must not
    /// look anything up in this registry: the entry being built is locked
    /// and the lookup would deadlock.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Returns the experiment registered under `name`, building and
    /// registering it with `init` on first access. Concurrent first accesses
    /// run `init` only once.
    ///
    /// `init` runs while part of the registry is locked and must not use the
    /// registry itself. The experiment it builds must carry `name`, otherwise
    /// nothing is registered.
    pub fn get_or_try_init<E, F>(&self, name: &str, init: F) -> Result<Arc<E>, RegistryError>
    where
        E: Named + Any + Send + Sync,
        F: FnOnce() -> Result<E, ConfigError>,
    {
        let registered = match self.experiments.entry(name.to_owned()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let experiment = init()?;
                if experiment.name() != name {
                    return Err(RegistryError::NameMismatch {
                        key: name.to_owned(),
                        name: experiment.name().to_owned(),
                    });
                }

                let experiment: Registered = Arc::new(experiment);
                entry.insert(Arc::clone(&experiment));
                tracing::debug!(experiment = name, "registered experiment");
                experiment
            }
        };

        downcast(name, registered)
    }

    /// The experiment registered under `name`, if any
    pub fn get<E>(&self, name: &str) -> Result<Option<Arc<E>>, RegistryError>
    where
        E: Any + Send + Sync,
    {
        let registered = self.experiments.get(name).map(|entry| Arc::clone(entry.value()));

        registered.map(|registered| downcast(name, registered)).transpose()
    }

    /// Forgets the experiment registered under `name`. Holders of the
    /// experiment keep their handle.
    pub fn remove(&self, name: &str) -> bool {
        self.experiments.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

fn downcast<E>(name: &str, registered: Registered) -> Result<Arc<E>, RegistryError>
where
    E: Any + Send + Sync,
{
    registered.downcast::<E>().map_err(|_| RegistryError::TypeMismatch {
        name: name.to_owned(),
        requested: any::type_name::<E>(),
    })
}
