// Unit factory
//
// Creates trainable units by registered name. Components that need to
// construct units (notably the shared-resource registry) hold a factory
// handle rather than reaching for ambient globals.

use std::collections::HashMap;

use anyhow::Result;

use crate::error::ContractError;
use crate::unit::TrainableUnit;

type UnitCtor = Box<dyn Fn() -> Box<dyn TrainableUnit> + Send + Sync>;

/// Registry of unit constructors keyed by name
#[derive(Default)]
pub struct UnitFactory {
    ctors: HashMap<String, UnitCtor>,
}

impl UnitFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, ctor: F)
    where
        F: Fn() -> Box<dyn TrainableUnit> + Send + Sync + 'static,
    {
        self.ctors.insert(name.into(), Box::new(ctor));
    }

    /// Construct a fresh unit for `name`
    pub fn create(&self, name: &str) -> Result<Box<dyn TrainableUnit>> {
        match self.ctors.get(name) {
            Some(ctor) => Ok(ctor()),
            None => Err(ContractError::UnknownUnit {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Whether a constructor is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.ctors.contains_key(name)
    }
}
