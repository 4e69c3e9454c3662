//! Driver persistence contract and the in-memory implementation the simulator
//! is seeded from.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{DispatchError, Result};
use crate::matching::DriverProfile;

/// Load/save contract for driver backends, keyed by external driver id.
pub trait DriverStore: Send + Sync {
    /// Every stored driver, ordered by external id.
    fn get_all(&self) -> Result<Vec<DriverProfile>>;

    /// Insert or replace the driver with the same external id.
    fn upsert(&self, driver: DriverProfile) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryDriverStore {
    drivers: RwLock<BTreeMap<String, DriverProfile>>,
}

impl InMemoryDriverStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drivers(drivers: impl IntoIterator<Item = DriverProfile>) -> Result<Self> {
        let store = Self::new();
        for driver in drivers {
            store.upsert(driver)?;
        }
        Ok(store)
    }

    pub fn get(&self, external_id: &str) -> Option<DriverProfile> {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(external_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DriverStore for InMemoryDriverStore {
    fn get_all(&self) -> Result<Vec<DriverProfile>> {
        Ok(self
            .drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    fn upsert(&self, driver: DriverProfile) -> Result<()> {
        if driver.external_id.trim().is_empty() {
            return Err(DispatchError::invalid("driver external id must not be empty"));
        }
        driver.location.validate()?;
        self.drivers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(driver.external_id.clone(), driver);
        Ok(())
    }
}
