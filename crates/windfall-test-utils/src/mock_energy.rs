//! Mock implementation of the `EnergyDataSource` trait for testing.
//!
//! Serves per-zone readings from an in-memory map so oracle and
//! routing tests can shape the cost surface exactly.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use windfall_oracle::{EnergyDataSource, SourceError, ZoneReadings};

struct MockEnergySourceInner {
    zones: HashMap<String, ZoneReadings>,
    should_fail: bool,
    fetch_count: usize,
}

/// A mock implementation of the `EnergyDataSource` trait for testing.
///
/// Uses `Arc<RwLock<...>>` internally, so it is cheap to clone and all
/// clones share the same state.
#[derive(Clone)]
pub struct MockEnergySource {
    inner: Arc<RwLock<MockEnergySourceInner>>,
}

impl Default for MockEnergySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEnergySource {
    /// Create an empty source: every zone answers 404.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockEnergySourceInner {
                zones: HashMap::new(),
                should_fail: false,
                fetch_count: 0,
            })),
        }
    }

    /// Seed a zone reading.
    pub fn with_zone(self, zone: &str, renewable_percent: f64, carbon_intensity: f64) -> Self {
        self.inner.write().unwrap().zones.insert(
            zone.to_string(),
            ZoneReadings {
                renewable_percent,
                carbon_intensity: Some(carbon_intensity),
            },
        );
        self
    }

    /// Configure the mock to fail all fetches.
    pub fn with_failure(self) -> Self {
        self.inner.write().unwrap().should_fail = true;
        self
    }

    /// Set the failure mode at runtime.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.inner.write().unwrap().should_fail = should_fail;
    }

    /// Get the number of fetches made.
    pub fn fetch_count(&self) -> usize {
        self.inner.read().unwrap().fetch_count
    }
}

#[async_trait]
impl EnergyDataSource for MockEnergySource {
    async fn fetch_zone(&self, zone: &str) -> Result<ZoneReadings, SourceError> {
        let mut inner = self.inner.write().unwrap();
        inner.fetch_count += 1;
        if inner.should_fail {
            return Err(SourceError::api(500, zone));
        }
        inner
            .zones
            .get(zone)
            .cloned()
            .ok_or_else(|| SourceError::api(404, zone))
    }
}
