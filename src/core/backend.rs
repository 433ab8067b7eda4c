use thiserror::Error;

use crate::core::criteria::SearchCriteria;
use crate::core::observation::Observation;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("backend task failed: {0}")]
    Task(String),
}

/// Headline numbers for the landing page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationStats {
    pub satellite_count: u64,
    pub observation_count: u64,
    /// Distinct observer credential lists per observing location.
    pub observer_count: u64,
    /// Newest first.
    pub latest: Vec<Observation>,
}

/// Read-only source of observations.
///
/// Implementations return rows ordered by date added, newest first, and must be
/// safe to call from concurrent requests.
pub trait ObservationBackend: Send + Sync {
    fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Observation>, BackendError>;

    /// Resolves identifiers to observations. Unknown identifiers are skipped and
    /// the result keeps the order of `ids`.
    fn fetch_by_ids(&self, ids: &[i64]) -> Result<Vec<Observation>, BackendError>;

    fn recent(&self, limit: usize) -> Result<Vec<Observation>, BackendError>;

    /// Every stored observation, newest first.
    fn all(&self) -> Result<Vec<Observation>, BackendError>;

    fn count(&self) -> Result<u64, BackendError>;

    fn stats(&self, latest: usize) -> Result<ObservationStats, BackendError>;
}
