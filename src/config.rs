//! Analysis parameters and cancellation control

use crate::error::SegmentError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_CLUSTERS: usize = 10;
pub const DEFAULT_CLUSTERS: usize = 3;
pub const DEFAULT_MIN_RECORDS_PER_CLUSTER: usize = 5;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_ITERATIONS: u64 = 300;
pub const DEFAULT_TOLERANCE: f64 = 1e-4;
pub const DEFAULT_N_RUNS: usize = 10;

/// Tunable parameters for one analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Largest segment count the selector will try
    pub max_clusters: usize,
    /// Segment count used when the batch is too small to select one
    pub default_clusters: usize,
    /// Each candidate `k` needs at least `k * min_records_per_cluster` records
    pub min_records_per_cluster: usize,
    /// Seed for k-means++ initialisation
    pub seed: u64,
    /// Lloyd iteration cap per run
    pub max_iterations: u64,
    /// Convergence tolerance on centroid movement
    pub tolerance: f64,
    /// Restarts per fit; the lowest-inertia run is kept
    pub n_runs: usize,
    /// Wall-clock budget checked between candidate fits
    pub time_budget: Option<Duration>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_clusters: DEFAULT_MAX_CLUSTERS,
            default_clusters: DEFAULT_CLUSTERS,
            min_records_per_cluster: DEFAULT_MIN_RECORDS_PER_CLUSTER,
            seed: DEFAULT_SEED,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            n_runs: DEFAULT_N_RUNS,
            time_budget: None,
        }
    }
}

impl AnalysisConfig {
    pub fn with_max_clusters(mut self, max_clusters: usize) -> Self {
        self.max_clusters = max_clusters;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_clusters < 2 {
            return Err(SegmentError::validation(format!(
                "max_clusters must be at least 2, got {}",
                self.max_clusters
            )));
        }
        if self.default_clusters == 0 {
            return Err(SegmentError::validation("default_clusters must be positive"));
        }
        if self.min_records_per_cluster == 0 {
            return Err(SegmentError::validation(
                "min_records_per_cluster must be positive",
            ));
        }
        if self.max_iterations == 0 || self.n_runs == 0 {
            return Err(SegmentError::validation(
                "max_iterations and n_runs must be positive",
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(SegmentError::validation(format!(
                "tolerance must be a positive finite number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Cloneable flag an external caller flips to abort a running analysis.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Checkpoint consulted between candidate fits.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint<'a> {
    cancel: Option<&'a CancelToken>,
    deadline: Option<Instant>,
}

impl<'a> Checkpoint<'a> {
    pub(crate) fn new(config: &AnalysisConfig, cancel: Option<&'a CancelToken>) -> Self {
        Self {
            cancel,
            deadline: config.time_budget.map(|budget| Instant::now() + budget),
        }
    }

    pub(crate) fn check(&self) -> crate::Result<()> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(SegmentError::Cancelled("cancellation requested".to_string()));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(SegmentError::Cancelled(
                    "time budget exhausted before the next candidate fit".to_string(),
                ));
            }
        }
        Ok(())
    }
}
