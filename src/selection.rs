//! Segment-count selection by maximum mean silhouette

use crate::config::{AnalysisConfig, CancelToken, Checkpoint};
use crate::features::count_distinct_rows;
use crate::model::{fit_kmeans, silhouette_score, KMeansParams};
use ndarray::Array2;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::ops::RangeInclusive;

/// Silhouette of one candidate fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    pub n_clusters: usize,
    pub silhouette: f64,
}

/// Outcome of the selection step
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSelection {
    /// Chosen segment count
    pub n_clusters: usize,
    /// Scores of every candidate that was fit, ascending by `n_clusters`;
    /// empty when the batch was too small and the default was used
    pub candidates: Vec<CandidateScore>,
}

impl ClusterSelection {
    pub fn used_default(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Candidate segment counts: `2..=min(max_clusters, n_records / min_records_per_cluster)`.
pub fn candidate_range(n_records: usize, config: &AnalysisConfig) -> RangeInclusive<usize> {
    let upper = config
        .max_clusters
        .min(n_records / config.min_records_per_cluster.max(1));
    2..=upper
}

/// Pick the segment count with the highest mean silhouette; ties go to the smaller count.
///
/// Candidates with more clusters than distinct rows are skipped. When no
/// candidate remains, `config.default_clusters` is returned without fitting.
pub fn select_cluster_count(
    features: &Array2<f64>,
    config: &AnalysisConfig,
    cancel: Option<&CancelToken>,
) -> crate::Result<ClusterSelection> {
    let n_records = features.nrows();
    let distinct_rows = count_distinct_rows(features);
    let candidates: Vec<usize> = candidate_range(n_records, config)
        .filter(|&k| k <= distinct_rows)
        .collect();

    if candidates.is_empty() {
        tracing::debug!(
            n_records,
            distinct_rows,
            default = config.default_clusters,
            "too few records to select a segment count; using the default"
        );
        return Ok(ClusterSelection {
            n_clusters: config.default_clusters,
            candidates: Vec::new(),
        });
    }

    let params = KMeansParams::from(config);
    let checkpoint = Checkpoint::new(config, cancel);

    let score_candidate = |n_clusters: usize| -> crate::Result<CandidateScore> {
        checkpoint.check()?;
        let fit = fit_kmeans(features, n_clusters, &params)?;
        let silhouette = silhouette_score(features, &fit.labels);
        tracing::debug!(
            n_clusters,
            silhouette,
            inertia = fit.inertia,
            "scored candidate"
        );
        Ok(CandidateScore {
            n_clusters,
            silhouette,
        })
    };

    #[cfg(feature = "rayon")]
    let scores = candidates
        .par_iter()
        .map(|&k| score_candidate(k))
        .collect::<crate::Result<Vec<_>>>()?;
    #[cfg(not(feature = "rayon"))]
    let scores = candidates
        .iter()
        .map(|&k| score_candidate(k))
        .collect::<crate::Result<Vec<_>>>()?;

    let best = best_candidate(&scores);
    tracing::info!(
        n_clusters = best.n_clusters,
        silhouette = best.silhouette,
        "selected segment count"
    );

    Ok(ClusterSelection {
        n_clusters: best.n_clusters,
        candidates: scores,
    })
}

/// Max-reduction over candidate scores with the smallest count winning ties.
fn best_candidate(scores: &[CandidateScore]) -> CandidateScore {
    scores
        .iter()
        .copied()
        .reduce(|best, candidate| {
            let better = candidate.silhouette > best.silhouette
                || (candidate.silhouette == best.silhouette
                    && candidate.n_clusters < best.n_clusters);
            if better {
                candidate
            } else {
                best
            }
        })
        .unwrap_or(CandidateScore {
            n_clusters: 2,
            silhouette: 0.0,
        })
}
