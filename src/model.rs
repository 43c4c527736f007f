//! K-Means partitioning and silhouette scoring

use crate::config::AnalysisConfig;
use crate::error::SegmentError;
use linfa::prelude::*;
use linfa::DatasetBase;
use linfa_clustering::{KMeans, KMeansError};
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Parameters of a single K-Means fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    pub seed: u64,
    pub max_iterations: u64,
    pub tolerance: f64,
    pub n_runs: usize,
}

impl From<&AnalysisConfig> for KMeansParams {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            seed: config.seed,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            n_runs: config.n_runs,
        }
    }
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

/// Result of one K-Means fit; no estimator state survives the call
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster index per row, contiguous from 0
    pub labels: Array1<usize>,
    /// One row per non-empty cluster, in the space the fit ran in
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares
    pub inertia: f64,
}

impl KMeansFit {
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters()];
        for &label in self.labels.iter() {
            if label < sizes.len() {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

/// Fit K-Means on standardized features
///
/// # Arguments
/// * `features` - Standardized feature matrix (n_records, n_fields)
/// * `n_clusters` - Number of clusters, at most the number of rows
/// * `params` - Seed and convergence settings
///
/// # Returns
/// * Labels, centroids and inertia; clusters left empty by the fit are
///   dropped and the remaining labels renumbered in order
pub fn fit_kmeans(
    features: &Array2<f64>,
    n_clusters: usize,
    params: &KMeansParams,
) -> crate::Result<KMeansFit> {
    let n_samples = features.nrows();
    if n_clusters == 0 {
        return Err(SegmentError::computation("number of clusters must be positive"));
    }
    if n_samples < n_clusters {
        return Err(SegmentError::computation(format!(
            "Number of data points ({n_samples}) must be at least equal to number of clusters ({n_clusters})"
        )));
    }

    if n_clusters == 1 {
        let centroid = features
            .mean_axis(Axis(0))
            .ok_or_else(|| SegmentError::computation("cannot fit an empty matrix"))?;
        let centroids = centroid.insert_axis(Axis(0));
        let labels = Array1::zeros(n_samples);
        let inertia = compute_inertia(features, &labels, &centroids);
        return Ok(KMeansFit {
            labels,
            centroids,
            inertia,
        });
    }

    let dataset = DatasetBase::from(features.clone());
    let rng = StdRng::seed_from_u64(params.seed);

    let fitted: Result<KMeans<f64, L2Dist>, KMeansError> =
        KMeans::params_with(n_clusters, rng, L2Dist)
            .n_runs(params.n_runs)
            .max_n_iterations(params.max_iterations)
            .tolerance(params.tolerance)
            .fit(&dataset);
    let model = fitted.map_err(|err| {
        SegmentError::computation(format!("k-means fit with k={n_clusters} failed: {err}"))
    })?;

    let centroids = model.centroids().clone();
    if centroids.iter().any(|v| !v.is_finite()) {
        return Err(SegmentError::computation(format!(
            "k-means fit with k={n_clusters} produced non-finite centroids"
        )));
    }

    let labels = assign_labels(features, &centroids);
    let (labels, centroids) = drop_empty_clusters(labels, centroids);
    if centroids.nrows() < n_clusters {
        tracing::warn!(
            requested = n_clusters,
            kept = centroids.nrows(),
            "k-means left clusters empty; dropping them"
        );
    }

    let inertia = compute_inertia(features, &labels, &centroids);

    Ok(KMeansFit {
        labels,
        centroids,
        inertia,
    })
}

/// Assign every row to its nearest centroid; ties go to the lower index
pub fn assign_labels(features: &Array2<f64>, centroids: &Array2<f64>) -> Array1<usize> {
    features
        .outer_iter()
        .map(|point| {
            let mut min_distance = f64::INFINITY;
            let mut closest_cluster = 0;

            for (cluster_idx, centroid) in centroids.outer_iter().enumerate() {
                let distance = squared_distance(&point, &centroid);
                if distance < min_distance {
                    min_distance = distance;
                    closest_cluster = cluster_idx;
                }
            }

            closest_cluster
        })
        .collect()
}

fn drop_empty_clusters(
    labels: Array1<usize>,
    centroids: Array2<f64>,
) -> (Array1<usize>, Array2<f64>) {
    let mut sizes = vec![0usize; centroids.nrows()];
    for &label in labels.iter() {
        sizes[label] += 1;
    }
    if sizes.iter().all(|&size| size > 0) {
        return (labels, centroids);
    }

    let kept: Vec<usize> = (0..sizes.len()).filter(|&c| sizes[c] > 0).collect();
    let mut remap = vec![usize::MAX; sizes.len()];
    for (new_id, &old_id) in kept.iter().enumerate() {
        remap[old_id] = new_id;
    }

    let labels = labels.mapv(|label| remap[label]);
    let centroids = centroids.select(Axis(0), &kept);
    (labels, centroids)
}

/// Mean silhouette coefficient over all rows.
///
/// A row alone in its cluster scores 0. The coefficient is undefined when the
/// partition has fewer than 2 or more than `n - 1` clusters; 0 is returned then.
pub fn silhouette_score(features: &Array2<f64>, labels: &Array1<usize>) -> f64 {
    let n_samples = features.nrows();
    if n_samples == 0 || labels.len() != n_samples {
        return 0.0;
    }

    let n_labels = labels.iter().max().map_or(0, |&max| max + 1);
    let mut sizes = vec![0usize; n_labels];
    for &label in labels.iter() {
        sizes[label] += 1;
    }
    let n_clusters = sizes.iter().filter(|&&size| size > 0).count();
    if n_clusters < 2 || n_clusters > n_samples - 1 {
        return 0.0;
    }

    let mut silhouette_sum = 0.0;
    let mut distance_sums = vec![0.0; n_labels];

    for i in 0..n_samples {
        let point = features.row(i);
        let cluster_label = labels[i];

        distance_sums.iter_mut().for_each(|sum| *sum = 0.0);
        for j in 0..n_samples {
            if i != j {
                distance_sums[labels[j]] += euclidean_distance(&point, &features.row(j));
            }
        }

        let own_size = sizes[cluster_label];
        if own_size < 2 {
            continue;
        }

        // a(i): mean distance to the rest of its own cluster
        let a_i = distance_sums[cluster_label] / (own_size - 1) as f64;

        // b(i): lowest mean distance to another cluster
        let b_i = (0..n_labels)
            .filter(|&c| c != cluster_label && sizes[c] > 0)
            .map(|c| distance_sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denominator = a_i.max(b_i);
        if denominator > 0.0 && denominator.is_finite() {
            silhouette_sum += (b_i - a_i) / denominator;
        }
    }

    silhouette_sum / n_samples as f64
}

/// Compute within-cluster sum of squares (inertia)
pub fn compute_inertia(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    centroids: &Array2<f64>,
) -> f64 {
    labels
        .iter()
        .enumerate()
        .filter(|(_, &cluster)| cluster < centroids.nrows())
        .map(|(i, &cluster)| squared_distance(&features.row(i), &centroids.row(cluster)))
        .sum()
}

fn squared_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    squared_distance(point1, point2).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn two_blobs() -> Array2<f64> {
        array![
            [-1.0, -1.0],
            [-1.1, -0.9],
            [-0.9, -1.1],
            [-1.0, -1.2],
            [1.0, 1.0],
            [1.1, 0.9],
            [0.9, 1.1],
            [1.0, 1.2],
        ]
    }

    #[test]
    fn test_fit_kmeans_separates_blobs() {
        let features = two_blobs();
        let fit = fit_kmeans(&features, 2, &KMeansParams::default()).unwrap();

        assert_eq!(fit.n_clusters(), 2);
        assert_eq!(fit.labels.len(), 8);
        assert_eq!(fit.centroids.shape(), &[2, 2]);
        assert!(fit.labels.iter().take(4).all(|&l| l == fit.labels[0]));
        assert!(fit.labels.iter().skip(4).all(|&l| l == fit.labels[4]));
        assert_ne!(fit.labels[0], fit.labels[4]);
        assert_eq!(fit.cluster_sizes(), vec![4, 4]);
    }

    #[test]
    fn test_fit_kmeans_is_deterministic() {
        let features = two_blobs();
        let params = KMeansParams::default();
        let first = fit_kmeans(&features, 3, &params).unwrap();
        let second = fit_kmeans(&features, 3, &params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_cluster_fit() {
        let features = two_blobs();
        let fit = fit_kmeans(&features, 1, &KMeansParams::default()).unwrap();

        assert!(fit.labels.iter().all(|&l| l == 0));
        assert_abs_diff_eq!(fit.centroids[[0, 0]], 0.0, epsilon = 1e-12);
        assert!(fit.inertia > 0.0);
    }

    #[test]
    fn test_invalid_cluster_count() {
        let features = two_blobs();
        assert!(fit_kmeans(&features, 0, &KMeansParams::default()).is_err());
        assert!(fit_kmeans(&features, 9, &KMeansParams::default()).is_err());
    }

    #[test]
    fn test_assign_labels_prefers_lower_index_on_ties() {
        let features = array![[0.0, 0.0], [2.0, 0.0]];
        let centroids = array![[1.0, 0.0], [1.0, 0.0]];
        let labels = assign_labels(&features, &centroids);
        assert_eq!(labels, array![0, 0]);
    }

    #[test]
    fn test_drop_empty_clusters_renumbers() {
        let labels = array![2, 0, 2];
        let centroids = array![[0.0], [5.0], [9.0]];
        let (labels, centroids) = drop_empty_clusters(labels, centroids);
        assert_eq!(labels, array![1, 0, 1]);
        assert_eq!(centroids, array![[0.0], [9.0]]);
    }

    #[test]
    fn test_silhouette_well_separated() {
        let features = two_blobs();
        let labels = array![0, 0, 0, 0, 1, 1, 1, 1];
        let score = silhouette_score(&features, &labels);
        assert!(score > 0.8, "score {score}");
        assert!(score <= 1.0);
    }

    #[test]
    fn test_silhouette_known_value() {
        // a = 1 everywhere; b = 4.5 for the outer points, 3.5 for the inner ones
        let features = array![[0.0], [1.0], [4.0], [5.0]];
        let labels = array![0, 0, 1, 1];
        let outer = 3.5 / 4.5;
        let inner = 2.5 / 3.5;
        let expected = (outer + inner + inner + outer) / 4.0;
        let score = silhouette_score(&features, &labels);
        assert_abs_diff_eq!(score, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_silhouette_degenerate_partitions() {
        let features = array![[0.0], [1.0], [4.0]];
        assert_eq!(silhouette_score(&features, &array![0, 0, 0]), 0.0);
        assert_eq!(silhouette_score(&features, &array![0, 1, 2]), 0.0);

        // The singleton contributes 0 to the mean
        let score = silhouette_score(&features, &array![0, 0, 1]);
        let expected = ((4.0 - 1.0) / 4.0 + (3.0 - 1.0) / 3.0) / 3.0;
        assert_abs_diff_eq!(score, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_compute_inertia() {
        let features = array![[0.0, 0.0], [2.0, 0.0]];
        let labels = array![0, 0];
        let centroids = array![[1.0, 0.0]];
        assert_abs_diff_eq!(compute_inertia(&features, &labels, &centroids), 2.0);
    }
}
