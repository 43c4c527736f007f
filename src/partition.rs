//! Final partition at the selected segment count

use crate::features::{count_distinct_rows, FeatureMatrix};
use crate::importance::feature_importance;
use crate::model::{fit_kmeans, silhouette_score, KMeansParams};
use ndarray::{Array1, Axis};
use std::collections::BTreeMap;

/// Segment labels plus everything derived from them
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Segment per record, contiguous from 0
    pub labels: Array1<usize>,
    /// Number of records per segment
    pub sizes: Vec<usize>,
    /// Per-segment mean of every numeric field, original units
    pub centroids: Vec<BTreeMap<String, f64>>,
    /// Normalised dependency of the labels on each numeric field
    pub feature_importance: BTreeMap<String, f64>,
    /// Mean silhouette of the partition on the standardized matrix
    pub fit_quality: f64,
    /// Within-cluster sum of squares in standardized units
    pub inertia: f64,
}

impl Partition {
    pub fn n_segments(&self) -> usize {
        self.centroids.len()
    }
}

/// Fit the final partition.
///
/// `n_clusters` is clamped to the number of distinct rows, so a default count
/// larger than a tiny batch still yields a valid partition.
pub fn partition(
    matrix: &FeatureMatrix,
    numeric_fields: &[String],
    n_clusters: usize,
    params: &KMeansParams,
) -> crate::Result<Partition> {
    let distinct_rows = count_distinct_rows(&matrix.standardized);
    let effective = n_clusters.min(distinct_rows).max(1);
    if effective != n_clusters {
        tracing::debug!(
            requested = n_clusters,
            effective,
            distinct_rows,
            "segment count clamped to the number of distinct records"
        );
    }

    let fit = fit_kmeans(&matrix.standardized, effective, params)?;
    let centroids = original_unit_centroids(matrix, numeric_fields, &fit.labels, fit.n_clusters());
    let feature_importance = feature_importance(numeric_fields, &matrix.raw, &fit.labels);
    let fit_quality = silhouette_score(&matrix.standardized, &fit.labels);
    let fit_quality = fit_quality.clamp(-1.0, 1.0);
    let sizes = fit.cluster_sizes();

    tracing::info!(
        segments = fit.n_clusters(),
        sizes = ?sizes,
        fit_quality,
        inertia = fit.inertia,
        "partition fitted"
    );

    Ok(Partition {
        labels: fit.labels,
        sizes,
        centroids,
        feature_importance,
        fit_quality,
        inertia: fit.inertia,
    })
}

fn original_unit_centroids(
    matrix: &FeatureMatrix,
    numeric_fields: &[String],
    labels: &Array1<usize>,
    n_segments: usize,
) -> Vec<BTreeMap<String, f64>> {
    (0..n_segments)
        .map(|segment| {
            let rows: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == segment)
                .map(|(row, _)| row)
                .collect();
            let means = matrix
                .raw
                .select(Axis(0), &rows)
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(numeric_fields.len()));

            numeric_fields
                .iter()
                .cloned()
                .zip(means.iter().copied())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::StandardScaler;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn matrix(raw: Array2<f64>) -> FeatureMatrix {
        let standardized = StandardScaler::fit(&raw).transform(&raw);
        FeatureMatrix { raw, standardized }
    }

    fn fields() -> Vec<String> {
        vec!["age".to_string(), "income".to_string()]
    }

    #[test]
    fn test_partition_reports_original_units() {
        let m = matrix(array![
            [20.0, 30_000.0],
            [22.0, 32_000.0],
            [24.0, 34_000.0],
            [60.0, 90_000.0],
            [62.0, 92_000.0],
            [64.0, 94_000.0],
        ]);
        let result = partition(&m, &fields(), 2, &KMeansParams::default()).unwrap();

        assert_eq!(result.n_segments(), 2);
        assert_eq!(result.sizes, vec![3, 3]);
        let young = result.labels[0];
        assert_abs_diff_eq!(result.centroids[young]["age"], 22.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.centroids[young]["income"], 32_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.centroids[1 - young]["age"], 62.0, epsilon = 1e-9);

        let total: f64 = result.feature_importance.values().sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        assert!(result.fit_quality > 0.5 && result.fit_quality <= 1.0);
    }

    #[test]
    fn test_partition_clamps_to_distinct_rows() {
        let m = matrix(array![[1.0, 1.0], [1.0, 1.0], [5.0, 5.0]]);
        let result = partition(&m, &fields(), 3, &KMeansParams::default()).unwrap();

        assert_eq!(result.n_segments(), 2);
        assert_eq!(result.sizes.iter().sum::<usize>(), 3);
        assert_eq!(result.sizes[result.labels[0]], 2);
        assert_eq!(result.labels[0], result.labels[1]);
        assert_ne!(result.labels[0], result.labels[2]);
    }

    #[test]
    fn test_identical_rows_form_one_segment() {
        let m = matrix(array![[3.0, 4.0], [3.0, 4.0]]);
        let result = partition(&m, &fields(), 3, &KMeansParams::default()).unwrap();

        assert_eq!(result.n_segments(), 1);
        assert_eq!(result.fit_quality, 0.0);
        assert_abs_diff_eq!(result.feature_importance["age"], 0.5);
    }
}
