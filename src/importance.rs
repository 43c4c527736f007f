//! Feature importance from mutual information between fields and segment labels
//!
//! Each numeric field is scored with the nearest-neighbour estimator for
//! mutual information between a continuous variable and a discrete one
//! (Ross, 2014). No random jitter is added, so identical inputs always give
//! identical weights.

use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Neighbours used by the estimator
pub const DEFAULT_NEIGHBORS: usize = 3;

/// Normalised importance per numeric field
///
/// # Arguments
/// * `fields` - Field names, one per column of `raw`
/// * `raw` - Field values in original units (imputed)
/// * `labels` - Segment label per row
///
/// # Returns
/// * Non-negative weights summing to 1; uniform when no field carries
///   any information about the labels
pub fn feature_importance(
    fields: &[String],
    raw: &Array2<f64>,
    labels: &Array1<usize>,
) -> BTreeMap<String, f64> {
    let labels = labels.to_vec();
    let scores: Vec<f64> = raw
        .columns()
        .into_iter()
        .map(|column| mutual_information(&column.to_vec(), &labels, DEFAULT_NEIGHBORS))
        .collect();

    normalize_scores(fields, &scores)
}

fn normalize_scores(fields: &[String], scores: &[f64]) -> BTreeMap<String, f64> {
    let total: f64 = scores.iter().sum();
    fields
        .iter()
        .zip(scores)
        .map(|(field, &score)| {
            let weight = if total > 0.0 {
                score / total
            } else {
                1.0 / fields.len() as f64
            };
            (field.clone(), weight)
        })
        .collect()
}

/// Mutual information (nats) between a continuous variable and discrete labels.
///
/// Rows whose label occurs only once carry no neighbour information and are
/// left out. Negative estimates are clamped to 0.
pub fn mutual_information(values: &[f64], labels: &[usize], n_neighbors: usize) -> f64 {
    let n = values.len().min(labels.len());
    if n == 0 || n_neighbors == 0 {
        return 0.0;
    }

    let mut label_counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &label in &labels[..n] {
        *label_counts.entry(label).or_insert(0) += 1;
    }

    let kept: Vec<usize> = (0..n).filter(|&i| label_counts[&labels[i]] > 1).collect();
    let informative_labels = label_counts.values().filter(|&&count| count > 1).count();
    if informative_labels < 2 {
        return 0.0;
    }

    let n_kept = kept.len();
    let mut digamma_k = 0.0;
    let mut digamma_label = 0.0;
    let mut digamma_m = 0.0;

    for &i in &kept {
        let x = values[i];
        let label = labels[i];
        let label_count = label_counts[&label];
        let k = n_neighbors.min(label_count - 1);

        let mut same_label: Vec<f64> = kept
            .iter()
            .filter(|&&j| j != i && labels[j] == label)
            .map(|&j| (values[j] - x).abs())
            .collect();
        same_label.sort_by(f64::total_cmp);
        let radius = same_label[k - 1];

        // Points strictly inside the radius, the point itself included
        let m = kept
            .iter()
            .filter(|&&j| {
                let d = (values[j] - x).abs();
                if radius > 0.0 {
                    d < radius
                } else {
                    d <= 0.0
                }
            })
            .count();

        digamma_k += digamma(k as f64);
        digamma_label += digamma(label_count as f64);
        digamma_m += digamma(m as f64);
    }

    let n_f = n_kept as f64;
    let mi = digamma(n_f) + (digamma_k - digamma_label - digamma_m) / n_f;
    mi.max(0.0)
}

/// Digamma function for positive arguments.
pub fn digamma(x: f64) -> f64 {
    let mut x = x;
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let f = 1.0 / (x * x);
    result + x.ln()
        - 0.5 / x
        - f * (1.0 / 12.0 - f * (1.0 / 120.0 - f * (1.0 / 252.0 - f * (1.0 / 240.0 - f / 132.0))))
}
