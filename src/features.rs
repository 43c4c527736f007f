//! Feature extraction: numeric vs categorical fields, imputation and scaling

use crate::data::{Record, ID_FIELD};
use crate::error::SegmentError;
use ndarray::{Array1, Array2, Axis};
use serde_json::Value;

/// Numeric and categorical field names of a record batch, in first-seen order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet {
    pub numeric_fields: Vec<String>,
    pub categorical_fields: Vec<String>,
}

impl FeatureSet {
    pub fn is_categorical(&self, field: &str) -> bool {
        self.categorical_fields.iter().any(|f| f == field)
    }
}

/// Classify the fields of a batch.
///
/// A field is numeric when at least one record holds a value for it and every
/// non-null value is a JSON number. `id` is never a feature.
pub fn extract_features(records: &[Record]) -> crate::Result<FeatureSet> {
    if records.is_empty() {
        return Err(SegmentError::validation("no records supplied"));
    }

    let mut fields: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if key != ID_FIELD && !fields.contains(&key.as_str()) {
                fields.push(key.as_str());
            }
        }
    }

    let mut numeric_fields = Vec::new();
    let mut categorical_fields = Vec::new();
    for field in fields {
        let mut present = records
            .iter()
            .filter_map(|record| record.get(field))
            .filter(|value| !value.is_null())
            .peekable();

        let has_values = present.peek().is_some();
        if has_values && present.all(Value::is_number) {
            numeric_fields.push(field.to_string());
        } else {
            categorical_fields.push(field.to_string());
        }
    }

    if numeric_fields.is_empty() {
        return Err(SegmentError::validation(
            "no numeric columns found for clustering",
        ));
    }

    Ok(FeatureSet {
        numeric_fields,
        categorical_fields,
    })
}

/// Per-field standardization fitted on one batch
#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit means and population standard deviations; constant fields keep scale 1.
    pub fn fit(features: &Array2<f64>) -> Self {
        let n = features.nrows().max(1) as f64;
        let mean = features.sum_axis(Axis(0)) / n;
        let scale = features
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(column, &mu)| {
                let variance = column.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                if std > f64::EPSILON * mu.abs().max(1.0) {
                    std
                } else {
                    1.0
                }
            })
            .collect::<Array1<f64>>();

        Self { mean, scale }
    }

    pub fn transform(&self, features: &Array2<f64>) -> Array2<f64> {
        (features - &self.mean) / &self.scale
    }
}

/// Numeric view of a batch, row-aligned with the records
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Values in original units, missing entries imputed with the field mean
    pub raw: Array2<f64>,
    /// `raw` scaled to zero mean and unit variance per field
    pub standardized: Array2<f64>,
}

/// Project the numeric fields of `records` into a matrix.
///
/// Missing values are replaced by the mean of the present values of their
/// field, so the imputed rows also feed the reported centroids.
pub fn build_feature_matrix(
    records: &[Record],
    feature_set: &FeatureSet,
) -> crate::Result<FeatureMatrix> {
    let n_rows = records.len();
    let n_cols = feature_set.numeric_fields.len();
    let mut raw = Array2::<f64>::zeros((n_rows, n_cols));

    for (col, field) in feature_set.numeric_fields.iter().enumerate() {
        let values: Vec<Option<f64>> = records
            .iter()
            .map(|record| record.get(field).and_then(Value::as_f64))
            .collect();

        let (sum, count) = values
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        if count == 0 {
            return Err(SegmentError::computation(format!(
                "numeric field `{field}` has no values to impute from"
            )));
        }
        let field_mean = sum / count as f64;

        for (row, value) in values.into_iter().enumerate() {
            raw[[row, col]] = value.unwrap_or(field_mean);
        }
    }

    if raw.iter().any(|v| !v.is_finite()) {
        return Err(SegmentError::computation(
            "numeric fields contain non-finite values",
        ));
    }

    let scaler = StandardScaler::fit(&raw);
    let standardized = scaler.transform(&raw);

    Ok(FeatureMatrix { raw, standardized })
}

/// Number of distinct rows, compared exactly.
pub fn count_distinct_rows(matrix: &Array2<f64>) -> usize {
    let mut distinct: Vec<Vec<u64>> = matrix
        .outer_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect())
        .collect();
    distinct.sort_unstable();
    distinct.dedup();
    distinct.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    fn records(value: Value) -> Vec<Record> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_features() {
        let batch = records(json!([
            {"id": 1, "age": 25, "gender": "F", "income": 40000, "region": "West"},
            {"id": 2, "age": 52, "gender": "M", "income": null, "region": "East"},
            {"id": 3, "age": 23, "score": "12", "vip": true}
        ]));

        let features = extract_features(&batch).unwrap();
        assert_eq!(features.numeric_fields, vec!["age", "income"]);
        assert_eq!(
            features.categorical_fields,
            vec!["gender", "region", "score", "vip"]
        );
        assert!(features.is_categorical("region"));
    }

    #[test]
    fn test_id_only_batch_is_rejected() {
        let batch = records(json!([{"id": 1}, {"id": 2, "name": "x"}]));
        let err = extract_features(&batch).unwrap_err();
        assert!(matches!(err, SegmentError::Validation(_)));
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        assert!(extract_features(&[]).is_err());
    }

    #[test]
    fn test_all_null_field_is_categorical() {
        let batch = records(json!([
            {"id": 1, "age": 20, "notes": null},
            {"id": 2, "age": 30, "notes": null}
        ]));
        let features = extract_features(&batch).unwrap();
        assert_eq!(features.numeric_fields, vec!["age"]);
        assert_eq!(features.categorical_fields, vec!["notes"]);
    }

    #[test]
    fn test_missing_values_are_mean_imputed() {
        let batch = records(json!([
            {"id": 1, "age": 20, "income": 1000},
            {"id": 2, "age": 40},
            {"id": 3, "age": null, "income": 3000}
        ]));
        let features = extract_features(&batch).unwrap();
        let matrix = build_feature_matrix(&batch, &features).unwrap();

        assert_abs_diff_eq!(matrix.raw[[1, 1]], 2000.0);
        assert_abs_diff_eq!(matrix.raw[[2, 0]], 30.0);
    }

    #[test]
    fn test_standardization() {
        let raw = Array2::from_shape_vec((4, 2), vec![1.0, 5.0, 2.0, 5.0, 3.0, 5.0, 4.0, 5.0])
            .unwrap();
        let scaler = StandardScaler::fit(&raw);
        let scaled = scaler.transform(&raw);

        let column = scaled.column(0);
        assert_abs_diff_eq!(column.sum(), 0.0, epsilon = 1e-12);
        let variance = column.iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert_abs_diff_eq!(variance, 1.0, epsilon = 1e-12);

        // Constant column collapses to zero instead of dividing by zero
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_count_distinct_rows() {
        let matrix = Array2::from_shape_vec((4, 2), vec![1.0, 2.0, 1.0, 2.0, 3.0, 4.0, 1.0, 2.0])
            .unwrap();
        assert_eq!(count_distinct_rows(&matrix), 2);
    }
}
