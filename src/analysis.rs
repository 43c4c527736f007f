//! The Analyze contract: records in, described segments out

use crate::config::{AnalysisConfig, CancelToken};
use crate::data::{validate_ids, Record, ID_FIELD};
use crate::describe::{describe_segment, name_segment, REGION_FIELD};
use crate::features::{build_feature_matrix, extract_features, FeatureSet};
use crate::model::KMeansParams;
use crate::partition::{partition, Partition};
use crate::selection::select_cluster_count;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key carrying the segment id inside a serialized centroid
const CENTROID_ID_KEY: &str = "cluster";

/// Segment center in original units, tagged with its segment id.
///
/// Serializes flat as `{"cluster": id, <field>: mean, ...}`. When a numeric
/// field is itself named `cluster`, the means move under a `means` key so the
/// two never share a key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "CentroidRepr")]
pub struct Centroid {
    pub segment_id: usize,
    pub means: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CentroidRepr {
    Nested {
        cluster: usize,
        means: BTreeMap<String, f64>,
    },
    Flat {
        cluster: usize,
        #[serde(flatten)]
        means: BTreeMap<String, f64>,
    },
}

impl From<CentroidRepr> for Centroid {
    fn from(repr: CentroidRepr) -> Self {
        match repr {
            CentroidRepr::Nested { cluster, means } | CentroidRepr::Flat { cluster, means } => {
                Self {
                    segment_id: cluster,
                    means,
                }
            }
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum CentroidRef<'a> {
    Nested {
        cluster: usize,
        means: &'a BTreeMap<String, f64>,
    },
    Flat {
        cluster: usize,
        #[serde(flatten)]
        means: &'a BTreeMap<String, f64>,
    },
}

impl Serialize for Centroid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let cluster = self.segment_id;
        let means = &self.means;
        let repr = if means.contains_key(CENTROID_ID_KEY) {
            CentroidRef::Nested { cluster, means }
        } else {
            CentroidRef::Flat { cluster, means }
        };
        repr.serialize(serializer)
    }
}

/// One group of behaviourally similar customers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(alias = "clusterId")]
    pub id: usize,
    #[serde(alias = "customers")]
    pub member_records: Vec<Record>,
    pub centroid: Centroid,
    #[serde(default)]
    pub characteristics: Vec<String>,
    #[serde(alias = "clusterName")]
    pub name: String,
}

impl Segment {
    pub fn size(&self) -> usize {
        self.member_records.len()
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &Value> {
        self.member_records
            .iter()
            .filter_map(|record| record.get(ID_FIELD))
    }
}

/// Result of one analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(alias = "clusters")]
    pub segments: Vec<Segment>,
    pub feature_importance: BTreeMap<String, f64>,
    /// Mean silhouette of the partition, in [-1, 1]
    #[serde(alias = "accuracy")]
    pub fit_quality: f64,
}

impl Analysis {
    pub fn total_records(&self) -> usize {
        self.segments.iter().map(Segment::size).sum()
    }

    /// Fraction of all records that fell into `segment`.
    pub fn share_of(&self, segment: &Segment) -> f64 {
        let total = self.total_records();
        if total == 0 {
            0.0
        } else {
            segment.size() as f64 / total as f64
        }
    }

    /// Feature importance sorted from most to least influential.
    pub fn ranked_features(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .feature_importance
            .iter()
            .map(|(field, &weight)| (field.as_str(), weight))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Segment a batch of customer records.
///
/// # Arguments
/// * `records` - Non-empty batch; every record needs a unique `id`
/// * `config` - Selection and fitting parameters
///
/// # Returns
/// * Described segments, feature importance and fit quality
pub fn analyze(records: &[Record], config: &AnalysisConfig) -> crate::Result<Analysis> {
    analyze_with_cancel(records, config, None)
}

/// Like [`analyze`], aborting between candidate fits once `cancel` is set.
pub fn analyze_with_cancel(
    records: &[Record],
    config: &AnalysisConfig,
    cancel: Option<&CancelToken>,
) -> crate::Result<Analysis> {
    config.validate()?;
    validate_ids(records)?;
    let feature_set = extract_features(records)?;
    tracing::debug!(
        records = records.len(),
        numeric = ?feature_set.numeric_fields,
        categorical = ?feature_set.categorical_fields,
        "extracted features"
    );

    let matrix = build_feature_matrix(records, &feature_set)?;
    let selection = select_cluster_count(&matrix.standardized, config, cancel)?;
    let partition = partition(
        &matrix,
        &feature_set.numeric_fields,
        selection.n_clusters,
        &KMeansParams::from(config),
    )?;

    let segments = build_segments(records, &feature_set, &partition);

    Ok(Analysis {
        segments,
        feature_importance: partition.feature_importance,
        fit_quality: partition.fit_quality,
    })
}

fn build_segments(
    records: &[Record],
    feature_set: &FeatureSet,
    partition: &Partition,
) -> Vec<Segment> {
    let region_is_categorical = feature_set.is_categorical(REGION_FIELD);

    partition
        .centroids
        .iter()
        .enumerate()
        .map(|(id, means)| {
            let mut member_records = Vec::with_capacity(partition.sizes[id]);
            member_records.extend(
                records
                    .iter()
                    .zip(partition.labels.iter())
                    .filter(|(_, &label)| label == id)
                    .map(|(record, _)| record.clone()),
            );

            let characteristics = describe_segment(means, &member_records, region_is_categorical);
            let name = name_segment(id, &characteristics);

            Segment {
                id,
                member_records,
                centroid: Centroid {
                    segment_id: id,
                    means: means.clone(),
                },
                characteristics,
                name,
            }
        })
        .collect()
}
