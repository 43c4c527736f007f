//! SegmentForge: customer segmentation with automatic K-Means segment selection
//!
//! This library turns a batch of customer records into behaviourally coherent
//! segments, describes each segment in business terms and derives
//! recommendations from those descriptions.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod describe;
pub mod error;
pub mod features;
pub mod importance;
pub mod model;
pub mod partition;
pub mod recommend;
pub mod selection;
pub mod viz;

// Re-export public items for easier access
pub use analysis::{analyze, analyze_with_cancel, Analysis, Centroid, Segment};
pub use cli::Args;
pub use config::{AnalysisConfig, CancelToken};
pub use data::{load_records, Record};
pub use error::SegmentError;
pub use features::{extract_features, FeatureSet};
pub use model::{fit_kmeans, silhouette_score, KMeansFit, KMeansParams};
pub use recommend::{recommend, RecommendationRequest, RecommendationSet};
pub use selection::{select_cluster_count, ClusterSelection};
pub use viz::generate_report_chart;

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, SegmentError>;
