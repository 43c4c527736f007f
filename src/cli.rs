//! Command-line interface definitions and argument parsing

use crate::config::AnalysisConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Customer segmentation CLI: automatic K-Means segments, descriptions and recommendations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the customer records (.csv, or JSON array / {"customerData": [...]})
    #[arg(short, long, default_value = "customers.csv")]
    pub input: PathBuf,

    /// Write the analysis as JSON to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write an SVG chart of segment sizes and feature importance
    #[arg(short, long)]
    pub plot: Option<PathBuf>,

    /// Recommendation mode: derive recommendations from a stored analysis JSON
    /// instead of running the clustering pipeline
    #[arg(short, long, conflicts_with_all = ["output", "plot"])]
    pub recommend: Option<PathBuf>,

    /// Largest segment count to consider
    #[arg(short = 'k', long, default_value = "10")]
    pub max_clusters: usize,

    /// Seed for K-Means initialisation
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value = "300")]
    pub max_iters: u64,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Abort segment-count selection once this many milliseconds have passed
    #[arg(long)]
    pub time_budget_ms: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the analysis configuration from the arguments
    pub fn analysis_config(&self) -> crate::Result<AnalysisConfig> {
        let mut config = AnalysisConfig::default()
            .with_max_clusters(self.max_clusters)
            .with_seed(self.seed)
            .with_max_iterations(self.max_iters)
            .with_tolerance(self.tolerance);
        if let Some(ms) = self.time_budget_ms {
            config = config.with_time_budget(Duration::from_millis(ms));
        }
        config.validate()?;
        Ok(config)
    }

    /// Default `tracing` filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "segmentforge=debug,info"
        } else {
            "info"
        }
    }
}
