//! SegmentForge: customer segmentation CLI
//!
//! This is the main entrypoint that orchestrates record loading, segment
//! selection, description, recommendations and the optional reports.

use anyhow::{Context, Result};
use clap::Parser;
use segmentforge::recommend::recommend_segments;
use segmentforge::viz::{self, print_segment_statistics};
use segmentforge::{
    analyze, load_records, recommend, Args, RecommendationRequest, RecommendationSet,
};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.verbose {
        println!("SegmentForge - Customer Segmentation");
        println!("====================================\n");
    }

    // Check if in recommendation mode
    if let Some(analysis_path) = &args.recommend {
        run_recommend_mode(analysis_path)?;
    } else {
        run_full_pipeline(&args)?;
    }

    Ok(())
}

/// Derive recommendations from a stored analysis
fn run_recommend_mode(analysis_path: &Path) -> Result<()> {
    println!("=== Recommendation Mode ===");

    let json = fs::read_to_string(analysis_path)
        .with_context(|| format!("failed to read analysis from {}", analysis_path.display()))?;
    let request = RecommendationRequest::from_json(&json)
        .with_context(|| format!("{} is not a valid analysis", analysis_path.display()))?;

    println!("Segments read: {}", request.segments.len());
    print_recommendations(&recommend_segments(&request.segments));

    Ok(())
}

/// Run the full segmentation pipeline
fn run_full_pipeline(args: &Args) -> Result<()> {
    println!("=== Segmentation Pipeline ===\n");

    let start_time = Instant::now();
    let config = args
        .analysis_config()
        .context("invalid analysis settings")?;

    // Step 1: Load records
    if args.verbose {
        println!("Step 1: Loading customer records");
        println!("  Input file: {}", args.input.display());
    }

    let records = load_records(&args.input)
        .with_context(|| format!("failed to load records from {}", args.input.display()))?;
    println!("✓ Records loaded: {} customers", records.len());

    // Step 2: Select, fit and describe segments
    if args.verbose {
        println!("\nStep 2: Segmenting customers");
        println!("  Max segments: {}", config.max_clusters);
        println!("  Max iterations: {}", config.max_iterations);
        println!("  Tolerance: {}", config.tolerance);
    }

    let analysis_start = Instant::now();
    let analysis = analyze(&records, &config).context("segmentation failed")?;
    let analysis_time = analysis_start.elapsed();

    println!("✓ Segments found: {}", analysis.segments.len());
    if args.verbose {
        println!("  Analysis time: {:.2}s", analysis_time.as_secs_f64());
    }

    print_segment_statistics(&analysis);
    print_recommendations(&recommend(&analysis));

    // Step 3: Reports
    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&analysis)?;
        fs::write(output, json)
            .with_context(|| format!("failed to write analysis to {}", output.display()))?;
        println!("\nAnalysis saved to: {}", output.display());
    }

    if let Some(plot) = &args.plot {
        viz::generate_report_chart(&analysis, plot)?;
        println!("Report chart saved to: {}", plot.display());
    }

    let total_time = start_time.elapsed();
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

fn print_recommendations(recommendations: &RecommendationSet) {
    println!("\n=== Recommendations ===");
    for (index, recommendation) in recommendations.iter().enumerate() {
        println!("{}. {}", index + 1, recommendation);
    }
}
