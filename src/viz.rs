//! Segment report charts using Plotters (SVG) and console statistics

use crate::analysis::Analysis;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

/// Color palette for different segments
const SEGMENT_COLORS: [RGBColor; 5] = [RED, BLUE, GREEN, CYAN, MAGENTA];

fn segment_color(index: usize) -> &'static RGBColor {
    &SEGMENT_COLORS[index % SEGMENT_COLORS.len()]
}

/// Draw one bar per entry of `values` on `area`, labelled by `labels`
fn draw_bar_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    caption: &str,
    y_desc: &str,
    labels: &[String],
    values: &[f64],
) -> anyhow::Result<()> {
    let max_value = values
        .iter()
        .copied()
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);
    let n_bars = values.len().max(1);

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((0..n_bars).into_segmented(), 0f64..(max_value * 1.1))
        .map_err(|err| anyhow::anyhow!("failed to build chart `{caption}`: {err}"))?;

    let formatter = |value: &SegmentValue<usize>| match value {
        SegmentValue::CenterOf(index) | SegmentValue::Exact(index) => {
            labels.get(*index).cloned().unwrap_or_default()
        }
        SegmentValue::Last => String::new(),
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(y_desc)
        .x_label_formatter(&formatter)
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(|err| anyhow::anyhow!("failed to draw axes of `{caption}`: {err}"))?;

    chart
        .draw_series(values.iter().enumerate().map(|(index, &value)| {
            Rectangle::new(
                [
                    (SegmentValue::Exact(index), 0.0),
                    (SegmentValue::Exact(index + 1), value),
                ],
                segment_color(index).filled(),
            )
        }))
        .map_err(|err| anyhow::anyhow!("failed to draw bars of `{caption}`: {err}"))?;

    Ok(())
}

/// Create an SVG report with segment sizes next to feature importance
///
/// # Arguments
/// * `analysis` - Completed analysis
/// * `output_path` - Path of the SVG file to write
pub fn generate_report_chart(
    analysis: &Analysis,
    output_path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let output_path = output_path.as_ref();
    let root = SVGBackend::new(output_path, (1200, 500)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|err| anyhow::anyhow!("failed to prepare canvas: {err}"))?;

    let panels = root.split_evenly((1, 2));

    let segment_labels: Vec<String> = analysis.segments.iter().map(|s| s.name.clone()).collect();
    let segment_sizes: Vec<f64> = analysis.segments.iter().map(|s| s.size() as f64).collect();
    draw_bar_panel(
        &panels[0],
        "Segment Sizes",
        "Number of Customers",
        &segment_labels,
        &segment_sizes,
    )?;

    let ranked = analysis.ranked_features();
    let feature_labels: Vec<String> = ranked.iter().map(|(field, _)| field.to_string()).collect();
    let feature_weights: Vec<f64> = ranked.iter().map(|(_, weight)| weight * 100.0).collect();
    draw_bar_panel(
        &panels[1],
        "Feature Importance",
        "Influence (%)",
        &feature_labels,
        &feature_weights,
    )?;

    root.present()
        .map_err(|err| anyhow::anyhow!("failed to write {}: {err}", output_path.display()))?;
    tracing::info!(path = %output_path.display(), "report chart written");

    Ok(())
}

/// Print segment statistics to console
pub fn print_segment_statistics(analysis: &Analysis) {
    println!("\n=== Segment Statistics ===");
    println!("Number of segments: {}", analysis.segments.len());
    println!("Total customers: {}", analysis.total_records());
    println!("Fit quality (silhouette): {:.3}", analysis.fit_quality);

    for segment in &analysis.segments {
        println!(
            "\nSegment {} - {}: {} customers ({:.1}%)",
            segment.id,
            segment.name,
            segment.size(),
            analysis.share_of(segment) * 100.0
        );
        let centroid: Vec<String> = segment
            .centroid
            .means
            .iter()
            .map(|(field, mean)| format!("{field}={mean:.2}"))
            .collect();
        println!("  Centroid: {}", centroid.join(", "));
        for characteristic in &segment.characteristics {
            println!("  - {characteristic}");
        }
    }

    println!("\nFeature importance:");
    for (field, weight) in analysis.ranked_features() {
        println!("  {:<20} {:5.1}%", field, weight * 100.0);
    }
}
