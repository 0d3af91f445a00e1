//! marketlens - CSV listing analysis & exploratory chart generation
//!
//! Loads two e-commerce listing exports, merges and cleans them, prints
//! summary statistics and a correlation matrix, and renders four charts.

mod charts;
mod data;
mod pipeline;
mod stats;

use anyhow::Result;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = pipeline::PipelineConfig::default();
    let output = pipeline::run(&config)?;

    let report = output.clean_report;
    println!(
        "Cleaned {} rows down to {} ({} with missing values, {} duplicates)",
        report.rows_in, report.rows_out, report.dropped_null, report.dropped_duplicate
    );
    println!("\nSummary statistics\n{}", output.summary);
    println!("Correlation matrix\n{}", output.correlation);

    if config.open_charts {
        for chart in &output.charts {
            if let Err(err) = open::that(chart) {
                warn!(chart = %chart.display(), %err, "could not open chart with system viewer");
            }
        }
    }

    Ok(())
}
