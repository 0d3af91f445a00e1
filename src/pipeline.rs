//! End-to-end pipeline: load, merge, clean, analyze, render.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::charts::{render_box, render_heatmap, render_histogram, render_scatter};
use crate::data::{self, CleanOptions, CleanReport};
use crate::stats::{self, CorrelationMatrix, SummaryTable};

/// Sold-count column shared by both input exports.
pub const SOLD_COLUMN: &str = "sold";
/// Category column used for the box plot.
pub const TYPE_COLUMN: &str = "type";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub inputs: Vec<PathBuf>,
    pub out_dir: PathBuf,
    pub clean: CleanOptions,
    pub open_charts: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inputs: vec![
                PathBuf::from("ebay_mens_perfume.csv"),
                PathBuf::from("ebay_womens_perfume.csv"),
            ],
            out_dir: PathBuf::from("charts"),
            clean: CleanOptions::default(),
            open_charts: true,
        }
    }
}

pub struct PipelineOutput {
    pub summary: SummaryTable,
    pub correlation: CorrelationMatrix,
    pub charts: Vec<PathBuf>,
    pub clean_report: CleanReport,
}

/// Run the whole pipeline and return the computed aggregates and chart paths.
pub fn run(config: &PipelineConfig) -> Result<PipelineOutput> {
    let frames = config
        .inputs
        .iter()
        .map(|path| {
            data::load_csv(path).with_context(|| format!("loading {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let combined = data::combine(&frames)?;
    info!(rows = combined.height(), "combined listing tables");

    let (cleaned, clean_report) = data::clean(&combined, &config.clean)?;
    let cleaned = data::coerce_price(&cleaned)?;
    let cleaned = data::with_display_price(&cleaned)?;

    let numeric = stats::numeric_subtable(&cleaned)?;
    let summary = stats::describe(&numeric)?;
    let correlation = stats::correlation_matrix(&numeric)?;

    fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("creating {}", config.out_dir.display()))?;

    let prices = data::column_f64(&cleaned, data::PRICE_COLUMN)?;
    let sold_vs_price = data::paired_f64(&cleaned, SOLD_COLUMN, data::PRICE_COLUMN)?;
    let type_prices = data::category_price_pairs(&cleaned, TYPE_COLUMN, data::PRICE_COLUMN)?;

    let charts = vec![
        render_histogram(&prices, &config.out_dir.join("price_histogram.png"))?,
        render_scatter(&sold_vs_price, &config.out_dir.join("sold_vs_price.png"))?,
        render_heatmap(&correlation, &config.out_dir.join("correlation_heatmap.png"))?,
        render_box(&type_prices, &config.out_dir.join("price_by_type.png"))?,
    ];

    export_json(&config.out_dir, &summary, &correlation)?;

    Ok(PipelineOutput {
        summary,
        correlation,
        charts,
        clean_report,
    })
}

fn export_json(
    out_dir: &Path,
    summary: &SummaryTable,
    correlation: &CorrelationMatrix,
) -> Result<()> {
    let summary_path = out_dir.join("summary_stats.json");
    fs::write(&summary_path, serde_json::to_string_pretty(summary)?)
        .with_context(|| format!("writing {}", summary_path.display()))?;

    let correlation_path = out_dir.join("correlation_matrix.json");
    fs::write(&correlation_path, serde_json::to_string_pretty(correlation)?)
        .with_context(|| format!("writing {}", correlation_path.display()))?;

    info!(
        summary = %summary_path.display(),
        correlation = %correlation_path.display(),
        "exported aggregates"
    );
    Ok(())
}
