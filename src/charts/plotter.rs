//! Chart Plotter Module
//! Renders the four exploratory charts as PNGs with plotters.
//!
//! Each function takes its data and an output path, draws one chart, and
//! returns the path it wrote; callers decide whether to open the images.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use plotters::prelude::*;
use plotters::style::colors::colormaps::{ColorMap, ViridisRGB};
use plotters::style::text_anchor::{HPos, Pos, VPos};
use statrs::distribution::{Continuous, Normal};
use tracing::{info, warn};

const CHART_SIZE: (u32, u32) = (1000, 600);
const BOX_CHART_SIZE: (u32, u32) = (1200, 800);
const HISTOGRAM_BINS: usize = 30;
const TOP_CATEGORIES: usize = 10;

const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
const DARK_BLUE: RGBColor = RGBColor(0, 51, 102);

/// Box fill palette, one colour per category.
const PALETTE: [RGBColor; 10] = [
    RGBColor(102, 194, 165),
    RGBColor(252, 141, 98),
    RGBColor(141, 160, 203),
    RGBColor(231, 138, 195),
    RGBColor(166, 216, 84),
    RGBColor(255, 217, 47),
    RGBColor(229, 196, 148),
    RGBColor(179, 179, 179),
    RGBColor(188, 128, 189),
    RGBColor(204, 235, 197),
];

/// Distribution histogram with a Gaussian KDE overlay, 30 bins.
pub fn render_histogram(prices: &[f64], out: &Path) -> Result<PathBuf> {
    if prices.is_empty() {
        bail!("no prices to draw a histogram from");
    }

    let (start, width, counts) = histogram_bins(prices, HISTOGRAM_BINS);
    let max_count = counts.iter().copied().max().unwrap_or(0).max(1);
    let x_max = start + width * HISTOGRAM_BINS as f64;

    let root = BitMapBackend::new(out, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Histogram of Prices", ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d(start..x_max, 0f64..max_count as f64 * 1.08)?;

    chart
        .configure_mesh()
        .x_desc("Price ($)")
        .y_desc("Frequency")
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
        let x0 = start + i as f64 * width;
        Rectangle::new([(x0, 0.0), (x0 + width, count as f64)], SKY_BLUE.filled())
    }))?;

    // Density overlay, scaled from probability density to expected bin count
    let bandwidth = kde_bandwidth(prices);
    if bandwidth > 0.0 {
        let scale = prices.len() as f64 * width;
        let steps = 200;
        let curve: Vec<(f64, f64)> = (0..=steps)
            .map(|i| {
                let x = start + (x_max - start) * i as f64 / steps as f64;
                (x, kde_density(prices, bandwidth, x) * scale)
            })
            .collect();
        chart.draw_series(LineSeries::new(curve, DARK_BLUE.stroke_width(2)))?;
    }

    root.present().context("failed to write histogram image")?;
    info!(path = %out.display(), "rendered price histogram");
    Ok(out.to_path_buf())
}

/// Log-log scatter of sold count vs. price, coloured by price, with an OLS
/// regression line. Non-positive points cannot be placed on log axes and are
/// filtered out up front.
pub fn render_scatter(points: &[(f64, f64)], out: &Path) -> Result<PathBuf> {
    let (kept, dropped) = filter_log_domain(points);
    if dropped > 0 {
        warn!(
            dropped,
            "discarded non-positive points before log-scale scatter"
        );
    }
    if kept.is_empty() {
        bail!("no points with positive sold count and price for the log-scale scatter");
    }

    let x_min = kept.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let x_max = kept.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y_min = kept.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let y_max = kept.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let root = BitMapBackend::new(out, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let (plot_area, bar_area) = root.split_horizontally(CHART_SIZE.0 - 110);

    let mut chart = ChartBuilder::on(&plot_area)
        .caption("Scatter Plot of Items Sold vs. Price", ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(
            (x_min * 0.9..x_max * 1.1).log_scale(),
            (y_min * 0.9..y_max * 1.1).log_scale(),
        )?;

    chart
        .configure_mesh()
        .x_desc("Items Sold")
        .y_desc("Price ($)")
        .draw()?;

    chart.draw_series(kept.iter().map(|&(x, y)| {
        let color = price_color(y, y_min, y_max);
        Circle::new((x, y), 3, color.mix(0.6).filled())
    }))?;

    // Regression fitted in linear space; segments outside the log domain are
    // clipped rather than handed to the axis
    if let Some((slope, intercept)) = linear_fit(&kept) {
        let steps = 100;
        let line: Vec<(f64, f64)> = (0..=steps)
            .map(|i| {
                let x = x_min + (x_max - x_min) * i as f64 / steps as f64;
                (x, slope * x + intercept)
            })
            .filter(|&(x, y)| x > 0.0 && y > 0.0)
            .collect();
        if line.len() >= 2 {
            chart.draw_series(LineSeries::new(line, DARK_BLUE.stroke_width(2)))?;
        }
    }

    draw_colorbar(&bar_area, y_min, y_max)?;

    root.present().context("failed to write scatter image")?;
    info!(path = %out.display(), points = kept.len(), "rendered sold vs. price scatter");
    Ok(out.to_path_buf())
}

fn draw_colorbar<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    price_lo: f64,
    price_hi: f64,
) -> Result<()> {
    let (price_lo, price_hi) = if price_hi > price_lo {
        (price_lo, price_hi)
    } else {
        (price_lo - 0.5, price_lo + 0.5)
    };
    let mut bar = ChartBuilder::on(area)
        .margin(12)
        .margin_top(60)
        .y_label_area_size(45)
        .x_label_area_size(20)
        .build_cartesian_2d(0f64..1f64, price_lo..price_hi)
        .map_err(|e| anyhow::anyhow!("colorbar layout: {e}"))?;

    bar.configure_mesh()
        .disable_mesh()
        .x_labels(0)
        .y_desc("Price ($)")
        .draw()
        .map_err(|e| anyhow::anyhow!("colorbar mesh: {e}"))?;

    let steps = 128;
    bar.draw_series((0..steps).map(|i| {
        let t0 = price_lo + (price_hi - price_lo) * i as f64 / steps as f64;
        let t1 = price_lo + (price_hi - price_lo) * (i + 1) as f64 / steps as f64;
        Rectangle::new([(0.0, t0), (1.0, t1)], price_color(t0, price_lo, price_hi).filled())
    }))
    .map_err(|e| anyhow::anyhow!("colorbar gradient: {e}"))?;

    Ok(())
}

/// Annotated heatmap of the correlation matrix.
pub fn render_heatmap(matrix: &crate::stats::CorrelationMatrix, out: &Path) -> Result<PathBuf> {
    if matrix.is_empty() {
        bail!("correlation matrix is empty");
    }
    let n = matrix.len();

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for i in 0..n {
        for j in 0..n {
            let v = matrix.get(i, j);
            if v.is_finite() {
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
    }
    if !lo.is_finite() || hi <= lo {
        lo = -1.0;
        hi = 1.0;
    }

    let root = BitMapBackend::new(out, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Heatmap of Correlation Matrix", ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(70)
        .y_label_area_size(110)
        .build_cartesian_2d(-0.5f64..n as f64 - 0.5, -0.5f64..n as f64 - 0.5)?;

    let x_names = matrix.columns.clone();
    let y_names = matrix.columns.clone();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&move |v: &f64| {
            let idx = v.round();
            if (v - idx).abs() > 0.01 || idx < 0.0 {
                return String::new();
            }
            x_names.get(idx as usize).cloned().unwrap_or_default()
        })
        .y_label_formatter(&move |v: &f64| {
            let idx = v.round();
            if (v - idx).abs() > 0.01 || idx < 0.0 {
                return String::new();
            }
            // row 0 of the matrix sits at the top of the chart
            let row = n as f64 - 1.0 - idx;
            y_names.get(row as usize).cloned().unwrap_or_default()
        })
        .draw()?;

    chart.draw_series((0..n).flat_map(|i| (0..n).map(move |j| (i, j))).map(
        |(i, j)| {
            let v = matrix.get(i, j);
            let color = if v.is_finite() {
                ViridisRGB.get_color_normalized(v as f32, lo as f32, hi as f32)
            } else {
                RGBColor(220, 220, 220)
            };
            let (x, y) = (j as f64, n as f64 - 1.0 - i as f64);
            Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], color.filled())
        },
    ))?;

    let mid = (lo + hi) / 2.0;
    let centered = Pos::new(HPos::Center, VPos::Center);
    chart.draw_series((0..n).flat_map(|i| (0..n).map(move |j| (i, j))).map(
        |(i, j)| {
            let v = matrix.get(i, j);
            let label = if v.is_finite() {
                format!("{v:.2}")
            } else {
                "nan".to_string()
            };
            // viridis runs dark to light, so flip the annotation colour midway
            let color = if v.is_finite() && v > mid { &BLACK } else { &WHITE };
            let (x, y) = (j as f64, n as f64 - 1.0 - i as f64);
            Text::new(
                label,
                (x, y),
                ("sans-serif", 16).into_font().color(color).pos(centered),
            )
        },
    ))?;

    root.present().context("failed to write heatmap image")?;
    info!(path = %out.display(), columns = n, "rendered correlation heatmap");
    Ok(out.to_path_buf())
}

/// Price box plot for the ten most frequent categories.
pub fn render_box(pairs: &[(String, f64)], out: &Path) -> Result<PathBuf> {
    if pairs.is_empty() {
        bail!("no category/price pairs for the box plot");
    }

    let categories = top_categories(pairs, TOP_CATEGORIES);
    let mut grouped: Vec<(String, Vec<f64>)> = categories
        .iter()
        .map(|c| (c.clone(), Vec::new()))
        .collect();
    for (category, price) in pairs {
        if let Some(entry) = grouped.iter_mut().find(|(c, _)| c == category) {
            entry.1.push(*price);
        }
    }

    let y_max = grouped
        .iter()
        .flat_map(|(_, values)| values.iter().copied())
        .fold(f64::NEG_INFINITY, f64::max);
    let y_min = grouped
        .iter()
        .flat_map(|(_, values)| values.iter().copied())
        .fold(f64::INFINITY, f64::min);
    let y_lo = if y_min >= 0.0 { 0.0 } else { y_min * 1.1 };
    let y_hi = if y_max > y_lo { y_max * 1.08 } else { y_lo + 1.0 };

    let root = BitMapBackend::new(out, BOX_CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let names: Vec<String> = grouped.iter().map(|(c, _)| c.clone()).collect();
    let mut chart = ChartBuilder::on(&root)
        .caption("Box Plot of Price by Perfume Type", ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(70)
        .y_label_area_size(60)
        .build_cartesian_2d((0..grouped.len()).into_segmented(), y_lo as f32..y_hi as f32)?;

    let label_names = names.clone();
    chart
        .configure_mesh()
        .x_desc("Perfume Type")
        .y_desc("Price ($)")
        .x_label_formatter(&move |segment: &SegmentValue<usize>| match segment {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
                label_names.get(*i).cloned().unwrap_or_default()
            }
            _ => String::new(),
        })
        .draw()?;

    for (i, (_, values)) in grouped.iter().enumerate() {
        if values.is_empty() {
            continue;
        }
        let color = PALETTE[i % PALETTE.len()];
        chart.draw_series([Boxplot::new_vertical(
            SegmentValue::CenterOf(i),
            &Quartiles::new(values),
        )
        .width(28)
        .whisker_width(0.5)
        .style(color.stroke_width(2))])?;
    }

    root.present().context("failed to write box plot image")?;
    info!(path = %out.display(), categories = grouped.len(), "rendered price-by-type box plot");
    Ok(out.to_path_buf())
}

/// Bin values into `bins` equal-width buckets; returns (start, width, counts).
fn histogram_bins(values: &[f64], bins: usize) -> (f64, f64, Vec<usize>) {
    if values.is_empty() || bins == 0 {
        return (0.0, 1.0, Vec::new());
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let width = span / bins as f64;

    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    (min, width, counts)
}

/// Silverman's rule-of-thumb bandwidth; 0.0 when a KDE is not meaningful.
fn kde_bandwidth(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    1.06 * variance.sqrt() * n.powf(-0.2)
}

/// Gaussian-kernel density estimate at `x`.
fn kde_density(values: &[f64], bandwidth: f64, x: f64) -> f64 {
    let Ok(kernel) = Normal::new(0.0, 1.0) else {
        return 0.0;
    };
    let n = values.len() as f64;
    values
        .iter()
        .map(|&v| kernel.pdf((x - v) / bandwidth))
        .sum::<f64>()
        / (n * bandwidth)
}

/// Keep points with both coordinates strictly positive; returns (kept, dropped).
fn filter_log_domain(points: &[(f64, f64)]) -> (Vec<(f64, f64)>, usize) {
    let kept: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|&(x, y)| x > 0.0 && y > 0.0)
        .collect();
    let dropped = points.len() - kept.len();
    (kept, dropped)
}

/// Ordinary least squares; None for degenerate input.
fn linear_fit(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let mut num = 0.0;
    let mut denom = 0.0;
    for &(x, y) in points {
        num += (x - mean_x) * (y - mean_y);
        denom += (x - mean_x) * (x - mean_x);
    }
    if denom == 0.0 {
        return None;
    }
    let slope = num / denom;
    Some((slope, mean_y - slope * mean_x))
}

fn price_color(value: f64, lo: f64, hi: f64) -> RGBColor {
    if hi <= lo {
        return ViridisRGB.get_color(0.5f32);
    }
    ViridisRGB.get_color_normalized(value as f32, lo as f32, hi as f32)
}

/// The `k` most frequent categories, descending; ties keep first-encounter
/// order (stable sort over insertion order).
fn top_categories(pairs: &[(String, f64)], k: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for (category, _) in pairs {
        match counts.iter_mut().find(|(c, _)| c == category) {
            Some(entry) => entry.1 += 1,
            None => counts.push((category.clone(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(k).map(|(c, _)| c).collect()
}
