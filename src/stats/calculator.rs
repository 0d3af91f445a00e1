//! Statistics Calculator Module
//! Descriptive statistics and Pearson correlation over the numeric columns.

use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::data::{column_f64, is_numeric_dtype, ProcessorError};

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Data(#[from] ProcessorError),
    #[error("table has no numeric columns")]
    NoNumericColumns,
}

/// describe()-style statistics for one numeric column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Summaries for every numeric column of a table.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryTable {
    pub columns: Vec<ColumnSummary>,
}

/// Pairwise Pearson coefficients, row-major and symmetric.
///
/// The diagonal is pinned to 1.0; off-diagonal cells are NaN when either
/// column has zero variance or fewer than two values.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.columns.len() + col]
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Names of the Float*/Int*/UInt* columns, in table order.
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_numeric_dtype(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

/// Projection of the table onto its numeric columns.
pub fn numeric_subtable(df: &DataFrame) -> Result<DataFrame, StatsError> {
    let names = numeric_columns(df);
    if names.is_empty() {
        return Err(StatsError::NoNumericColumns);
    }
    Ok(df.select(names)?)
}

/// Compute per-column descriptive statistics, columns in parallel.
pub fn describe(df: &DataFrame) -> Result<SummaryTable, StatsError> {
    let names = numeric_columns(df);
    if names.is_empty() {
        return Err(StatsError::NoNumericColumns);
    }

    let extracted: Vec<Vec<f64>> = names
        .iter()
        .map(|name| column_f64(df, name))
        .collect::<Result<_, _>>()?;

    let columns: Vec<ColumnSummary> = names
        .par_iter()
        .zip(extracted.par_iter())
        .map(|(name, values)| summarize(name, values))
        .collect();

    debug!(columns = columns.len(), "computed summary statistics");
    Ok(SummaryTable { columns })
}

fn summarize(name: &str, values: &[f64]) -> ColumnSummary {
    let n = values.len();
    if n == 0 {
        return ColumnSummary {
            name: name.to_string(),
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            q25: f64::NAN,
            median: f64::NAN,
            q75: f64::NAN,
            max: f64::NAN,
        };
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };

    ColumnSummary {
        name: name.to_string(),
        count: n,
        mean,
        std: variance.sqrt(),
        min: sorted[0],
        q25: percentile(&sorted, 25.0),
        median: percentile(&sorted, 50.0),
        q75: percentile(&sorted, 75.0),
        max: sorted[n - 1],
    }
}

/// Percentile by linear interpolation (NumPy compatible).
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    let n = sorted_values.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted_values[0];
    }

    let rank = (p / 100.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (rank.ceil() as usize).min(n - 1);
    let frac = rank - lower as f64;

    if lower == upper {
        sorted_values[lower]
    } else {
        sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
    }
}

/// Pearson correlation coefficient.
///
/// NaN when there are fewer than two points or either side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }

    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        f64::NAN
    } else {
        cov / denom
    }
}

/// Pairwise correlation over the numeric columns, pairs in parallel.
pub fn correlation_matrix(df: &DataFrame) -> Result<CorrelationMatrix, StatsError> {
    let names = numeric_columns(df);
    if names.is_empty() {
        return Err(StatsError::NoNumericColumns);
    }

    let series: Vec<Vec<f64>> = names
        .iter()
        .map(|name| column_f64(df, name))
        .collect::<Result<_, _>>()?;

    let n = names.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i..n).map(move |j| (i, j)))
        .collect();

    let computed: Vec<((usize, usize), f64)> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let r = if i == j {
                1.0
            } else {
                pearson(&series[i], &series[j])
            };
            ((i, j), r)
        })
        .collect();

    let mut values = vec![f64::NAN; n * n];
    for ((i, j), r) in computed {
        values[i * n + j] = r;
        values[j * n + i] = r;
    }

    debug!(columns = n, "computed correlation matrix");
    Ok(CorrelationMatrix {
        columns: names,
        values,
    })
}

fn clip(name: &str) -> String {
    name.chars().take(13).collect()
}

impl fmt::Display for SummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<7}", "")?;
        for column in &self.columns {
            write!(f, "{:>14}", clip(&column.name))?;
        }
        writeln!(f)?;

        write!(f, "{:<7}", "count")?;
        for column in &self.columns {
            write!(f, "{:>14}", column.count)?;
        }
        writeln!(f)?;

        let rows: [(&str, fn(&ColumnSummary) -> f64); 7] = [
            ("mean", |c| c.mean),
            ("std", |c| c.std),
            ("min", |c| c.min),
            ("25%", |c| c.q25),
            ("50%", |c| c.median),
            ("75%", |c| c.q75),
            ("max", |c| c.max),
        ];
        for (label, value) in rows {
            write!(f, "{label:<7}")?;
            for column in &self.columns {
                write!(f, "{:>14.4}", value(column))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for CorrelationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<14}", "")?;
        for name in &self.columns {
            write!(f, "{:>14}", clip(name))?;
        }
        writeln!(f)?;

        for (i, name) in self.columns.iter().enumerate() {
            write!(f, "{:<14}", clip(name))?;
            for j in 0..self.columns.len() {
                write!(f, "{:>14.4}", self.get(i, j))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::with_display_price;

    fn listing_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("price".into(), vec![10.0f64, 20.0]),
            Column::new("sold".into(), vec![5i64, 2]),
            Column::new("type".into(), vec!["Cologne", "Cologne"]),
        ])
        .unwrap()
    }

    #[test]
    fn numeric_columns_skip_strings() {
        let df = with_display_price(&listing_frame()).unwrap();
        assert_eq!(numeric_columns(&df), ["price", "sold"]);
    }

    #[test]
    fn numeric_subtable_projects_in_order() {
        let table = numeric_subtable(&listing_frame()).unwrap();
        assert_eq!(table.width(), 2);
        assert_eq!(table.height(), 2);
    }

    #[test]
    fn subtable_of_text_only_table_is_an_error() {
        let df = DataFrame::new(vec![Column::new("type".into(), vec!["a", "b"])]).unwrap();
        assert!(matches!(
            numeric_subtable(&df),
            Err(StatsError::NoNumericColumns)
        ));
    }

    #[test]
    fn describe_matches_hand_computed_values() {
        let summary = describe(&listing_frame()).unwrap();
        let price = &summary.columns[0];

        assert_eq!(price.name, "price");
        assert_eq!(price.count, 2);
        assert!((price.mean - 15.0).abs() < 1e-12);
        assert!((price.std - 50.0f64.sqrt()).abs() < 1e-12);
        assert!((price.min - 10.0).abs() < 1e-12);
        assert!((price.q25 - 12.5).abs() < 1e-12);
        assert!((price.median - 15.0).abs() < 1e-12);
        assert!((price.q75 - 17.5).abs() < 1e-12);
        assert!((price.max - 20.0).abs() < 1e-12);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&sorted, 25.0) - 1.75).abs() < 1e-12);
        assert!((percentile(&sorted, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&sorted, 100.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn two_point_correlation_is_defined() {
        // two listings: (price 10, sold 5) and (price 20, sold 2)
        let r = pearson(&[10.0, 20.0], &[5.0, 2.0]);
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_series_has_undefined_correlation() {
        assert!(pearson(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]).is_nan());
        assert!(pearson(&[1.0], &[2.0]).is_nan());
    }

    #[test]
    fn perfectly_linear_series_correlate_to_one() {
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let df = DataFrame::new(vec![
            Column::new("price".into(), vec![10.0f64, 20.0, 30.0]),
            Column::new("sold".into(), vec![6i64, 4, 2]),
            Column::new("available".into(), vec![7.0f64, 7.0, 7.0]),
        ])
        .unwrap();

        let matrix = correlation_matrix(&df).unwrap();
        assert_eq!(matrix.len(), 3);
        for i in 0..3 {
            assert_eq!(matrix.get(i, i), 1.0);
            for j in 0..3 {
                let a = matrix.get(i, j);
                let b = matrix.get(j, i);
                assert!(a == b || (a.is_nan() && b.is_nan()));
            }
        }
        // price and sold move in exact opposition
        assert!((matrix.get(0, 1) + 1.0).abs() < 1e-12);
        // zero-variance column correlates with nothing
        assert!(matrix.get(0, 2).is_nan());
    }

    #[test]
    fn display_renders_one_row_per_statistic() {
        let rendered = describe(&listing_frame()).unwrap().to_string();
        for label in ["count", "mean", "std", "min", "25%", "50%", "75%", "max"] {
            assert!(rendered.contains(label), "missing {label}");
        }
    }
}
