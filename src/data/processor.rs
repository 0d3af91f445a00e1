//! Data Processor Module
//! Merging, cleaning and the price display transform.

use polars::prelude::*;
use thiserror::Error;
use tracing::info;

/// Numeric price column shared by both input exports.
pub const PRICE_COLUMN: &str = "price";
/// Presentational price column added by [`with_display_price`].
pub const DISPLAY_PRICE_COLUMN: &str = "display_price";

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("no input tables to combine")]
    NoInput,
    #[error("column '{0}' not found in table")]
    MissingColumn(String),
    #[error("cannot parse '{value}' as a price")]
    PriceParse { value: String },
    #[error("no rows left after cleaning")]
    EmptyAfterClean,
}

/// Cleaning policy.
///
/// `null_subset: None` reproduces the all-or-nothing policy of dropping any
/// row with a missing value in any column; a subset restricts the null check
/// to the named columns.
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    pub null_subset: Option<Vec<String>>,
}

/// Row accounting for one cleaning pass.
#[derive(Debug, Clone, Copy)]
pub struct CleanReport {
    pub rows_in: usize,
    pub dropped_null: usize,
    pub dropped_duplicate: usize,
    pub rows_out: usize,
}

/// Concatenate tables vertically, preserving the first table's column order.
pub fn combine(frames: &[DataFrame]) -> Result<DataFrame, ProcessorError> {
    let (first, rest) = frames.split_first().ok_or(ProcessorError::NoInput)?;

    let mut combined = first.clone();
    for frame in rest {
        combined.vstack_mut(frame)?;
    }
    Ok(combined)
}

/// Drop rows with missing values, then exact-duplicate rows (first kept).
pub fn clean(
    df: &DataFrame,
    options: &CleanOptions,
) -> Result<(DataFrame, CleanReport), ProcessorError> {
    if let Some(subset) = &options.null_subset {
        for name in subset {
            if df.column(name).is_err() {
                return Err(ProcessorError::MissingColumn(name.clone()));
            }
        }
    }

    let rows_in = df.height();

    let lazy = df.clone().lazy();
    let without_nulls = match &options.null_subset {
        Some(subset) => lazy.drop_nulls(Some(subset.iter().map(|c| col(c.as_str())).collect())),
        None => lazy.drop_nulls(None),
    }
    .collect()?;
    let dropped_null = rows_in - without_nulls.height();

    let deduped = without_nulls.unique_stable(None::<&[String]>, UniqueKeepStrategy::First, None)?;
    let dropped_duplicate = without_nulls.height() - deduped.height();
    let rows_out = deduped.height();

    if rows_out == 0 {
        return Err(ProcessorError::EmptyAfterClean);
    }

    info!(
        rows_in,
        dropped_null, dropped_duplicate, rows_out, "cleaned combined table"
    );
    Ok((
        deduped,
        CleanReport {
            rows_in,
            dropped_null,
            dropped_duplicate,
            rows_out,
        },
    ))
}

/// Format a numeric price for display, e.g. `9.5` -> `"$9.50"`.
///
/// Rounding follows `{:.2}` float formatting: nearest representable value,
/// ties to even.
pub fn format_price(value: f64) -> String {
    format!("${value:.2}")
}

/// Parse a display price back to its numeric value, e.g. `"$9.50"` -> `9.5`.
pub fn parse_display_price(text: &str) -> Option<f64> {
    text.trim().trim_start_matches('$').parse::<f64>().ok()
}

/// Ensure the price column is numeric.
///
/// Some exports carry prices as already-formatted strings (`"$9.99"`); those
/// are stripped and parsed. A numeric column passes through unchanged.
pub fn coerce_price(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
    let column = df
        .column(PRICE_COLUMN)
        .map_err(|_| ProcessorError::MissingColumn(PRICE_COLUMN.to_string()))?;

    if is_numeric_dtype(column.dtype()) {
        return Ok(df.clone());
    }

    let series = column.as_materialized_series();
    let mut parsed: Vec<Option<f64>> = Vec::with_capacity(series.len());
    for i in 0..series.len() {
        let value = series.get(i)?;
        if value.is_null() {
            parsed.push(None);
            continue;
        }
        let text = value.to_string();
        let text = text.trim_matches('"');
        match parse_display_price(text) {
            Some(v) => parsed.push(Some(v)),
            None => {
                return Err(ProcessorError::PriceParse {
                    value: text.to_string(),
                })
            }
        }
    }

    let mut out = df.clone();
    out.with_column(Column::new(PRICE_COLUMN.into(), parsed))?;
    Ok(out)
}

/// Append the `display_price` column. The numeric price column is kept.
pub fn with_display_price(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
    let column = df
        .column(PRICE_COLUMN)
        .map_err(|_| ProcessorError::MissingColumn(PRICE_COLUMN.to_string()))?;
    let as_f64 = column.cast(&DataType::Float64)?;
    let ca = as_f64.f64()?;

    let display: Vec<Option<String>> = ca.into_iter().map(|v| v.map(format_price)).collect();

    let mut out = df.clone();
    out.with_column(Column::new(DISPLAY_PRICE_COLUMN.into(), display))?;
    Ok(out)
}

pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Extract a column as f64 values, skipping nulls and NaNs.
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>, ProcessorError> {
    let column = df
        .column(name)
        .map_err(|_| ProcessorError::MissingColumn(name.to_string()))?;
    let as_f64 = column.cast(&DataType::Float64)?;
    let ca = as_f64.f64()?;
    Ok(ca
        .into_iter()
        .filter_map(|v| v)
        .filter(|v| !v.is_nan())
        .collect())
}

/// Extract two columns as row-aligned (x, y) pairs, skipping rows where
/// either value is missing.
pub fn paired_f64(df: &DataFrame, x: &str, y: &str) -> Result<Vec<(f64, f64)>, ProcessorError> {
    let x_col = df
        .column(x)
        .map_err(|_| ProcessorError::MissingColumn(x.to_string()))?
        .cast(&DataType::Float64)?;
    let y_col = df
        .column(y)
        .map_err(|_| ProcessorError::MissingColumn(y.to_string()))?
        .cast(&DataType::Float64)?;
    let xs = x_col.f64()?;
    let ys = y_col.f64()?;

    Ok(xs
        .into_iter()
        .zip(ys.into_iter())
        .filter_map(|pair| match pair {
            (Some(x), Some(y)) if !x.is_nan() && !y.is_nan() => Some((x, y)),
            _ => None,
        })
        .collect())
}

/// Extract (category, value) pairs, skipping rows where either is missing.
pub fn category_price_pairs(
    df: &DataFrame,
    category: &str,
    value: &str,
) -> Result<Vec<(String, f64)>, ProcessorError> {
    let cat_column = df
        .column(category)
        .map_err(|_| ProcessorError::MissingColumn(category.to_string()))?;
    let cat_series = cat_column.as_materialized_series();
    let value_col = df
        .column(value)
        .map_err(|_| ProcessorError::MissingColumn(value.to_string()))?
        .cast(&DataType::Float64)?;
    let values = value_col.f64()?;

    let mut pairs = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        if let (Ok(cat), Some(v)) = (cat_series.get(i), values.get(i)) {
            if !cat.is_null() && !v.is_nan() {
                pairs.push((cat.to_string().trim_matches('"').to_string(), v));
            }
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listings_a() -> DataFrame {
        DataFrame::new(vec![
            Column::new("price".into(), vec![10.0f64, 35.5]),
            Column::new("sold".into(), vec![5i64, 12]),
            Column::new("type".into(), vec!["Cologne", "Eau de Parfum"]),
        ])
        .unwrap()
    }

    fn listings_b() -> DataFrame {
        DataFrame::new(vec![
            Column::new("price".into(), vec![20.0f64]),
            Column::new("sold".into(), vec![2i64]),
            Column::new("type".into(), vec!["Cologne"]),
        ])
        .unwrap()
    }

    #[test]
    fn combine_sums_row_counts() {
        let combined = combine(&[listings_a(), listings_b()]).unwrap();
        assert_eq!(combined.height(), 3);
        assert_eq!(
            combined.get_column_names(),
            listings_a().get_column_names()
        );
    }

    #[test]
    fn combine_rejects_mismatched_schemas() {
        let other = DataFrame::new(vec![Column::new("brand".into(), vec!["Acme"])]).unwrap();
        assert!(combine(&[listings_a(), other]).is_err());
    }

    #[test]
    fn combine_requires_input() {
        assert!(matches!(combine(&[]), Err(ProcessorError::NoInput)));
    }

    #[test]
    fn clean_drops_whole_row_on_any_null() {
        let df = DataFrame::new(vec![
            Column::new("price".into(), vec![Some(10.0f64), Some(20.0)]),
            Column::new("sold".into(), vec![Some(5i64), None]),
            Column::new("type".into(), vec!["Cologne", "Spray"]),
        ])
        .unwrap();

        let (cleaned, report) = clean(&df, &CleanOptions::default()).unwrap();
        assert_eq!(cleaned.height(), 1);
        assert_eq!(report.rows_in, 2);
        assert_eq!(report.dropped_null, 1);
        assert_eq!(report.rows_out, 1);
    }

    #[test]
    fn clean_subset_ignores_nulls_elsewhere() {
        let df = DataFrame::new(vec![
            Column::new("price".into(), vec![Some(10.0f64), Some(20.0)]),
            Column::new("sold".into(), vec![Some(5i64), None]),
            Column::new("type".into(), vec!["Cologne", "Spray"]),
        ])
        .unwrap();

        let options = CleanOptions {
            null_subset: Some(vec!["price".to_string()]),
        };
        let (cleaned, report) = clean(&df, &options).unwrap();
        assert_eq!(cleaned.height(), 2);
        assert_eq!(report.dropped_null, 0);
    }

    #[test]
    fn clean_subset_requires_known_columns() {
        let options = CleanOptions {
            null_subset: Some(vec!["brand".to_string()]),
        };
        assert!(matches!(
            clean(&listings_a(), &options),
            Err(ProcessorError::MissingColumn(_))
        ));
    }

    #[test]
    fn clean_removes_exact_duplicates_and_is_idempotent() {
        let df = combine(&[listings_a(), listings_a()]).unwrap();

        let (once, report) = clean(&df, &CleanOptions::default()).unwrap();
        assert_eq!(once.height(), 2);
        assert_eq!(report.dropped_duplicate, 2);

        let (twice, report) = clean(&once, &CleanOptions::default()).unwrap();
        assert_eq!(twice.height(), once.height());
        assert_eq!(report.dropped_duplicate, 0);
    }

    #[test]
    fn clean_rejects_fully_empty_result() {
        let df = DataFrame::new(vec![
            Column::new("price".into(), vec![None::<f64>]),
            Column::new("sold".into(), vec![Some(1i64)]),
        ])
        .unwrap();
        assert!(matches!(
            clean(&df, &CleanOptions::default()),
            Err(ProcessorError::EmptyAfterClean)
        ));
    }

    #[test]
    fn format_price_prefixes_and_rounds_to_cents() {
        assert_eq!(format_price(9.5), "$9.50");
        assert_eq!(format_price(10.0), "$10.00");
        assert_eq!(format_price(0.0), "$0.00");
        // 20.005 sits just below the tie in binary and rounds down
        assert_eq!(format_price(20.005), "$20.00");
    }

    #[test]
    fn display_price_round_trips_within_a_cent() {
        for value in [0.0, 0.01, 9.5, 10.0, 19.99, 123.456] {
            let parsed = parse_display_price(&format_price(value)).unwrap();
            assert!((parsed - value).abs() < 0.005 + 1e-9, "value {value}");
        }
    }

    #[test]
    fn parse_display_price_rejects_garbage() {
        assert_eq!(parse_display_price("$9.50"), Some(9.5));
        assert_eq!(parse_display_price("12.00"), Some(12.0));
        assert_eq!(parse_display_price("free"), None);
        assert_eq!(parse_display_price(""), None);
    }

    #[test]
    fn coerce_price_parses_string_prices() {
        let df = DataFrame::new(vec![
            Column::new("price".into(), vec!["$10.00", "$35.50"]),
            Column::new("sold".into(), vec![5i64, 12]),
        ])
        .unwrap();

        let coerced = coerce_price(&df).unwrap();
        assert!(is_numeric_dtype(
            coerced.column(PRICE_COLUMN).unwrap().dtype()
        ));
        assert_eq!(column_f64(&coerced, PRICE_COLUMN).unwrap(), vec![10.0, 35.5]);
    }

    #[test]
    fn coerce_price_rejects_unparsable_values() {
        let df = DataFrame::new(vec![Column::new("price".into(), vec!["$10.00", "call us"])])
            .unwrap();
        assert!(matches!(
            coerce_price(&df),
            Err(ProcessorError::PriceParse { .. })
        ));
    }

    #[test]
    fn coerce_price_keeps_numeric_columns() {
        let coerced = coerce_price(&listings_a()).unwrap();
        assert_eq!(
            column_f64(&coerced, PRICE_COLUMN).unwrap(),
            column_f64(&listings_a(), PRICE_COLUMN).unwrap()
        );
    }

    #[test]
    fn display_price_is_added_alongside_numeric_price() {
        let df = with_display_price(&listings_a()).unwrap();

        assert!(is_numeric_dtype(df.column(PRICE_COLUMN).unwrap().dtype()));
        let display = df.column(DISPLAY_PRICE_COLUMN).unwrap();
        let series = display.as_materialized_series();
        let first = series.get(0).unwrap().to_string();
        assert_eq!(first.trim_matches('"'), "$10.00");
    }

    #[test]
    fn paired_extraction_is_row_aligned() {
        let pairs = paired_f64(&listings_a(), "sold", "price").unwrap();
        assert_eq!(pairs, vec![(5.0, 10.0), (12.0, 35.5)]);
    }

    #[test]
    fn category_pairs_skip_missing_rows() {
        let df = DataFrame::new(vec![
            Column::new("price".into(), vec![Some(10.0f64), Some(20.0), None]),
            Column::new("type".into(), vec![Some("Cologne"), None, Some("Spray")]),
        ])
        .unwrap();

        let pairs = category_price_pairs(&df, "type", "price").unwrap();
        assert_eq!(pairs, vec![("Cologne".to_string(), 10.0)]);
    }
}
