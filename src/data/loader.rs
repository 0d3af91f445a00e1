//! CSV Loader Module
//! Reads listing exports into DataFrames using Polars.

use polars::prelude::*;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("failed to load CSV {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: PolarsError,
    },
    #[error("{path} contains no rows")]
    Empty { path: String },
}

/// Load a listing export into a DataFrame.
///
/// Schema is inferred from the first 10k rows; cells that fail to parse
/// become nulls and are left for the cleaning stage to drop.
pub fn load_csv(path: &Path) -> Result<DataFrame, LoaderError> {
    // Use lazy evaluation for memory efficiency, then collect
    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(10_000))
        .with_ignore_errors(true)
        .finish()
        .and_then(|lazy| lazy.collect())
        .map_err(|source| LoaderError::Csv {
            path: path.display().to_string(),
            source,
        })?;

    if df.height() == 0 {
        return Err(LoaderError::Empty {
            path: path.display().to_string(),
        });
    }

    info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "loaded listing export"
    );
    Ok(df)
}
