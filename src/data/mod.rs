//! Data module - CSV loading, merging and cleaning

mod loader;
mod processor;

pub use loader::{load_csv, LoaderError};
pub use processor::{
    category_price_pairs, clean, coerce_price, column_f64, combine, format_price,
    is_numeric_dtype, paired_f64, parse_display_price, with_display_price, CleanOptions,
    CleanReport, ProcessorError, DISPLAY_PRICE_COLUMN, PRICE_COLUMN,
};
