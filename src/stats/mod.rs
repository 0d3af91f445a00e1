//! Stats module - descriptive statistics and correlation

mod calculator;

pub use calculator::{
    correlation_matrix, describe, numeric_columns, numeric_subtable, pearson, ColumnSummary,
    CorrelationMatrix, StatsError, SummaryTable,
};
