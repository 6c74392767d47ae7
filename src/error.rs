//! Error types for allotment list processing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading inputs or building the line parser.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Failed to read an input file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a CSV table.
    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Failed to open or read a spreadsheet workbook.
    #[error("failed to read workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    /// Table has no header row.
    #[error("table is empty: {path}")]
    EmptyTable { path: PathBuf },

    /// Required column not found in a table.
    #[error("required column '{column}' not found in {path}")]
    MissingColumn { column: String, path: PathBuf },

    /// Input file extension is not one we can read.
    #[error("unsupported input format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Layout configuration cannot drive the line parser.
    #[error("invalid layout configuration: {reason}")]
    InvalidLayout { reason: String },

    /// A range token could not be expanded.
    #[error("invalid range token '{token}'")]
    InvalidRange { token: String },

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// Result type for analyzer operations.
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Reason a single list line produced no record.
///
/// These never leave the parser; they are logged and collected in the
/// parse report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("no leading rank")]
    MissingRank,
    #[error("no roll number")]
    MissingIdentifier,
    #[error("no percentile after roll number")]
    MissingPercentile,
    #[error("percentile '{0}' is not a decimal")]
    InvalidPercentile(String),
    #[error("no location code after percentile")]
    MissingLocation,
    #[error("no category after location code")]
    MissingCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalyzerError::MissingColumn {
            column: "COLL".to_string(),
            path: PathBuf::from("options.csv"),
        };
        assert_eq!(
            err.to_string(),
            "required column 'COLL' not found in options.csv"
        );
    }

    #[test]
    fn test_line_error_display() {
        assert_eq!(
            LineError::InvalidPercentile("1.2.3".into()).to_string(),
            "percentile '1.2.3' is not a decimal"
        );
    }
}
