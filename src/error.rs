//! Error types for salesbase using snafu.
//!
//! One enum per stage of the job, aggregated by [`PipelineError`]. Context
//! selectors are public so each module can attach its own context.

use snafu::prelude::*;
use std::path::PathBuf;

// ============ Storage Errors ============

/// Errors raised by the object storage backends underneath the store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error"))]
    S3Config { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition.
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Source path is empty.
    #[snafu(display("Source path cannot be empty"))]
    EmptySourcePath,

    /// Store URL is empty.
    #[snafu(display("Store URL cannot be empty"))]
    EmptyStoreUrl,

    /// Delimiter must be exactly one ASCII character.
    #[snafu(display("Delimiter must be a single ASCII character, got {delimiter:?}"))]
    InvalidDelimiter { delimiter: String },

    /// The top-products report needs at least one entry.
    #[snafu(display("report.top_products must be greater than zero"))]
    ZeroTopProducts,

    /// Configured table name is not usable by the store.
    #[snafu(display("Invalid table name in configuration"))]
    TableName { source: StoreError },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {}", path.display()))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },
}

// ============ Dataset Errors ============

/// Errors raised while reading and cleaning the input dataset.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatasetError {
    /// The input path does not resolve to a file.
    #[snafu(display("Dataset file not found: {}", path.display()))]
    FileNotFound { path: PathBuf },

    /// The input file exists but could not be opened.
    #[snafu(display("Failed to open dataset {}", path.display()))]
    OpenFile {
        source: std::io::Error,
        path: PathBuf,
    },

    /// The file is not valid delimited text.
    #[snafu(display("Failed to parse dataset {}", path.display()))]
    Csv { source: csv::Error, path: PathBuf },

    /// Header is missing one or more schema columns.
    #[snafu(display("Dataset is missing required columns: {}", columns.join(", ")))]
    MissingColumns { columns: Vec<String> },

    /// A record has more fields than the header declares.
    #[snafu(display("Line {line} has {found} fields, header declares {expected}"))]
    ExtraFields {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A numeric column holds text that is not a number.
    #[snafu(display("Invalid number {value:?} in column {column} at line {line}"))]
    InvalidNumber {
        line: u64,
        column: &'static str,
        value: String,
    },
}

// ============ Store Errors ============

/// Errors raised by the wide-column store client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// Underlying storage request failed (store unreachable or I/O failure).
    #[snafu(display("Store request failed"))]
    Storage { source: StorageError },

    /// The connection was already closed.
    #[snafu(display("Connection is closed"))]
    ConnectionClosed,

    /// Table name contains characters the store cannot address.
    #[snafu(display("Invalid table name: {name:?}"))]
    InvalidTableName { name: String },

    /// Row key contains characters the store cannot address.
    #[snafu(display("Invalid row key: {key:?}"))]
    InvalidRowKey { key: String },

    /// Table does not exist.
    #[snafu(display("Table '{table}' not found"))]
    TableNotFound { table: String },

    /// Table already exists.
    #[snafu(display("Table '{table}' already exists"))]
    TableExists { table: String },

    /// Table is disabled and rejects reads and writes.
    #[snafu(display("Table '{table}' is disabled"))]
    TableDisabled { table: String },

    /// Table must be disabled before it can be deleted.
    #[snafu(display("Table '{table}' must be disabled before deletion"))]
    TableEnabled { table: String },

    /// A table needs at least one column family.
    #[snafu(display("Table '{table}' must declare at least one column family"))]
    NoFamilies { table: String },

    /// Cell addressed a family the table does not declare.
    #[snafu(display("Table '{table}' has no column family '{family}'"))]
    UnknownFamily { table: String, family: String },

    /// Column family names are limited to ASCII letters, digits and `_`.
    #[snafu(display("Invalid column family name: {family:?}"))]
    InvalidFamilyName { family: String },

    /// Table descriptor could not be encoded or decoded.
    #[snafu(display("Corrupt descriptor for table '{table}'"))]
    DescriptorCodec {
        source: serde_json::Error,
        table: String,
    },

    /// Row document could not be encoded or decoded.
    #[snafu(display("Corrupt row '{key}' in table '{table}'"))]
    RowCodec {
        source: serde_json::Error,
        table: String,
        key: String,
    },
}

// ============ Ingest Errors ============

/// Errors raised by the bulk loader.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    /// Table could not be opened for writing.
    #[snafu(display("Failed to open table for loading"))]
    OpenTable { source: StoreError },

    /// A record has a missing value that cleaning does not cover.
    #[snafu(display("Record {row_key} has no value for {column}"))]
    MissingField {
        row_key: String,
        column: &'static str,
    },

    /// Writing a row failed.
    #[snafu(display("Failed to write row {row_key}"))]
    Write { source: StoreError, row_key: String },
}

// ============ Report Errors ============

/// Errors raised while scanning and reporting.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReportError {
    /// Scanning the table failed.
    #[snafu(display("Table scan failed"))]
    Scan { source: StoreError },

    /// A scanned row lacks a cell a report needs.
    #[snafu(display("Row {row_key} has no cell {column}"))]
    MissingCell {
        row_key: String,
        column: &'static str,
    },

    /// A numeric cell could not be parsed.
    #[snafu(display("Row {row_key} has invalid {column} value {value:?}"))]
    InvalidCell {
        row_key: String,
        column: &'static str,
        value: String,
    },

    /// Writing report output failed.
    #[snafu(display("Failed to write report output"))]
    Render { source: std::io::Error },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization and export.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Failed to write the metrics textfile.
    #[snafu(display("Failed to write metrics to {}", path.display()))]
    WriteTextfile {
        source: std::io::Error,
        path: PathBuf,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level errors that abort a run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Dataset loading failed.
    #[snafu(display("Dataset error"))]
    Dataset { source: DatasetError },

    /// Opening the store failed.
    #[snafu(display("Failed to connect to store"))]
    Connect { source: StoreError },

    /// Recreating the table failed.
    #[snafu(display("Schema error"))]
    Schema { source: StoreError },

    /// Bulk load failed.
    #[snafu(display("Load error"))]
    Ingest { source: IngestError },

    /// Preview or reporting failed.
    #[snafu(display("Report error"))]
    Report { source: ReportError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },
}

impl PipelineError {
    /// Check if this error means the target table vanished mid-run.
    pub fn is_table_not_found(&self) -> bool {
        match self {
            PipelineError::Ingest {
                source:
                    IngestError::Write {
                        source: StoreError::TableNotFound { .. },
                        ..
                    }
                    | IngestError::OpenTable {
                        source: StoreError::TableNotFound { .. },
                    },
            } => true,
            PipelineError::Report {
                source:
                    ReportError::Scan {
                        source: StoreError::TableNotFound { .. },
                    },
            } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_not_found_detection() {
        let missing = || StoreError::TableNotFound {
            table: "sales".to_string(),
        };

        let open = PipelineError::Ingest {
            source: IngestError::OpenTable { source: missing() },
        };
        let write = PipelineError::Ingest {
            source: IngestError::Write {
                source: missing(),
                row_key: "row_0".to_string(),
            },
        };
        let scan = PipelineError::Report {
            source: ReportError::Scan { source: missing() },
        };
        assert!(open.is_table_not_found());
        assert!(write.is_table_not_found());
        assert!(scan.is_table_not_found());

        let schema = PipelineError::Schema { source: missing() };
        let closed = PipelineError::Ingest {
            source: IngestError::OpenTable {
                source: StoreError::ConnectionClosed,
            },
        };
        assert!(!schema.is_table_not_found());
        assert!(!closed.is_table_not_found());
    }

    #[test]
    fn test_missing_columns_message_lists_all() {
        let err = DatasetError::MissingColumns {
            columns: vec!["Country".to_string(), "UnitPrice".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Dataset is missing required columns: Country, UnitPrice"
        );
    }
}
