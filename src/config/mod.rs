//! Configuration parsing and validation.
//!
//! Every section is optional; a missing section or field falls back to the
//! defaults the job has always run with.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dataset::LoadOptions;
use crate::error::{
    ConfigError, EmptySourcePathSnafu, EmptyStoreUrlSnafu, InvalidDelimiterSnafu, ReadFileSnafu,
    TableNameSnafu, YamlParseSnafu, ZeroTopProductsSnafu,
};
use crate::ingest::RowKeyStrategy;
use crate::report::{DEFAULT_PREVIEW_ROWS, DEFAULT_TOP_PRODUCTS};
use crate::store::validate_table_name;

/// Main configuration structure for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub report: ReportConfig,
    /// Metrics configuration (optional, enabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Input dataset location and format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the delimited sales file.
    #[serde(default = "default_source_path")]
    pub path: PathBuf,

    /// Field delimiter, a single ASCII character (default: ",").
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_source_path() -> PathBuf {
    PathBuf::from("/mnt/data/online_sales_dataset.csv")
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl SourceConfig {
    /// Reader options derived from this section.
    pub fn load_options(&self) -> Result<LoadOptions, ConfigError> {
        let delimiter = match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => *byte,
            _ => {
                return InvalidDelimiterSnafu {
                    delimiter: &self.delimiter,
                }
                .fail();
            }
        };
        Ok(LoadOptions { delimiter })
    }
}

/// Target store and table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store location.
    /// Examples: "file:///var/lib/salesbase", "s3://bucket/salesbase", "memory://"
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Table that is recreated and loaded on every run.
    #[serde(default = "default_table")]
    pub table: String,

    /// Storage options (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,

    /// How row keys are derived (default: ordinal).
    #[serde(default)]
    pub row_keys: RowKeyStrategy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            table: default_table(),
            storage_options: HashMap::new(),
            row_keys: RowKeyStrategy::default(),
        }
    }
}

fn default_store_url() -> String {
    "file:///tmp/salesbase".to_string()
}

fn default_table() -> String {
    "data_science_salaries".to_string()
}

/// Preview and report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Rows shown by the scan preview (default: 5).
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,

    /// Entries in the best-seller report (default: 5).
    #[serde(default = "default_top_products")]
    pub top_products: usize,

    /// Build all reports from one scan instead of one scan each (default: false).
    #[serde(default = "default_single_pass")]
    pub single_pass: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            preview_rows: default_preview_rows(),
            top_products: default_top_products(),
            single_pass: default_single_pass(),
        }
    }
}

fn default_preview_rows() -> usize {
    DEFAULT_PREVIEW_ROWS
}

fn default_top_products() -> usize {
    DEFAULT_TOP_PRODUCTS
}

fn default_single_pass() -> bool {
    false
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// File the Prometheus text exposition is written to when the run ends.
    #[serde(default)]
    pub textfile_path: Option<PathBuf>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            textfile_path: None,
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            !self.source.path.as_os_str().is_empty(),
            EmptySourcePathSnafu
        );
        self.source.load_options()?;
        ensure!(!self.store.url.trim().is_empty(), EmptyStoreUrlSnafu);
        validate_table_name(&self.store.table).context(TableNameSnafu)?;
        ensure!(self.report.top_products > 0, ZeroTopProductsSnafu);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.source.path,
            PathBuf::from("/mnt/data/online_sales_dataset.csv")
        );
        assert_eq!(config.store.table, "data_science_salaries");
        assert_eq!(config.store.row_keys, RowKeyStrategy::Ordinal);
        assert_eq!(config.report.preview_rows, 5);
        assert_eq!(config.report.top_products, 5);
        assert!(!config.report.single_pass);
        assert!(config.metrics.enabled);
        assert_eq!(config.source.load_options().unwrap().delimiter, b',');
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.store.url, "file:///tmp/salesbase");
    }

    #[test]
    fn test_config_yaml_parsing() {
        let yaml = r#"
source:
  path: /data/sales.csv
  delimiter: ";"

store:
  url: "s3://bucket/salesbase"
  table: online_sales
  row_keys: invoice_line
  storage_options:
    aws_region: eu-west-1

report:
  top_products: 10
  single_pass: true

metrics:
  textfile_path: /var/lib/node_exporter/salesbase.prom
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.source.load_options().unwrap().delimiter, b';');
        assert_eq!(config.store.table, "online_sales");
        assert_eq!(config.store.row_keys, RowKeyStrategy::InvoiceLine);
        assert_eq!(
            config.store.storage_options.get("aws_region").map(String::as_str),
            Some("eu-west-1")
        );
        assert_eq!(config.report.top_products, 10);
        assert_eq!(config.report.preview_rows, 5);
        assert!(config.report.single_pass);
        assert!(config.metrics.enabled);
        assert!(config.metrics.textfile_path.is_some());
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            ("source:\n  path: ''\n", "source path"),
            ("source:\n  delimiter: ',,'\n", "delimiter"),
            ("source:\n  delimiter: 'é'\n", "delimiter"),
            ("store:\n  url: ' '\n", "store url"),
            ("store:\n  table: 'a/b'\n", "table"),
            ("report:\n  top_products: 0\n", "top products"),
        ];
        for (yaml, what) in cases {
            assert!(Config::from_yaml(yaml).is_err(), "expected invalid {what}");
        }

        assert!(matches!(
            Config::from_yaml("report:\n  top_products: 0\n"),
            Err(ConfigError::ZeroTopProducts)
        ));
        assert!(matches!(
            Config::from_yaml("store:\n  table: '_x'\n"),
            Err(ConfigError::TableName { .. })
        ));
    }

    #[test]
    fn test_unknown_row_key_strategy() {
        let err = Config::from_yaml("store:\n  row_keys: random\n").unwrap_err();
        assert!(matches!(err, ConfigError::YamlParse { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "store:\n  url: memory://\n").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.store.url, "memory://");

        let err = Config::from_file("/nonexistent/salesbase.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
