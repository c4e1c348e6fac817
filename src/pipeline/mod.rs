//! The load-and-report job.
//!
//! Stages run strictly in sequence on one connection:
//!
//! 1. load and clean the dataset
//! 2. drop and recreate the table
//! 3. bulk load one row per record
//! 4. preview the first rows
//! 5. run the reports
//!
//! Any failure aborts the run. The connection is closed on every path.

use snafu::prelude::*;
use std::io::Write;
use tracing::{debug, info};

use crate::config::Config;
use crate::dataset::{SalesRecord, load_dataset};
use crate::error::{
    ConfigSnafu, ConnectSnafu, DatasetSnafu, IngestSnafu, PipelineError, ReportSnafu, SchemaSnafu,
};
use crate::ingest::bulk_load;
use crate::report::{self, render_preview, render_summary};
use crate::schema::recreate_table;
use crate::store::Connection;

/// Statistics about the pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub records_loaded: usize,
    pub defaults_applied: usize,
    pub table_dropped: bool,
    pub rows_dropped: usize,
    pub rows_written: usize,
    pub rows_scanned: usize,
    pub regions: usize,
    pub categories: usize,
}

/// Run the whole job, writing the preview and reports to `out`.
pub async fn run_pipeline(
    config: &Config,
    out: &mut impl Write,
) -> Result<PipelineStats, PipelineError> {
    let options = config.source.load_options().context(ConfigSnafu)?;
    let dataset = load_dataset(&config.source.path, &options).context(DatasetSnafu)?;

    let conn = Connection::open(&config.store.url, config.store.storage_options.clone())
        .await
        .context(ConnectSnafu)?;
    info!("Connected to store at {}", conn.storage().canonical_url());

    let mut stats = PipelineStats {
        records_loaded: dataset.len(),
        defaults_applied: dataset.cleaning.total(),
        ..Default::default()
    };
    let result = run_stages(config, &conn, &dataset.records, &mut stats, out).await;

    conn.close();
    result?;
    Ok(stats)
}

async fn run_stages(
    config: &Config,
    conn: &Connection,
    records: &[SalesRecord],
    stats: &mut PipelineStats,
    out: &mut impl Write,
) -> Result<(), PipelineError> {
    let table_name = config.store.table.as_str();

    let recreation = recreate_table(conn, table_name)
        .await
        .context(SchemaSnafu)?;
    stats.table_dropped = recreation.dropped;
    stats.rows_dropped = recreation.rows_dropped;

    let load = bulk_load(conn, table_name, records, config.store.row_keys)
        .await
        .context(IngestSnafu)?;
    stats.rows_written = load.rows_written;
    debug!("Bulk load took {:?}", load.duration);

    let table = recreation.table;
    let limit = config.report.preview_rows;
    let rows = report::preview(&table, limit).await.context(ReportSnafu)?;
    render_preview(out, &rows, limit).context(ReportSnafu)?;

    let top_n = config.report.top_products;
    let summary = if config.report.single_pass {
        report::summarize(&table, top_n).await
    } else {
        report::summarize_by_scans(&table, top_n).await
    }
    .context(ReportSnafu)?;
    render_summary(out, &summary).context(ReportSnafu)?;

    stats.rows_scanned = summary.rows_scanned + rows.len();
    stats.regions = summary.regions.len();
    stats.categories = summary.categories.len();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatasetError;
    use tempfile::{NamedTempFile, TempDir};

    const HEADER: &str = "InvoiceNo,InvoiceDate,Quantity,CustomerID,Country,StockCode,Description,UnitPrice,Category,PaymentMethod,ShippingCost,SalesChannel,ReturnStatus,ShipmentProvider,WarehouseLocation,OrderPriority";

    fn dataset_file(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    fn config_for(source: &NamedTempFile, store: &TempDir) -> Config {
        let mut config = Config::default();
        config.source.path = source.path().to_path_buf();
        config.store.url = format!("file://{}", store.path().display());
        config.metrics.enabled = false;
        config
    }

    #[tokio::test]
    async fn test_rerun_replaces_table() {
        let source = dataset_file(&[
            "1,2020-01-01,2,10,UK,S1,Mug,1.5,Kitchen,Card,1.0,Online,Not Returned,UPS,London,High",
            "2,2020-01-02,1,11,France,S2,Lamp,10,Home,Cash,,Store,Returned,DHL,Paris,Low",
        ]);
        let store = TempDir::new().unwrap();
        let config = config_for(&source, &store);

        let mut out = Vec::new();
        let first = run_pipeline(&config, &mut out).await.unwrap();
        assert!(!first.table_dropped);
        assert_eq!(first.rows_written, 2);

        let second = run_pipeline(&config, &mut Vec::new()).await.unwrap();
        assert!(second.table_dropped);
        assert_eq!(second.rows_dropped, 2);
        assert_eq!(second.rows_written, 2);
        assert_eq!(second.regions, 2);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("France: $10.00"));
        assert!(text.contains("UK: $3.00"));
    }

    #[tokio::test]
    async fn test_independent_scans_report_the_same() {
        let source = dataset_file(&[
            "1,2020-01-01,2,10,UK,S1,Mug,1.5,Kitchen,Card,1.0,Online,Not Returned,UPS,London,High",
            "2,2020-01-02,1,11,France,S2,Lamp,10,Home,Cash,,Store,Returned,DHL,Paris,Low",
        ]);
        let store = TempDir::new().unwrap();
        let mut config = config_for(&source, &store);

        let mut scans = Vec::new();
        let stats = run_pipeline(&config, &mut scans).await.unwrap();
        assert_eq!(stats.rows_scanned, 2 * 3 + 2);

        config.report.single_pass = true;
        let mut single = Vec::new();
        let stats = run_pipeline(&config, &mut single).await.unwrap();
        assert_eq!(stats.rows_scanned, 2 + 2);

        assert_eq!(single, scans);
    }

    #[tokio::test]
    async fn test_missing_dataset_touches_nothing() {
        let store = TempDir::new().unwrap();
        let mut config = Config::default();
        config.source.path = store.path().join("missing.csv");
        config.store.url = format!("file://{}", store.path().display());

        let err = run_pipeline(&config, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Dataset {
                source: DatasetError::FileNotFound { .. }
            }
        ));
        assert_eq!(std::fs::read_dir(store.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_uncovered_missing_value_aborts_load() {
        let source = dataset_file(&[
            "1,2020-01-01,2,10,UK,S1,Mug,1.5,Kitchen,Card,1.0,Online,Not Returned,UPS,London,High",
            "2,2020-01-02,1,11,,S2,Lamp,10,Home,Cash,,Store,Returned,DHL,Paris,Low",
        ]);
        let store = TempDir::new().unwrap();
        let config = config_for(&source, &store);

        let err = run_pipeline(&config, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Ingest { .. }));

        let conn = Connection::open(&config.store.url, Default::default())
            .await
            .unwrap();
        let table = conn.table(&config.store.table).await.unwrap();
        assert_eq!(table.count_rows().await.unwrap(), 1);
    }
}
