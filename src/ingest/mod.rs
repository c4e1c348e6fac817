//! Bulk loading of cleaned records into the sales table.
//!
//! Every record becomes one row, written with its own `put`. There is no
//! batching and no rollback: a failure midway leaves the rows written so far
//! in place.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::dataset::{
    CATEGORY, COUNTRY, CUSTOMER_ID, DESCRIPTION, INVOICE_DATE, INVOICE_NO, ORDER_PRIORITY,
    PAYMENT_METHOD, QUANTITY, RETURN_STATUS, SALES_CHANNEL, SHIPMENT_PROVIDER, SHIPPING_COST,
    STOCK_CODE, SalesRecord, UNIT_PRICE, WAREHOUSE_LOCATION,
};
use crate::emit;
use crate::error::{IngestError, MissingFieldSnafu, OpenTableSnafu, WriteSnafu};
use crate::metrics::events::{LoadCompleted, RowsWritten, TableRows};
use crate::schema::{METADATA, PRODUCT_DATA, SALES_DATA};
use crate::store::{Cells, Connection};

/// Text stored for a missing optional value.
const NAN: &str = "nan";

/// How row keys are derived from records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKeyStrategy {
    /// `row_<index>`, the zero-based position in the source file.
    #[default]
    Ordinal,
    /// `<InvoiceNo>_<n>`, where `n` counts earlier records of the same invoice.
    InvoiceLine,
}

/// Assigns row keys to records in load order.
#[derive(Debug, Default)]
struct RowKeys {
    strategy: RowKeyStrategy,
    next_ordinal: usize,
    lines: HashMap<String, usize>,
}

impl RowKeys {
    fn new(strategy: RowKeyStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    fn next(&mut self, record: &SalesRecord) -> String {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        match self.strategy {
            RowKeyStrategy::Ordinal => format!("row_{ordinal}"),
            RowKeyStrategy::InvoiceLine => {
                let invoice = record.invoice_no.as_deref().unwrap_or(NAN);
                let line = self.lines.entry(invoice.to_string()).or_insert(0);
                let key = format!("{invoice}_{line}");
                *line += 1;
                key
            }
        }
    }
}

/// Render a float the way the stored text is expected to read: shortest
/// round-trip digits, with `.0` kept on integral values.
pub fn encode_float(value: f64) -> String {
    if value.is_nan() {
        NAN.to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn required<'a>(
    value: &'a Option<String>,
    row_key: &str,
    column: &'static str,
) -> Result<&'a str, IngestError> {
    value
        .as_deref()
        .context(MissingFieldSnafu { row_key, column })
}

/// Map a record onto the three column families.
pub fn record_cells(record: &SalesRecord, row_key: &str) -> Result<Cells, IngestError> {
    let mut cells = Cells::new();

    cells.insert(
        SALES_DATA,
        INVOICE_NO,
        record.invoice_no.as_deref().unwrap_or(NAN),
    );
    cells.insert(SALES_DATA, INVOICE_DATE, record.invoice_date.as_str());
    cells.insert(SALES_DATA, QUANTITY, record.quantity.to_string());
    cells.insert(SALES_DATA, CUSTOMER_ID, record.customer_id.to_string());
    cells.insert(
        SALES_DATA,
        COUNTRY,
        required(&record.country, row_key, COUNTRY)?,
    );

    cells.insert(
        PRODUCT_DATA,
        STOCK_CODE,
        required(&record.stock_code, row_key, STOCK_CODE)?,
    );
    cells.insert(
        PRODUCT_DATA,
        DESCRIPTION,
        required(&record.description, row_key, DESCRIPTION)?,
    );
    cells.insert(PRODUCT_DATA, UNIT_PRICE, encode_float(record.unit_price));
    cells.insert(
        PRODUCT_DATA,
        CATEGORY,
        required(&record.category, row_key, CATEGORY)?,
    );

    cells.insert(
        METADATA,
        PAYMENT_METHOD,
        required(&record.payment_method, row_key, PAYMENT_METHOD)?,
    );
    cells.insert(
        METADATA,
        SHIPPING_COST,
        record.shipping_cost.map_or_else(|| NAN.to_string(), encode_float),
    );
    cells.insert(
        METADATA,
        SALES_CHANNEL,
        required(&record.sales_channel, row_key, SALES_CHANNEL)?,
    );
    cells.insert(
        METADATA,
        RETURN_STATUS,
        required(&record.return_status, row_key, RETURN_STATUS)?,
    );
    cells.insert(METADATA, SHIPMENT_PROVIDER, record.shipment_provider.as_str());
    cells.insert(METADATA, WAREHOUSE_LOCATION, record.warehouse_location.as_str());
    cells.insert(
        METADATA,
        ORDER_PRIORITY,
        required(&record.order_priority, row_key, ORDER_PRIORITY)?,
    );

    Ok(cells)
}

/// Statistics from a bulk load.
#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    pub rows_written: usize,
    pub duration: Duration,
}

/// Write every record to `table_name`, one row per record.
pub async fn bulk_load(
    conn: &Connection,
    table_name: &str,
    records: &[SalesRecord],
    strategy: RowKeyStrategy,
) -> Result<LoadStats, IngestError> {
    let table = conn.table(table_name).await.context(OpenTableSnafu)?;
    let start = Instant::now();
    let mut keys = RowKeys::new(strategy);
    let mut stats = LoadStats::default();

    for record in records {
        let row_key = keys.next(record);
        let cells = record_cells(record, &row_key)?;
        table
            .put(&row_key, &cells)
            .await
            .context(WriteSnafu { row_key: &row_key })?;
        stats.rows_written += 1;
        emit!(RowsWritten { count: 1 });

        if stats.rows_written % 10_000 == 0 {
            debug!("Wrote {} of {} rows", stats.rows_written, records.len());
        }
    }

    stats.duration = start.elapsed();
    emit!(LoadCompleted {
        duration: stats.duration
    });
    emit!(TableRows {
        count: stats.rows_written
    });
    info!("Data loaded successfully into '{}'.", table_name);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::schema::recreate_table;
    use crate::storage::StorageProvider;
    use std::sync::Arc;

    fn connection() -> Connection {
        Connection::with_storage(Arc::new(StorageProvider::in_memory()))
    }

    fn record(invoice: &str, quantity: i64, unit_price: f64) -> SalesRecord {
        SalesRecord {
            invoice_no: Some(invoice.to_string()),
            invoice_date: "2020-01-01 10:00".to_string(),
            quantity,
            customer_id: 17850,
            country: Some("United Kingdom".to_string()),
            stock_code: Some("SKU_1".to_string()),
            description: Some("White Mug".to_string()),
            unit_price,
            category: Some("Kitchen".to_string()),
            payment_method: Some("Card".to_string()),
            shipping_cost: Some(4.5),
            sales_channel: Some("Online".to_string()),
            return_status: Some("Not Returned".to_string()),
            shipment_provider: "UPS".to_string(),
            warehouse_location: "London".to_string(),
            order_priority: Some("High".to_string()),
        }
    }

    #[test]
    fn test_encode_float() {
        assert_eq!(encode_float(3.0), "3.0");
        assert_eq!(encode_float(0.0), "0.0");
        assert_eq!(encode_float(-2.0), "-2.0");
        assert_eq!(encode_float(2.55), "2.55");
        assert_eq!(encode_float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(encode_float(f64::NAN), "nan");
    }

    #[test]
    fn test_record_cells_mapping() {
        let cells = record_cells(&record("536365", 6, 2.55), "row_0").unwrap();

        assert_eq!(cells.len(), 16);
        assert_eq!(cells.get(SALES_DATA, QUANTITY), Some("6"));
        assert_eq!(cells.get(SALES_DATA, CUSTOMER_ID), Some("17850"));
        assert_eq!(cells.get(SALES_DATA, COUNTRY), Some("United Kingdom"));
        assert_eq!(cells.get(PRODUCT_DATA, UNIT_PRICE), Some("2.55"));
        assert_eq!(cells.get(PRODUCT_DATA, DESCRIPTION), Some("White Mug"));
        assert_eq!(cells.get(METADATA, SHIPPING_COST), Some("4.5"));
        assert_eq!(cells.get(METADATA, WAREHOUSE_LOCATION), Some("London"));
        assert_eq!(
            cells.families().collect::<Vec<_>>(),
            vec![METADATA, PRODUCT_DATA, SALES_DATA]
        );
    }

    #[test]
    fn test_missing_optional_values_stored_as_nan() {
        let mut rec = record("536365", 1, 1.0);
        rec.invoice_no = None;
        rec.shipping_cost = None;

        let cells = record_cells(&rec, "row_0").unwrap();
        assert_eq!(cells.get(SALES_DATA, INVOICE_NO), Some("nan"));
        assert_eq!(cells.get(METADATA, SHIPPING_COST), Some("nan"));
    }

    #[test]
    fn test_missing_uncleaned_text_fails() {
        let mut rec = record("536365", 1, 1.0);
        rec.description = None;

        let err = record_cells(&rec, "row_3").unwrap_err();
        assert!(matches!(
            err,
            IngestError::MissingField {
                ref row_key,
                column: DESCRIPTION
            } if row_key == "row_3"
        ));
    }

    #[test]
    fn test_invoice_line_keys() {
        let mut keys = RowKeys::new(RowKeyStrategy::InvoiceLine);
        let a = record("536365", 1, 1.0);
        let b = record("536366", 1, 1.0);
        let mut missing = record("x", 1, 1.0);
        missing.invoice_no = None;

        let generated: Vec<_> = [&a, &b, &a, &missing, &a]
            .into_iter()
            .map(|r| keys.next(r))
            .collect();
        assert_eq!(
            generated,
            vec!["536365_0", "536366_0", "536365_1", "nan_0", "536365_2"]
        );
    }

    #[tokio::test]
    async fn test_bulk_load_writes_one_row_per_record() {
        let conn = connection();
        recreate_table(&conn, "sales").await.unwrap();
        let records: Vec<_> = (0..12).map(|i| record("536365", i, 1.5)).collect();

        let stats = bulk_load(&conn, "sales", &records, RowKeyStrategy::Ordinal)
            .await
            .unwrap();
        assert_eq!(stats.rows_written, 12);

        let table = conn.table("sales").await.unwrap();
        assert_eq!(table.count_rows().await.unwrap(), 12);
        let row = table.get("row_11").await.unwrap().unwrap();
        assert_eq!(row.cell(SALES_DATA, QUANTITY), Some("11"));
        assert_eq!(row.cell(PRODUCT_DATA, UNIT_PRICE), Some("1.5"));
    }

    #[tokio::test]
    async fn test_bulk_load_empty_dataset() {
        let conn = connection();
        recreate_table(&conn, "sales").await.unwrap();
        let stats = bulk_load(&conn, "sales", &[], RowKeyStrategy::Ordinal)
            .await
            .unwrap();
        assert_eq!(stats.rows_written, 0);
    }

    #[tokio::test]
    async fn test_bulk_load_missing_table() {
        let conn = connection();
        let err = bulk_load(&conn, "sales", &[record("1", 1, 1.0)], RowKeyStrategy::Ordinal)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::OpenTable {
                source: StoreError::TableNotFound { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_bulk_load_stops_at_first_bad_record() {
        let conn = connection();
        recreate_table(&conn, "sales").await.unwrap();
        let mut bad = record("2", 1, 1.0);
        bad.country = None;
        let records = vec![record("1", 1, 1.0), bad, record("3", 1, 1.0)];

        let err = bulk_load(&conn, "sales", &records, RowKeyStrategy::Ordinal)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingField { column: COUNTRY, .. }));

        let table = conn.table("sales").await.unwrap();
        assert_eq!(table.count_rows().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bulk_load_after_close_fails() {
        let conn = connection();
        recreate_table(&conn, "sales").await.unwrap();
        conn.close();

        let err = bulk_load(&conn, "sales", &[record("1", 1, 1.0)], RowKeyStrategy::Ordinal)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::OpenTable {
                source: StoreError::ConnectionClosed
            }
        ));
    }
}
