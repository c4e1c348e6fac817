//! Sales dataset loading and cleaning.
//!
//! Reads the delimited sales export into memory in file order, substituting
//! defaults for missing values in the columns that have cleaning rules and
//! coercing the numeric columns to their types.

mod clean;

pub use clean::{CleaningReport, is_missing};

use csv::ReaderBuilder;
use snafu::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::emit;
use crate::error::{
    CsvSnafu, DatasetError, FileNotFoundSnafu, MissingColumnsSnafu, OpenFileSnafu,
};
use crate::metrics::events::{DefaultsApplied, RecordsCleaned};

pub const INVOICE_NO: &str = "InvoiceNo";
pub const INVOICE_DATE: &str = "InvoiceDate";
pub const QUANTITY: &str = "Quantity";
pub const CUSTOMER_ID: &str = "CustomerID";
pub const COUNTRY: &str = "Country";
pub const STOCK_CODE: &str = "StockCode";
pub const DESCRIPTION: &str = "Description";
pub const UNIT_PRICE: &str = "UnitPrice";
pub const CATEGORY: &str = "Category";
pub const PAYMENT_METHOD: &str = "PaymentMethod";
pub const SHIPPING_COST: &str = "ShippingCost";
pub const SALES_CHANNEL: &str = "SalesChannel";
pub const RETURN_STATUS: &str = "ReturnStatus";
pub const SHIPMENT_PROVIDER: &str = "ShipmentProvider";
pub const WAREHOUSE_LOCATION: &str = "WarehouseLocation";
pub const ORDER_PRIORITY: &str = "OrderPriority";

/// Every column the input file must carry, in canonical order.
pub const COLUMNS: [&str; 16] = [
    INVOICE_NO,
    INVOICE_DATE,
    QUANTITY,
    CUSTOMER_ID,
    COUNTRY,
    STOCK_CODE,
    DESCRIPTION,
    UNIT_PRICE,
    CATEGORY,
    PAYMENT_METHOD,
    SHIPPING_COST,
    SALES_CHANNEL,
    RETURN_STATUS,
    SHIPMENT_PROVIDER,
    WAREHOUSE_LOCATION,
    ORDER_PRIORITY,
];

/// Placeholder for missing warehouse location and shipment provider.
pub const UNKNOWN: &str = "Unknown";

/// Placeholder for a missing invoice date.
pub const EPOCH_DATE: &str = "1970-01-01";

/// One cleaned sales line.
///
/// Columns with a cleaning rule are never missing. The remaining text
/// columns keep `None` for missing values; the bulk loader decides what to
/// do with them.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRecord {
    pub invoice_no: Option<String>,
    pub invoice_date: String,
    pub quantity: i64,
    pub customer_id: i64,
    pub country: Option<String>,
    pub stock_code: Option<String>,
    pub description: Option<String>,
    pub unit_price: f64,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub shipping_cost: Option<f64>,
    pub sales_channel: Option<String>,
    pub return_status: Option<String>,
    pub shipment_provider: String,
    pub warehouse_location: String,
    pub order_priority: Option<String>,
}

impl SalesRecord {
    /// Sales amount of the line: quantity times unit price.
    pub fn amount(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

/// Cleaned records in source order.
#[derive(Debug, Clone, Default)]
pub struct SalesDataset {
    pub records: Vec<SalesRecord>,
    pub cleaning: CleaningReport,
}

impl SalesDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Options for reading the input file.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Load and clean the dataset at `path`.
pub fn load_dataset(path: &Path, options: &LoadOptions) -> Result<SalesDataset, DatasetError> {
    ensure!(path.is_file(), FileNotFoundSnafu { path });
    let file = File::open(path).context(OpenFileSnafu { path })?;

    let dataset = read_dataset(file, options, path)?;
    info!(
        "Loaded {} records from {} ({} defaults applied)",
        dataset.len(),
        path.display(),
        dataset.cleaning.total()
    );
    Ok(dataset)
}

/// Read and clean a dataset from any reader. `path` is only used in errors.
pub fn read_dataset<R: Read>(
    reader: R,
    options: &LoadOptions,
    path: &Path,
) -> Result<SalesDataset, DatasetError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers().context(CsvSnafu { path })?.clone();
    let index = clean::ColumnIndex::resolve(&headers)
        .map_err(|columns| MissingColumnsSnafu { columns }.build())?;
    debug!("Resolved {} columns in {}", COLUMNS.len(), path.display());

    let mut cleaning = CleaningReport::default();
    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.context(CsvSnafu { path })?;
        records.push(index.clean(&row, &mut cleaning)?);
    }

    emit!(RecordsCleaned {
        count: records.len() as u64
    });
    for (column, count) in cleaning.by_column() {
        if count > 0 {
            emit!(DefaultsApplied {
                column,
                count: count as u64
            });
        }
    }

    Ok(SalesDataset { records, cleaning })
}
