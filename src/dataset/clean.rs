//! Per-column cleaning rules.

use csv::StringRecord;
use snafu::prelude::*;

use super::{
    CATEGORY, COLUMNS, COUNTRY, CUSTOMER_ID, DESCRIPTION, EPOCH_DATE, INVOICE_DATE, INVOICE_NO,
    ORDER_PRIORITY, PAYMENT_METHOD, QUANTITY, RETURN_STATUS, SALES_CHANNEL, SHIPMENT_PROVIDER,
    SHIPPING_COST, STOCK_CODE, SalesRecord, UNIT_PRICE, UNKNOWN, WAREHOUSE_LOCATION,
};
use crate::error::{DatasetError, ExtraFieldsSnafu, InvalidNumberSnafu};

/// Cell contents conventionally read as a null value.
const NULL_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Whether a raw cell counts as a missing value.
///
/// Matching is exact: padded markers and whitespace-only cells are text.
pub fn is_missing(raw: &str) -> bool {
    raw.is_empty() || NULL_MARKERS.contains(&raw)
}

/// How many missing values each cleaning rule replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub warehouse_location: usize,
    pub shipment_provider: usize,
    pub invoice_date: usize,
    pub customer_id: usize,
    pub quantity: usize,
    pub unit_price: usize,
}

impl CleaningReport {
    /// Counts keyed by source column name.
    pub fn by_column(&self) -> [(&'static str, usize); 6] {
        [
            (WAREHOUSE_LOCATION, self.warehouse_location),
            (SHIPMENT_PROVIDER, self.shipment_provider),
            (INVOICE_DATE, self.invoice_date),
            (CUSTOMER_ID, self.customer_id),
            (QUANTITY, self.quantity),
            (UNIT_PRICE, self.unit_price),
        ]
    }

    pub fn total(&self) -> usize {
        self.by_column().iter().map(|(_, count)| count).sum()
    }
}

/// Position of every schema column in the file's header.
pub(super) struct ColumnIndex {
    positions: [usize; COLUMNS.len()],
    width: usize,
}

impl ColumnIndex {
    /// Map schema columns to header positions, or list the ones that are absent.
    pub(super) fn resolve(headers: &StringRecord) -> Result<Self, Vec<String>> {
        let mut positions = [0; COLUMNS.len()];
        let mut missing = Vec::new();
        for (slot, column) in positions.iter_mut().zip(COLUMNS) {
            match headers.iter().position(|h| h == column) {
                Some(pos) => *slot = pos,
                None => missing.push(column.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(Self {
                positions,
                width: headers.len(),
            })
        } else {
            Err(missing)
        }
    }

    /// Raw cell for `column`, `None` when the row is short or the cell is null.
    fn cell<'r>(&self, row: &'r StringRecord, column: &str) -> Option<&'r str> {
        let slot = COLUMNS.iter().position(|c| *c == column)?;
        row.get(self.positions[slot]).filter(|raw| !is_missing(raw))
    }

    fn text(&self, row: &StringRecord, column: &str) -> Option<String> {
        self.cell(row, column).map(str::to_string)
    }

    fn float(
        &self,
        row: &StringRecord,
        line: u64,
        column: &'static str,
    ) -> Result<Option<f64>, DatasetError> {
        self.cell(row, column)
            .map(|raw| parse_float(raw).context(InvalidNumberSnafu { line, column, value: raw }))
            .transpose()
    }

    fn integer(
        &self,
        row: &StringRecord,
        line: u64,
        column: &'static str,
    ) -> Result<Option<i64>, DatasetError> {
        self.cell(row, column)
            .map(|raw| parse_integral(raw).context(InvalidNumberSnafu { line, column, value: raw }))
            .transpose()
    }

    /// Apply every cleaning rule to one row.
    pub(super) fn clean(
        &self,
        row: &StringRecord,
        report: &mut CleaningReport,
    ) -> Result<SalesRecord, DatasetError> {
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        ensure!(
            row.len() <= self.width,
            ExtraFieldsSnafu {
                line,
                expected: self.width,
                found: row.len(),
            }
        );

        let warehouse_location = self.text(row, WAREHOUSE_LOCATION).unwrap_or_else(|| {
            report.warehouse_location += 1;
            UNKNOWN.to_string()
        });
        let shipment_provider = self.text(row, SHIPMENT_PROVIDER).unwrap_or_else(|| {
            report.shipment_provider += 1;
            UNKNOWN.to_string()
        });
        let invoice_date = self.text(row, INVOICE_DATE).unwrap_or_else(|| {
            report.invoice_date += 1;
            EPOCH_DATE.to_string()
        });
        let customer_id = self.integer(row, line, CUSTOMER_ID)?.unwrap_or_else(|| {
            report.customer_id += 1;
            0
        });
        let quantity = self.integer(row, line, QUANTITY)?.unwrap_or_else(|| {
            report.quantity += 1;
            0
        });
        let unit_price = self.float(row, line, UNIT_PRICE)?.unwrap_or_else(|| {
            report.unit_price += 1;
            0.0
        });

        Ok(SalesRecord {
            invoice_no: self.text(row, INVOICE_NO),
            invoice_date,
            quantity,
            customer_id,
            country: self.text(row, COUNTRY),
            stock_code: self.text(row, STOCK_CODE),
            description: self.text(row, DESCRIPTION),
            unit_price,
            category: self.text(row, CATEGORY),
            payment_method: self.text(row, PAYMENT_METHOD),
            shipping_cost: self.float(row, line, SHIPPING_COST)?,
            sales_channel: self.text(row, SALES_CHANNEL),
            return_status: self.text(row, RETURN_STATUS),
            shipment_provider,
            warehouse_location,
            order_priority: self.text(row, ORDER_PRIORITY),
        })
    }
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

/// Parse an integer cell, accepting float notation truncated toward zero.
fn parse_integral(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?.trunc();
    // i64::MAX is not representable, so compare against 2^63 exclusively
    (value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64)
        .then_some(value as i64)
}
