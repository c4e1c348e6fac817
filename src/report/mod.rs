//! Scan-based reports over the sales table.
//!
//! Each scanned row is decoded once into [`SaleFacts`] and fed to the
//! accumulators in [`accumulate`]. The three reports can run as independent
//! scans or together through [`summarize`], which reads the table once.

mod accumulate;
mod render;

pub use accumulate::{
    CategoryAverage, CategoryAverages, ProductQuantity, RegionTotal, RegionTotals, TopProducts,
};
pub use render::{
    render_category_averages, render_preview, render_region_totals, render_summary,
    render_top_products,
};

use snafu::prelude::*;
use std::time::Instant;
use tracing::debug;

use crate::dataset::{CATEGORY, COUNTRY, DESCRIPTION, QUANTITY, UNIT_PRICE};
use crate::emit;
use crate::error::{InvalidCellSnafu, MissingCellSnafu, ReportError, ScanSnafu};
use crate::metrics::events::{ReportCompleted, RowsScanned};
use crate::schema::{PRODUCT_DATA, SALES_DATA};
use crate::store::{Row, Table};

/// Number of best sellers reported by default.
pub const DEFAULT_TOP_PRODUCTS: usize = 5;

/// Number of rows shown by the preview by default.
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// The cells of a row that the reports read, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleFacts {
    pub country: String,
    pub description: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: f64,
}

impl SaleFacts {
    pub fn from_row(row: &Row) -> Result<Self, ReportError> {
        let quantity = cell(row, SALES_DATA, QUANTITY)?;
        let unit_price = cell(row, PRODUCT_DATA, UNIT_PRICE)?;

        Ok(Self {
            country: cell(row, SALES_DATA, COUNTRY)?.to_string(),
            description: cell(row, PRODUCT_DATA, DESCRIPTION)?.to_string(),
            category: cell(row, PRODUCT_DATA, CATEGORY)?.to_string(),
            quantity: quantity.parse::<i64>().ok().context(InvalidCellSnafu {
                row_key: &row.key,
                column: QUANTITY,
                value: quantity,
            })?,
            unit_price: unit_price.parse::<f64>().ok().context(InvalidCellSnafu {
                row_key: &row.key,
                column: UNIT_PRICE,
                value: unit_price,
            })?,
        })
    }

    /// Sales amount: quantity times unit price.
    pub fn amount(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

fn cell<'r>(row: &'r Row, family: &str, column: &'static str) -> Result<&'r str, ReportError> {
    row.cell(family, column).context(MissingCellSnafu {
        row_key: &row.key,
        column,
    })
}

/// Run a full scan, handing every decoded row to `visit`. Returns the rows scanned.
async fn scan_facts<F>(table: &Table, report: &'static str, mut visit: F) -> Result<usize, ReportError>
where
    F: FnMut(&SaleFacts),
{
    let start = Instant::now();
    let mut scanner = table.scan().await.context(ScanSnafu)?;
    while let Some(row) = scanner.next().await {
        let row = row.context(ScanSnafu)?;
        visit(&SaleFacts::from_row(&row)?);
    }

    let scanned = scanner.scanned();
    emit!(RowsScanned {
        scan: report,
        count: scanned as u64
    });
    emit!(ReportCompleted {
        report,
        duration: start.elapsed()
    });
    debug!("Report '{}' scanned {} rows", report, scanned);
    Ok(scanned)
}

/// Total sales amount per region, largest first.
pub async fn totals_by_region(table: &Table) -> Result<Vec<RegionTotal>, ReportError> {
    let mut totals = RegionTotals::default();
    scan_facts(table, "totals_by_region", |facts| totals.add(facts)).await?;
    Ok(totals.finish())
}

/// The `n` products with the most units sold.
pub async fn top_products(table: &Table, n: usize) -> Result<Vec<ProductQuantity>, ReportError> {
    let mut top = TopProducts::default();
    scan_facts(table, "top_products", |facts| top.add(facts)).await?;
    Ok(top.finish(n))
}

/// Mean sales amount per category, ordered by category name.
pub async fn average_by_category(table: &Table) -> Result<Vec<CategoryAverage>, ReportError> {
    let mut averages = CategoryAverages::default();
    scan_facts(table, "average_by_category", |facts| averages.add(facts)).await?;
    Ok(averages.finish())
}

/// Results of all three reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesSummary {
    pub regions: Vec<RegionTotal>,
    pub top_products: Vec<ProductQuantity>,
    pub categories: Vec<CategoryAverage>,
    /// Rows read to build the summary.
    pub rows_scanned: usize,
}

/// Compute all three reports from a single scan.
pub async fn summarize(table: &Table, top_n: usize) -> Result<SalesSummary, ReportError> {
    let mut totals = RegionTotals::default();
    let mut top = TopProducts::default();
    let mut averages = CategoryAverages::default();

    let rows_scanned = scan_facts(table, "summary", |facts| {
        totals.add(facts);
        top.add(facts);
        averages.add(facts);
    })
    .await?;

    Ok(SalesSummary {
        regions: totals.finish(),
        top_products: top.finish(top_n),
        categories: averages.finish(),
        rows_scanned,
    })
}

/// Compute the reports with one independent scan each.
pub async fn summarize_by_scans(table: &Table, top_n: usize) -> Result<SalesSummary, ReportError> {
    let mut totals = RegionTotals::default();
    let mut top = TopProducts::default();
    let mut averages = CategoryAverages::default();

    let mut rows_scanned = scan_facts(table, "totals_by_region", |facts| totals.add(facts)).await?;
    rows_scanned += scan_facts(table, "top_products", |facts| top.add(facts)).await?;
    rows_scanned += scan_facts(table, "average_by_category", |facts| averages.add(facts)).await?;

    Ok(SalesSummary {
        regions: totals.finish(),
        top_products: top.finish(top_n),
        categories: averages.finish(),
        rows_scanned,
    })
}

/// The first `limit` rows in row-key order.
pub async fn preview(table: &Table, limit: usize) -> Result<Vec<Row>, ReportError> {
    let mut scanner = table.scan().await.context(ScanSnafu)?;
    let mut rows = Vec::with_capacity(limit.min(scanner.remaining()));
    while rows.len() < limit {
        match scanner.next().await {
            Some(row) => rows.push(row.context(ScanSnafu)?),
            None => break,
        }
    }

    emit!(RowsScanned {
        scan: "preview",
        count: rows.len() as u64
    });
    Ok(rows)
}
