//! Console rendering of the preview and the reports.

use snafu::prelude::*;
use std::io::Write;

use super::{CategoryAverage, ProductQuantity, RegionTotal, SalesSummary};
use crate::error::{RenderSnafu, ReportError};
use crate::store::Row;

const SEPARATOR_WIDTH: usize = 40;

fn heading(out: &mut impl Write, title: &str) -> Result<(), ReportError> {
    writeln!(out, "\n=== {title} ===").context(RenderSnafu)
}

/// Print each row's key and cells, framed by a dashed separator.
pub fn render_preview(out: &mut impl Write, rows: &[Row], limit: usize) -> Result<(), ReportError> {
    heading(out, &format!("First {limit} rows of the table"))?;
    for row in rows {
        writeln!(out, "Row Key: {}", row.key).context(RenderSnafu)?;
        for (family, qualifier, value) in row.cells.iter() {
            writeln!(out, "{family}:{qualifier}: {value}").context(RenderSnafu)?;
        }
        writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH)).context(RenderSnafu)?;
    }
    Ok(())
}

pub fn render_region_totals(out: &mut impl Write, totals: &[RegionTotal]) -> Result<(), ReportError> {
    heading(out, "Total sales by region")?;
    for RegionTotal { region, total } in totals {
        writeln!(out, "{region}: ${total:.2}").context(RenderSnafu)?;
    }
    Ok(())
}

pub fn render_top_products(
    out: &mut impl Write,
    products: &[ProductQuantity],
) -> Result<(), ReportError> {
    heading(out, "Top products")?;
    for ProductQuantity { product, quantity } in products {
        writeln!(out, "{product}: {quantity} units").context(RenderSnafu)?;
    }
    Ok(())
}

pub fn render_category_averages(
    out: &mut impl Write,
    averages: &[CategoryAverage],
) -> Result<(), ReportError> {
    heading(out, "Average sales by category")?;
    for CategoryAverage {
        category, average, ..
    } in averages
    {
        writeln!(out, "{category}: ${average:.2}").context(RenderSnafu)?;
    }
    Ok(())
}

/// Print all three reports in order.
pub fn render_summary(out: &mut impl Write, summary: &SalesSummary) -> Result<(), ReportError> {
    render_region_totals(out, &summary.regions)?;
    render_top_products(out, &summary.top_products)?;
    render_category_averages(out, &summary.categories)
}
