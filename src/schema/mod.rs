//! Destructive recreation of the sales table.

use tracing::{debug, info, warn};

use crate::emit;
use crate::error::StoreError;
use crate::metrics::events::{RecreatePhase, TableRecreated};
use crate::store::{Connection, Table};

pub const SALES_DATA: &str = "sales_data";
pub const PRODUCT_DATA: &str = "product_data";
pub const METADATA: &str = "metadata";

/// Column families of the sales table.
pub const COLUMN_FAMILIES: [&str; 3] = [SALES_DATA, PRODUCT_DATA, METADATA];

/// Outcome of [`recreate_table`].
#[derive(Debug)]
pub struct Recreation {
    /// Handle to the freshly created, empty table.
    pub table: Table,
    /// Whether a previous table was dropped.
    pub dropped: bool,
    /// Rows the previous table held.
    pub rows_dropped: usize,
}

/// Drop `name` if it exists, then create it empty with [`COLUMN_FAMILIES`].
///
/// The two phases are not atomic: if the process dies after the drop, the
/// table stays absent until the next run.
pub async fn recreate_table(conn: &Connection, name: &str) -> Result<Recreation, StoreError> {
    let (dropped, rows_dropped) = drop_phase(conn, name).await?;
    if dropped {
        warn!(
            "Table '{}' is absent until it is created again; writes fail until then",
            name
        );
    }

    let table = conn.create_table(name, &COLUMN_FAMILIES).await?;
    emit!(TableRecreated {
        phase: RecreatePhase::Created
    });
    info!("Table '{}' created successfully.", name);

    Ok(Recreation {
        table,
        dropped,
        rows_dropped,
    })
}

async fn drop_phase(conn: &Connection, name: &str) -> Result<(bool, usize), StoreError> {
    if !conn.table_exists(name).await? {
        debug!("Table '{}' does not exist, nothing to drop", name);
        return Ok((false, 0));
    }

    conn.disable_table(name).await?;
    let rows = conn.delete_table(name).await?;
    emit!(TableRecreated {
        phase: RecreatePhase::Dropped
    });
    info!("Table '{}' deleted.", name);
    Ok((true, rows))
}
