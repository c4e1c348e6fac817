//! Wide-column table store on top of object storage.
//!
//! A table is a key prefix holding a descriptor and one JSON document per
//! row:
//!
//! ```text
//! <table>/_descriptor.json          name, column families, enabled flag
//! <table>/rows/<row_key>.json       family -> qualifier -> text value
//! ```
//!
//! Like the wide-column stores it models, a table must be disabled before it
//! can be deleted, every cell belongs to one of the table's declared column
//! families, and scans visit rows in lexicographic row-key order.

mod table;

pub use table::{Cells, Row, Scanner, Table};

use object_store::path::Path;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::error::{
    ConnectionClosedSnafu, DescriptorCodecSnafu, InvalidFamilyNameSnafu, InvalidTableNameSnafu,
    NoFamiliesSnafu, StorageSnafu, StoreError, TableEnabledSnafu, TableExistsSnafu,
    TableNotFoundSnafu,
};
use crate::storage::{StorageProvider, StorageProviderRef};

const DESCRIPTOR_FILE: &str = "_descriptor.json";
const ROWS_DIR: &str = "rows";

/// Persistent description of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub families: Vec<String>,
    pub enabled: bool,
}

fn descriptor_path(table: &str) -> Path {
    Path::from_iter([table, DESCRIPTOR_FILE])
}

fn rows_prefix(table: &str) -> Path {
    Path::from_iter([table, ROWS_DIR])
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Check that a table name can be used as a storage prefix.
///
/// Names starting with `_` or `.` are reserved.
pub fn validate_table_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && !name.starts_with(['_', '.'])
        && name.chars().all(is_name_char);
    ensure!(valid, InvalidTableNameSnafu { name });
    Ok(())
}

/// A connection to the store, opened once per run and closed explicitly.
///
/// Table handles obtained from a connection stop working once it is closed.
#[derive(Debug)]
pub struct Connection {
    storage: StorageProviderRef,
    closed: Arc<AtomicBool>,
}

impl Connection {
    /// Open a connection to the store at `url`.
    pub async fn open(url: &str, options: HashMap<String, String>) -> Result<Self, StoreError> {
        let storage = StorageProvider::for_url_with_options(url, options)
            .await
            .context(StorageSnafu)?;
        debug!("Opened store at {}", storage.canonical_url());
        Ok(Self::with_storage(Arc::new(storage)))
    }

    /// Wrap an existing storage provider.
    pub fn with_storage(storage: StorageProviderRef) -> Self {
        Self {
            storage,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The storage this connection talks to.
    pub fn storage(&self) -> &StorageProviderRef {
        &self.storage
    }

    /// Close the connection. Closing twice is a no-op.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed store at {}", self.storage.canonical_url());
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        ensure!(!self.is_closed(), ConnectionClosedSnafu);
        Ok(())
    }

    /// Names of all tables, sorted.
    pub async fn tables(&self) -> Result<Vec<String>, StoreError> {
        self.ensure_open()?;
        let paths = self
            .storage
            .list_with_prefix(&Path::default())
            .await
            .context(StorageSnafu)?;

        let tables = paths
            .iter()
            .filter_map(|path| {
                let parts: Vec<_> = path.parts().collect();
                match parts.as_slice() {
                    [table, file] if file.as_ref() == DESCRIPTOR_FILE => {
                        Some(table.as_ref().to_string())
                    }
                    _ => None,
                }
            })
            .collect();
        Ok(tables)
    }

    /// Whether a table with this name exists.
    pub async fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        validate_table_name(name)?;
        self.storage
            .exists(&descriptor_path(name))
            .await
            .context(StorageSnafu)
    }

    /// Load a table's descriptor.
    pub async fn describe(&self, name: &str) -> Result<TableDescriptor, StoreError> {
        self.ensure_open()?;
        validate_table_name(name)?;
        let bytes = match self.storage.get(&descriptor_path(name)).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return TableNotFoundSnafu { table: name }.fail(),
            Err(source) => return Err(StoreError::Storage { source }),
        };
        serde_json::from_slice(&bytes).context(DescriptorCodecSnafu { table: name })
    }

    async fn write_descriptor(&self, descriptor: &TableDescriptor) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(descriptor).context(DescriptorCodecSnafu {
            table: &descriptor.name,
        })?;
        self.storage
            .put(&descriptor_path(&descriptor.name), json)
            .await
            .context(StorageSnafu)
    }

    /// Create an empty, enabled table with the given column families.
    pub async fn create_table(&self, name: &str, families: &[&str]) -> Result<Table, StoreError> {
        self.ensure_open()?;
        validate_table_name(name)?;
        ensure!(!families.is_empty(), NoFamiliesSnafu { table: name });
        for family in families {
            let valid = !family.is_empty()
                && family.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            ensure!(valid, InvalidFamilyNameSnafu { family: *family });
        }
        ensure!(
            !self.table_exists(name).await?,
            TableExistsSnafu { table: name }
        );

        // Rows left behind by an interrupted delete must not show up in the new table.
        let leftovers = self
            .storage
            .list_with_prefix(&rows_prefix(name))
            .await
            .context(StorageSnafu)?;
        for path in &leftovers {
            self.storage.delete(path).await.context(StorageSnafu)?;
        }
        if !leftovers.is_empty() {
            debug!("Removed {} orphaned rows of table {}", leftovers.len(), name);
        }

        let mut unique: Vec<String> = Vec::with_capacity(families.len());
        for family in families {
            if !unique.iter().any(|f| f == family) {
                unique.push(family.to_string());
            }
        }

        let descriptor = TableDescriptor {
            name: name.to_string(),
            families: unique,
            enabled: true,
        };
        self.write_descriptor(&descriptor).await?;
        debug!("Created table {} with families {:?}", name, descriptor.families);

        Ok(Table::new(descriptor, self.storage.clone(), self.closed.clone()))
    }

    /// Disable a table so it can be deleted. Disabling twice is a no-op.
    pub async fn disable_table(&self, name: &str) -> Result<(), StoreError> {
        let mut descriptor = self.describe(name).await?;
        if descriptor.enabled {
            descriptor.enabled = false;
            self.write_descriptor(&descriptor).await?;
            debug!("Disabled table {}", name);
        }
        Ok(())
    }

    /// Delete a disabled table and all of its rows.
    ///
    /// Rows are removed before the descriptor, so an interrupted delete
    /// leaves a disabled table behind rather than orphaned rows.
    pub async fn delete_table(&self, name: &str) -> Result<usize, StoreError> {
        let descriptor = self.describe(name).await?;
        ensure!(!descriptor.enabled, TableEnabledSnafu { table: name });

        let rows = self
            .storage
            .list_with_prefix(&rows_prefix(name))
            .await
            .context(StorageSnafu)?;
        for path in &rows {
            self.storage.delete(path).await.context(StorageSnafu)?;
        }
        self.storage
            .delete(&descriptor_path(name))
            .await
            .context(StorageSnafu)?;

        debug!("Deleted table {} ({} rows)", name, rows.len());
        Ok(rows.len())
    }

    /// Open a handle to an existing table.
    pub async fn table(&self, name: &str) -> Result<Table, StoreError> {
        let descriptor = self.describe(name).await?;
        Ok(Table::new(descriptor, self.storage.clone(), self.closed.clone()))
    }
}
