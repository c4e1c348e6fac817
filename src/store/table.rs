//! Table handles, rows and full scans.

use object_store::path::Path;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{ROWS_DIR, TableDescriptor, descriptor_path, is_name_char, rows_prefix};
use crate::error::{
    ConnectionClosedSnafu, DescriptorCodecSnafu, InvalidRowKeySnafu, RowCodecSnafu, StorageSnafu,
    StoreError, TableDisabledSnafu, TableNotFoundSnafu, UnknownFamilySnafu,
};
use crate::storage::StorageProviderRef;

const ROW_SUFFIX: &str = ".json";

/// Cells of one row, grouped by column family then qualifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cells(BTreeMap<String, BTreeMap<String, String>>);

impl Cells {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `family:qualifier` to `value`, replacing any previous value.
    pub fn insert(&mut self, family: &str, qualifier: &str, value: impl Into<String>) {
        self.0
            .entry(family.to_string())
            .or_default()
            .insert(qualifier.to_string(), value.into());
    }

    pub fn get(&self, family: &str, qualifier: &str) -> Option<&str> {
        self.0
            .get(family)
            .and_then(|columns| columns.get(qualifier))
            .map(String::as_str)
    }

    /// Families that hold at least one cell.
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Every cell as `(family, qualifier, value)`, ordered by family then qualifier.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.0.iter().flat_map(|(family, columns)| {
            columns
                .iter()
                .map(move |(qualifier, value)| (family.as_str(), qualifier.as_str(), value.as_str()))
        })
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A stored row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub key: String,
    pub cells: Cells,
}

impl Row {
    pub fn cell(&self, family: &str, qualifier: &str) -> Option<&str> {
        self.cells.get(family, qualifier)
    }
}

fn validate_row_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty() && !key.starts_with('.') && key.chars().all(is_name_char);
    ensure!(valid, InvalidRowKeySnafu { key });
    Ok(())
}

/// Handle to an existing table.
///
/// The handle refers to the table by name. Every operation re-reads the
/// stored descriptor, so a handle to a table that has since been disabled or
/// deleted fails instead of touching its rows.
#[derive(Debug, Clone)]
pub struct Table {
    descriptor: TableDescriptor,
    storage: StorageProviderRef,
    closed: Arc<AtomicBool>,
}

impl Table {
    pub(super) fn new(
        descriptor: TableDescriptor,
        storage: StorageProviderRef,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            descriptor,
            storage,
            closed,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Column families declared when the handle was opened.
    pub fn families(&self) -> &[String] {
        &self.descriptor.families
    }

    pub fn is_enabled(&self) -> bool {
        self.descriptor.enabled
    }

    /// Load the stored descriptor and check the table can still be used.
    async fn ensure_usable(&self) -> Result<TableDescriptor, StoreError> {
        ensure!(!self.closed.load(Ordering::SeqCst), ConnectionClosedSnafu);
        let table = self.name();
        let bytes = match self.storage.get(&descriptor_path(table)).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return TableNotFoundSnafu { table }.fail(),
            Err(source) => return Err(StoreError::Storage { source }),
        };
        let descriptor: TableDescriptor =
            serde_json::from_slice(&bytes).context(DescriptorCodecSnafu { table })?;
        ensure!(descriptor.enabled, TableDisabledSnafu { table });
        Ok(descriptor)
    }

    fn row_path(&self, key: &str) -> Path {
        let file = format!("{key}{ROW_SUFFIX}");
        Path::from_iter([self.name(), ROWS_DIR, file.as_str()])
    }

    /// Write a row, replacing any row already stored under `row_key`.
    ///
    /// Every cell must belong to one of the table's column families.
    pub async fn put(&self, row_key: &str, cells: &Cells) -> Result<(), StoreError> {
        validate_row_key(row_key)?;
        let descriptor = self.ensure_usable().await?;
        for family in cells.families() {
            ensure!(
                descriptor.families.iter().any(|f| f == family),
                UnknownFamilySnafu {
                    table: self.name(),
                    family
                }
            );
        }

        let row = Row {
            key: row_key.to_string(),
            cells: cells.clone(),
        };
        let json = serde_json::to_vec(&row).context(RowCodecSnafu {
            table: self.name(),
            key: row_key,
        })?;
        self.storage
            .put(&self.row_path(row_key), json)
            .await
            .context(StorageSnafu)
    }

    /// Fetch a single row.
    pub async fn get(&self, row_key: &str) -> Result<Option<Row>, StoreError> {
        validate_row_key(row_key)?;
        self.ensure_usable().await?;
        match self.storage.get(&self.row_path(row_key)).await {
            Ok(bytes) => decode_row(self.name(), row_key, &bytes).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(source) => Err(StoreError::Storage { source }),
        }
    }

    /// Row keys with their storage paths, in lexicographic key order.
    async fn row_index(&self) -> Result<Vec<(String, Path)>, StoreError> {
        let paths = self
            .storage
            .list_with_prefix(&rows_prefix(self.name()))
            .await
            .context(StorageSnafu)?;

        let mut index: Vec<(String, Path)> = paths
            .into_iter()
            .filter_map(|path| {
                let key = path.filename()?.strip_suffix(ROW_SUFFIX)?.to_string();
                Some((key, path))
            })
            .collect();
        index.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(index)
    }

    /// Number of rows currently stored.
    pub async fn count_rows(&self) -> Result<usize, StoreError> {
        self.ensure_usable().await?;
        Ok(self.row_index().await?.len())
    }

    /// Start a full scan over every row, in row-key order.
    ///
    /// The set of rows is fixed when the scan starts; rows are fetched one
    /// at a time as the scanner advances.
    pub async fn scan(&self) -> Result<Scanner, StoreError> {
        self.ensure_usable().await?;
        let index = self.row_index().await?;
        Ok(Scanner {
            table: self.name().to_string(),
            storage: self.storage.clone(),
            closed: self.closed.clone(),
            pending: index.into_iter(),
            scanned: 0,
        })
    }
}

fn decode_row(table: &str, key: &str, bytes: &[u8]) -> Result<Row, StoreError> {
    serde_json::from_slice(bytes).context(RowCodecSnafu { table, key })
}

/// Cursor over a full table scan.
pub struct Scanner {
    table: String,
    storage: StorageProviderRef,
    closed: Arc<AtomicBool>,
    pending: std::vec::IntoIter<(String, Path)>,
    scanned: usize,
}

impl Scanner {
    /// Fetch the next row, or `None` once every row has been visited.
    pub async fn next(&mut self) -> Option<Result<Row, StoreError>> {
        let (key, path) = self.pending.next()?;
        if self.closed.load(Ordering::SeqCst) {
            return Some(ConnectionClosedSnafu.fail());
        }

        let row = match self.storage.get(&path).await {
            Ok(bytes) => decode_row(&self.table, &key, &bytes),
            Err(source) => Err(StoreError::Storage { source }),
        };
        if row.is_ok() {
            self.scanned += 1;
        }
        Some(row)
    }

    /// Rows fetched so far.
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Rows not yet fetched.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}
