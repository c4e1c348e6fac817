//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in a run. Events
//! implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when the dataset loader has cleaned its records.
pub struct RecordsCleaned {
    pub count: u64,
}

impl InternalEvent for RecordsCleaned {
    fn emit(self) {
        trace!(count = self.count, "Records cleaned");
        counter!("salesbase_records_cleaned_total").increment(self.count);
    }
}

/// Event emitted when a cleaning rule substituted defaults in a column.
pub struct DefaultsApplied {
    pub column: &'static str,
    pub count: u64,
}

impl InternalEvent for DefaultsApplied {
    fn emit(self) {
        trace!(column = self.column, count = self.count, "Defaults applied");
        counter!("salesbase_defaults_applied_total", "column" => self.column)
            .increment(self.count);
    }
}

/// Event emitted when the bulk loader writes rows.
pub struct RowsWritten {
    pub count: u64,
}

impl InternalEvent for RowsWritten {
    fn emit(self) {
        trace!(count = self.count, "Rows written");
        counter!("salesbase_rows_written_total").increment(self.count);
    }
}

/// Event emitted after a full scan finishes.
pub struct RowsScanned {
    pub scan: &'static str,
    pub count: u64,
}

impl InternalEvent for RowsScanned {
    fn emit(self) {
        trace!(scan = self.scan, count = self.count, "Rows scanned");
        counter!("salesbase_rows_scanned_total", "scan" => self.scan).increment(self.count);
    }
}

/// Phase of a destructive table recreation.
#[derive(Debug, Clone, Copy)]
pub enum RecreatePhase {
    Dropped,
    Created,
}

impl RecreatePhase {
    fn as_str(&self) -> &'static str {
        match self {
            RecreatePhase::Dropped => "dropped",
            RecreatePhase::Created => "created",
        }
    }
}

/// Event emitted when a phase of table recreation completes.
pub struct TableRecreated {
    pub phase: RecreatePhase,
}

impl InternalEvent for TableRecreated {
    fn emit(self) {
        trace!(phase = self.phase.as_str(), "Table recreation phase");
        counter!("salesbase_table_recreations_total", "phase" => self.phase.as_str())
            .increment(1);
    }
}

/// Event emitted with the number of rows a load produced.
pub struct TableRows {
    pub count: usize,
}

impl InternalEvent for TableRows {
    fn emit(self) {
        trace!(count = self.count, "Table rows");
        gauge!("salesbase_table_rows").set(self.count as f64);
    }
}

// ============================================================================
// Histogram events for timing
// ============================================================================

/// Event emitted when the bulk load completes.
pub struct LoadCompleted {
    pub duration: Duration,
}

impl InternalEvent for LoadCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Load completed");
        histogram!("salesbase_load_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a report completes.
pub struct ReportCompleted {
    pub report: &'static str,
    pub duration: Duration,
}

impl InternalEvent for ReportCompleted {
    fn emit(self) {
        trace!(
            report = self.report,
            duration_ms = self.duration.as_millis(),
            "Report completed"
        );
        histogram!("salesbase_report_duration_seconds", "report" => self.report)
            .record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    Delete,
    Head,
    List,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::Delete => "delete",
            StorageOperation::Head => "head",
            StorageOperation::List => "list",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "salesbase_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        histogram!(
            "salesbase_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
