//! Metrics and observability infrastructure for salesbase.
//!
//! - `events`: internal event types and the `InternalEvent` trait
//! - `exporter`: Prometheus recorder and textfile export at the end of a run

pub mod events;
pub mod exporter;

pub use exporter::MetricsExporter;

/// Emit an internal event.
///
/// This macro calls the `InternalEvent::emit()` method on the given event,
/// which records the corresponding metric.
///
/// # Example
///
/// ```ignore
/// use salesbase::metrics::events::RowsWritten;
///
/// emit!(RowsWritten { count: 100 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
