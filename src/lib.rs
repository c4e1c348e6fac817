//! salesbase: load a sales export into a wide-column table and report on it.
//!
//! The job cleans a delimited sales file, recreates a table with three
//! column families, writes one row per record, previews the first rows and
//! prints totals by region, best-selling products and average sales by
//! category.
//!
//! # Example
//!
//! ```ignore
//! use salesbase::{Config, run_pipeline, error::PipelineError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::default();
//!     let stats = run_pipeline(&config, &mut std::io::stdout()).await?;
//!     println!("Wrote {} rows", stats.rows_written);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod storage;
pub mod store;

// Re-export main types
pub use config::Config;
pub use pipeline::{PipelineStats, run_pipeline};
pub use storage::{StorageProvider, StorageProviderRef};
pub use store::Connection;
