//! Prometheus textfile export.
//!
//! The job runs to completion, so there is nothing to scrape while it runs.
//! Instead the recorder is installed up front and its rendered text is
//! written once at the end, in the format node_exporter's textfile
//! collector picks up.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{MetricsError, PrometheusInitSnafu, WriteTextfileSnafu};

/// Handle to the installed recorder.
pub struct MetricsExporter {
    handle: PrometheusHandle,
    textfile_path: Option<PathBuf>,
}

impl MetricsExporter {
    /// Install the global Prometheus recorder.
    pub fn install(textfile_path: Option<PathBuf>) -> Result<Self, MetricsError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context(PrometheusInitSnafu)?;

        Ok(Self {
            handle,
            textfile_path,
        })
    }

    /// Render all metrics recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the rendered metrics to the configured textfile, if any.
    pub fn flush(&self) -> Result<(), MetricsError> {
        let Some(path) = &self.textfile_path else {
            return Ok(());
        };
        write_textfile(path, &self.render())?;
        debug!("Wrote metrics to {}", path.display());
        Ok(())
    }
}

/// Write through a temp file and rename so collectors never see a partial file.
fn write_textfile(path: &Path, contents: &str) -> Result<(), MetricsError> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, contents).context(WriteTextfileSnafu { path: &tmp })?;
    std::fs::rename(&tmp, path).context(WriteTextfileSnafu { path })?;
    Ok(())
}
