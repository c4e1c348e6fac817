//! S3-compatible storage backend.

use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey};
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{S3ConfigSnafu, StorageError};

use super::{BackendConfig, StorageProvider};

/// Region used for self-hosted endpoints when none is configured.
const DEFAULT_ENDPOINT_REGION: &str = "us-east-1";

/// S3 storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Custom endpoint (e.g. a self-hosted store at a configured host).
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: String,
    pub key: Option<Path>,
}

impl S3Config {
    /// The URL the store is reported under, in the form it was configured.
    pub fn canonical_url(&self) -> String {
        let base = match &self.endpoint {
            Some(endpoint) => format!("s3::{}/{}", endpoint, self.bucket),
            None => format!("s3://{}", self.bucket),
        };
        match &self.key {
            Some(key) => format!("{base}/{key}"),
            None => base,
        }
    }

    /// Builder for this bucket, with `options` applied last so they win over
    /// anything derived from the URL or the environment.
    fn builder(&self, options: &HashMap<String, String>) -> Result<AmazonS3Builder, StorageError> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&self.bucket)
            .with_retry(RetryConfig::default());

        match (&self.endpoint, &self.region) {
            (Some(endpoint), region) => {
                // Self-hosted stores serve buckets on the path, over plain HTTP.
                builder = builder
                    .with_endpoint(endpoint)
                    .with_virtual_hosted_style_request(false)
                    .with_allow_http(true)
                    .with_region(region.as_deref().unwrap_or(DEFAULT_ENDPOINT_REGION));
            }
            (None, Some(region)) => builder = builder.with_region(region),
            (None, None) => {}
        }

        for (key, value) in options {
            let key: AmazonS3ConfigKey = key.parse().context(S3ConfigSnafu)?;
            builder = builder.with_config(key, value.clone());
        }
        Ok(builder)
    }
}

impl StorageProvider {
    pub(super) fn construct_s3(
        config: S3Config,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let object_store: Arc<dyn ObjectStore> =
            Arc::new(config.builder(&options)?.build().context(S3ConfigSnafu)?);
        let canonical_url = config.canonical_url();
        debug!(
            "Built S3 store for bucket {} ({} options)",
            config.bucket,
            options.len()
        );

        Ok(Self {
            config: BackendConfig::S3(config),
            object_store,
            canonical_url,
        })
    }
}
