//! Object storage backends underneath the wide-column store.
//!
//! Provides a unified interface over the local filesystem, an in-memory
//! store and S3-compatible endpoints. Paths handed to and returned from
//! the provider are relative to the key prefix in the storage URL.

mod local;
mod s3;

use bytes::Bytes;
use futures::StreamExt;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use regex::Regex;
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::debug;

use crate::emit;
use crate::error::{InvalidUrlSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

pub use local::LocalConfig;
pub use s3::S3Config;

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider that abstracts over the supported backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

// URL patterns for the supported backends
const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_ENDPOINT_URL: &str = r"^[sS]3[aA]?::(?<protocol>https?)://(?P<endpoint>[^:/]+):(?<port>\d+)/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

const MEMORY_URL: &str = r"^memory://(?P<key>.*)$";

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum Backend {
    S3,
    Local,
    Memory,
}

fn matchers() -> &'static [(Backend, Vec<Regex>)] {
    static MATCHERS: OnceLock<Vec<(Backend, Vec<Regex>)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("static pattern compiles");
        vec![
            (Backend::Memory, vec![compile(MEMORY_URL)]),
            (
                Backend::S3,
                vec![compile(S3_ENDPOINT_URL), compile(S3_URL)],
            ),
            (Backend::Local, vec![compile(FILE_URI), compile(FILE_PATH)]),
        ]
    })
}

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Local(LocalConfig),
    Memory { key: Option<Path> },
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        for (backend, patterns) in matchers() {
            if let Some(matches) = patterns.iter().find_map(|r| r.captures(url)) {
                return Ok(match backend {
                    Backend::S3 => Self::parse_s3(&matches),
                    Backend::Local => Self::parse_local(&matches),
                    Backend::Memory => BackendConfig::Memory {
                        key: non_empty_key(matches.name("key").map(|m| m.as_str())),
                    },
                });
            }
        }

        InvalidUrlSnafu {
            url: url.to_string(),
        }
        .fail()
    }

    fn parse_s3(matches: &regex::Captures) -> Self {
        let bucket = matches
            .name("bucket")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let endpoint = std::env::var("AWS_ENDPOINT").ok().or_else(|| {
            matches.name("endpoint").map(|endpoint| {
                let port = matches
                    .name("port")
                    .and_then(|p| p.as_str().parse::<u16>().ok())
                    .unwrap_or(443);
                let protocol = matches
                    .name("protocol")
                    .map(|p| p.as_str())
                    .unwrap_or("https");
                format!("{}://{}:{}", protocol, endpoint.as_str(), port)
            })
        });

        let region = std::env::var("AWS_DEFAULT_REGION").ok();
        let key = non_empty_key(matches.name("key").map(|m| m.as_str()));

        BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket,
            key,
        })
    }

    fn parse_local(matches: &regex::Captures) -> Self {
        let path = matches.name("path").map(|m| m.as_str()).unwrap_or_default();
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        BackendConfig::Local(LocalConfig { path })
    }

    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Local(_) => None,
            BackendConfig::Memory { key } => key.as_ref(),
        }
    }
}

fn non_empty_key(key: Option<&str>) -> Option<Path> {
    key.map(|k| k.trim_matches('/'))
        .filter(|k| !k.is_empty())
        .map(Path::from)
}

/// Record the outcome of a single storage request.
fn record_request<T, E>(operation: StorageOperation, start: Instant, result: &Result<T, E>) {
    let status = if result.is_ok() {
        RequestStatus::Success
    } else {
        RequestStatus::Error
    };
    emit!(StorageRequest { operation, status });
    emit!(StorageRequestDuration {
        operation,
        duration: start.elapsed(),
    });
}

impl StorageProvider {
    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        match BackendConfig::parse_url(url)? {
            BackendConfig::S3(config) => Self::construct_s3(config, options),
            BackendConfig::Local(config) => Self::construct_local(config).await,
            BackendConfig::Memory { key } => Ok(Self::construct_memory(key)),
        }
    }

    /// Create a fresh, empty in-memory provider.
    pub fn in_memory() -> Self {
        Self::construct_memory(None)
    }

    fn construct_memory(key: Option<Path>) -> Self {
        let canonical_url = match &key {
            Some(key) => format!("memory://{key}"),
            None => "memory://".to_string(),
        };
        Self {
            config: BackendConfig::Memory { key },
            object_store: Arc::new(InMemory::new()),
            canonical_url,
        }
    }

    /// The URL this provider was resolved to.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Get the contents of an object.
    pub async fn get(&self, path: &Path) -> Result<Bytes, StorageError> {
        let start = Instant::now();
        let result = self.object_store.get(&self.qualify_path(path)).await;
        record_request(StorageOperation::Get, start, &result);

        let bytes = result
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)?;
        Ok(bytes)
    }

    /// Put bytes to a path, replacing any existing object.
    pub async fn put(&self, path: &Path, bytes: impl Into<Bytes>) -> Result<(), StorageError> {
        let payload = PutPayload::from(bytes.into());
        let start = Instant::now();
        let result = self
            .object_store
            .put(&self.qualify_path(path), payload)
            .await;
        record_request(StorageOperation::Put, start, &result);

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Delete an object. Deleting a missing object is not an error.
    pub async fn delete(&self, path: &Path) -> Result<(), StorageError> {
        let start = Instant::now();
        let result = self.object_store.delete(&self.qualify_path(path)).await;
        record_request(StorageOperation::Delete, start, &result);

        match result {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(source) => Err(StorageError::ObjectStore { source }),
        }
    }

    /// Check whether an object exists.
    pub async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        let start = Instant::now();
        let result = self.object_store.head(&self.qualify_path(path)).await;
        record_request(StorageOperation::Head, start, &result);

        match result {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(source) => Err(StorageError::ObjectStore { source }),
        }
    }

    /// List every object under `prefix` (recursively).
    ///
    /// Returns paths relative to the configured base prefix, sorted. A
    /// missing prefix lists as empty.
    pub async fn list_with_prefix(&self, prefix: &Path) -> Result<Vec<Path>, StorageError> {
        let full_prefix = self.qualify_path(prefix);
        let key_part_count = self
            .config
            .key()
            .map(|key| key.parts().count())
            .unwrap_or_default();

        let start = Instant::now();
        let mut stream = self.object_store.list(Some(&full_prefix));
        let mut paths = Vec::new();

        while let Some(result) = stream.next().await {
            match result {
                Ok(meta) => {
                    // Strip the base prefix so callers get relative paths
                    let relative: Path = meta.location.parts().skip(key_part_count).collect();
                    paths.push(relative);
                }
                // A prefix that was never written lists as empty
                Err(object_store::Error::NotFound { .. }) => {}
                Err(source) => {
                    record_request(StorageOperation::List, start, &Err::<(), _>(&source));
                    return Err(StorageError::ObjectStore { source });
                }
            }
        }
        record_request(StorageOperation::List, start, &Ok::<_, ()>(()));

        debug!("Listed {} objects under {}", paths.len(), full_prefix);
        paths.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_s3_url_parsing() {
        let config = BackendConfig::parse_url("s3://mybucket/path/to/store").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "mybucket");
                assert_eq!(s3.key, Some(Path::from("path/to/store")));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_s3_endpoint_url_parsing() {
        // AWS_ENDPOINT takes precedence over the URL
        if std::env::var("AWS_ENDPOINT").is_ok() {
            return;
        }
        let config = BackendConfig::parse_url("s3::http://localhost:9000/sales/hbase").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "sales");
                assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9000"));
                assert_eq!(s3.key, Some(Path::from("hbase")));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_local_url_parsing() {
        let config = BackendConfig::parse_url("/var/lib/salesbase").unwrap();
        assert_eq!(
            config,
            BackendConfig::Local(LocalConfig {
                path: "/var/lib/salesbase".to_string()
            })
        );

        let config = BackendConfig::parse_url("file:///var/lib/salesbase").unwrap();
        assert_eq!(
            config,
            BackendConfig::Local(LocalConfig {
                path: "/var/lib/salesbase".to_string()
            })
        );
    }

    #[test]
    fn test_memory_url_parsing() {
        assert_eq!(
            BackendConfig::parse_url("memory://").unwrap(),
            BackendConfig::Memory { key: None }
        );
        assert_eq!(
            BackendConfig::parse_url("memory://tables").unwrap(),
            BackendConfig::Memory {
                key: Some(Path::from("tables"))
            }
        );
    }

    #[test]
    fn test_invalid_url() {
        let err = BackendConfig::parse_url("localhost:9090").unwrap_err();
        assert!(matches!(err, StorageError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_list_returns_relative_sorted_paths() {
        let storage = StorageProvider::for_url_with_options("memory://base", HashMap::new())
            .await
            .unwrap();
        assert_eq!(storage.canonical_url(), "memory://base");
        assert!(matches!(storage.config(), BackendConfig::Memory { key: Some(_) }));

        storage.put(&Path::from("t/rows/row_10.json"), "b").await.unwrap();
        storage.put(&Path::from("t/rows/row_2.json"), "c").await.unwrap();
        storage.put(&Path::from("t/_descriptor.json"), "a").await.unwrap();

        let listed = storage.list_with_prefix(&Path::from("t/rows")).await.unwrap();
        let listed: Vec<String> = listed.iter().map(|p| p.to_string()).collect();
        assert_eq!(listed, vec!["t/rows/row_10.json", "t/rows/row_2.json"]);

        let content = storage.get(&Path::from("t/rows/row_2.json")).await.unwrap();
        assert_eq!(content.as_ref(), b"c");
    }

    #[tokio::test]
    async fn test_local_roundtrip_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let url = format!("file://{}", temp_dir.path().display());
        let storage = StorageProvider::for_url_with_options(&url, HashMap::new())
            .await
            .unwrap();

        let path = Path::from("sales/rows/row_0.json");
        assert!(!storage.exists(&path).await.unwrap());

        storage.put(&path, "{}").await.unwrap();
        assert!(storage.exists(&path).await.unwrap());
        assert_eq!(storage.list_with_prefix(&Path::from("sales")).await.unwrap().len(), 1);

        storage.delete(&path).await.unwrap();
        assert!(!storage.exists(&path).await.unwrap());
        // Deleting twice is fine
        storage.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_prefix_lists_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage =
            StorageProvider::for_url_with_options(temp_dir.path().to_str().unwrap(), HashMap::new())
                .await
                .unwrap();

        let listed = storage.list_with_prefix(&Path::from("nothing/here")).await.unwrap();
        assert!(listed.is_empty());
    }
}
