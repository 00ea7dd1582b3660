//! S3-compatible object storage used for exported BAG parquet artifacts.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use thiserror::Error;

/// Container every export lands in unless the deployment overrides it.
pub const DEFAULT_CONTAINER: &str = "development";

const ENV_BUCKET: &str = "BAG_STORE_BUCKET";
const ENV_REGION: &str = "BAG_STORE_REGION";
const ENV_ENDPOINT: &str = "BAG_STORE_ENDPOINT";
const ENV_ACCESS_KEY_ID: &str = "BAG_STORE_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "BAG_STORE_SECRET_ACCESS_KEY";
const ENV_FORCE_PATH_STYLE: &str = "BAG_STORE_FORCE_PATH_STYLE";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub force_path_style: bool,
}

impl StoreConfig {
    /// Resolves the store credential from the process environment, once per
    /// run. A missing credential is a configuration error; callers check this
    /// before any table work starts.
    pub fn from_env() -> Result<Self, StoreError> {
        let bucket =
            std::env::var(ENV_BUCKET).unwrap_or_else(|_| DEFAULT_CONTAINER.to_string());
        let region = std::env::var(ENV_REGION).unwrap_or_else(|_| "us-east-1".to_string());
        let endpoint = std::env::var(ENV_ENDPOINT).ok();
        let access_key_id = require_var(ENV_ACCESS_KEY_ID)?;
        let secret_access_key = require_var(ENV_SECRET_ACCESS_KEY)?;
        let force_path_style = std::env::var(ENV_FORCE_PATH_STYLE)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            bucket,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            force_path_style,
        })
    }
}

fn require_var(key: &str) -> Result<String, StoreError> {
    std::env::var(key)
        .map_err(|_| StoreError::Configuration(format!("{key} is not set in the environment")))
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("sdk error: {0}")]
    Sdk(String),
    #[error("object not found: {0}")]
    NotFound(String),
}

impl StoreError {
    fn from_sdk(err: impl fmt::Display) -> Self {
        Self::Sdk(err.to_string())
    }
}

/// Overwrite-on-put blob storage addressed by key. Last writer wins; there is
/// no versioning and no optimistic concurrency.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError>;
    async fn get_object(&self, key: &str) -> Result<Bytes, StoreError>;
    async fn delete_object(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(config: StoreConfig) -> Result<Self, StoreError> {
        if config.bucket.is_empty() {
            return Err(StoreError::Configuration(
                "bucket name cannot be empty".into(),
            ));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "static",
        );
        let loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(SharedCredentialsProvider::new(credentials));

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(StoreError::from_sdk)?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err {
                SdkError::ServiceError(service_err) => {
                    let message = service_err.err().to_string();
                    if message.contains("NoSuchKey") {
                        StoreError::NotFound(key.to_string())
                    } else {
                        StoreError::from_sdk(message)
                    }
                }
                other => StoreError::from_sdk(other),
            })?;

        let data = output.body.collect().await.map_err(StoreError::from_sdk)?;
        Ok(Bytes::from(data.into_bytes()))
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(StoreError::from_sdk)?;
        Ok(())
    }
}

/// In-memory store for tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_overwrites_on_put() {
        let store = MemoryObjectStore::new();
        store
            .put_object("bag/pand.parquet", Bytes::from_static(b"first"), "b/p")
            .await
            .unwrap();
        store
            .put_object("bag/pand.parquet", Bytes::from_static(b"second"), "b/p")
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let got = store.get_object("bag/pand.parquet").await.unwrap();
        assert_eq!(&got[..], b"second");
    }

    #[tokio::test]
    async fn memory_store_reports_missing_objects() {
        let store = MemoryObjectStore::new();
        let err = store.get_object("bag/nope.parquet").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn from_env_requires_the_credential_pair() {
        // Run both halves in one test so env mutation stays ordered.
        std::env::remove_var(ENV_ACCESS_KEY_ID);
        std::env::remove_var(ENV_SECRET_ACCESS_KEY);
        std::env::remove_var(ENV_BUCKET);

        let err = StoreConfig::from_env().unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));

        std::env::set_var(ENV_ACCESS_KEY_ID, "test-key");
        std::env::set_var(ENV_SECRET_ACCESS_KEY, "test-secret");

        let config = StoreConfig::from_env().unwrap();
        assert_eq!(config.bucket, DEFAULT_CONTAINER);
        assert_eq!(config.access_key_id, "test-key");

        std::env::remove_var(ENV_ACCESS_KEY_ID);
        std::env::remove_var(ENV_SECRET_ACCESS_KEY);
    }
}
