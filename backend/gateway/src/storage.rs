//! # Garage
//!
//! S3-compatible object store running inside the cluster.
//!
//! Results are written once under a timestamp key and never read back by the
//! gateway. Objects are artifacts for external inspection, so there is no
//! index or manifest.
//!
//! ## Addressing
//!
//! - Garage signs with its own region name, `garage`
//! - Path-style addressing, the bucket is never moved into the hostname
//! - Static credentials from `SA_ACCESS_KEY`/`SA_SECRET_KEY`
//!
//! Each `put` is a single attempt. SDK retries are disabled.
//!
//! Empty credentials are accepted at startup. The first upload fails instead,
//! which the request pipeline records as degraded persistence.
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, retry::RetryConfig};
use aws_sdk_s3::{
    Client,
    config::{Builder, Credentials},
    error::DisplayErrorContext,
    primitives::ByteStream,
};
use tokio::time::timeout;
use tracing::info;

use crate::{
    config::StorageConfig,
    error::{ConfigError, StorageError},
};

pub const GARAGE_REGION: &str = "garage";

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Writes `payload` under `key`, replacing any existing object.
    async fn put(&self, key: &str, payload: Vec<u8>) -> Result<(), StorageError>;
}

pub struct GarageStore {
    client: Client,
    bucket: String,
    upload_timeout: Duration,
}

impl GarageStore {
    pub async fn initialize(config: &StorageConfig) -> Result<Self, ConfigError> {
        validate(config)?;

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "goml-static",
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(GARAGE_REGION))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .load()
            .await;

        let s3_config = Builder::from(&shared).force_path_style(true).build();

        info!(
            "Garage store ready: bucket {} at {}",
            config.bucket, config.endpoint
        );

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            upload_timeout: config.upload_timeout,
        })
    }
}

fn validate(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.bucket.is_empty() {
        return Err(ConfigError::EmptyBucket);
    }

    let has_host = ["http://", "https://"].iter().any(|scheme| {
        config
            .endpoint
            .strip_prefix(scheme)
            .is_some_and(|rest| !rest.is_empty())
    });

    if !has_host {
        return Err(ConfigError::InvalidEndpoint(config.endpoint.clone()));
    }

    Ok(())
}

#[async_trait]
impl ObjectStore for GarageStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, payload: Vec<u8>) -> Result<(), StorageError> {
        let size = payload.len();

        let upload = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(payload))
            .send();

        match timeout(self.upload_timeout, upload).await {
            Ok(Ok(_)) => {
                info!("Stored {size} bytes at s3://{}/{key}", self.bucket);
                Ok(())
            }
            Ok(Err(e)) => Err(StorageError::Upload {
                key: key.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            }),
            Err(_) => Err(StorageError::Timeout {
                key: key.to_string(),
                timeout: self.upload_timeout,
            }),
        }
    }
}
