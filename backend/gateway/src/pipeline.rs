//! # Pipeline
//!
//! One RPC, one optional object write.
//!
//! 1. Call mlsolid through the request's own [`RemoteClient`].
//! 2. Serialize the result to JSON. These exact bytes are what gets stored.
//! 3. Write them under a key derived from the request timestamp.
//! 4. A failed write does not fail the pipeline, it comes back as
//!    [`Persistence::Degraded`] so the caller can report it.
//!
//! ## Keys
//! - Experiments export: `exports/experiments_<unix seconds>.json`
//! - Tagged model prediction: `prediction-<YYYYMMDD-HHMMSS>.json` (UTC)
use std::time::Duration;

use chrono::{DateTime, Utc};
use mlsolid::TaggedModelResponse;
use serde::Serialize;
use tracing::{info, warn};

use crate::{error::PipelineError, remote::RemoteClient, storage::ObjectStore};

pub fn experiments_key(at: DateTime<Utc>) -> String {
    format!("exports/experiments_{}.json", at.timestamp())
}

pub fn prediction_key(at: DateTime<Utc>) -> String {
    format!("prediction-{}.json", at.format("%Y%m%d-%H%M%S"))
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ExperimentsExport {
    pub exp_ids: Vec<String>,
    pub count: usize,
    pub timestamp: i64,
}

impl ExperimentsExport {
    pub fn new(exp_ids: Vec<String>, at: DateTime<Utc>) -> Self {
        Self {
            count: exp_ids.len(),
            exp_ids,
            timestamp: at.timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    Stored { key: String },
    Degraded { key: String, reason: String },
    Disabled,
}

impl Persistence {
    pub fn stored_key(&self) -> Option<&str> {
        match self {
            Persistence::Stored { key } => Some(key),
            _ => None,
        }
    }
}

pub struct Exported<T> {
    pub data: T,
    pub persistence: Persistence,
}

pub async fn persist(store: Option<&dyn ObjectStore>, key: String, payload: Vec<u8>) -> Persistence {
    let Some(store) = store else {
        return Persistence::Disabled;
    };

    match store.put(&key, payload).await {
        Ok(()) => {
            info!("Persisted s3://{}/{key}", store.bucket());
            Persistence::Stored { key }
        }
        Err(e) => {
            warn!("Continuing without persistence: {e}");
            Persistence::Degraded {
                key,
                reason: e.to_string(),
            }
        }
    }
}

async fn finish<T: Serialize>(
    data: T,
    store: Option<&dyn ObjectStore>,
    key: String,
) -> Result<Exported<T>, PipelineError> {
    let payload = serde_json::to_vec(&data)?;
    let persistence = persist(store, key, payload).await;

    Ok(Exported { data, persistence })
}

pub async fn export_experiments(
    remote: &mut RemoteClient,
    store: Option<&dyn ObjectStore>,
    deadline: Duration,
    at: DateTime<Utc>,
) -> Result<Exported<ExperimentsExport>, PipelineError> {
    let exp_ids = remote.list_experiments(deadline).await?;
    let export = ExperimentsExport::new(exp_ids, at);

    info!(
        "Fetched {} experiment ids from {}",
        export.count,
        remote.address()
    );

    finish(export, store, experiments_key(at)).await
}

pub async fn predict_tagged(
    remote: &mut RemoteClient,
    store: Option<&dyn ObjectStore>,
    name: &str,
    tag: &str,
    deadline: Duration,
    at: DateTime<Utc>,
) -> Result<Exported<TaggedModelResponse>, PipelineError> {
    let prediction = remote.tagged_model(name, tag, deadline).await?;

    info!("Fetched prediction for {name}:{tag} from {}", remote.address());

    finish(prediction, store, prediction_key(at)).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::error::StorageError;

    #[derive(Default)]
    struct RecordingStore {
        objects: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        fn bucket(&self) -> &str {
            "goml-data"
        }

        async fn put(&self, key: &str, payload: Vec<u8>) -> Result<(), StorageError> {
            self.objects.lock().unwrap().push((key.to_string(), payload));
            Ok(())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ObjectStore for BrokenStore {
        fn bucket(&self) -> &str {
            "goml-data"
        }

        async fn put(&self, key: &str, _payload: Vec<u8>) -> Result<(), StorageError> {
            Err(StorageError::Upload {
                key: key.to_string(),
                reason: "AccessDenied".to_string(),
            })
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_keys() {
        assert_eq!(experiments_key(at()), "exports/experiments_1741529107.json");
        assert_eq!(prediction_key(at()), "prediction-20250309-140507.json");

        assert_eq!(experiments_key(at()), experiments_key(at()));
        assert_ne!(
            experiments_key(at()),
            experiments_key(at() + chrono::Duration::seconds(1))
        );
    }

    #[test]
    fn test_export_payload() {
        let export = ExperimentsExport::new(vec!["a".to_string(), "b".to_string()], at());

        assert_eq!(
            serde_json::to_string(&export).unwrap(),
            r#"{"exp_ids":["a","b"],"count":2,"timestamp":1741529107}"#
        );
    }

    #[tokio::test]
    async fn test_persist_stored() {
        let store = RecordingStore::default();

        let outcome = persist(Some(&store), "k.json".to_string(), b"{}".to_vec()).await;

        assert_eq!(outcome.stored_key(), Some("k.json"));
        assert_eq!(
            store.objects.lock().unwrap().as_slice(),
            &[("k.json".to_string(), b"{}".to_vec())]
        );
    }

    #[tokio::test]
    async fn test_persist_degraded() {
        let outcome = persist(Some(&BrokenStore), "k.json".to_string(), b"{}".to_vec()).await;

        match outcome {
            Persistence::Degraded { key, reason } => {
                assert_eq!(key, "k.json");
                assert!(reason.contains("AccessDenied"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_persist_disabled() {
        let outcome = persist(None, "k.json".to_string(), b"{}".to_vec()).await;

        assert_eq!(outcome, Persistence::Disabled);
        assert_eq!(outcome.stored_key(), None);
    }
}
