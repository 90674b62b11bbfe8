use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    pipeline::{Exported, Persistence, export_experiments, predict_tagged},
    remote::RemoteClient,
    state::AppState,
};

pub const HEALTH_MESSAGE: &str = "GoML gateway is running";

#[derive(Deserialize)]
pub struct PredictQuery {
    name: Option<String>,
    tag: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Target {
    Experiments,
    TaggedModel { name: String, tag: String },
}

impl PredictQuery {
    fn target(self) -> Result<Target, AppError> {
        let name = self.name.filter(|s| !s.trim().is_empty());
        let tag = self.tag.filter(|s| !s.trim().is_empty());

        match (name, tag) {
            (None, None) => Ok(Target::Experiments),
            (Some(name), Some(tag)) => Ok(Target::TaggedModel { name, tag }),
            (Some(_), None) => Err(AppError::MalformedQuery("tag is required with name")),
            (None, Some(_)) => Err(AppError::MalformedQuery("name is required with tag")),
        }
    }
}

#[derive(Serialize)]
pub struct PredictBody<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub data: T,
}

impl<T> From<Exported<T>> for PredictBody<T> {
    fn from(exported: Exported<T>) -> Self {
        let (status, stored_file, warning) = match exported.persistence {
            Persistence::Stored { key } => ("success", Some(key), None),
            Persistence::Degraded { reason, .. } => ("degraded", None, Some(reason)),
            Persistence::Disabled => ("not_persisted", None, None),
        };

        Self {
            status,
            stored_file,
            warning,
            data: exported.data,
        }
    }
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, HEALTH_MESSAGE)
}

pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PredictQuery>,
) -> Result<Response, AppError> {
    let target = query.target()?;
    let config = &state.config;

    let mut remote = RemoteClient::connect(&config.mlsolid_addr, config.connect_timeout).await?;

    let now = Utc::now();
    let store = state.storage.as_deref();

    let response = match target {
        Target::Experiments => {
            let exported = export_experiments(&mut remote, store, config.rpc_timeout, now).await?;
            Json(PredictBody::from(exported)).into_response()
        }
        Target::TaggedModel { name, tag } => {
            let exported =
                predict_tagged(&mut remote, store, &name, &tag, config.rpc_timeout, now).await?;
            Json(PredictBody::from(exported)).into_response()
        }
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(name: Option<&str>, tag: Option<&str>) -> PredictQuery {
        PredictQuery {
            name: name.map(str::to_string),
            tag: tag.map(str::to_string),
        }
    }

    #[test]
    fn test_target_selection() {
        assert_eq!(query(None, None).target().unwrap(), Target::Experiments);
        assert_eq!(query(Some(""), Some(" ")).target().unwrap(), Target::Experiments);
        assert_eq!(
            query(Some("churn"), Some("production")).target().unwrap(),
            Target::TaggedModel {
                name: "churn".to_string(),
                tag: "production".to_string()
            }
        );
    }

    #[test]
    fn test_partial_query_rejected() {
        assert!(matches!(
            query(Some("churn"), None).target(),
            Err(AppError::MalformedQuery(_))
        ));
        assert!(matches!(
            query(None, Some("production")).target(),
            Err(AppError::MalformedQuery(_))
        ));
    }

    #[test]
    fn test_body_shapes() {
        let stored = PredictBody::from(Exported {
            data: 1,
            persistence: Persistence::Stored {
                key: "exports/experiments_1.json".to_string(),
            },
        });
        assert_eq!(
            serde_json::to_value(&stored).unwrap(),
            serde_json::json!({
                "status": "success",
                "stored_file": "exports/experiments_1.json",
                "data": 1
            })
        );

        let degraded = PredictBody::from(Exported {
            data: 1,
            persistence: Persistence::Degraded {
                key: "exports/experiments_1.json".to_string(),
                reason: "timed out".to_string(),
            },
        });
        assert_eq!(
            serde_json::to_value(&degraded).unwrap(),
            serde_json::json!({ "status": "degraded", "warning": "timed out", "data": 1 })
        );

        let disabled = PredictBody::from(Exported {
            data: 1,
            persistence: Persistence::Disabled,
        });
        assert_eq!(
            serde_json::to_value(&disabled).unwrap(),
            serde_json::json!({ "status": "not_persisted", "data": 1 })
        );
    }
}
