use std::{io, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid storage endpoint {0:?}: expected an http:// or https:// URL")]
    InvalidEndpoint(String),

    #[error("Storage bucket name is empty")]
    EmptyBucket,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("Upload of {key} timed out after {timeout:?}")]
    Timeout { key: String, timeout: Duration },
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Failed to connect to mlsolid service at {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("mlsolid call timed out after {0:?}")]
    Timeout(Duration),

    #[error("mlsolid call failed ({code:?}): {message}")]
    Rpc { code: tonic::Code, message: String },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("Server error: {0}")]
    Serve(io::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed query: {0}")]
    MalformedQuery(&'static str),

    #[error("{0}")]
    Unreachable(RemoteError),

    #[error("{0}")]
    Upstream(RemoteError),

    #[error("{0}")]
    Encode(serde_json::Error),
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Connect { .. } => AppError::Unreachable(err),
            RemoteError::Timeout(_) | RemoteError::Rpc { .. } => AppError::Upstream(err),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Remote(remote) => remote.into(),
            PipelineError::Serialize(e) => AppError::Encode(e),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedQuery(_) => StatusCode::BAD_REQUEST,
            AppError::Unreachable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(%status, "Request failed: {self}");
        } else {
            warn!(%status, "Request rejected: {self}");
        }

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failure_is_internal_error() {
        let err: AppError = RemoteError::Connect {
            address: "mlsolid-service:5000".to_string(),
            reason: "connection refused".to_string(),
        }
        .into();

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("mlsolid-service:5000"));
    }

    #[test]
    fn test_rpc_failures_are_unavailable() {
        let timeout: AppError = RemoteError::Timeout(Duration::from_secs(5)).into();
        let rpc: AppError = PipelineError::Remote(RemoteError::Rpc {
            code: tonic::Code::Internal,
            message: "boom".to_string(),
        })
        .into();

        assert_eq!(timeout.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(rpc.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(rpc.to_string().contains("boom"));
    }

    #[test]
    fn test_malformed_query_is_bad_request() {
        let response = AppError::MalformedQuery("tag is required with name").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
