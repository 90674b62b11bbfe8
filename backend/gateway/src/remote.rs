//! # mlsolid
//!
//! gRPC client for the experiment tracking service.
//!
//! One connection per incoming request. The channel lives inside
//! [`RemoteClient`] and is torn down when the client is dropped, which happens
//! at the end of the handler on every path. Nothing is pooled.
//!
//! Plaintext only, the service is reached over the cluster network.
use std::time::Duration;

use mlsolid::{ExperimentsRequest, MlsolidServiceClient, TaggedModelRequest, TaggedModelResponse};
use tokio::time::timeout;
use tonic::{
    Code, Request, Response, Status,
    transport::{Channel, Endpoint},
};
use tracing::debug;

use crate::{config::DEFAULT_MLSOLID_ADDR, error::RemoteError};

pub struct RemoteClient {
    client: MlsolidServiceClient<Channel>,
    address: String,
}

/// Uses the configured address when it is set and non-blank.
pub fn resolve_address(value: Option<String>) -> String {
    value
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty())
        .unwrap_or_else(|| DEFAULT_MLSOLID_ADDR.to_string())
}

fn endpoint_uri(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}

impl RemoteClient {
    pub async fn connect(address: &str, connect_timeout: Duration) -> Result<Self, RemoteError> {
        let connect_error = |reason: String| RemoteError::Connect {
            address: address.to_string(),
            reason,
        };

        let endpoint = Endpoint::from_shared(endpoint_uri(address))
            .map_err(|e| connect_error(describe(&e)))?
            .connect_timeout(connect_timeout);

        let channel = match timeout(connect_timeout, endpoint.connect()).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => return Err(connect_error(describe(&e))),
            Err(_) => return Err(connect_error(format!("timed out after {connect_timeout:?}"))),
        };

        debug!("Connected to mlsolid at {address}");

        Ok(Self {
            client: MlsolidServiceClient::new(channel),
            address: address.to_string(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn list_experiments(&mut self, deadline: Duration) -> Result<Vec<String>, RemoteError> {
        let mut request = Request::new(ExperimentsRequest {});
        request.set_timeout(deadline);

        let response = settle(deadline, timeout(deadline, self.client.experiments(request)).await)?;

        Ok(response.exp_ids)
    }

    pub async fn tagged_model(
        &mut self,
        name: &str,
        tag: &str,
        deadline: Duration,
    ) -> Result<TaggedModelResponse, RemoteError> {
        let mut request = Request::new(TaggedModelRequest {
            name: name.to_string(),
            tag: tag.to_string(),
        });
        request.set_timeout(deadline);

        settle(deadline, timeout(deadline, self.client.tagged_model(request)).await)
    }
}

fn settle<T>(
    deadline: Duration,
    outcome: Result<Result<Response<T>, Status>, tokio::time::error::Elapsed>,
) -> Result<T, RemoteError> {
    match outcome {
        Ok(Ok(response)) => Ok(response.into_inner()),
        Ok(Err(status)) if status.code() == Code::DeadlineExceeded => {
            Err(RemoteError::Timeout(deadline))
        }
        Ok(Err(status)) => Err(RemoteError::Rpc {
            code: status.code(),
            message: status.message().to_string(),
        }),
        Err(_) => Err(RemoteError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_address() {
        assert_eq!(resolve_address(None), "mlsolid-service:5000");
        assert_eq!(resolve_address(Some("".to_string())), "mlsolid-service:5000");
        assert_eq!(resolve_address(Some("  ".to_string())), "mlsolid-service:5000");
        assert_eq!(resolve_address(Some("10.1.2.3:5000".to_string())), "10.1.2.3:5000");
    }

    #[test]
    fn test_endpoint_uri() {
        assert_eq!(endpoint_uri("mlsolid-service:5000"), "http://mlsolid-service:5000");
        assert_eq!(endpoint_uri("http://127.0.0.1:5000"), "http://127.0.0.1:5000");
    }

    #[test]
    fn test_settle_maps_status() {
        let deadline = Duration::from_secs(5);

        let unavailable = settle::<()>(deadline, Ok(Err(Status::unavailable("down")))).unwrap_err();
        assert!(matches!(
            unavailable,
            RemoteError::Rpc {
                code: Code::Unavailable,
                ..
            }
        ));

        let exceeded = settle::<()>(deadline, Ok(Err(Status::deadline_exceeded("slow")))).unwrap_err();
        assert!(matches!(exceeded, RemoteError::Timeout(d) if d == deadline));

        let ok = settle(deadline, Ok(Ok(Response::new(7)))).unwrap();
        assert_eq!(ok, 7);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let err = RemoteClient::connect("127.0.0.1:1", Duration::from_secs(2))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, RemoteError::Connect { ref address, .. } if address == "127.0.0.1:1"));
    }
}
