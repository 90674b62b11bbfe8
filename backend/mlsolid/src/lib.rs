//! Contract of the external mlsolid experiment tracking service.
//!
//! The gateway is a pure client of this contract. Server stubs are generated
//! as well so integration tests can stand up a fake service.
pub mod proto {
    tonic::include_proto!("mlsolid");
}

pub use proto::{
    ExperimentsRequest, ExperimentsResponse, TaggedModelRequest, TaggedModelResponse,
    mlsolid_service_client::MlsolidServiceClient,
    mlsolid_service_server::{MlsolidService, MlsolidServiceServer},
};
