//! StreamService gRPC handlers.
//!
//! One handler per event kind. Each makes sure the kind's table is ready,
//! then inserts the record's fields in column order.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{error, warn};

use super::records::Record;
use crate::proto::stream_service_server::StreamService;
use crate::proto::{Ack, BeaconRequest, CspRequest, HttpRequest, RepoRequest};
use crate::storage::{Backend, Gateway, Phase, StorageError};

/// StreamService implementation backed by a storage gateway.
///
/// Without a gateway (storage disabled) every call fails with
/// `FAILED_PRECONDITION` and nothing touches a database.
pub struct StreamSink<B: Backend> {
    gateway: Option<Arc<Gateway<B>>>,
}

impl<B: Backend> StreamSink<B> {
    pub fn new(gateway: Arc<Gateway<B>>) -> Self {
        Self {
            gateway: Some(gateway),
        }
    }

    pub fn disabled() -> Self {
        Self { gateway: None }
    }

    /// Store one record of kind `R::KIND`.
    pub async fn store<R: Record>(&self, record: R) -> Result<Ack, StorageError> {
        let gateway = self.gateway.as_deref().ok_or(StorageError::Disabled)?;

        gateway.ensure_ready(R::KIND).await?;
        gateway.insert(R::KIND, record.into_values()?).await?;

        Ok(Ack {})
    }

    async fn handle<R: Record>(&self, request: Request<R>) -> Result<Response<Ack>, Status> {
        match self.store(request.into_inner()).await {
            Ok(ack) => Ok(Response::new(ack)),
            Err(e) => {
                match e.phase() {
                    Some(Phase::Init) => {
                        warn!(kind = %R::KIND, phase = "init", error = %e, "Table not ready")
                    }
                    Some(Phase::Insert) => {
                        error!(kind = %R::KIND, phase = "insert", error = %e, "Failed to store record")
                    }
                    None => warn!(kind = %R::KIND, error = %e, "Storage unavailable"),
                }
                Err(e.into())
            }
        }
    }
}

#[tonic::async_trait]
impl<B: Backend> StreamService for StreamSink<B> {
    async fn log_http(&self, request: Request<HttpRequest>) -> Result<Response<Ack>, Status> {
        self.handle(request).await
    }

    async fn log_csp(&self, request: Request<CspRequest>) -> Result<Response<Ack>, Status> {
        self.handle(request).await
    }

    async fn log_beacon(&self, request: Request<BeaconRequest>) -> Result<Response<Ack>, Status> {
        self.handle(request).await
    }

    async fn log_repo(&self, request: Request<RepoRequest>) -> Result<Response<Ack>, Status> {
        self.handle(request).await
    }
}
