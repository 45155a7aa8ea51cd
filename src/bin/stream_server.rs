//! stream-server: telemetry ingestion sink
//!
//! Serves StreamService over gRPC and writes each record to SQLite.
//!
//! ## Architecture
//! ```text
//! [client] --(StreamService gRPC)--> [stream-server] --> SQLite
//!                                                        http | csp | beacon | repo
//! ```
//!
//! ## Configuration
//! - STREAM_CONFIG: Path to a YAML config file (optional)
//! - STREAM__STORAGE__DSN / DATABASE_URL: SQLite descriptor; unset disables storage
//! - STREAM__TRANSPORT__TCP__PORT: Port for gRPC services (default: 50051)
//! - STREAM_LOG: tracing filter (default: info)

use std::sync::Arc;

use tonic::transport::Server;
use tonic_health::server::health_reporter;
use tracing::{error, info, warn};

use stream::config::Config;
use stream::handlers::StreamSink;
use stream::proto::stream_service_server::StreamServiceServer;
use stream::storage::{Gateway, SqliteBackend};
use stream::transport::{grpc_trace_layer, serve};
use stream::utils::bootstrap::{init_tracing, shutdown_signal};

const SERVICE_NAME: &str = "stream";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;

    let gateway = if config.storage.is_enabled() {
        let gateway = match Gateway::open(&config.storage).await {
            Ok(gateway) => Arc::new(gateway),
            Err(e) => {
                error!(error = %e, "Failed to open storage");
                return Err(e.into());
            }
        };
        if config.storage.eager_init {
            let ready = gateway.warm_up().await;
            info!(ready, "Storage warm-up complete");
        }
        Some(gateway)
    } else {
        warn!("No storage descriptor configured, all requests will be rejected");
        None
    };

    let sink = match &gateway {
        Some(gateway) => StreamSink::new(Arc::clone(gateway)),
        None => StreamSink::<SqliteBackend>::disabled(),
    };

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<StreamServiceServer<StreamSink<SqliteBackend>>>()
        .await;

    let mut server = Server::builder();
    if let Some(timeout) = config.server.request_timeout() {
        server = server.timeout(timeout);
    }

    let router = server
        .layer(grpc_trace_layer())
        .add_service(health_service)
        .add_service(StreamServiceServer::new(sink));

    info!(storage = gateway.is_some(), "stream-server started");

    serve(router, &config.transport, SERVICE_NAME, shutdown_signal())
        .await?;

    if let Some(gateway) = gateway {
        info!("Closing storage");
        gateway.close().await;
    }

    info!("Shutdown complete");
    Ok(())
}
