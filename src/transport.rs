//! Where the gRPC server listens.
//!
//! `transport.type` selects a TCP address (default `0.0.0.0:50051`) or a
//! Unix socket at `<uds.base_path>/stream.sock` for same-host clients.

use std::future::Future;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

use serde::Deserialize;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::service::Routes;
use tonic::transport::server::Router;
use tower::{Layer, Service};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    #[default]
    Tcp,
    Uds,
}

/// Listener settings. Only the section named by `type` is used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    #[serde(rename = "type")]
    pub transport_type: TransportType,
    pub tcp: TcpConfig,
    pub uds: UdsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50051,
        }
    }
}

impl TcpConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UdsConfig {
    /// Directory holding socket files.
    pub base_path: PathBuf,
}

impl Default for UdsConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/tmp/stream"),
        }
    }
}

impl UdsConfig {
    /// Socket file for a service under `base_path`.
    pub fn socket_path(&self, service_name: &str) -> PathBuf {
        self.base_path.join(format!("{}.sock", service_name))
    }

    /// Bind the service's socket, replacing a file left by an earlier run.
    ///
    /// The returned guard unlinks the socket when dropped.
    fn bind(&self, service_name: &str) -> std::io::Result<(UnixListenerStream, SocketFile)> {
        let path = self.socket_path(service_name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if path.exists() {
            info!(path = %path.display(), "Removing stale UDS socket");
            std::fs::remove_file(&path)?;
        }

        let listener = UnixListener::bind(&path)?;
        Ok((UnixListenerStream::new(listener), SocketFile(path)))
    }
}

/// Unlinks a bound socket file on drop.
struct SocketFile(PathBuf);

impl Drop for SocketFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.0.display(), error = %e, "Failed to remove UDS socket");
            }
        }
    }
}

/// Serve a gRPC router on the configured transport until `signal` completes.
pub async fn serve<L, ResBody, F>(
    router: Router<L>,
    config: &TransportConfig,
    service_name: &str,
    signal: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    L: Layer<Routes> + Clone,
    L::Service: Service<http::Request<tonic::body::BoxBody>, Response = http::Response<ResBody>>
        + Clone
        + Send
        + 'static,
    <L::Service as Service<http::Request<tonic::body::BoxBody>>>::Future: Send + 'static,
    <L::Service as Service<http::Request<tonic::body::BoxBody>>>::Error:
        Into<Box<dyn std::error::Error + Send + Sync>> + Send,
    ResBody: http_body::Body<Data = bytes::Bytes> + Send + 'static,
    ResBody::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    F: Future<Output = ()> + Send,
{
    match config.transport_type {
        TransportType::Tcp => {
            let addr = config.tcp.socket_addr()?;
            info!(
                service = %service_name,
                address = %addr,
                transport = "tcp",
                "Server listening"
            );
            router.serve_with_shutdown(addr, signal).await?;
        }
        TransportType::Uds => {
            let (incoming, socket) = config.uds.bind(service_name)?;
            info!(
                service = %service_name,
                path = %socket.0.display(),
                transport = "uds",
                "Server listening"
            );
            router.serve_with_incoming_shutdown(incoming, signal).await?;
        }
    }

    Ok(())
}

/// Tower layer that opens a `grpc` span per request, carrying the request
/// path and the caller's `x-correlation-id` header if present.
pub fn grpc_trace_layer() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::GrpcErrorsAsFailures>,
    impl Fn(&http::Request<tonic::body::BoxBody>) -> tracing::Span + Clone,
> {
    TraceLayer::new_for_grpc().make_span_with(|request: &http::Request<tonic::body::BoxBody>| {
        let correlation_id = request
            .headers()
            .get("x-correlation-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let path = request.uri().path();
        tracing::info_span!("grpc", %correlation_id, %path)
    })
}
