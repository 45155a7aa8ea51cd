//! End-to-end StreamService tests over a loopback TCP listener.
//!
//! Run with: cargo test --test grpc_integration

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use prost_types::Timestamp;
use sqlx::Row;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};
use tonic::Code;

use common::{count, fetch_all, open_gateway, Repo};
use stream::handlers::StreamSink;
use stream::proto::stream_service_client::StreamServiceClient;
use stream::proto::stream_service_server::StreamServiceServer;
use stream::proto::{Ack, BeaconRequest, CspRequest, HttpRequest, RepoRequest};
use stream::storage::{Backend, SqliteBackend};
use stream::transport::grpc_trace_layer;

/// Running server plus the handle that stops it.
struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start<B: Backend>(sink: StreamSink<B>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let router = Server::builder()
            .layer(grpc_trace_layer())
            .add_service(StreamServiceServer::new(sink));

        tokio::spawn(async move {
            router
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown: Some(shutdown_tx),
        }
    }

    async fn client(&self) -> StreamServiceClient<Channel> {
        StreamServiceClient::connect(format!("http://{}", self.addr))
            .await
            .expect("Failed to connect to server")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn t0() -> Option<Timestamp> {
    Some(Timestamp {
        seconds: 1704067200,
        nanos: 0,
    })
}

#[tokio::test]
async fn test_all_rpcs_acknowledge() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = open_gateway(dir.path()).await;
    let server = TestServer::start(StreamSink::new(Arc::clone(&gateway))).await;
    let mut client = server.client().await;

    let ack = client
        .log_http(HttpRequest {
            timestamp: t0(),
            method: "GET".to_string(),
            domain: "example.com".to_string(),
            path: "/".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(ack, Ack {});

    client
        .log_csp(CspRequest {
            timestamp: t0(),
            enforce: true,
            line_number: 7,
            ..Default::default()
        })
        .await
        .unwrap();
    client
        .log_beacon(BeaconRequest {
            duration_ms: 99,
            ..Default::default()
        })
        .await
        .unwrap();
    client
        .log_repo(RepoRequest {
            timestamp: t0(),
            owner: "acme".to_string(),
            repo: "widget".to_string(),
        })
        .await
        .unwrap();

    let pool = gateway.backend().pool();
    for table in ["http", "csp", "beacon", "repo"] {
        assert_eq!(count(pool, table).await, 1, "{}", table);
    }

    let rows = fetch_all(pool, Repo::Table, [Repo::Timestamp, Repo::Owner, Repo::Repo]).await;
    assert_eq!(rows[0].get::<String, _>("timestamp"), "2024-01-01T00:00:00Z");
    assert_eq!(rows[0].get::<String, _>("owner"), "acme");
    assert_eq!(rows[0].get::<String, _>("repo"), "widget");
}

#[tokio::test]
async fn test_disabled_storage_returns_failed_precondition() {
    let server = TestServer::start(StreamSink::<SqliteBackend>::disabled()).await;
    let mut client = server.client().await;

    let status = client
        .log_repo(RepoRequest::default())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);
    assert!(status.message().contains("storage disabled"));
}

#[tokio::test]
async fn test_unrepresentable_timestamp_returns_internal() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = open_gateway(dir.path()).await;
    let server = TestServer::start(StreamSink::new(Arc::clone(&gateway))).await;
    let mut client = server.client().await;

    let status = client
        .log_http(HttpRequest {
            timestamp: Some(Timestamp {
                seconds: 0,
                nanos: -5,
            }),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
    assert!(status.message().starts_with("http insert"));
    assert_eq!(count(gateway.backend().pool(), "http").await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = open_gateway(dir.path()).await;
    let server = TestServer::start(StreamSink::new(Arc::clone(&gateway))).await;
    let client = server.client().await;

    let calls = (0..25).map(|i| {
        let mut client = client.clone();
        async move {
            client
                .log_beacon(BeaconRequest {
                    duration_ms: i,
                    src_page: "/".to_string(),
                    dst_page: format!("/{}", i),
                    ..Default::default()
                })
                .await
        }
    });

    let results = futures::future::join_all(calls).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(count(gateway.backend().pool(), "beacon").await, 25);
}
