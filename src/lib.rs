//! Stream - telemetry ingestion sink
//!
//! Receives HTTP access logs, CSP violation reports, navigation beacons and
//! repository star events over gRPC and appends each record to the SQLite
//! table for its kind.
//!
//! ## Architecture
//! ```text
//! [client] --(StreamService gRPC)--> [StreamSink] --> [Gateway] --> [SQLite]
//!                                      one handler      lazy per-kind
//!                                      per kind         schema + statement
//! ```

pub mod config;
pub mod handlers;
pub mod storage;
pub mod transport;
pub mod utils;

pub mod proto {
    tonic::include_proto!("stream");
}
