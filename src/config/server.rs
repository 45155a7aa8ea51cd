//! Server configuration types.

use std::time::Duration;

use serde::Deserialize;

/// gRPC server settings not covered by the transport.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Upper bound on a single request, in milliseconds. Clients may ask
    /// for less with `grpc-timeout`.
    pub request_timeout_ms: Option<u64>,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let server = ServerConfig::default();
        assert_eq!(server.request_timeout(), None);
    }
}
