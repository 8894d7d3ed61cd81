//! Accept loop tying the listener to the hash router.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::BalancerConfig;
use crate::load_balancer::AddressHashRouter;
use crate::net::connection::UdpConn;
use crate::net::listener::UdpListener;
use crate::proxy::UdpProxy;

/// Error type for server construction.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("backend '{name}' has invalid address '{address}': {source}")]
    InvalidBackend {
        name: String,
        address: String,
        source: std::net::AddrParseError,
    },
}

/// Routes every session accepted by a listener through one router.
#[derive(Debug)]
pub struct UdpServer {
    router: Arc<AddressHashRouter<UdpConn>>,
}

impl UdpServer {
    /// Build the backend pool in configuration order.
    pub fn new(config: &BalancerConfig) -> Result<Self, ServerError> {
        let router = Arc::new(AddressHashRouter::new());
        let idle_timeout = Duration::from_secs(config.proxy.idle_timeout_secs);

        for backend in &config.backends {
            let target: SocketAddr =
                backend
                    .address
                    .parse()
                    .map_err(|source| ServerError::InvalidBackend {
                        name: backend.name.clone(),
                        address: backend.address.clone(),
                        source,
                    })?;
            let index =
                router.add_backend(Arc::new(UdpProxy::new(&backend.name, target, idle_timeout)));
            tracing::info!(backend = %backend.name, target = %target, index, "Backend added");
        }

        Ok(Self { router })
    }

    /// Router shared with the accept loop.
    pub fn router(&self) -> &Arc<AddressHashRouter<UdpConn>> {
        &self.router
    }

    /// Route sessions until the listener stops.
    pub async fn run(self, mut listener: UdpListener) {
        tracing::info!(
            address = %listener.local_addr(),
            backends = self.router.len(),
            "UDP balancer starting"
        );
        if self.router.is_empty() {
            tracing::warn!("No backends configured, every session will be closed");
        }

        while let Some(conn) = listener.accept().await {
            self.router.route(conn);
        }

        tracing::info!("UDP balancer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn builds_pool_in_config_order() {
        let mut config = BalancerConfig::default();
        config.backends = vec![
            BackendConfig {
                name: "a".into(),
                address: "10.0.0.1:53".into(),
            },
            BackendConfig {
                name: "b".into(),
                address: "10.0.0.2:53".into(),
            },
        ];

        let server = UdpServer::new(&config).unwrap();
        assert_eq!(server.router().len(), 2);
    }

    #[test]
    fn rejects_bad_backend_address() {
        let mut config = BalancerConfig::default();
        config.backends = vec![BackendConfig {
            name: "a".into(),
            address: "localhost".into(),
        }];

        let err = UdpServer::new(&config).unwrap_err();
        assert!(matches!(err, ServerError::InvalidBackend { ref name, .. } if name == "a"));
    }
}
