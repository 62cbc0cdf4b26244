//! HTTP clients for federated dispatch.
//!
//! All clients require TLS 1.3 or newer and share the configured pool
//! limits. The local peer gets a dedicated client that trusts the hub
//! service CA (or, in development mode, a local self-signed certificate);
//! remote peers validate against their per-peer CA bundle when one is
//! present in the peer secret.
use super::config::RemoteSearchService;
use crate::cluster::ClusterClient;
use crate::config::Config;
use anyhow::{Context, Result};
use reqwest::Certificate;
use std::sync::Arc;

const DEV_CA_PATH: &str = "sslcert/tls.crt";
const SERVICE_CA_NAMESPACE: &str = "open-cluster-management";
const SERVICE_CA_CONFIG_MAP: &str = "search-ca-crt";
const SERVICE_CA_KEY: &str = "service-ca.crt";

pub struct HttpClientPool {
    config: Arc<Config>,
    cluster: Arc<dyn ClusterClient>,
}

impl HttpClientPool {
    pub fn new(config: Arc<Config>, cluster: Arc<dyn ClusterClient>) -> Self {
        Self { config, cluster }
    }

    fn builder(&self) -> reqwest::ClientBuilder {
        let pool = &self.config.federation.http_pool;
        // reqwest's only pool-size knob is the per-host idle cap, so the
        // stricter of the two per-host limits binds it. The total idle cap
        // has no reqwest equivalent; it is bounded here by peers ×
        // per-host and logged with the rest of the configuration.
        let per_host = pool.max_idle_conn_per_host.min(pool.max_conns_per_host);
        if pool.max_idle_conns < per_host {
            tracing::warn!(
                max_idle_conns = pool.max_idle_conns,
                per_host,
                "MAX_IDLE_CONNS is below the per-host cap and cannot be enforced directly"
            );
        }
        reqwest::Client::builder()
            .min_tls_version(reqwest::tls::Version::TLS_1_3)
            .pool_max_idle_per_host(per_host)
            .pool_idle_timeout(pool.max_idle_conn_timeout)
            .read_timeout(pool.response_header_timeout)
            .timeout(pool.request_timeout)
    }

    /// Client for a remote peer, trusting its CA bundle when provided.
    pub fn remote_client(&self, peer: &RemoteSearchService) -> Result<reqwest::Client> {
        let mut builder = self.builder();
        match &peer.ca_bundle {
            Some(pem) => {
                let cert = Certificate::from_pem(pem)
                    .with_context(|| format!("parse CA bundle for peer {}", peer.name))?;
                builder = builder.add_root_certificate(cert);
            }
            None => {
                tracing::warn!(peer = %peer.name, "TLS CA bundle not provided for remote peer");
            }
        }
        builder.build().context("build peer http client")
    }

    /// Client for the in-process peer, trusting the hub service CA.
    pub async fn local_client(&self) -> Result<reqwest::Client> {
        let mut builder = self.builder();
        if self.config.development_mode {
            tracing::warn!("running in development mode; using local self-signed certificate");
            match std::fs::read(DEV_CA_PATH) {
                Ok(pem) => {
                    builder = builder
                        .add_root_certificate(Certificate::from_pem(&pem).context("parse dev CA")?);
                }
                Err(err) => {
                    tracing::error!(error = %err, path = DEV_CA_PATH, "error reading local self-signed certificate");
                }
            }
        } else {
            match self
                .cluster
                .read_config_map(SERVICE_CA_NAMESPACE, SERVICE_CA_CONFIG_MAP)
                .await
            {
                Ok(Some(data)) => {
                    if let Some(pem) = data.get(SERVICE_CA_KEY) {
                        builder = builder.add_root_certificate(
                            Certificate::from_pem(pem.as_bytes()).context("parse service CA")?,
                        );
                    }
                }
                Ok(None) => {
                    tracing::warn!(
                        config_map = SERVICE_CA_CONFIG_MAP,
                        "service CA config map not found"
                    );
                }
                Err(err) => {
                    tracing::error!(error = %err, "error getting the service CA config map");
                }
            }
        }
        builder.build().context("build local http client")
    }
}
