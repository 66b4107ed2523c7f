//! Runtime handle for a single provider endpoint

use serde::Serialize;
use std::time::Duration;

use super::{BackendId, ProviderError, ProviderFailure};
use crate::config::ProviderConfig;

/// A provider endpoint with its own HTTP client and credentials
pub struct ProviderNode {
    pub backend: BackendId,
    pub url: String,
    pub model: String,
    api_key: String,
    pub http_client: reqwest::Client,
}

impl ProviderNode {
    pub fn new(
        backend: BackendId,
        config: &ProviderConfig,
        api_key: String,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            backend,
            url: config.url.clone(),
            model: config.model.clone(),
            api_key,
            http_client,
        }
    }

    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// POST a JSON body and return the response if the status is a success
    ///
    /// Non-success responses are logged with a body preview and classified
    /// into a [`ProviderFailure`].
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        streaming: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{}", self.base_url(), path);

        let mut request = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body);
        if streaming {
            request = request.header(reqwest::header::ACCEPT, "text/event-stream");
        }

        tracing::debug!(backend = %self.backend, url = %url, streaming, "Sending provider request");

        let response = request.send().await.map_err(|e| {
            tracing::warn!(backend = %self.backend, error = %e, "Provider request failed");
            self.error(ProviderFailure::from_reqwest(&e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let preview: String = error_body.chars().take(500).collect();
            tracing::warn!(
                backend = %self.backend,
                status = %status,
                error_body = %preview,
                "Provider returned error response"
            );
            return Err(self.error(ProviderFailure::from_status(status, &error_body)));
        }

        Ok(response)
    }

    pub fn error(&self, cause: ProviderFailure) -> ProviderError {
        ProviderError::new(self.backend, cause)
    }
}

/// Build an HTTP client for a single provider
pub fn build_node_client(config: &ProviderConfig) -> Result<reqwest::Client, Box<dyn std::error::Error>> {
    let mut client_builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .connect_timeout(Duration::from_secs(config.timeout_seconds.min(10)))
        .pool_max_idle_per_host(10);

    if let Some(ref tls) = config.tls {
        if tls.accept_invalid_certs {
            client_builder = client_builder.danger_accept_invalid_certs(true);
            tracing::warn!("TLS: Accepting invalid certificates (use only for development/testing)");
        }

        if let Some(ref ca_path) = tls.ca_cert_path {
            let ca_cert = std::fs::read(ca_path)?;
            let ca_cert = reqwest::Certificate::from_pem(&ca_cert)?;
            client_builder = client_builder.add_root_certificate(ca_cert);
            tracing::info!("TLS: Loaded custom CA certificate from {}", ca_path);
        }
    }

    Ok(client_builder.build()?)
}
