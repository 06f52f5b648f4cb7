use crate::error::ApiError;
use async_trait::async_trait;
use mockall::automock;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// `{base}?colos={colo}&targets={target_ip}`
pub fn request_uri(base: &str, colo: &str, target_ip: &str) -> Result<Url, url::ParseError> {
    Url::parse_with_params(base, &[("colos", colo), ("targets", target_ip)])
}

#[automock]
#[async_trait]
pub trait TracerouteApi: Send + Sync {
    /// Raw response body for one (colo, target) traceroute request
    async fn trace(&self, colo: &str, target_ip: &str) -> Result<String, ApiError>;
}

pub struct HttpTracerouteApi {
    client: reqwest::Client,
    base_uri: String,
}

impl HttpTracerouteApi {
    pub fn new(base_uri: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_uri: base_uri.to_string(),
        })
    }
}

#[async_trait]
impl TracerouteApi for HttpTracerouteApi {
    async fn trace(&self, colo: &str, target_ip: &str) -> Result<String, ApiError> {
        let url = request_uri(&self.base_uri, colo, target_ip)
            .map_err(|e| ApiError::Transport(format!("invalid traceroute URI: {e}")))?;
        debug!("GET {url}");

        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}
