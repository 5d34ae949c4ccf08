use std::fmt;

use async_trait::async_trait;
use lambda_http::http::{Method, StatusCode};
use lambda_http::tracing;
use serde_json::Value;
use url::Url;

use crate::config::REDACTED;
use crate::error::ProxyError;

#[derive(Clone)]
pub(crate) struct UpstreamRequest {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) bearer: String,
    pub(crate) body: Option<Value>,
}

impl fmt::Debug for UpstreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("bearer", &REDACTED)
            .field("body", &self.body)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct UpstreamResponse {
    pub(crate) status: StatusCode,
    pub(crate) body: String,
}

/// One outbound call to the table API.
#[async_trait]
pub(crate) trait Upstream: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ProxyError>;
}

pub(crate) struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub(crate) fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ProxyError> {
        tracing::debug!(method = %request.method, url = %request.url, "sending to airtable");

        let mut builder = self
            .client
            .request(request.method, request.url)
            .bearer_auth(&request.bearer);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let res = builder
            .send()
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;

        tracing::debug!(status = status.as_u16(), bytes = body.len(), "airtable responded");
        Ok(UpstreamResponse { status, body })
    }
}
