//! HTTP client for the crew backend.
//!
//! [`Backend`] is the seam the poller talks through; [`Client`] is the
//! reqwest implementation. Every non-2xx answer is a transport error
//! regardless of body (the backend answers success with 202).

pub mod types;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;

use crate::config::{DEFAULT_API_URL, DashboardConfig};
use crate::dispatch::UpdateRequest;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use types::{MinerDetail, MinerId, MinerRecord, PathKind, RunResult};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Operations the dashboard needs from the crew backend.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Status of every known miner.
    async fn miners(&self) -> Result<Vec<MinerRecord>>;

    /// Detail and pending delta for one miner.
    async fn miner(&self, id: MinerId) -> Result<MinerDetail>;

    /// Filesystem path of a rules file, for display.
    async fn path(&self, kind: PathKind) -> Result<String>;

    /// Ask the backend to push configuration. Fire-and-forget: success
    /// only means the request was accepted.
    async fn update(&self, request: &UpdateRequest) -> Result<()>;

    /// Reload the active rules. A non-empty answer is an error message
    /// meant for the operator.
    async fn reload(&self) -> Result<String>;

    /// Evaluate the rules under test against one miner.
    async fn run(&self, id: MinerId) -> Result<RunResult>;
}

/// reqwest-backed [`Backend`].
#[derive(Clone, Debug)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Client for a backend on the default local address.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_API_URL)
    }

    pub fn with_base_url(url: impl Into<String>) -> Self {
        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Client honoring the configured URL and request timeout.
    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| Error::Transport {
                url: config.api_url.clone(),
                source,
            })?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Contents of the rules file at `path` (as returned by
    /// [`Backend::path`]). The backend serves rules files under their
    /// last two path components.
    pub async fn rules(&self, path: &str) -> Result<String> {
        self.get_text(&rules_location(path)).await
    }

    fn url(&self, location: &str) -> String {
        format!("{}{}", self.base_url, location)
    }

    async fn send(&self, url: String, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|source| Error::Transport {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = %status, "Backend rejected request");
            return Err(Error::Status { url, status });
        }

        Ok(response)
    }

    async fn body_text(url: String, response: reqwest::Response) -> Result<String> {
        response
            .text()
            .await
            .map_err(|source| Error::Transport { url, source })
    }

    async fn get_text(&self, location: &str) -> Result<String> {
        let url = self.url(location);
        let response = self.send(url.clone(), self.http.get(&url)).await?;
        Self::body_text(url, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, location: &str) -> Result<T> {
        let url = self.url(location);
        let response = self.send(url.clone(), self.http.get(&url)).await?;
        let body = Self::body_text(url.clone(), response).await?;
        serde_json::from_str(&body).map_err(|source| Error::Decode { url, source })
    }

    async fn post_form(&self, location: &str, body: String) -> Result<reqwest::Response> {
        let url = self.url(location);
        trace!(url = %url, body = %body, "POST");
        let request = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, FORM_URLENCODED)
            .body(body);
        self.send(url, request).await
    }
}

#[async_trait]
impl Backend for Client {
    async fn miners(&self) -> Result<Vec<MinerRecord>> {
        self.get_json("/miners").await
    }

    async fn miner(&self, id: MinerId) -> Result<MinerDetail> {
        self.get_json(&format!("/miner?id={id}")).await
    }

    async fn path(&self, kind: PathKind) -> Result<String> {
        self.get_text(&format!("/path?type={kind}")).await
    }

    async fn update(&self, request: &UpdateRequest) -> Result<()> {
        self.post_form("/update", request.form_body()).await?;
        Ok(())
    }

    async fn reload(&self) -> Result<String> {
        let url = self.url("/reload");
        let response = self.post_form("/reload", String::new()).await?;
        Self::body_text(url, response).await
    }

    async fn run(&self, id: MinerId) -> Result<RunResult> {
        let url = self.url("/run");
        let response = self.post_form("/run", format!("id={}", id.0)).await?;
        let body = Self::body_text(url.clone(), response).await?;
        serde_json::from_str(&body).map_err(|source| Error::Decode { url, source })
    }
}

/// Location under which the backend serves the rules file at `path`.
fn rules_location(path: &str) -> String {
    let path = path.trim();
    let tail: Vec<&str> = path.rsplit('/').take(2).collect();
    let joined: Vec<&str> = tail.into_iter().rev().collect();
    format!("/{}", joined.join("/"))
}
