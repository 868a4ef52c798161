//! HTTP client for the streaming chat completion endpoint

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, info, warn};

use super::accumulator::AccumulatorOptions;
use super::pipeline::{transform_stream, OutboundStream};
use super::transform::Transform;
use super::types::ChatRequest;
use crate::error::{PipelineError, PipelineResult};

/// Default chat completion endpoint
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Connection settings for [`CompletionClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    /// Sent as `Authorization: Bearer <api_key>`
    pub api_key: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

/// Sends chat requests and pipes their SSE responses through the pipeline
pub struct CompletionClient {
    http: reqwest::Client,
    config: ClientConfig,
    transform: Arc<dyn Transform>,
    options: AccumulatorOptions,
}

impl CompletionClient {
    pub fn new(
        config: ClientConfig,
        transform: Arc<dyn Transform>,
        options: AccumulatorOptions,
    ) -> PipelineResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PipelineError::Config("API key is empty".to_string()));
        }
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            config,
            transform,
            options,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a streaming completion and return the transformed stream.
    ///
    /// Returns `Ok(None)` when the upstream answers without a body.
    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
    ) -> PipelineResult<Option<OutboundStream>> {
        let mut body = request.clone();
        body.stream = true;

        info!(
            "Starting streaming completion: model={}, {} messages",
            body.model,
            body.messages.len()
        );
        let response = self.build_request().json(&body).send().await?;
        let response = self.handle_error_response(response).await?;

        if response.status() == StatusCode::NO_CONTENT {
            info!("Upstream returned no body, nothing to stream");
            return Ok(None);
        }

        debug!("Upstream stream opened with status {}", response.status());
        Ok(Some(transform_stream(
            response.bytes_stream(),
            self.transform.clone(),
            self.options,
        )))
    }

    fn build_request(&self) -> RequestBuilder {
        self.http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .header(CONTENT_TYPE, "application/json")
    }

    async fn handle_error_response(&self, response: Response) -> PipelineResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Upstream request failed: status={}, body={}", status, body);
        Err(PipelineError::Upstream { status, body })
    }
}
