//! Seedream provider (ByteDance Seedream on Volcengine Ark).
//!
//! Synchronous, OpenAI-style images API.

use crate::error::Result;
use crate::image::debug::ResponseDumper;
use crate::image::payload::{extract_payload, resolve_payload, ImagePayload, ResponseShape};
use crate::image::provider::ImageProvider;
use crate::image::providers::{
    http_client, json_or_error, resolve_api_key, DEFAULT_REQUEST_TIMEOUT,
};
use crate::image::types::{GeneratedImage, GenerationMetadata, GenerationRequest, ImageProviderKind};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

const GENERATIONS_URL: &str = "https://ark.cn-beijing.volces.com/api/v3/images/generations";

const DEFAULT_SIZE: &str = "2K";

/// Seedream model variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SeedreamModel {
    /// Seedream 4.0 (default).
    #[default]
    Seedream40,
    /// Seedream 3.0 text-to-image.
    Seedream30,
    /// Any other Ark model id or inference endpoint id (`ep-...`).
    Custom(String),
}

impl SeedreamModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seedream40 => "doubao-seedream-4-0-250828",
            Self::Seedream30 => "doubao-seedream-3-0-t2i-250415",
            Self::Custom(id) => id,
        }
    }

    /// Maps a model id to a known variant, or `Custom`.
    pub fn from_id(id: &str) -> Self {
        match id {
            "doubao-seedream-4-0-250828" => Self::Seedream40,
            "doubao-seedream-3-0-t2i-250415" => Self::Seedream30,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Builder for [`SeedreamProvider`].
#[derive(Debug, Clone)]
pub struct SeedreamProviderBuilder {
    api_key: Option<String>,
    model: SeedreamModel,
    endpoint: Option<String>,
    default_size: String,
    response_format: Option<String>,
    timeout: Duration,
    dumper: ResponseDumper,
}

impl Default for SeedreamProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            model: SeedreamModel::default(),
            endpoint: None,
            default_size: DEFAULT_SIZE.to_string(),
            response_format: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            dumper: ResponseDumper::disabled(),
        }
    }
}

impl SeedreamProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `ARK_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the model variant.
    pub fn model(mut self, model: SeedreamModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the generation endpoint.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Size used when the request does not carry one.
    pub fn default_size(mut self, size: impl Into<String>) -> Self {
        self.default_size = size.into();
        self
    }

    /// Sets `response_format` ("url" or "b64_json"). Vendor default when unset.
    pub fn response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = Some(format.into());
        self
    }

    /// Sets the per-request HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Where raw responses are dumped.
    pub fn dumper(mut self, dumper: ResponseDumper) -> Self {
        self.dumper = dumper;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<SeedreamProvider> {
        let api_key =
            resolve_api_key(self.api_key, ImageProviderKind::Seedream.api_key_env_var())?;

        Ok(SeedreamProvider {
            client: http_client(self.timeout)?,
            api_key,
            model: self.model,
            endpoint: self.endpoint.unwrap_or_else(|| GENERATIONS_URL.to_string()),
            default_size: self.default_size,
            response_format: self.response_format,
            dumper: self.dumper,
        })
    }
}

/// Seedream image generation provider.
pub struct SeedreamProvider {
    client: reqwest::Client,
    api_key: String,
    model: SeedreamModel,
    endpoint: String,
    default_size: String,
    response_format: Option<String>,
    dumper: ResponseDumper,
}

impl SeedreamProvider {
    /// Creates a new [`SeedreamProviderBuilder`].
    pub fn builder() -> SeedreamProviderBuilder {
        SeedreamProviderBuilder::new()
    }
}

#[async_trait]
impl ImageProvider for SeedreamProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        request.validate()?;
        let start = Instant::now();

        let body = SeedreamRequest::from_generation_request(
            request,
            &self.model,
            &self.default_size,
            self.response_format.as_deref(),
        );

        tracing::debug!(
            model = %self.model.as_str(),
            row = ?request.row_number,
            "submitting Seedream generation request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let result = json_or_error(response).await?;
        self.dumper
            .dump(&ResponseDumper::response_name(request.row_number), &result);

        let (shape, payload) = extract_payload(&result, ResponseShape::SYNC)?;
        tracing::debug!(shape = ?shape, "found image in Seedream response");

        let data = resolve_payload(&self.client, &payload).await?;

        let source_url = match payload {
            ImagePayload::Url(url) => Some(url),
            ImagePayload::Base64(_) => None,
        };

        GeneratedImage::decode(
            data,
            ImageProviderKind::Seedream,
            GenerationMetadata {
                model: Some(self.model.as_str().to_string()),
                task_id: None,
                source_url,
                duration_ms: Some(start.elapsed().as_millis() as u64),
            },
        )
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Seedream
    }

    fn model(&self) -> &str {
        self.model.as_str()
    }
}

#[derive(Debug, Serialize)]
struct SeedreamRequest {
    model: String,
    prompt: String,
    size: String,
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<String>,
    watermark: bool,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl SeedreamRequest {
    fn from_generation_request(
        req: &GenerationRequest,
        model: &SeedreamModel,
        default_size: &str,
        response_format: Option<&str>,
    ) -> Self {
        Self {
            model: model.as_str().to_string(),
            prompt: req.prompt.clone(),
            size: req.size.clone().unwrap_or_else(|| default_size.to_string()),
            n: 1,
            negative_prompt: req.negative_prompt.clone(),
            response_format: response_format.map(str::to_string),
            watermark: req.watermark.unwrap_or(false),
            extra: req.extra.clone(),
        }
    }
}
