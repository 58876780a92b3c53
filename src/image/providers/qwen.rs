//! Qwen image provider (Alibaba DashScope multimodal generation).
//!
//! Synchronous: one POST returns the image inline or as a short-lived URL.

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

const GENERATION_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/multimodal-generation/generation";

const DEFAULT_SIZE: &str = "1328*1328";

/// Qwen image model variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QwenModel {
    /// Qwen-Image Plus (default).
    #[default]
    QwenImagePlus,
    /// Qwen-Image.
    QwenImage,
    /// Any other DashScope model id.
    Custom(String),
}

impl QwenModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::QwenImagePlus => "qwen-image-plus",
            Self::QwenImage => "qwen-image",
            Self::Custom(id) => id,
        }
    }

    /// Maps a model id to a known variant, or `Custom`.
    pub fn from_id(id: &str) -> Self {
        match id {
            "qwen-image-plus" => Self::QwenImagePlus,
            "qwen-image" => Self::QwenImage,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Builder for [`QwenProvider`].
#[derive(Debug, Clone)]
pub struct QwenProviderBuilder {
    api_key: Option<String>,
    model: QwenModel,
    endpoint: Option<String>,
    default_size: String,
    timeout: Duration,
    dumper: ResponseDumper,
}

impl Default for QwenProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            model: QwenModel::default(),
            endpoint: None,
            default_size: DEFAULT_SIZE.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            dumper: ResponseDumper::disabled(),
        }
    }
}

impl QwenProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `DASHSCOPE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the model variant.
    pub fn model(mut self, model: QwenModel) -> Self {
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
    pub fn build(self) -> Result<QwenProvider> {
        let api_key = resolve_api_key(self.api_key, ImageProviderKind::Qwen.api_key_env_var())?;

        Ok(QwenProvider {
            client: http_client(self.timeout)?,
            api_key,
            model: self.model,
            endpoint: self.endpoint.unwrap_or_else(|| GENERATION_URL.to_string()),
            default_size: self.default_size,
            dumper: self.dumper,
        })
    }
}

/// Qwen image generation provider.
pub struct QwenProvider {
    client: reqwest::Client,
    api_key: String,
    model: QwenModel,
    endpoint: String,
    default_size: String,
    dumper: ResponseDumper,
}

impl QwenProvider {
    /// Creates a new [`QwenProviderBuilder`].
    pub fn builder() -> QwenProviderBuilder {
        QwenProviderBuilder::new()
    }
}

#[async_trait]
impl ImageProvider for QwenProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        request.validate()?;
        let start = Instant::now();

        let body = QwenRequest::from_generation_request(request, &self.model, &self.default_size);

        tracing::debug!(
            model = %self.model.as_str(),
            row = ?request.row_number,
            "submitting Qwen generation request"
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
        tracing::debug!(shape = ?shape, "found image in Qwen response");

        let data = resolve_payload(&self.client, &payload).await?;

        let source_url = match payload {
            ImagePayload::Url(url) => Some(url),
            ImagePayload::Base64(_) => None,
        };

        GeneratedImage::decode(
            data,
            ImageProviderKind::Qwen,
            GenerationMetadata {
                model: Some(self.model.as_str().to_string()),
                task_id: None,
                source_url,
                duration_ms: Some(start.elapsed().as_millis() as u64),
            },
        )
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Qwen
    }

    fn model(&self) -> &str {
        self.model.as_str()
    }
}

#[derive(Debug, Serialize)]
struct QwenRequest {
    model: String,
    input: QwenInput,
    parameters: QwenParameters,
}

#[derive(Debug, Serialize)]
struct QwenInput {
    messages: Vec<QwenMessage>,
}

#[derive(Debug, Serialize)]
struct QwenMessage {
    role: &'static str,
    content: Vec<QwenContent>,
}

#[derive(Debug, Serialize)]
struct QwenContent {
    text: String,
}

#[derive(Debug, Serialize)]
struct QwenParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<String>,
    prompt_extend: bool,
    watermark: bool,
    size: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl QwenRequest {
    fn from_generation_request(
        req: &GenerationRequest,
        model: &QwenModel,
        default_size: &str,
    ) -> Self {
        Self {
            model: model.as_str().to_string(),
            input: QwenInput {
                messages: vec![QwenMessage {
                    role: "user",
                    content: vec![QwenContent {
                        text: req.prompt.clone(),
                    }],
                }],
            },
            parameters: QwenParameters {
                negative_prompt: req.negative_prompt.clone(),
                prompt_extend: req.prompt_extend.unwrap_or(true),
                watermark: req.watermark.unwrap_or(false),
                size: req.size.clone().unwrap_or_else(|| default_size.to_string()),
                extra: req.extra.clone(),
            },
        }
    }
}
