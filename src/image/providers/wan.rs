//! Wan text-to-image provider (Alibaba DashScope image synthesis).
//!
//! Asynchronous: the submit call returns a task id, which is polled at a
//! fixed interval until the task succeeds, fails, or the poll budget runs
//! out. The finished task carries a result URL (or inline base64).

use crate::error::{Result, SheetVizError};
use crate::image::debug::ResponseDumper;
use crate::image::payload::{extract_payload, resolve_payload, ImagePayload, ResponseShape};
use crate::image::provider::ImageProvider;
use crate::image::providers::{http_client, json_or_error, resolve_api_key};
use crate::image::task::{
    poll_until_terminal, GenerationTask, PollPolicy, TaskSnapshot, TaskStatus, TaskStatusSource,
};
use crate::image::types::{GeneratedImage, GenerationMetadata, GenerationRequest, ImageProviderKind};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

const SYNTHESIS_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/text2image/image-synthesis";
const TASKS_URL: &str = "https://dashscope.aliyuncs.com/api/v1/tasks";

const DEFAULT_SIZE: &str = "1024*1024";

/// Wan model variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WanModel {
    /// Wan 2.5 text-to-image preview (default).
    #[default]
    Wan25T2iPreview,
    /// Wan 2.2 text-to-image flash.
    Wan22T2iFlash,
    /// Any other DashScope model id.
    Custom(String),
}

impl WanModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Wan25T2iPreview => "wan2.5-t2i-preview",
            Self::Wan22T2iFlash => "wan2.2-t2i-flash",
            Self::Custom(id) => id,
        }
    }

    /// Maps a model id to a known variant, or `Custom`.
    pub fn from_id(id: &str) -> Self {
        match id {
            "wan2.5-t2i-preview" => Self::Wan25T2iPreview,
            "wan2.2-t2i-flash" => Self::Wan22T2iFlash,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Builder for [`WanProvider`].
#[derive(Debug, Clone)]
pub struct WanProviderBuilder {
    api_key: Option<String>,
    model: WanModel,
    endpoint: Option<String>,
    tasks_endpoint: Option<String>,
    default_size: String,
    timeout: Duration,
    poll: PollPolicy,
    dumper: ResponseDumper,
}

impl Default for WanProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            model: WanModel::default(),
            endpoint: None,
            tasks_endpoint: None,
            default_size: DEFAULT_SIZE.to_string(),
            timeout: Duration::from_secs(30),
            poll: PollPolicy::default(),
            dumper: ResponseDumper::disabled(),
        }
    }
}

impl WanProviderBuilder {
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
    pub fn model(mut self, model: WanModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the task submission endpoint.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Overrides the task status base URL (`<url>/<task_id>` is queried).
    pub fn tasks_endpoint(mut self, url: impl Into<String>) -> Self {
        self.tasks_endpoint = Some(url.into());
        self
    }

    /// Size used when the request does not carry one.
    pub fn default_size(mut self, size: impl Into<String>) -> Self {
        self.default_size = size.into();
        self
    }

    /// Sets the per-request HTTP timeout (each submit and each poll).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll.interval = interval;
        self
    }

    /// Sets the maximum number of status queries.
    pub fn max_polls(mut self, max_polls: u32) -> Self {
        self.poll.max_polls = max_polls;
        self
    }

    /// Where raw responses are dumped.
    pub fn dumper(mut self, dumper: ResponseDumper) -> Self {
        self.dumper = dumper;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<WanProvider> {
        let api_key = resolve_api_key(self.api_key, ImageProviderKind::Wan.api_key_env_var())?;
        if self.poll.max_polls == 0 {
            return Err(SheetVizError::Config("max_polls must be at least 1".into()));
        }

        Ok(WanProvider {
            client: http_client(self.timeout)?,
            api_key,
            model: self.model,
            endpoint: self.endpoint.unwrap_or_else(|| SYNTHESIS_URL.to_string()),
            tasks_endpoint: self
                .tasks_endpoint
                .unwrap_or_else(|| TASKS_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            default_size: self.default_size,
            poll: self.poll,
            dumper: self.dumper,
        })
    }
}

/// Wan text-to-image provider.
pub struct WanProvider {
    client: reqwest::Client,
    api_key: String,
    model: WanModel,
    endpoint: String,
    tasks_endpoint: String,
    default_size: String,
    poll: PollPolicy,
    dumper: ResponseDumper,
}

impl WanProvider {
    /// Creates a new [`WanProviderBuilder`].
    pub fn builder() -> WanProviderBuilder {
        WanProviderBuilder::new()
    }

    /// Submits a generation task and returns its id.
    async fn submit(&self, request: &GenerationRequest) -> Result<String> {
        let body = WanRequest::from_generation_request(request, &self.model, &self.default_size);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-DashScope-Async", "enable")
            .json(&body)
            .send()
            .await?;

        let result = json_or_error(response).await?;
        self.dumper
            .dump(&ResponseDumper::response_name(request.row_number), &result);

        result
            .get("output")
            .and_then(|o| o.get("task_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SheetVizError::UnexpectedResponse("No task_id in response".into()))
    }
}

#[async_trait]
impl TaskStatusSource for WanProvider {
    async fn query(&self, task_id: &str, poll: u32) -> Result<TaskSnapshot> {
        let url = format!("{}/{}", self.tasks_endpoint, task_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let body = json_or_error(response).await?;
        self.dumper
            .dump(&ResponseDumper::task_name(task_id, poll), &body);

        let output = body.get("output");
        let status = output
            .and_then(|o| o.get("task_status"))
            .and_then(Value::as_str)
            .map(TaskStatus::parse)
            .unwrap_or_else(|| TaskStatus::Unknown("<missing output>".into()));
        let message = output.and_then(|o| {
            let code = o.get("code").and_then(Value::as_str);
            let message = o.get("message").and_then(Value::as_str);
            match (code, message) {
                (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                (None, Some(message)) => Some(message.to_string()),
                (Some(code), None) => Some(code.to_string()),
                (None, None) => None,
            }
        });

        Ok(TaskSnapshot {
            status,
            message,
            body,
        })
    }
}

#[async_trait]
impl ImageProvider for WanProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        request.validate()?;
        let start = Instant::now();

        let task_id = self.submit(request).await?;
        tracing::debug!(
            task_id = %task_id,
            row = ?request.row_number,
            "submitted Wan generation task"
        );

        let mut task = GenerationTask::new(task_id);
        let result = poll_until_terminal(self, &mut task, &self.poll).await?;

        let (shape, payload) = extract_payload(&result, ResponseShape::TASK)?;
        tracing::debug!(
            task_id = %task.task_id,
            shape = ?shape,
            polls = task.polls,
            "generation complete"
        );

        let data = resolve_payload(&self.client, &payload).await?;

        let source_url = match payload {
            ImagePayload::Url(url) => Some(url),
            ImagePayload::Base64(_) => None,
        };

        GeneratedImage::decode(
            data,
            ImageProviderKind::Wan,
            GenerationMetadata {
                model: Some(self.model.as_str().to_string()),
                task_id: Some(task.task_id),
                source_url,
                duration_ms: Some(start.elapsed().as_millis() as u64),
            },
        )
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Wan
    }

    fn model(&self) -> &str {
        self.model.as_str()
    }
}

#[derive(Debug, Serialize)]
struct WanRequest {
    model: String,
    input: WanInput,
    parameters: WanParameters,
}

#[derive(Debug, Serialize)]
struct WanInput {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
struct WanParameters {
    size: String,
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_extend: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    watermark: Option<bool>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl WanRequest {
    fn from_generation_request(
        req: &GenerationRequest,
        model: &WanModel,
        default_size: &str,
    ) -> Self {
        Self {
            model: model.as_str().to_string(),
            input: WanInput {
                prompt: req.prompt.clone(),
                negative_prompt: req.negative_prompt.clone(),
            },
            parameters: WanParameters {
                size: req.size.clone().unwrap_or_else(|| default_size.to_string()),
                n: 1,
                prompt_extend: req.prompt_extend,
                watermark: req.watermark,
                extra: req.extra.clone(),
            },
        }
    }
}
