//! Run configuration.
//!
//! Loaded once from a TOML file (or defaults), adjusted by CLI flags, then
//! passed into the pipeline. Credentials left unset here fall back to the
//! provider's environment variable.

use crate::batch::BatchOptions;
use crate::error::{Result, SheetVizError};
use crate::image::{GenerationRequest, ImageProvider, ImageProviderKind, ResponseDumper};
use crate::retry::RetryPolicy;
use crate::rows::RowSourceOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything a batch run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Which adapter to use.
    pub provider: ImageProviderKind,

    /// API key. Env var fallback when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Generation (or task submission) endpoint override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Task status base URL override (asynchronous providers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_endpoint: Option<String>,

    /// Model id; provider default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Vendor size string; provider default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Things every image should avoid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    /// Vendor-side prompt rewriting (Qwen defaults it on).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_extend: Option<bool>,

    /// Vendor watermark (off unless set).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<bool>,

    /// Seedream `response_format` ("url" or "b64_json").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,

    /// 0-based prompt column.
    pub column_index: usize,

    /// Whether the first row is a header.
    pub has_header: bool,

    /// Worksheet name; first sheet when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,

    /// Seconds to wait between rows.
    pub delay_secs: f64,

    /// Attempts per row.
    pub max_attempts: u32,

    /// Seconds between task status queries.
    pub poll_interval_secs: u64,

    /// Status queries before a task counts as timed out.
    pub max_polls: u32,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Where images, dumps and the report go.
    pub output_dir: PathBuf,

    /// Whether raw API responses are saved next to the images.
    pub write_debug_dumps: bool,

    /// Extra vendor parameters, e.g. `steps` or `guidance_scale`.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            provider: ImageProviderKind::Qwen,
            api_key: None,
            endpoint: None,
            tasks_endpoint: None,
            model: None,
            size: None,
            negative_prompt: None,
            prompt_extend: None,
            watermark: None,
            response_format: None,
            column_index: 0,
            has_header: true,
            sheet: None,
            delay_secs: 2.0,
            max_attempts: 3,
            poll_interval_secs: 30,
            max_polls: 30,
            request_timeout_secs: 120,
            output_dir: PathBuf::from("generated_images"),
            write_debug_dumps: true,
            extra: Map::new(),
        }
    }
}

impl BatchConfig {
    /// Parses and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SheetVizError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| SheetVizError::Config(format!("{}: {e}", path.display())))
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BatchConfig =
            toml::from_str(content).map_err(|e| SheetVizError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values no run can use.
    pub fn validate(&self) -> Result<()> {
        self.delay()?;
        if self.max_attempts == 0 {
            return Err(SheetVizError::Config("max_attempts must be at least 1".into()));
        }
        if self.max_polls == 0 {
            return Err(SheetVizError::Config("max_polls must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(SheetVizError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Row Source settings.
    pub fn row_options(&self) -> RowSourceOptions {
        RowSourceOptions {
            column_index: self.column_index,
            has_header: self.has_header,
            sheet: self.sheet.clone(),
        }
    }

    /// Shared request settings; prompt and row are filled per row.
    pub fn request_template(&self) -> GenerationRequest {
        GenerationRequest {
            size: self.size.clone(),
            negative_prompt: self
                .negative_prompt
                .clone()
                .filter(|n| !n.trim().is_empty()),
            prompt_extend: self.prompt_extend,
            watermark: self.watermark,
            extra: self.extra.clone(),
            ..GenerationRequest::default()
        }
    }

    /// Pause between rows.
    fn delay(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.delay_secs).map_err(|_| {
            SheetVizError::Config(format!(
                "delay_secs must be a non-negative number of seconds, got {}",
                self.delay_secs
            ))
        })
    }

    /// Batch Driver settings.
    pub fn batch_options(&self) -> Result<BatchOptions> {
        Ok(BatchOptions {
            delay: self.delay()?,
            retry: RetryPolicy::new(self.max_attempts),
            request: self.request_template(),
        })
    }

    /// Dumper writing into `dir`, or a disabled one.
    pub fn dumper(&self, dir: &Path) -> ResponseDumper {
        if self.write_debug_dumps {
            ResponseDumper::new(dir)
        } else {
            ResponseDumper::disabled()
        }
    }

    /// Builds the configured adapter.
    pub fn build_provider(
        &self,
        #[cfg_attr(
            not(any(feature = "qwen-image", feature = "wan-image", feature = "seedream-image")),
            allow(unused_variables)
        )]
        dumper: ResponseDumper,
    ) -> Result<Box<dyn ImageProvider>> {
        #[cfg(any(feature = "qwen-image", feature = "wan-image", feature = "seedream-image"))]
        let timeout = Duration::from_secs(self.request_timeout_secs);

        match self.provider {
            #[cfg(feature = "qwen-image")]
            ImageProviderKind::Qwen => {
                use crate::image::providers::{QwenModel, QwenProvider};

                let mut builder = QwenProvider::builder().timeout(timeout).dumper(dumper);
                if let Some(key) = &self.api_key {
                    builder = builder.api_key(key.as_str());
                }
                if let Some(model) = &self.model {
                    builder = builder.model(QwenModel::from_id(model));
                }
                if let Some(endpoint) = &self.endpoint {
                    builder = builder.endpoint(endpoint.as_str());
                }
                Ok(Box::new(builder.build()?))
            }

            #[cfg(feature = "wan-image")]
            ImageProviderKind::Wan => {
                use crate::image::providers::{WanModel, WanProvider};

                let mut builder = WanProvider::builder()
                    .timeout(timeout)
                    .poll_interval(Duration::from_secs(self.poll_interval_secs))
                    .max_polls(self.max_polls)
                    .dumper(dumper);
                if let Some(key) = &self.api_key {
                    builder = builder.api_key(key.as_str());
                }
                if let Some(model) = &self.model {
                    builder = builder.model(WanModel::from_id(model));
                }
                if let Some(endpoint) = &self.endpoint {
                    builder = builder.endpoint(endpoint.as_str());
                }
                if let Some(tasks) = &self.tasks_endpoint {
                    builder = builder.tasks_endpoint(tasks.as_str());
                }
                Ok(Box::new(builder.build()?))
            }

            #[cfg(feature = "seedream-image")]
            ImageProviderKind::Seedream => {
                use crate::image::providers::{SeedreamModel, SeedreamProvider};

                let mut builder = SeedreamProvider::builder().timeout(timeout).dumper(dumper);
                if let Some(key) = &self.api_key {
                    builder = builder.api_key(key.as_str());
                }
                if let Some(model) = &self.model {
                    builder = builder.model(SeedreamModel::from_id(model));
                }
                if let Some(endpoint) = &self.endpoint {
                    builder = builder.endpoint(endpoint.as_str());
                }
                if let Some(format) = &self.response_format {
                    builder = builder.response_format(format.as_str());
                }
                Ok(Box::new(builder.build()?))
            }

            #[allow(unreachable_patterns)]
            other => Err(SheetVizError::Config(format!(
                "provider {other} is not enabled in this build"
            ))),
        }
    }
}
