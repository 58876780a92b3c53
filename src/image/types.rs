//! Core types for image generation.

use crate::error::{Result, SheetVizError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Cursor;
use std::path::Path;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Image provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProviderKind {
    /// Alibaba Qwen image models (synchronous multimodal generation).
    Qwen,
    /// Alibaba Wan text-to-image models (asynchronous tasks).
    Wan,
    /// ByteDance Seedream models on Volcengine Ark.
    Seedream,
}

impl ImageProviderKind {
    /// Environment variable holding the credential for this provider.
    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            Self::Qwen | Self::Wan => "DASHSCOPE_API_KEY",
            Self::Seedream => "ARK_API_KEY",
        }
    }
}

impl std::fmt::Display for ImageProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Qwen => write!(f, "qwen"),
            Self::Wan => write!(f, "wan"),
            Self::Seedream => write!(f, "seedream"),
        }
    }
}

impl std::str::FromStr for ImageProviderKind {
    type Err = SheetVizError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "qwen" => Ok(Self::Qwen),
            "wan" => Ok(Self::Wan),
            "seedream" => Ok(Self::Seedream),
            other => Err(SheetVizError::Config(format!("unknown provider: {other}"))),
        }
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Vendor task id (asynchronous providers only).
    pub task_id: Option<String>,
    /// URL the image was downloaded from, when not returned inline.
    pub source_url: Option<String>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A request to generate one image.
///
/// Built per row immediately before the API call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Vendor size string (e.g. `1328*1328`, `2K`). Provider default when unset.
    pub size: Option<String>,
    /// Things the image should not contain.
    pub negative_prompt: Option<String>,
    /// Let the vendor rewrite the prompt before generating.
    pub prompt_extend: Option<bool>,
    /// Ask the vendor to add its watermark.
    pub watermark: Option<bool>,
    /// Extra vendor options merged into the request parameters.
    #[serde(default)]
    pub extra: Map<String, Value>,
    /// Spreadsheet row this request came from; keys debug dumps.
    pub row_number: Option<u32>,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Sets the vendor size string.
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Sets the negative prompt. Empty strings are ignored.
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        let negative = negative.into();
        if !negative.trim().is_empty() {
            self.negative_prompt = Some(negative);
        }
        self
    }

    /// Enables or disables vendor-side prompt rewriting.
    pub fn with_prompt_extend(mut self, enabled: bool) -> Self {
        self.prompt_extend = Some(enabled);
        self
    }

    /// Enables or disables the vendor watermark.
    pub fn with_watermark(mut self, enabled: bool) -> Self {
        self.watermark = Some(enabled);
        self
    }

    /// Adds one extra vendor option.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Tags the request with its spreadsheet row.
    pub fn with_row_number(mut self, row: u32) -> Self {
        self.row_number = Some(row);
        self
    }

    /// Rejects requests that can never succeed.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(SheetVizError::InvalidRequest("prompt is empty".into()));
        }
        Ok(())
    }
}

/// A generated image whose bytes are known to decode.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Raw image bytes as returned by the vendor.
    pub data: Vec<u8>,
    /// Image format of `data`.
    pub format: ImageFormat,
    /// Pixel dimensions (width, height).
    pub dimensions: (u32, u32),
    /// Provider that generated this image.
    pub provider: ImageProviderKind,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Validates `data` by decoding it and wraps it.
    ///
    /// Bytes that do not decode are a [`SheetVizError::Decode`] even when
    /// the HTTP layer reported success.
    pub fn decode(
        data: Vec<u8>,
        provider: ImageProviderKind,
        metadata: GenerationMetadata,
    ) -> Result<Self> {
        let decoded = ::image::load_from_memory(&data)
            .map_err(|e| SheetVizError::Decode(format!("invalid image data: {e}")))?;
        let format = ImageFormat::from_magic_bytes(&data).unwrap_or_default();
        Ok(Self {
            dimensions: (decoded.width(), decoded.height()),
            data,
            format,
            provider,
            metadata,
        })
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns the image re-encoded as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        if self.format == ImageFormat::Png {
            return Ok(self.data.clone());
        }
        let decoded = ::image::load_from_memory(&self.data)
            .map_err(|e| SheetVizError::Decode(e.to_string()))?;
        let mut out = Cursor::new(Vec::new());
        decoded
            .write_to(&mut out, ::image::ImageFormat::Png)
            .map_err(|e| SheetVizError::Decode(format!("PNG encoding failed: {e}")))?;
        Ok(out.into_inner())
    }

    /// Saves the image as PNG to the specified path.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_png()?)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;

    /// Encodes a small solid-colour image in the given format.
    pub fn encoded_image(width: u32, height: u32, format: ::image::ImageFormat) -> Vec<u8> {
        let img = ::image::RgbImage::from_pixel(width, height, ::image::Rgb([200, 40, 90]));
        let mut out = Cursor::new(Vec::new());
        ::image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, format)
            .unwrap();
        out.into_inner()
    }

    pub fn png_bytes() -> Vec<u8> {
        encoded_image(4, 3, ::image::ImageFormat::Png)
    }
}
