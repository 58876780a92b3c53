//! Locating image data inside vendor responses.
//!
//! Vendors document one response layout and return another often enough
//! that every provider tries a fixed, ordered list of known layouts. Each
//! [`ResponseShape`] either extracts an [`ImagePayload`] or reports "not
//! this shape"; the first match wins.

use crate::error::{Result, SheetVizError};
use serde_json::Value;

/// Where the image bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Inline base64 data (optionally a `data:` URL).
    Base64(String),
    /// HTTP(S) URL that must be fetched.
    Url(String),
}

impl ImagePayload {
    fn from_image_field(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else if value.starts_with("http://") || value.starts_with("https://") {
            Some(Self::Url(value.to_string()))
        } else {
            Some(Self::Base64(value.to_string()))
        }
    }
}

/// Known response layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"images": ["<base64>", ...]}`
    InlineImages,
    /// `{"output": {"choices": [{"message": {"content": [{"image": "<url or base64>"}]}}]}}`
    MessageContent,
    /// `{"data": [{"b64_json": "..."} | {"url": "..."}]}`
    DataList,
    /// `{"output": {"results": [{"url": "..."} | {"image": "<base64>"}]}}`
    TaskResults,
    /// `{"output": {"image": "<base64>"}}`
    OutputImage,
}

impl ResponseShape {
    /// Priority order for synchronous generation responses.
    pub const SYNC: &'static [ResponseShape] = &[
        ResponseShape::InlineImages,
        ResponseShape::MessageContent,
        ResponseShape::DataList,
    ];

    /// Priority order for finished asynchronous task responses.
    pub const TASK: &'static [ResponseShape] =
        &[ResponseShape::TaskResults, ResponseShape::OutputImage];

    /// Extracts the first image from `body`, or `None` if `body` is not this shape.
    pub fn extract(&self, body: &Value) -> Option<ImagePayload> {
        match self {
            Self::InlineImages => body
                .get("images")?
                .as_array()?
                .first()?
                .as_str()
                .filter(|s| !s.trim().is_empty())
                .map(|s| ImagePayload::Base64(s.to_string())),
            Self::MessageContent => body
                .get("output")?
                .get("choices")?
                .as_array()?
                .first()?
                .get("message")?
                .get("content")?
                .as_array()?
                .iter()
                .find_map(|part| {
                    part.get("image")?
                        .as_str()
                        .and_then(ImagePayload::from_image_field)
                }),
            Self::DataList => {
                let item = body.get("data")?.as_array()?.first()?;
                // Inline data first: it saves a second round trip.
                if let Some(b64) = item.get("b64_json").and_then(Value::as_str) {
                    if !b64.trim().is_empty() {
                        return Some(ImagePayload::Base64(b64.to_string()));
                    }
                }
                item.get("url")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| ImagePayload::Url(s.to_string()))
            }
            Self::TaskResults => {
                let first = body.get("output")?.get("results")?.as_array()?.first()?;
                if let Some(url) = first.get("url").and_then(Value::as_str) {
                    if !url.trim().is_empty() {
                        return Some(ImagePayload::Url(url.to_string()));
                    }
                }
                first
                    .get("image")
                    .and_then(Value::as_str)
                    .and_then(ImagePayload::from_image_field)
            }
            Self::OutputImage => body
                .get("output")?
                .get("image")?
                .as_str()
                .and_then(ImagePayload::from_image_field),
        }
    }
}

/// Tries each shape in order and returns the first match.
pub fn extract_payload(
    body: &Value,
    shapes: &[ResponseShape],
) -> Result<(ResponseShape, ImagePayload)> {
    shapes
        .iter()
        .find_map(|shape| shape.extract(body).map(|payload| (*shape, payload)))
        .ok_or_else(|| {
            let keys = body
                .as_object()
                .map(|o| o.keys().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_else(|| "<not an object>".into());
            SheetVizError::UnexpectedResponse(format!(
                "no image data in response (top-level keys: {keys})"
            ))
        })
}

/// Decodes a base64 string that may be imperfectly formatted.
///
/// Accepts a `data:` URI prefix, missing padding and embedded whitespace.
pub fn decode_base64_lenient(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;

    let b64 = match input.find(";base64,") {
        Some(pos) => &input[pos + 8..],
        None => input,
    };

    let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD.decode(&cleaned)
}

/// Downloads an image from `url`.
pub async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    tracing::debug!(url = %url, "downloading image");
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        let message = match status.as_u16() {
            403 | 410 => "image URL expired before download".to_string(),
            _ => "failed to download image".to_string(),
        };
        return Err(SheetVizError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.bytes().await?.to_vec())
}

/// Turns a payload into raw bytes, fetching URLs and decoding base64.
///
/// Both paths yield identical bytes for identical underlying images.
pub async fn resolve_payload(client: &reqwest::Client, payload: &ImagePayload) -> Result<Vec<u8>> {
    match payload {
        ImagePayload::Base64(data) => {
            decode_base64_lenient(data).map_err(|e| SheetVizError::Decode(e.to_string()))
        }
        ImagePayload::Url(url) => download(client, url).await,
    }
}
