//! Image generation providers.

#[cfg(feature = "qwen-image")]
mod qwen;
#[cfg(feature = "seedream-image")]
mod seedream;
#[cfg(feature = "wan-image")]
mod wan;

#[cfg(feature = "qwen-image")]
pub use qwen::{QwenModel, QwenProvider, QwenProviderBuilder};

#[cfg(feature = "seedream-image")]
pub use seedream::{SeedreamModel, SeedreamProvider, SeedreamProviderBuilder};

#[cfg(feature = "wan-image")]
pub use wan::{WanModel, WanProvider, WanProviderBuilder};

#[cfg(any(feature = "qwen-image", feature = "wan-image", feature = "seedream-image"))]
use crate::error::{Result, SheetVizError};
#[cfg(any(feature = "qwen-image", feature = "wan-image", feature = "seedream-image"))]
use std::time::Duration;

/// Default per-request HTTP timeout.
#[cfg(any(feature = "qwen-image", feature = "seedream-image"))]
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Resolves the credential from the builder or the provider's env var.
#[cfg(any(feature = "qwen-image", feature = "wan-image", feature = "seedream-image"))]
pub(crate) fn resolve_api_key(explicit: Option<String>, env_var: &str) -> Result<String> {
    explicit
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.trim().is_empty()))
        .ok_or_else(|| SheetVizError::Auth(format!("{env_var} not set and no API key provided")))
}

/// Builds the shared HTTP client with a per-request timeout.
#[cfg(any(feature = "qwen-image", feature = "wan-image", feature = "seedream-image"))]
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Reads a JSON body, mapping non-success statuses to errors.
#[cfg(any(feature = "qwen-image", feature = "wan-image", feature = "seedream-image"))]
pub(crate) async fn json_or_error(response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let headers = response.headers().clone();
        let text = response.text().await.unwrap_or_default();
        return Err(SheetVizError::from_status(status.as_u16(), &text, &headers));
    }
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        SheetVizError::UnexpectedResponse(format!("response is not valid JSON: {e}"))
    })
}
