//! Image provider trait.

use crate::error::Result;
use crate::image::types::{GeneratedImage, GenerationRequest, ImageProviderKind};
use async_trait::async_trait;

/// Trait for image generation providers.
///
/// One call is one attempt: retries, backoff and row bookkeeping live in
/// [`crate::retry`] and [`crate::batch`].
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image from the given request.
    ///
    /// The returned image has already been decoded once, so callers can
    /// rely on its bytes being a valid image.
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ImageProviderKind;

    /// Returns the model identifier sent to the vendor.
    fn model(&self) -> &str;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            ImageProviderKind::Qwen => "Qwen Image (Alibaba DashScope)",
            ImageProviderKind::Wan => "Wan Text-to-Image (Alibaba DashScope)",
            ImageProviderKind::Seedream => "Seedream (Volcengine Ark)",
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::image::types::test_support::png_bytes;
    use crate::image::types::GenerationMetadata;
    use std::sync::Mutex;

    type Script = Box<dyn Fn(&GenerationRequest, u32) -> Result<()> + Send + Sync>;

    /// Provider whose per-call outcome is decided by a closure.
    ///
    /// The closure gets the request and the 1-based call number; `Ok(())`
    /// yields a small PNG.
    pub struct ScriptedProvider {
        script: Script,
        calls: Mutex<Vec<Option<u32>>>,
    }

    impl ScriptedProvider {
        pub fn new(
            script: impl Fn(&GenerationRequest, u32) -> Result<()> + Send + Sync + 'static,
        ) -> Self {
            Self {
                script: Box::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Number of `generate` calls so far.
        pub fn call_count(&self) -> u32 {
            self.calls.lock().unwrap().len() as u32
        }

        /// Row numbers of every call, in order.
        pub fn rows_seen(&self) -> Vec<Option<u32>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageProvider for ScriptedProvider {
        async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(request.row_number);
                calls.len() as u32
            };
            (self.script)(request, call)?;
            GeneratedImage::decode(
                png_bytes(),
                ImageProviderKind::Qwen,
                GenerationMetadata::default(),
            )
        }

        fn kind(&self) -> ImageProviderKind {
            ImageProviderKind::Qwen
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }
}
