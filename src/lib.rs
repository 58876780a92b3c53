#![warn(missing_docs)]
//! SheetViz - batch text-to-image generation from spreadsheet prompts.
//!
//! Reads one prompt per row from a spreadsheet column, generates one image
//! per row through a vendor adapter (Qwen, Wan or Seedream), retries
//! transient failures, and writes `row_NNNN.png` files plus a plain-text
//! report. Rows are processed strictly one after another.
//!
//! # Quick Start
//!
//! ```no_run
//! use sheetviz::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> sheetviz::Result<()> {
//!     let config = BatchConfig::default();
//!     let rows = read_prompt_rows("prompts.xlsx", &config.row_options())?;
//!
//!     let output = OutputDir::create(&config.output_dir)?;
//!     let provider = config.build_provider(config.dumper(output.path()))?;
//!
//!     let options = config.batch_options()?;
//!     let report = run_batch(&rows, provider.as_ref(), &options, &output).await;
//!     let ctx = ReportContext::new(provider.as_ref(), output.path()).with_source("prompts.xlsx");
//!     write_report(output.report_path(), &report, &ctx)?;
//!     Ok(())
//! }
//! ```
//!
//! # Single image
//!
//! ```no_run
//! use sheetviz::{GenerationRequest, ImageProvider, QwenProvider};
//!
//! #[tokio::main]
//! async fn main() -> sheetviz::Result<()> {
//!     let provider = QwenProvider::builder().build()?;
//!     let request = GenerationRequest::new("A flower shop with wooden doors");
//!     let image = provider.generate(&request).await?;
//!     image.save_png("flower_shop.png")?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `qwen-image`: Qwen image (Alibaba DashScope, synchronous)
//! - `wan-image`: Wan text-to-image (Alibaba DashScope, asynchronous tasks)
//! - `seedream-image`: Seedream (Volcengine Ark, synchronous)
//! - `image`: All providers
//! - `cli`: Command-line interface

mod error;

pub mod batch;
pub mod config;
pub mod image;
pub mod output;
pub mod report;
pub mod retry;
pub mod rows;

// Re-export error types at crate root
pub use error::{FailureKind, Result, SheetVizError};

pub use batch::{run_batch, BatchOptions, BatchReport, GenerationOutcome};
pub use config::BatchConfig;
pub use image::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProvider,
    ImageProviderKind, ResponseDumper,
};
pub use output::OutputDir;
pub use report::{render_report, write_report, ReportContext};
pub use retry::{generate_with_retry, RetryPolicy};
pub use rows::{read_prompt_rows, PromptRow, RowSourceOptions};

#[cfg(feature = "qwen-image")]
pub use image::providers::{QwenModel, QwenProvider, QwenProviderBuilder};

#[cfg(feature = "wan-image")]
pub use image::providers::{WanModel, WanProvider, WanProviderBuilder};

#[cfg(feature = "seedream-image")]
pub use image::providers::{SeedreamModel, SeedreamProvider, SeedreamProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::batch::{run_batch, BatchOptions, BatchReport, GenerationOutcome};
    pub use crate::config::BatchConfig;
    pub use crate::error::{Result, SheetVizError};
    pub use crate::image::{GeneratedImage, GenerationRequest, ImageProvider};
    pub use crate::output::OutputDir;
    pub use crate::report::{write_report, ReportContext};
    pub use crate::rows::{read_prompt_rows, PromptRow};

    #[cfg(feature = "qwen-image")]
    pub use crate::image::providers::QwenProvider;

    #[cfg(feature = "wan-image")]
    pub use crate::image::providers::WanProvider;

    #[cfg(feature = "seedream-image")]
    pub use crate::image::providers::SeedreamProvider;
}
