//! Image generation: request/response types, the provider trait, response
//! parsing, task polling and the vendor adapters.

pub mod debug;
pub mod payload;
pub(crate) mod provider;
pub mod providers;
pub mod task;
pub(crate) mod types;

pub use debug::ResponseDumper;
pub use payload::{ImagePayload, ResponseShape};
pub use provider::ImageProvider;
pub use task::{GenerationTask, PollPolicy, TaskStatus};
pub use types::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProviderKind,
};
