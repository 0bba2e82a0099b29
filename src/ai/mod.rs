//! AI service integration for image description
//!
//! Provides the provider-neutral `VisionService` interface and its Gemini
//! implementation, which sends images inline or via the file service and
//! extracts the generated text.

pub mod gemini;
pub mod mime;
pub mod mock;

pub use gemini::GeminiVisionClient;
pub use mock::MockVisionClient;

use crate::error::ApiError;
use crate::models::{AiResponse, ImagePayload, ImageSource, PromptSpec, UploadedFileRef};
use async_trait::async_trait;

#[async_trait]
pub trait VisionService: Send + Sync {
    /// One request, one attempt: send the image and prompt, return the first text part.
    async fn describe_image(
        &self,
        image: &ImageSource,
        prompt: &PromptSpec,
    ) -> Result<AiResponse, ApiError>;

    /// Store an image with the provider so later requests can reference it by URI.
    async fn upload_file(
        &self,
        image: &ImagePayload,
        display_name: &str,
    ) -> Result<UploadedFileRef, ApiError>;
}
