//! Application orchestration for describing a batch of images.

use crate::ai::{GeminiVisionClient, VisionService};
use crate::models::{AiResponse, Config, ImagePayload, ImageSource, PromptSpec};
use crate::Result;
use std::io::Write;
use std::path::Path;
use tracing::{error, info};

/// Largest payload sent inline; bigger images go through the file service.
pub const INLINE_LIMIT_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum UploadMode {
    /// Upload only images too large to inline.
    #[default]
    Auto,
    /// Upload every image and reference it by file URI.
    Always,
    /// Always send the image inline, whatever its size.
    Never,
}

/// One image to describe, with the names used for output and upload.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub label: String,
    pub display_name: String,
    pub payload: ImagePayload,
}

impl ImageInput {
    pub fn from_path(path: &Path) -> Result<Self> {
        let payload = ImagePayload::from_path(path)?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        Ok(Self {
            label: path.display().to_string(),
            display_name,
            payload,
        })
    }

    pub fn from_base64(data: &str, mime_type: &str) -> Result<Self> {
        Ok(Self {
            label: "<base64>".to_string(),
            display_name: "image".to_string(),
            payload: ImagePayload::from_base64(data, mime_type)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Sends each input to the vision service and writes the extracted text.
pub struct App {
    vision: Box<dyn VisionService>,
    prompt: PromptSpec,
    upload_mode: UploadMode,
}

impl App {
    /// Build an app around any `VisionService`, e.g. a mock in tests.
    pub fn with_services(
        vision: Box<dyn VisionService>,
        prompt: PromptSpec,
        upload_mode: UploadMode,
    ) -> Self {
        Self {
            vision,
            prompt,
            upload_mode,
        }
    }

    pub fn new(config: &Config, prompt: PromptSpec, upload_mode: UploadMode) -> Self {
        let client = GeminiVisionClient::from_config(config);
        info!(
            "Vision provider: Gemini (model: {}, timeout: {}s)",
            client.model(),
            config.timeout.as_secs()
        );
        Self::with_services(Box::new(client), prompt, upload_mode)
    }

    fn should_upload(&self, payload: &ImagePayload) -> bool {
        match self.upload_mode {
            UploadMode::Always => true,
            UploadMode::Never => false,
            UploadMode::Auto => payload.len() > INLINE_LIMIT_BYTES,
        }
    }

    /// Describe a single image, uploading it first when the mode calls for it.
    pub async fn describe(&self, input: &ImageInput) -> Result<AiResponse> {
        let source = if self.should_upload(&input.payload) {
            info!(
                "Uploading {} ({} bytes) before describing",
                input.label,
                input.payload.len()
            );
            let file = self
                .vision
                .upload_file(&input.payload, &input.display_name)
                .await?;
            ImageSource::Uploaded(file)
        } else {
            ImageSource::Inline(input.payload.clone())
        };

        Ok(self.vision.describe_image(&source, &self.prompt).await?)
    }

    /// Describe inputs one after another, in the given order.
    ///
    /// Text goes to `out`, per-image failures to `err`; a failure does not
    /// stop the batch.
    pub async fn run<W: Write, E: Write>(
        &self,
        inputs: &[ImageInput],
        out: &mut W,
        err: &mut E,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        let labelled = inputs.len() > 1;

        for (index, input) in inputs.iter().enumerate() {
            info!("Processing {} ({}/{})", input.label, index + 1, inputs.len());

            match self.describe(input).await {
                Ok(response) => {
                    if labelled {
                        writeln!(out, "==> {} <==", input.label)?;
                    }
                    writeln!(out, "{}", response)?;
                    summary.succeeded += 1;
                }
                Err(e) => {
                    error!("Failed to describe {}: {}", input.label, e);
                    writeln!(err, "error: {}: {}", input.label, e)?;
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Batch finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        Ok(summary)
    }
}
