use super::client::GeminiHttpClient;
use super::types::{Content, FileData, GenerateContentRequest, GenerateContentResponse, InlineData, Part};
use crate::ai::VisionService;
use crate::error::ApiError;
use crate::models::{
    AiResponse, Config, Credentials, ImagePayload, ImageSource, PromptSpec, UploadedFileRef,
};
use async_trait::async_trait;
use std::time::Duration;

// Gemini accepts "user" or "model" roles only, including on the system instruction block.
const USER_ROLE: &str = "user";

pub struct GeminiVisionClient {
    http: GeminiHttpClient,
}

impl GeminiVisionClient {
    pub fn new(credentials: Credentials, model: String, timeout: Duration) -> Self {
        Self::new_with_client(credentials, model, timeout, reqwest::Client::new())
    }

    pub fn new_with_client(
        credentials: Credentials,
        model: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(credentials, model, timeout, client),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.credentials.clone(),
            config.model.clone(),
            config.timeout,
        )
        .with_base_url(config.base_url.clone())
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    pub fn model(&self) -> &str {
        self.http.model()
    }

    /// Assemble the `generateContent` body: image part first, then the prompt.
    pub fn build_request(image: &ImageSource, prompt: &PromptSpec) -> GenerateContentRequest {
        let image_part = match image {
            ImageSource::Inline(payload) => Part::InlineData {
                inline_data: InlineData {
                    mime_type: payload.mime_type().to_string(),
                    data: payload.to_base64(),
                },
            },
            ImageSource::Uploaded(file) => Part::FileData {
                file_data: FileData {
                    file_uri: file.uri.clone(),
                    mime_type: file.mime_type.clone(),
                },
            },
        };

        let system_instruction = prompt.system_instruction().map(|text| Content {
            role: Some(USER_ROLE.to_string()),
            parts: vec![Part::Text {
                text: text.to_string(),
            }],
        });

        let generation_config = Some(prompt.generation_config())
            .filter(|config| !config.is_empty())
            .cloned();

        GenerateContentRequest {
            contents: vec![Content {
                role: Some(USER_ROLE.to_string()),
                parts: vec![
                    image_part,
                    Part::Text {
                        text: prompt.user_prompt().to_string(),
                    },
                ],
            }],
            system_instruction,
            generation_config,
        }
    }
}

#[async_trait]
impl VisionService for GeminiVisionClient {
    async fn describe_image(
        &self,
        image: &ImageSource,
        prompt: &PromptSpec,
    ) -> Result<AiResponse, ApiError> {
        match image {
            ImageSource::Inline(payload) => tracing::debug!(
                "Describing inline image ({} bytes, {}) via Gemini",
                payload.len(),
                payload.mime_type()
            ),
            ImageSource::Uploaded(file) => {
                tracing::debug!("Describing uploaded image {} via Gemini", file.uri)
            }
        }

        let request = Self::build_request(image, prompt);
        let response: GenerateContentResponse = self.http.generate_content(&request).await?;

        match response.first_text() {
            Some(text) => Ok(AiResponse::Text(text.to_string())),
            None => {
                tracing::warn!("Gemini response carried no text at candidates[0].content.parts[0]");
                Ok(AiResponse::NoTextFound)
            }
        }
    }

    async fn upload_file(
        &self,
        image: &ImagePayload,
        display_name: &str,
    ) -> Result<UploadedFileRef, ApiError> {
        self.http.upload_file(image, display_name).await
    }
}
