//! Data models and structures
//!
//! Defines the values callers hand to the vision client (images, prompts,
//! credentials), what it hands back, and the environment configuration.

use crate::ai::mime;
use crate::{prompts, Error, Result};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Image bytes plus their MIME type. Always non-empty with a supported type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<Self> {
        let mime_type = mime_type.into().trim().to_ascii_lowercase();
        if bytes.is_empty() {
            return Err(Error::InvalidInput("image data is empty".to_string()));
        }
        if !mime::is_supported_image_mime(&mime_type) {
            return Err(Error::InvalidInput(format!(
                "unsupported image MIME type '{}' (expected one of: {})",
                mime_type,
                mime::SUPPORTED_IMAGE_MIME_TYPES.join(", ")
            )));
        }
        Ok(Self { bytes, mime_type })
    }

    /// Build a payload whose type is sniffed from the bytes themselves.
    pub fn detect(bytes: Vec<u8>) -> Result<Self> {
        let mime_type = mime::detect_image_mime(&bytes).ok_or_else(|| {
            Error::InvalidInput("could not recognize image format from its contents".to_string())
        })?;
        Self::new(bytes, mime_type)
    }

    /// Decode an already base64-encoded image (e.g. a rendered PDF page).
    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| Error::InvalidInput(format!("image data is not valid base64: {}", e)))?;
        Self::new(bytes, mime_type)
    }

    /// Read an image from disk; magic bytes win over the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime_type = mime::detect_image_mime(&bytes)
            .or_else(|| mime::mime_from_extension(path))
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "could not determine image type of {}",
                    path.display()
                ))
            })?;
        Self::new(bytes, mime_type)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Sampling and decoding options sent as `generationConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

impl GenerationConfig {
    /// Settings used for speech-friendly transcription.
    pub fn tts() -> Self {
        Self {
            temperature: Some(1.0),
            top_k: Some(40),
            top_p: Some(0.95),
            max_output_tokens: Some(8192),
            response_mime_type: Some("text/plain".to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn validate(&self) -> Result<()> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::InvalidInput(format!(
                    "temperature must be between 0 and 2, got {}",
                    t
                )));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidInput(format!(
                    "topP must be between 0 and 1, got {}",
                    p
                )));
            }
        }
        if self.top_k == Some(0) {
            return Err(Error::InvalidInput("topK must be positive".to_string()));
        }
        if self.max_output_tokens == Some(0) {
            return Err(Error::InvalidInput(
                "maxOutputTokens must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything textual about one describe call.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    system_instruction: Option<String>,
    user_prompt: String,
    generation_config: GenerationConfig,
}

impl PromptSpec {
    pub fn new(
        user_prompt: impl Into<String>,
        system_instruction: Option<String>,
        generation_config: GenerationConfig,
    ) -> Result<Self> {
        let user_prompt = user_prompt.into();
        if user_prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".to_string()));
        }
        generation_config.validate()?;

        let system_instruction = system_instruction.filter(|s| !s.trim().is_empty());

        Ok(Self {
            system_instruction,
            user_prompt,
            generation_config,
        })
    }

    /// Plain "describe this image" request without system instruction or tuning.
    pub fn describe() -> Self {
        Self {
            system_instruction: None,
            user_prompt: prompts::trimmed(prompts::DESCRIBE_USER),
            generation_config: GenerationConfig::default(),
        }
    }

    /// Speech-friendly request: bundled system instruction plus tuned sampling.
    pub fn tts() -> Self {
        Self {
            system_instruction: Some(prompts::trimmed(prompts::TTS_SYSTEM)),
            user_prompt: prompts::trimmed(prompts::DESCRIBE_USER),
            generation_config: GenerationConfig::tts(),
        }
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction.as_deref()
    }

    pub fn generation_config(&self) -> &GenerationConfig {
        &self.generation_config
    }
}

/// Reference to an image previously stored with the provider's file service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFileRef {
    pub uri: String,
    pub mime_type: String,
}

/// Image part of a describe request.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Inline(ImagePayload),
    Uploaded(UploadedFileRef),
}

impl From<ImagePayload> for ImageSource {
    fn from(payload: ImagePayload) -> Self {
        ImageSource::Inline(payload)
    }
}

impl From<UploadedFileRef> for ImageSource {
    fn from(file: UploadedFileRef) -> Self {
        ImageSource::Uploaded(file)
    }
}

pub const NO_TEXT_FOUND: &str = "Could not extract text from response.";

/// Outcome of a successful describe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiResponse {
    Text(String),
    /// The provider answered, but `candidates[0].content.parts[0].text` was absent.
    NoTextFound,
}

impl AiResponse {
    pub fn text(&self) -> &str {
        match self {
            AiResponse::Text(text) => text,
            AiResponse::NoTextFound => NO_TEXT_FOUND,
        }
    }

    pub fn has_text(&self) -> bool {
        matches!(self, AiResponse::Text(_))
    }
}

impl fmt::Display for AiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(Error::Config("API key must not be empty".to_string()));
        }
        Ok(Self { api_key })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

// Configuration
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .ok_or_else(|| Error::Config("GEMINI_API_KEY not set".to_string()))?;
        let credentials = Credentials::new(api_key)
            .map_err(|_| Error::Config("GEMINI_API_KEY is empty".to_string()))?;

        let model = lookup("GEMINI_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = lookup("GEMINI_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let timeout_secs = match lookup("GEMINI_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                Error::Config(format!(
                    "GEMINI_TIMEOUT_SECS must be a positive integer, got '{}'",
                    raw
                ))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            credentials,
            model,
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
