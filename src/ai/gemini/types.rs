//! Gemini wire schemas for `generateContent` and the file upload service.

use crate::models::GenerationConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level `generateContent` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

/// Untagged union of the request part shapes.
///
/// Each variant has a distinct required key, so decoding is unambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

/// Base64 inline payload used for image requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Reference to a file held by the provider's file service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub file_uri: String,
    pub mime_type: String,
}

/// `generateContent` response envelope.
///
/// Every level is optional: a missing segment means "no text", not a
/// malformed response. A level that is present must be an object (or an
/// array of objects), otherwise decoding fails.
#[derive(Debug, Default, Deserialize)]
#[serde(try_from = "Value")]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
}

impl TryFrom<Value> for GenerateContentResponse {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        ensure_object_levels(&value)?;
        let envelope: Envelope = serde_json::from_value(value).map_err(|e| e.to_string())?;
        Ok(Self {
            candidates: envelope.candidates,
        })
    }
}

/// Derived struct decoding also accepts JSON arrays, so the nesting is
/// checked on the raw value first.
fn ensure_object_levels(value: &Value) -> Result<(), String> {
    let root = value
        .as_object()
        .ok_or("expected a JSON object at the top level")?;

    for candidate in present_array(root, "candidates")? {
        let candidate = candidate
            .as_object()
            .ok_or("each candidate must be an object")?;
        let Some(content) = candidate.get("content").filter(|v| !v.is_null()) else {
            continue;
        };
        let content = content
            .as_object()
            .ok_or("candidate content must be an object")?;
        for part in present_array(content, "parts")? {
            part.as_object().ok_or("each content part must be an object")?;
        }
    }
    Ok(())
}

fn present_array<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a [Value], String> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(format!("'{}' must be an array", key)),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, if every segment is present.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .as_ref()?
            .first()?
            .text
            .as_deref()
    }
}

/// Metadata sent when starting a resumable upload.
#[derive(Debug, Serialize)]
pub struct UploadStartRequest {
    pub file: UploadFileMetadata,
}

#[derive(Debug, Serialize)]
pub struct UploadFileMetadata {
    pub display_name: String,
}

/// Response of the finalizing upload request.
///
/// Accepts both a flat `fileUri` and the file service's `{"file": {"uri"}}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFinalizeResponse {
    #[serde(default)]
    pub file_uri: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file: Option<UploadedFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl UploadFinalizeResponse {
    pub fn uri(&self) -> Option<&str> {
        self.file_uri
            .as_deref()
            .or_else(|| self.file.as_ref().and_then(|f| f.uri.as_deref()))
            .filter(|uri| !uri.is_empty())
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type
            .as_deref()
            .or_else(|| self.file.as_ref().and_then(|f| f.mime_type.as_deref()))
    }
}
