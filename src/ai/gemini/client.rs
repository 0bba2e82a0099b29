use super::types::{UploadFileMetadata, UploadFinalizeResponse, UploadStartRequest};
use crate::error::ApiError;
use crate::models::{Credentials, ImagePayload, UploadedFileRef, DEFAULT_BASE_URL};
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Lightweight Gemini REST client shared by the vision operations.
///
/// Every call is a single attempt; retry policy belongs to the caller.
pub struct GeminiHttpClient {
    client: Client,
    credentials: Credentials,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiHttpClient {
    /// Construct a Gemini client.
    ///
    /// `model` should be the bare model ID (for example `gemini-2.0-flash-exp`);
    /// a `models/` prefix is stripped.
    pub fn new(credentials: Credentials, model: String, timeout: Duration) -> Self {
        Self::new_with_client(credentials, model, timeout, Client::new())
    }

    pub fn new_with_client(
        credentials: Credentials,
        model: String,
        timeout: Duration,
        client: Client,
    ) -> Self {
        let model = model.strip_prefix("models/").unwrap_or(&model).to_string();

        Self {
            client,
            credentials,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Returns the configured model ID without the `models/` prefix.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|e| {
            let err = ApiError::transport(e);
            tracing::error!("Failed to send request to Gemini: {}", err);
            err
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.map_err(ApiError::transport)?;
            tracing::error!("Gemini API error (status {}): {}", status, body);
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn read_json<Resp: DeserializeOwned>(response: Response) -> Result<Resp, ApiError> {
        Self::read_json_keeping_raw(response)
            .await
            .map(|(parsed, _)| parsed)
    }

    /// Calls Gemini's `generateContent` endpoint.
    pub async fn generate_content<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        request: &Req,
    ) -> Result<Resp, ApiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        tracing::debug!("POST {}", url);

        let builder = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .query(&[("key", self.credentials.api_key())])
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(request);

        let response = self.send(builder).await?;
        Self::read_json(response).await
    }

    /// Two-step upload: announce the file, then post its bytes to the
    /// session URL the provider hands back.
    pub async fn upload_file(
        &self,
        image: &ImagePayload,
        display_name: &str,
    ) -> Result<UploadedFileRef, ApiError> {
        let upload_url = self.start_upload(image, display_name).await?;
        tracing::debug!("Uploading {} bytes for '{}'", image.len(), display_name);

        let builder = self
            .client
            .post(upload_url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, image.mime_type())
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", "0")
            .body(image.bytes().to_vec());

        let response = self.send(builder).await?;
        let (finalized, raw): (UploadFinalizeResponse, String) =
            Self::read_json_keeping_raw(response).await?;

        let uri = match finalized.uri() {
            Some(uri) => uri.to_string(),
            None => {
                tracing::error!("Upload response carried no file URI: {}", raw);
                return Err(ApiError::MissingFileUri { raw });
            }
        };
        let mime_type = finalized
            .mime_type()
            .unwrap_or(image.mime_type())
            .to_string();
        tracing::info!("Uploaded '{}' as {}", display_name, uri);

        Ok(UploadedFileRef { uri, mime_type })
    }

    async fn start_upload(&self, image: &ImagePayload, display_name: &str) -> Result<Url, ApiError> {
        let url = format!("{}/upload/v1beta/files", self.base_url);
        tracing::debug!("POST {} (start upload)", url);

        let metadata = UploadStartRequest {
            file: UploadFileMetadata {
                display_name: display_name.to_string(),
            },
        };

        let builder = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .query(&[("key", self.credentials.api_key())])
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", image.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", image.mime_type())
            .header(CONTENT_TYPE, "application/json")
            .json(&metadata);

        let response = self.send(builder).await?;

        let location = [LOCATION.as_str(), UPLOAD_URL_HEADER]
            .iter()
            .find_map(|name| {
                response
                    .headers()
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            })
            .ok_or_else(|| {
                tracing::error!("Upload initiation response carried no upload URL");
                ApiError::MissingUploadUrl
            })?;

        self.resolve_upload_url(location)
    }

    /// Relative session targets are resolved against the configured base URL.
    fn resolve_upload_url(&self, location: &str) -> Result<Url, ApiError> {
        Url::parse(&self.base_url)
            .and_then(|base| base.join(location))
            .map_err(|e| ApiError::Parse {
                message: format!("invalid upload URL: {}", e),
                raw: location.to_string(),
            })
    }

    async fn read_json_keeping_raw<Resp: DeserializeOwned>(
        response: Response,
    ) -> Result<(Resp, String), ApiError> {
        let body = response.text().await.map_err(ApiError::transport)?;
        match serde_json::from_str(&body) {
            Ok(parsed) => Ok((parsed, body)),
            Err(e) => {
                tracing::error!("Failed to parse Gemini response: {}\nBody: {}", e, body);
                Err(ApiError::Parse {
                    message: e.to_string(),
                    raw: body,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::gemini::test_support;
    use crate::error::ErrorKind;
    use wiremock::matchers::{body_bytes, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> GeminiHttpClient {
        GeminiHttpClient::new(
            Credentials::new("key").unwrap(),
            "models/gemini-2.0-flash-exp".to_string(),
            Duration::from_secs(5),
        )
        .with_base_url(base_url.to_string())
    }

    #[test]
    fn test_model_prefix_is_stripped() {
        assert_eq!(client("http://localhost").model(), "gemini-2.0-flash-exp");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        assert_eq!(client("http://localhost:9000/").base_url, "http://localhost:9000");
    }

    #[test]
    fn test_resolve_relative_upload_url() {
        let url = client("http://localhost:9000")
            .resolve_upload_url("/upload/v1beta/files?upload_id=abc")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/upload/v1beta/files?upload_id=abc"
        );
    }

    #[test]
    fn test_resolve_absolute_upload_url() {
        let url = client("http://localhost:9000")
            .resolve_upload_url("https://uploads.example.com/session/1")
            .unwrap();
        assert_eq!(url.as_str(), "https://uploads.example.com/session/1");
    }

    fn jpeg() -> ImagePayload {
        ImagePayload::new(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00], "image/jpeg").unwrap()
    }

    async fn mount_upload_start(server: &MockServer, location: &str) {
        Mock::given(method("POST"))
            .and(path(test_support::UPLOAD_START_PATH))
            .and(query_param("key", "key"))
            .and(header("x-goog-upload-protocol", "resumable"))
            .and(header("x-goog-upload-command", "start"))
            .and(header("x-goog-upload-header-content-length", "5"))
            .and(header("x-goog-upload-header-content-type", "image/jpeg"))
            .and(body_string_contains("\"display_name\":\"scan.jpg\""))
            .respond_with(ResponseTemplate::new(200).insert_header("Location", location))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_upload_file_two_step_protocol() {
        let server = MockServer::start().await;
        mount_upload_start(&server, &format!("{}/upload-session/abc", server.uri())).await;

        Mock::given(method("POST"))
            .and(path("/upload-session/abc"))
            .and(header("content-type", "image/jpeg"))
            .and(|req: &wiremock::Request| {
                req.headers
                    .get("x-goog-upload-command")
                    .is_some_and(|v| v == "upload, finalize")
            })
            .and(body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00]))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "fileUri": "https://generativelanguage.googleapis.com/v1beta/files/abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let file = client(&server.uri())
            .upload_file(&jpeg(), "scan.jpg")
            .await
            .unwrap();
        assert_eq!(
            file.uri,
            "https://generativelanguage.googleapis.com/v1beta/files/abc"
        );
        assert_eq!(file.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_upload_file_accepts_relative_location_and_nested_uri() {
        let server = MockServer::start().await;
        mount_upload_start(&server, "/upload-session/rel").await;

        Mock::given(method("POST"))
            .and(path("/upload-session/rel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "file": { "uri": "files/rel", "mimeType": "image/jpeg" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let file = client(&server.uri())
            .upload_file(&jpeg(), "scan.jpg")
            .await
            .unwrap();
        assert_eq!(file.uri, "files/rel");
    }

    #[tokio::test]
    async fn test_upload_file_missing_location() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(test_support::UPLOAD_START_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .upload_file(&jpeg(), "scan.jpg")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingUploadUrl);
    }

    #[tokio::test]
    async fn test_upload_file_missing_file_uri() {
        let server = MockServer::start().await;
        mount_upload_start(&server, &format!("{}/upload-session/abc", server.uri())).await;

        Mock::given(method("POST"))
            .and(path("/upload-session/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "ACTIVE"
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .upload_file(&jpeg(), "scan.jpg")
            .await
            .unwrap_err();
        match err {
            ApiError::MissingFileUri { raw } => assert!(raw.contains("ACTIVE")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_start_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(test_support::UPLOAD_START_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad metadata"))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .upload_file(&jpeg(), "scan.jpg")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let err = client("http://127.0.0.1:1")
            .generate_content::<_, serde_json::Value>(&serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportError);
        assert!(!err.to_string().contains("key="));
    }
}
