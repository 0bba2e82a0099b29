use super::VisionService;
use crate::error::ApiError;
use crate::models::{AiResponse, ImagePayload, ImageSource, PromptSpec, UploadedFileRef};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// In-memory `VisionService` returning queued results.
///
/// Clones share the same queues and call logs.
#[derive(Clone)]
pub struct MockVisionClient {
    describe_responses: Arc<Mutex<VecDeque<Result<AiResponse, ApiError>>>>,
    describe_calls: Arc<Mutex<Vec<ImageSource>>>,
    upload_calls: Arc<Mutex<Vec<String>>>,
}

impl MockVisionClient {
    pub fn new() -> Self {
        Self {
            describe_responses: Arc::new(Mutex::new(VecDeque::new())),
            describe_calls: Arc::new(Mutex::new(Vec::new())),
            upload_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_text_response(self, text: &str) -> Self {
        self.describe_responses
            .lock()
            .unwrap()
            .push_back(Ok(AiResponse::Text(text.to_string())));
        self
    }

    pub fn with_error(self, error: ApiError) -> Self {
        self.describe_responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn get_describe_calls(&self) -> Vec<ImageSource> {
        self.describe_calls.lock().unwrap().clone()
    }

    pub fn get_upload_calls(&self) -> Vec<String> {
        self.upload_calls.lock().unwrap().clone()
    }
}

impl Default for MockVisionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisionService for MockVisionClient {
    async fn describe_image(
        &self,
        image: &ImageSource,
        _prompt: &PromptSpec,
    ) -> Result<AiResponse, ApiError> {
        self.describe_calls.lock().unwrap().push(image.clone());

        // Default mock response once the queue is drained
        self.describe_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AiResponse::Text("A mock description".to_string())))
    }

    async fn upload_file(
        &self,
        image: &ImagePayload,
        display_name: &str,
    ) -> Result<UploadedFileRef, ApiError> {
        let mut calls = self.upload_calls.lock().unwrap();
        calls.push(display_name.to_string());

        Ok(UploadedFileRef {
            uri: format!("mock://files/{}", calls.len()),
            mime_type: image.mime_type().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline() -> ImageSource {
        ImagePayload::new(vec![1, 2, 3], "image/png").unwrap().into()
    }

    #[tokio::test]
    async fn test_mock_default_response() {
        let client = MockVisionClient::new();
        let response = client
            .describe_image(&inline(), &PromptSpec::describe())
            .await
            .unwrap();
        assert_eq!(response.text(), "A mock description");
        assert_eq!(client.get_describe_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_queued_responses_in_order() {
        let client = MockVisionClient::new()
            .with_text_response("first")
            .with_error(ApiError::MissingUploadUrl);

        let first = client
            .describe_image(&inline(), &PromptSpec::describe())
            .await
            .unwrap();
        assert_eq!(first.text(), "first");

        let second = client
            .describe_image(&inline(), &PromptSpec::describe())
            .await;
        assert!(matches!(second, Err(ApiError::MissingUploadUrl)));
    }

    #[tokio::test]
    async fn test_mock_upload_numbers_files() {
        let client = MockVisionClient::new();
        let image = ImagePayload::new(vec![1], "image/jpeg").unwrap();

        let first = client.upload_file(&image, "a.jpg").await.unwrap();
        let second = client.upload_file(&image, "b.jpg").await.unwrap();

        assert_eq!(first.uri, "mock://files/1");
        assert_eq!(second.uri, "mock://files/2");
        assert_eq!(second.mime_type, "image/jpeg");
        assert_eq!(client.get_upload_calls(), vec!["a.jpg", "b.jpg"]);
    }
}
