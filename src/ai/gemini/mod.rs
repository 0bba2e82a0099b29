pub mod client;
pub mod types;
pub mod vision;

pub use client::GeminiHttpClient;
pub use vision::GeminiVisionClient;

#[cfg(test)]
pub(crate) mod test_support {
    use wiremock::matchers::{method, path_regex};
    use wiremock::MockBuilder;

    pub const GENERATE_CONTENT_PATH_REGEX: &str = r"^/v1beta/models/[^/]+:generateContent$";
    pub const UPLOAD_START_PATH: &str = "/upload/v1beta/files";

    pub fn post_path_regex(pattern: &str) -> MockBuilder {
        wiremock::Mock::given(method("POST")).and(path_regex(pattern))
    }
}
