pub mod client;
pub mod image;
pub mod prompt;
pub mod types;
pub mod video;

pub use client::GeminiHttpClient;
pub use image::ImageGenerator;
pub use prompt::PromptSynthesizer;
pub use video::VeoVideoGenerator;

/// Adds a test-only `with_base_url` builder to a client wrapper whose
/// HTTP client lives in a field named `http`. Gate the invocation with
/// `#[cfg(test)]`.
macro_rules! impl_with_gemini_base_url {
    ($client:ty) => {
        impl $client {
            pub fn with_base_url(mut self, base_url: String) -> Self {
                self.http = self.http.with_base_url(base_url);
                self
            }
        }
    };
}
pub(crate) use impl_with_gemini_base_url;

#[cfg(test)]
pub mod test_support {
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockBuilder};

    pub const GENERATE_CONTENT_PATH_REGEX: &str = r"^/v1beta/models/[^/]+:generateContent$";
    pub const PREDICT_LONG_RUNNING_PATH_REGEX: &str =
        r"^/v1beta/models/[^/]+:predictLongRunning$";

    pub fn post_path_regex(pattern: &str) -> MockBuilder {
        Mock::given(method("POST")).and(path_regex(pattern))
    }

    pub fn get_path_regex(pattern: &str) -> MockBuilder {
        Mock::given(method("GET")).and(path_regex(pattern))
    }
}
