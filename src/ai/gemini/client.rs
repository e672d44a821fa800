use crate::{Error, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Lightweight Gemini REST client shared by the image, video, and prompt
/// modules. Unlike a per-model client, the model ID is a call argument so
/// the orchestrators can walk their candidate lists over one client.
pub struct GeminiHttpClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiHttpClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self::new_with_client(api_key, timeout, Client::new())
    }

    pub fn new_with_client(api_key: String, timeout: Duration, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Classify a non-success response into the crate error taxonomy.
    ///
    /// 503 or an "overloaded" message is a retryable-busy condition; 500
    /// usually means the prompt or reference payload was too complex.
    fn classify_error(status: reqwest::StatusCode, body: &str) -> Error {
        if status.as_u16() == 503 || body.to_lowercase().contains("overloaded") {
            return Error::Busy(
                "backend is currently overloaded, try again in about a minute".to_string(),
            );
        }
        if status.as_u16() == 500 {
            return Error::BackendInternal(
                "backend internal error, the prompt or reference images may be too complex"
                    .to_string(),
            );
        }
        Error::AiProvider(format!("Gemini API error (status {}): {}", status, body))
    }

    async fn post_to_url<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        url: String,
        request: &Req,
    ) -> Result<Resp> {
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to Gemini: {}", e);
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Gemini API error (status {}): {}", status, error_text);
            return Err(Self::classify_error(status, &error_text));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse Gemini response: {}\nBody: {}", e, body);
            Error::AiProvider(format!("Failed to parse Gemini response: {}", e))
        })
    }

    /// Calls `generateContent` for image and prompt requests.
    pub async fn generate_content<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        model: &str,
        request: &Req,
    ) -> Result<Resp> {
        let model = model.strip_prefix("models/").unwrap_or(model);
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        self.post_to_url(url, request).await
    }

    /// Calls `predictLongRunning` to submit an asynchronous video job.
    pub async fn predict_long_running<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        model: &str,
        request: &Req,
    ) -> Result<Resp> {
        let model = model.strip_prefix("models/").unwrap_or(model);
        let url = format!(
            "{}/v1beta/models/{}:predictLongRunning",
            self.base_url, model
        );
        self.post_to_url(url, request).await
    }

    /// Fetches the current state of a long-running operation by name.
    pub async fn get_operation<Resp: DeserializeOwned>(&self, name: &str) -> Result<Resp> {
        let url = format!("{}/v1beta/{}", self.base_url, name);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(Self::classify_error(status, &error_text));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            Error::AiProvider(format!("Failed to parse operation response: {}", e))
        })
    }

    /// Downloads binary media from a backend-returned URL, passing the API
    /// key since generated-file URLs require it.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::AiProvider(format!(
                "Failed to download media (status {})",
                status
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_classify_503_as_busy() {
        let err = GeminiHttpClient::classify_error(StatusCode::SERVICE_UNAVAILABLE, "whatever");
        assert!(matches!(err, Error::Busy(_)));
    }

    #[test]
    fn test_classify_overloaded_substring_as_busy() {
        let err = GeminiHttpClient::classify_error(
            StatusCode::TOO_MANY_REQUESTS,
            "The model is OVERLOADED right now",
        );
        assert!(matches!(err, Error::Busy(_)));
    }

    #[test]
    fn test_classify_500_as_backend_internal() {
        let err = GeminiHttpClient::classify_error(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(err, Error::BackendInternal(_)));
    }

    #[test]
    fn test_classify_other_as_provider_error() {
        let err = GeminiHttpClient::classify_error(StatusCode::FORBIDDEN, "forbidden");
        assert!(matches!(err, Error::AiProvider(_)));
    }
}
