//! Alternate video backend (Kling job queue)
//!
//! Kling authenticates with short-lived HS256 tokens signed from an
//! access/secret key pair. Tokens are reissued on every poll so a long
//! wait cannot outlive the credential. Jobs are submitted, polled to a
//! terminal state, and the finished video downloaded from the returned
//! URL.

use crate::models::{GenerationConfig, MediaPayload};
use crate::{Error, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, Instant};

const KLING_BASE_URL: &str = "https://api.klingai.com";

/// Kling jobs can queue for a long time; fixed deadline, not configurable.
const POLL_TIMEOUT: Duration = Duration::from_secs(1200);
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Signed tokens stay valid well past a single poll round-trip.
const TOKEN_TTL_SECS: i64 = 1800;

/// Fixed translation of caller camera-movement names onto Kling's simple
/// camera config. One axis per movement.
const CAMERA_MOVEMENTS: [(&str, &str, f64); 8] = [
    ("zoomIn", "zoom", 5.0),
    ("zoomOut", "zoom", -5.0),
    ("panLeft", "pan", -5.0),
    ("panRight", "pan", 5.0),
    ("tiltUp", "tilt", 5.0),
    ("tiltDown", "tilt", -5.0),
    ("truckLeft", "horizontal", -5.0),
    ("truckRight", "horizontal", 5.0),
];

#[derive(Debug, Serialize)]
struct VideoJobRequest {
    model_name: String,
    prompt: String,
    duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<String>,
    /// Raw base64, no data-URI header.
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    camera_control: Option<CameraControl>,
}

#[derive(Debug, Serialize)]
struct CameraControl {
    #[serde(rename = "type")]
    control_type: String,
    config: CameraConfig,
}

#[derive(Debug, Serialize, Default)]
struct CameraConfig {
    horizontal: f64,
    vertical: f64,
    pan: f64,
    tilt: f64,
    roll: f64,
    zoom: f64,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<JobData>,
}

#[derive(Debug, Deserialize)]
struct JobData {
    task_id: String,
    #[serde(default)]
    task_status: String,
    #[serde(default)]
    task_status_msg: Option<String>,
    #[serde(default)]
    task_result: Option<JobResult>,
}

#[derive(Debug, Deserialize)]
struct JobResult {
    #[serde(default)]
    videos: Vec<JobVideo>,
}

#[derive(Debug, Deserialize)]
struct JobVideo {
    url: String,
}

pub struct KlingClient {
    client: reqwest::Client,
    access_key: String,
    secret_key: String,
    base_url: String,
}

/// Kling accepts only 5 or 10 second clips; anything above 5 rounds up.
pub fn effective_duration(requested: Option<u32>) -> u32 {
    match requested {
        Some(secs) if secs > 5 => 10,
        _ => 5,
    }
}

/// Strip a data-URI header, leaving the raw base64 payload Kling expects.
fn strip_data_uri_header(image: &str) -> &str {
    if image.starts_with("data:") {
        image.split_once(',').map(|(_, b64)| b64).unwrap_or(image)
    } else {
        image
    }
}

fn camera_control_for(movement: &str) -> Option<CameraControl> {
    let (_, axis, value) = CAMERA_MOVEMENTS
        .iter()
        .find(|(name, _, _)| *name == movement)?;
    let mut config = CameraConfig::default();
    match *axis {
        "horizontal" => config.horizontal = *value,
        "vertical" => config.vertical = *value,
        "pan" => config.pan = *value,
        "tilt" => config.tilt = *value,
        "roll" => config.roll = *value,
        _ => config.zoom = *value,
    }
    Some(CameraControl {
        control_type: "simple".to_string(),
        config,
    })
}

fn base64_url_no_pad(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

impl KlingClient {
    pub fn new(access_key: String, secret_key: String) -> Self {
        Self::new_with_client(access_key, secret_key, reqwest::Client::new())
    }

    pub fn new_with_client(
        access_key: String,
        secret_key: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client,
            access_key,
            secret_key,
            base_url: KLING_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Issue a fresh short-lived HS256 token. Called per request and per
    /// poll iteration so long waits never hit an expired credential.
    fn sign_token(&self) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let header = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
        let claims = serde_json::json!({
            "iss": self.access_key,
            "exp": now + TOKEN_TTL_SECS,
            "nbf": now - 5,
        });

        let signing_input = format!(
            "{}.{}",
            base64_url_no_pad(serde_json::to_vec(&header)?.as_slice()),
            base64_url_no_pad(serde_json::to_vec(&claims)?.as_slice()),
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|_| Error::Config("invalid Kling secret key".to_string()))?;
        mac.update(signing_input.as_bytes());
        let signature = base64_url_no_pad(&mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    async fn post_job(&self, endpoint: &str, request: &VideoJobRequest) -> Result<String> {
        let token = self.sign_token()?;
        let response = self
            .client
            .post(format!("{}/v1/videos/{}", self.base_url, endpoint))
            .header("Authorization", format!("Bearer {}", token))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body: JobResponse = response.json().await.map_err(|e| {
            Error::AiProvider(format!("Failed to parse Kling response: {}", e))
        })?;

        if !status.is_success() || body.code != 0 {
            return Err(Error::AiProvider(format!(
                "Kling job submission failed (status {}, code {}): {}",
                status, body.code, body.message
            )));
        }
        body.data
            .map(|d| d.task_id)
            .ok_or_else(|| Error::AiProvider("Kling response missing task id".to_string()))
    }

    async fn fetch_job(&self, endpoint: &str, task_id: &str) -> Result<JobData> {
        let token = self.sign_token()?;
        let response = self
            .client
            .get(format!(
                "{}/v1/videos/{}/{}",
                self.base_url, endpoint, task_id
            ))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        let body: JobResponse = response.json().await.map_err(|e| {
            Error::AiProvider(format!("Failed to parse Kling status: {}", e))
        })?;
        body.data
            .ok_or_else(|| Error::AiProvider("Kling status missing data".to_string()))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::AiProvider(format!(
                "Failed to download Kling video (status {})",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Submit a video job and poll until it terminates.
    ///
    /// "failed" raises immediately with the backend's message; anything
    /// still pending after the fixed deadline is a timeout.
    pub async fn generate(
        &self,
        prompt: &str,
        generation: &GenerationConfig,
        reference_image: Option<&str>,
    ) -> Result<MediaPayload> {
        let model = generation
            .model_id
            .clone()
            .unwrap_or_else(|| "kling-v1".to_string());
        let duration = effective_duration(generation.duration_seconds);
        let image = reference_image.map(|r| strip_data_uri_header(r).to_string());
        let endpoint = if image.is_some() {
            "image2video"
        } else {
            "text2video"
        };

        let camera_control = generation
            .camera_movement
            .as_deref()
            .and_then(|movement| {
                let control = camera_control_for(movement);
                if control.is_none() {
                    tracing::warn!("Unknown camera movement '{}', ignoring", movement);
                }
                control
            });

        let request = VideoJobRequest {
            model_name: model.clone(),
            prompt: prompt.to_string(),
            duration: duration.to_string(),
            aspect_ratio: generation.aspect_ratio.clone(),
            image,
            camera_control,
        };

        let task_id = self.post_job(endpoint, &request).await?;
        tracing::info!("Kling job {} submitted ({}s, {})", task_id, duration, model);

        let started = Instant::now();
        loop {
            let job = self.fetch_job(endpoint, &task_id).await?;
            match job.task_status.as_str() {
                "succeed" => {
                    let url = job
                        .task_result
                        .and_then(|r| r.videos.into_iter().next())
                        .map(|v| v.url)
                        .ok_or_else(|| {
                            Error::AiProvider("Kling job succeeded without a video URL".to_string())
                        })?;
                    let bytes = self.download(&url).await?;
                    return Ok(MediaPayload {
                        bytes,
                        mime_type: "video/mp4".to_string(),
                        model_id: model,
                    });
                }
                "failed" => {
                    return Err(Error::Generation(format!(
                        "Kling job failed: {}",
                        job.task_status_msg
                            .unwrap_or_else(|| "no message".to_string())
                    )));
                }
                _ => {
                    if started.elapsed() >= POLL_TIMEOUT {
                        return Err(Error::Timeout("Kling job timed out".to_string()));
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_effective_duration_rounds_up_past_five() {
        assert_eq!(effective_duration(Some(7)), 10);
        assert_eq!(effective_duration(Some(10)), 10);
        assert_eq!(effective_duration(Some(5)), 5);
        assert_eq!(effective_duration(Some(3)), 5);
        assert_eq!(effective_duration(None), 5);
    }

    #[test]
    fn test_strip_data_uri_header() {
        assert_eq!(strip_data_uri_header("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_uri_header("QUJD"), "QUJD");
    }

    #[test]
    fn test_camera_translation_table() {
        let control = camera_control_for("zoomIn").unwrap();
        assert_eq!(control.control_type, "simple");
        assert_eq!(control.config.zoom, 5.0);

        let control = camera_control_for("panLeft").unwrap();
        assert_eq!(control.config.pan, -5.0);

        assert!(camera_control_for("dollyZoom").is_none());
    }

    #[test]
    fn test_sign_token_shape() {
        let client = KlingClient::new("ak".to_string(), "sk".to_string());
        let token = client.sign_token().unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);

        use base64::Engine as _;
        let header = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(segments[0])
            .unwrap();
        let header: serde_json::Value = serde_json::from_slice(&header).unwrap();
        assert_eq!(header["alg"], "HS256");

        let claims = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(segments[1])
            .unwrap();
        let claims: serde_json::Value = serde_json::from_slice(&claims).unwrap();
        assert_eq!(claims["iss"], "ak");
        assert!(claims["exp"].as_i64().unwrap() > claims["nbf"].as_i64().unwrap());
    }

    fn succeed_status(video_url: &str) -> serde_json::Value {
        serde_json::json!({
            "code": 0,
            "message": "ok",
            "data": {
                "task_id": "task-1",
                "task_status": "succeed",
                "task_result": { "videos": [{ "url": video_url }] }
            }
        })
    }

    #[tokio::test]
    async fn test_generate_downloads_video_on_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/videos/text2video"))
            .and(header_exists("Authorization"))
            .and(body_string_contains("\"duration\":\"10\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "message": "ok",
                "data": { "task_id": "task-1", "task_status": "submitted" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/videos/text2video/task-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(succeed_status(&format!("{}/files/out.mp4", server.uri()))),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/files/out.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![4, 5, 6]))
            .mount(&server)
            .await;

        let client = KlingClient::new("ak".to_string(), "sk".to_string())
            .with_base_url(server.uri());
        let generation = GenerationConfig {
            model_id: Some("kling-v1-6".to_string()),
            duration_seconds: Some(7),
            ..Default::default()
        };

        let payload = client.generate("a lighthouse", &generation, None).await.unwrap();
        assert_eq!(payload.bytes, vec![4, 5, 6]);
        assert_eq!(payload.model_id, "kling-v1-6");
        assert_eq!(payload.mime_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_failed_job_raises_with_backend_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/videos/text2video"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "message": "ok",
                "data": { "task_id": "task-2", "task_status": "submitted" }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/videos/text2video/task-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "message": "ok",
                "data": {
                    "task_id": "task-2",
                    "task_status": "failed",
                    "task_status_msg": "content policy violation"
                }
            })))
            .mount(&server)
            .await;

        let client = KlingClient::new("ak".to_string(), "sk".to_string())
            .with_base_url(server.uri());
        let err = client
            .generate("a lighthouse", &GenerationConfig::default(), None)
            .await
            .unwrap_err();

        match err {
            Error::Generation(message) => assert!(message.contains("content policy violation")),
            other => panic!("expected Generation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reference_image_routes_to_image2video_with_raw_base64() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/videos/image2video"))
            .and(body_string_contains("\"image\":\"QUJD\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "message": "ok",
                "data": { "task_id": "task-3", "task_status": "submitted" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/videos/image2video/task-3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(succeed_status(&format!("{}/files/v.mp4", server.uri()))),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/files/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1]))
            .mount(&server)
            .await;

        let client = KlingClient::new("ak".to_string(), "sk".to_string())
            .with_base_url(server.uri());
        client
            .generate(
                "a lighthouse",
                &GenerationConfig::default(),
                Some("data:image/png;base64,QUJD"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_code_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/videos/text2video"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 1102,
                "message": "insufficient balance"
            })))
            .mount(&server)
            .await;

        let client = KlingClient::new("ak".to_string(), "sk".to_string())
            .with_base_url(server.uri());
        let err = client
            .generate("a lighthouse", &GenerationConfig::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AiProvider(_)));
    }
}
