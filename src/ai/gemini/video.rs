//! Video generation orchestration (primary backend)
//!
//! Submits an asynchronous Veo job and polls the returned operation to
//! completion. The attempt plan is the cross-product of candidate models,
//! prompt variants (primary and compressed), and reference usage; the
//! first attempt yielding non-empty video bytes wins.

use super::client::GeminiHttpClient;
use super::types::Operation;
use crate::media::split_data_uri;
use crate::models::{GenerationConfig, MediaPayload};
use crate::{Error, Result};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Hardcoded last resort for the candidate list.
const LAST_RESORT_VIDEO_MODEL: &str = "veo-3.0-generate-001";

const ALLOWED_ASPECT_RATIOS: [&str; 3] = ["16:9", "9:16", "1:1"];
const DEFAULT_ASPECT_RATIO: &str = "16:9";

const MIN_DURATION_SECS: u32 = 4;
const MAX_DURATION_SECS: u32 = 8;

const MAX_COMPRESSED_PROMPT_CHARS: usize = 1800;

/// Failure reasons beyond this are dropped from the aggregate message.
const MAX_FAILURE_REASONS: usize = 4;

#[derive(Debug, Serialize)]
struct VideoRequest {
    instances: Vec<VideoInstance>,
    parameters: VideoParameters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoInstance {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<VideoImage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoImage {
    bytes_base64_encoded: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters {
    aspect_ratio: String,
    duration_seconds: u32,
}

pub struct VeoVideoGenerator {
    http: GeminiHttpClient,
    default_model: String,
    timeout: Duration,
    poll_interval: Duration,
}

#[cfg(test)]
super::impl_with_gemini_base_url!(VeoVideoGenerator);

/// Clamp a requested duration into the backend's supported range.
pub fn clamp_duration(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(MAX_DURATION_SECS)
        .clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
}

fn validate_aspect_ratio(requested: Option<&str>) -> &str {
    match requested {
        Some(ratio) if ALLOWED_ASPECT_RATIOS.contains(&ratio) => ratio,
        _ => DEFAULT_ASPECT_RATIO,
    }
}

/// Fallback prompt variant: keep only the first paragraph when the prompt
/// is a full Style/Scene script, otherwise pass it through. Always
/// truncated so an overlong prompt cannot sink every attempt.
pub fn compress_prompt(prompt: &str) -> String {
    let lower = prompt.to_lowercase();
    let base = if lower.contains("style:") && lower.contains("scene:") {
        prompt.split("\n\n").next().unwrap_or(prompt)
    } else {
        prompt
    };
    let trimmed = base.trim();
    if trimmed.chars().count() <= MAX_COMPRESSED_PROMPT_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(MAX_COMPRESSED_PROMPT_CHARS).collect()
    }
}

impl VeoVideoGenerator {
    pub fn new(
        api_key: String,
        default_model: String,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self::new_with_client(
            api_key,
            default_model,
            timeout,
            poll_interval,
            reqwest::Client::new(),
        )
    }

    pub fn new_with_client(
        api_key: String,
        default_model: String,
        timeout: Duration,
        poll_interval: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, Duration::from_secs(120), client),
            default_model,
            timeout,
            poll_interval,
        }
    }

    fn candidate_models(&self, requested: Option<&str>) -> Vec<String> {
        let mut candidates = Vec::new();
        let requested = requested.map(str::trim).filter(|m| !m.is_empty());
        for model in requested
            .into_iter()
            .chain([self.default_model.as_str(), LAST_RESORT_VIDEO_MODEL])
        {
            if !candidates.iter().any(|c| c == model) {
                candidates.push(model.to_string());
            }
        }
        candidates
    }

    /// Generate one video, walking the attempt plan in order.
    ///
    /// Per-attempt failures are accumulated, not raised; only a poll
    /// timeout (the overall wall-clock bound) propagates immediately.
    pub async fn generate(
        &self,
        prompt: &str,
        generation: &GenerationConfig,
        reference_image: Option<&str>,
    ) -> Result<MediaPayload> {
        let duration = clamp_duration(generation.duration_seconds);
        let aspect_ratio = validate_aspect_ratio(generation.aspect_ratio.as_deref()).to_string();
        let candidates = self.candidate_models(generation.model_id.as_deref());

        let compressed = compress_prompt(prompt);
        let mut prompt_variants: Vec<(&str, String)> = vec![("primary", prompt.to_string())];
        if compressed != prompt {
            prompt_variants.push(("compressed", compressed));
        }

        // Already normalized upstream; split into MIME type and payload.
        let reference = reference_image.and_then(split_data_uri);
        let reference_variants: Vec<Option<(&str, &str)>> = match reference {
            Some(r) => vec![Some(r), None],
            None => vec![None],
        };

        tracing::info!(
            "Generating video ({} models x {} prompts x {} reference variants, {}s, {})",
            candidates.len(),
            prompt_variants.len(),
            reference_variants.len(),
            duration,
            aspect_ratio
        );

        let mut reasons: Vec<String> = Vec::new();
        for model in &candidates {
            for (variant_name, variant_prompt) in &prompt_variants {
                for reference in &reference_variants {
                    let attempt = format!(
                        "{} [{} prompt, {}]",
                        model,
                        variant_name,
                        if reference.is_some() {
                            "with reference"
                        } else {
                            "no reference"
                        }
                    );

                    match self
                        .submit_and_poll(model, variant_prompt, *reference, &aspect_ratio, duration)
                        .await
                    {
                        Ok(bytes) if !bytes.is_empty() => {
                            return Ok(MediaPayload {
                                bytes,
                                mime_type: "video/mp4".to_string(),
                                model_id: model.clone(),
                            });
                        }
                        Ok(_) => {
                            tracing::warn!("{} returned empty video content", attempt);
                            reasons.push(format!("{}: empty video content", attempt));
                        }
                        Err(e @ Error::Timeout(_)) => return Err(e),
                        Err(e) => {
                            tracing::warn!("{} failed: {}", attempt, e);
                            reasons.push(format!("{}: {}", attempt, e));
                        }
                    }
                }
            }
        }

        reasons.truncate(MAX_FAILURE_REASONS);
        Err(Error::Generation(format!(
            "all video generation attempts failed: {}",
            reasons.join(" | ")
        )))
    }

    async fn submit_and_poll(
        &self,
        model: &str,
        prompt: &str,
        reference: Option<(&str, &str)>,
        aspect_ratio: &str,
        duration: u32,
    ) -> Result<Vec<u8>> {
        let request = VideoRequest {
            instances: vec![VideoInstance {
                prompt: prompt.to_string(),
                image: reference.map(|(mime_type, payload)| VideoImage {
                    bytes_base64_encoded: payload.to_string(),
                    mime_type: mime_type.to_string(),
                }),
            }],
            parameters: VideoParameters {
                aspect_ratio: aspect_ratio.to_string(),
                duration_seconds: duration,
            },
        };

        let mut operation: Operation = self.http.predict_long_running(model, &request).await?;
        let started = Instant::now();

        while !operation.done {
            if started.elapsed() >= self.timeout {
                return Err(Error::Timeout("video generation timed out".to_string()));
            }
            tokio::time::sleep(self.poll_interval).await;
            operation = self.http.get_operation(&operation.name).await?;
        }

        if let Some(op_error) = operation.error {
            return Err(Error::AiProvider(format!(
                "video job failed: {}",
                op_error.message.unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        let video = operation
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|s| s.video)
            .ok_or_else(|| Error::AiProvider("no video in completed operation".to_string()))?;

        if let Some(encoded) = video.bytes_base64_encoded {
            use base64::Engine as _;
            return base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| Error::AiProvider(format!("invalid video payload: {}", e)));
        }
        if let Some(uri) = video.uri {
            return self.http.download(&uri).await;
        }
        Ok(Vec::new())
    }
}
