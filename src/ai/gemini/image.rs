//! Image generation orchestration
//!
//! Walks an ordered list of candidate image models, retrying once per
//! candidate with a stricter instruction when the backend replies with
//! text instead of media, and aggregates diagnostics when every
//! candidate is exhausted.

use super::client::GeminiHttpClient;
use super::types::{Content, GenerateContentResponse, GoogleSearch, InlineData, Part, Tool};
use crate::media::split_data_uri;
use crate::models::{GenerationConfig, MediaPayload};
use crate::{config, prompts, Error, Result};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;

/// Hardcoded last resort when both the requested and the configured
/// fallback model fail.
const LAST_RESORT_MODEL: &str = "gemini-2.5-flash-image";

/// Identifiers the API key cannot bill for; force-rewritten to the
/// default capable model.
const NON_BILLABLE_FAMILY: &str = "imagen-3.0";

/// Deprecated identifiers still present in persisted node configs.
const DEPRECATED_ALIASES: [(&str, &str); 2] = [
    ("gemini-2.5-flash-image-preview", "gemini-2.5-flash-image"),
    ("gemini-2.0-flash-preview-image-generation", "gemini-2.5-flash-image"),
];

const IMAGE_ONLY_DIRECTIVE: &str =
    "Return only the generated image. Do not reply with text, plans, or descriptions.";

const TEXT_SAMPLE_CHARS: usize = 200;

/// Shorten backend text for diagnostic messages.
fn truncate_sample(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}…", head)
    }
}

fn slash_command_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Some backends read "/imagine ..." as a request for a textual plan.
    RE.get_or_init(|| Regex::new(r"^/\S+\s+").expect("slash command regex should compile"))
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

pub struct ImageGenerator {
    http: GeminiHttpClient,
    default_model: String,
    fallback_model: String,
}

#[cfg(test)]
super::impl_with_gemini_base_url!(ImageGenerator);

impl ImageGenerator {
    pub fn new(api_key: String, default_model: String, fallback_model: String) -> Self {
        Self::new_with_client(api_key, default_model, fallback_model, reqwest::Client::new())
    }

    pub fn new_with_client(
        api_key: String,
        default_model: String,
        fallback_model: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            // Image generation is slow; match the backend's 10 minute ceiling.
            http: GeminiHttpClient::new_with_client(api_key, Duration::from_secs(600), client),
            default_model,
            fallback_model,
        }
    }

    /// Rewrite deprecated aliases and reject identifiers that cannot
    /// produce images (stale text-model IDs from older configs).
    fn normalize_model_id(&self, model: &str) -> String {
        let mut id = model.trim().to_string();
        if let Some((_, replacement)) = DEPRECATED_ALIASES.iter().find(|(alias, _)| *alias == id) {
            id = replacement.to_string();
        }
        if id.contains(NON_BILLABLE_FAMILY) {
            return config::DEFAULT_IMAGE_MODEL.to_string();
        }
        if !id.contains("image") && !id.contains("imagen") {
            tracing::warn!("Model '{}' cannot generate images, using default", id);
            return config::DEFAULT_IMAGE_MODEL.to_string();
        }
        id
    }

    /// Ordered, de-duplicated candidate list: requested (normalized) →
    /// configured fallback → hardcoded last resort.
    fn candidate_models(&self, requested: Option<&str>) -> Vec<String> {
        let first = self.normalize_model_id(requested.unwrap_or(&self.default_model));
        let mut candidates = Vec::new();
        for model in [
            first.as_str(),
            self.fallback_model.as_str(),
            LAST_RESORT_MODEL,
        ] {
            if !model.is_empty() && !candidates.iter().any(|c| c == model) {
                candidates.push(model.to_string());
            }
        }
        candidates
    }

    /// Assemble the outgoing prompt text: slash-command prefix stripped,
    /// inpainting wrapper when a mask is attached, aspect-ratio and
    /// resolution suffixes appended.
    fn build_prompt_text(prompt: &str, generation: &GenerationConfig, has_mask: bool) -> String {
        let stripped = slash_command_re().replace(prompt.trim(), "").to_string();
        let mut text = if has_mask {
            prompts::render(prompts::INPAINTING, &[("prompt", &stripped)])
                .trim()
                .to_string()
        } else {
            stripped
        };

        let mut suffixes = Vec::new();
        if let Some(ratio) = generation.aspect_ratio.as_deref() {
            suffixes.push(format!("--aspect {}", ratio));
        }
        match generation.resolution.as_deref() {
            Some("2K") => suffixes.push("2k resolution, high quality".to_string()),
            Some("4K") => {
                suffixes.push("4k resolution, ultra high definition, extremely detailed".to_string())
            }
            _ => {}
        }
        if !suffixes.is_empty() {
            text = format!("{} {}", text, suffixes.join(", "));
        }
        text
    }

    /// Callers hand in already-normalized data URIs; the payloads pass
    /// through without another decode.
    fn build_parts(
        prompt_text: &str,
        reference_images: &[String],
        mask_image: Option<&str>,
    ) -> Vec<Part> {
        let mut parts = Vec::new();
        for image in reference_images
            .iter()
            .map(String::as_str)
            .chain(mask_image)
        {
            if let Some((mime_type, payload)) = split_data_uri(image) {
                parts.push(Part::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.to_string(),
                        data: payload.to_string(),
                    },
                });
            }
        }
        parts.push(Part::Text {
            text: prompt_text.to_string(),
        });
        parts
    }

    fn request_for(parts: Vec<Part>, generation: &GenerationConfig) -> ImageRequest {
        let tools = generation.use_grounding.then(|| {
            vec![Tool {
                google_search: GoogleSearch::default(),
            }]
        });
        ImageRequest {
            contents: vec![Content { role: None, parts }],
            tools,
        }
    }

    /// Generate one image, trying each candidate model in order.
    ///
    /// A text-only reply triggers exactly one stricter retry against the
    /// same candidate; a failed call advances to the next candidate. Only
    /// overload and backend-internal errors short-circuit the fallback.
    pub async fn generate(
        &self,
        prompt: &str,
        generation: &GenerationConfig,
        reference_images: &[String],
        mask_image: Option<&str>,
    ) -> Result<MediaPayload> {
        let prompt_text = Self::build_prompt_text(prompt, generation, mask_image.is_some());
        let candidates = self.candidate_models(generation.model_id.as_deref());

        tracing::info!(
            "Generating image ({} candidate models, {} reference images)",
            candidates.len(),
            reference_images.len()
        );

        let mut last_text: Option<String> = None;
        let mut last_diagnostics = String::new();
        let mut attempt_errors: Vec<String> = Vec::new();

        for model in &candidates {
            for strict in [false, true] {
                let text = if strict {
                    format!("{}\n{}", prompt_text, IMAGE_ONLY_DIRECTIVE)
                } else {
                    prompt_text.clone()
                };
                let parts = Self::build_parts(&text, reference_images, mask_image);
                let request = Self::request_for(parts, generation);

                let response: GenerateContentResponse =
                    match self.http.generate_content(model, &request).await {
                        Ok(response) => response,
                        Err(e @ Error::Busy(_)) | Err(e @ Error::BackendInternal(_)) => {
                            return Err(e);
                        }
                        Err(e) => {
                            tracing::warn!("Image model {} failed: {}", model, e);
                            attempt_errors.push(format!("{}: {}", model, e));
                            break;
                        }
                    };

                if let Some(inline) = response.first_inline_data() {
                    use base64::Engine as _;
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(&inline.data)
                        .map_err(|e| {
                            Error::AiProvider(format!("Failed to decode inline image data: {}", e))
                        })?;
                    return Ok(MediaPayload {
                        bytes,
                        mime_type: inline.mime_type.clone(),
                        model_id: model.clone(),
                    });
                }

                if let Some(text) = response.first_text() {
                    last_text = Some(text.to_string());
                }
                last_diagnostics = response.diagnostics();
                tracing::warn!(
                    "Image model {} returned no inline media (strict={})",
                    model,
                    strict
                );
            }
        }

        let sample = last_text
            .map(|t| truncate_sample(&t, TEXT_SAMPLE_CHARS))
            .unwrap_or_else(|| "<none>".to_string());
        let mut message = format!(
            "no image produced by candidates [{}]; last text sample: \"{}\"",
            candidates.join(", "),
            sample
        );
        if !attempt_errors.is_empty() {
            message.push_str(&format!("; call errors: {}", attempt_errors.join(" | ")));
        }
        if !last_diagnostics.is_empty() {
            message.push_str(&format!("; diagnostics: {}", last_diagnostics));
        }
        Err(Error::Generation(message))
    }
}
