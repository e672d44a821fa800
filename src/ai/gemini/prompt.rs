//! Prompt synthesis over Gemini chat models.
//!
//! Walks a candidate-model chain until one returns usable text, then
//! applies media-specific post-processing: image prompts get an aspect
//! ratio flag appended and stale version flags stripped.

use super::client::GeminiHttpClient;
use super::types::{Content, InlineData, Part};
use crate::models::{MediaType, PromptRequest};
use crate::prompts;
use crate::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;

const PROMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Safe defaults walked when the preferred model fails. Ordered newest
/// first so degradation stays as close to current quality as possible.
const FALLBACK_PROMPT_MODELS: [&str; 3] =
    ["gemini-2.0-flash", "gemini-2.5-flash", "gemini-1.5-flash"];

/// Terms whose presence marks a "prompt body" as meta-instructions rather
/// than scene description. Two or more distinct hits exempt the body from
/// the verbatim-preservation re-prepend.
const META_KEYWORDS: [&str; 8] = [
    "instruction",
    "guideline",
    "system prompt",
    "output format",
    "you are",
    "must not",
    "constraint",
    "rule:",
];

fn version_flag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"--v\s+[0-9.]+").expect("version flag regex should compile"))
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: ChatGenerationConfig,
}

#[derive(Debug, Serialize)]
struct ChatGenerationConfig {
    temperature: f32,
}

pub struct PromptSynthesizer {
    http: GeminiHttpClient,
    default_model: String,
}

fn inline_part_from_data_uri(data_uri: &str) -> Option<Part> {
    let reference = crate::media::normalize_reference(data_uri)?;
    use base64::Engine as _;
    Some(Part::InlineData {
        inline_data: InlineData {
            mime_type: reference.mime_type,
            data: base64::engine::general_purpose::STANDARD.encode(reference.bytes),
        },
    })
}

/// Collapse case and whitespace so substring checks survive the model
/// reflowing text.
fn normalize_for_containment(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn looks_like_meta_instructions(body: &str) -> bool {
    let lower = body.to_lowercase();
    META_KEYWORDS.iter().filter(|k| lower.contains(**k)).count() >= 2
}

impl PromptSynthesizer {
    pub fn new(api_key: String, default_model: String) -> Self {
        Self {
            http: GeminiHttpClient::new(api_key, PROMPT_TIMEOUT),
            default_model,
        }
    }

    pub fn new_with_client(
        api_key: String,
        default_model: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, PROMPT_TIMEOUT, client),
            default_model,
        }
    }

    fn candidate_models(&self, preferred: Option<&str>) -> Vec<String> {
        let mut candidates = Vec::new();
        let mut push = |model: &str| {
            let model = model.trim();
            if !model.is_empty() && !candidates.iter().any(|c| c == model) {
                candidates.push(model.to_string());
            }
        };
        if let Some(model) = preferred {
            push(model);
        }
        push(&self.default_model);
        for model in FALLBACK_PROMPT_MODELS {
            push(model);
        }
        candidates
    }

    /// Run one request down the candidate chain; first non-empty text wins.
    /// Per-candidate errors are logged and skipped.
    async fn generate_text(
        &self,
        system: &str,
        parts: Vec<Part>,
        preferred_model: Option<&str>,
    ) -> Result<String> {
        let request = ChatRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: system.to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: ChatGenerationConfig { temperature: 0.7 },
        };

        let mut last_error: Option<Error> = None;
        for model in self.candidate_models(preferred_model) {
            match self
                .http
                .generate_content::<_, super::types::GenerateContentResponse>(&model, &request)
                .await
            {
                Ok(response) => {
                    if let Some(text) = response.first_text() {
                        let text = text.trim();
                        if !text.is_empty() {
                            tracing::debug!("Prompt text produced by {}", model);
                            return Ok(text.to_string());
                        }
                    }
                    tracing::warn!("Model {} returned no prompt text, trying next", model);
                }
                Err(err) => {
                    tracing::warn!("Prompt model {} failed: {}", model, err);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::Generation("no response text from any prompt model".to_string())
        }))
    }

    /// Synthesize a generation prompt for the requested media type.
    pub async fn synthesize(&self, request: &PromptRequest) -> Result<String> {
        let system = match request.media_type {
            MediaType::Image => prompts::IMAGE_PROMPT_SYSTEM,
            MediaType::Video => prompts::VIDEO_PROMPT_SYSTEM,
        };

        let subject = if request.subject.trim().is_empty() {
            "a striking, memorable scene".to_string()
        } else {
            request.subject.trim().to_string()
        };
        let presets = request.presets.join(", ");
        let resolution = request.config.resolution.clone().unwrap_or_default();
        let user = prompts::render(
            prompts::PROMPT_USER,
            &[
                ("subject", &subject),
                ("presets", &presets),
                ("resolution", &resolution),
            ],
        );

        let mut parts: Vec<Part> = request
            .reference_images
            .iter()
            .filter_map(|uri| inline_part_from_data_uri(uri))
            .collect();
        parts.push(Part::Text { text: user });

        let text = self
            .generate_text(system, parts, request.config.model_id.as_deref())
            .await?;

        Ok(self.post_process(text, request))
    }

    /// Synthesize, mapping any failure onto a caller-safe string instead
    /// of an error.
    pub async fn synthesize_safe(&self, request: &PromptRequest) -> String {
        match self.synthesize(request).await {
            Ok(text) => text,
            Err(err) => {
                tracing::error!("Prompt synthesis failed: {}", err);
                format!("Error generating prompt: {}", err)
            }
        }
    }

    /// Merge a caller-authored prompt body with reference context. The
    /// body must survive verbatim; if the model rewrote it away (and the
    /// body is not itself a block of meta-instructions), re-prepend it.
    pub async fn synthesize_merged(
        &self,
        body: &str,
        reference: &str,
        presets: &[String],
        preferred_model: Option<&str>,
    ) -> Result<String> {
        let user = prompts::render(
            prompts::MERGE_USER,
            &[
                ("body", body),
                ("reference", reference),
                ("presets", &presets.join(", ")),
            ],
        );
        let generated = self
            .generate_text(prompts::MERGE_SYSTEM, vec![Part::Text { text: user }], preferred_model)
            .await?;

        let body_trimmed = body.trim();
        if body_trimmed.is_empty() || looks_like_meta_instructions(body_trimmed) {
            return Ok(generated);
        }
        let haystack = normalize_for_containment(&generated);
        let needle = normalize_for_containment(body_trimmed);
        if haystack.contains(&needle) {
            Ok(generated)
        } else {
            tracing::warn!("Merged prompt dropped the original body, re-prepending");
            Ok(format!("{}\n\n{}", body_trimmed, generated))
        }
    }

    fn post_process(&self, text: String, request: &PromptRequest) -> String {
        let mut text = text.replace('\n', " ").trim().to_string();
        text = version_flag_re().replace_all(&text, "").trim().to_string();

        if request.media_type == MediaType::Image {
            if let Some(ar) = &request.config.aspect_ratio {
                if !text.contains("--ar") {
                    text = format!("{} --ar {}", text, ar);
                }
            }
        }
        text
    }
}
