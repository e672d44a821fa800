//! Data models and structures
//!
//! Defines the request/response shapes exchanged with the caller: the
//! per-request generation configuration, generated media payloads, and
//! prompt-synthesis requests.

use serde::{Deserialize, Serialize};

/// Per-request generation settings supplied by the caller. Every key is
/// optional; absent keys fall back to `Config` or hardcoded defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    pub model_id: Option<String>,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
    pub use_grounding: bool,
    pub duration_seconds: Option<u32>,
    pub camera_movement: Option<String>,
}

/// Target medium for prompt synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl Default for MediaType {
    fn default() -> Self {
        MediaType::Image
    }
}

/// Binary media returned by a generation backend, with the model that
/// actually produced it.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub model_id: String,
}

impl MediaPayload {
    pub fn to_data_uri(&self) -> String {
        use base64::Engine as _;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.mime_type, b64)
    }
}

/// Inputs for prompt synthesis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptRequest {
    pub subject: String,
    pub presets: Vec<String>,
    pub media_type: MediaType,
    pub config: GenerationConfig,
    /// Data-URI reference images; undecodable entries are skipped.
    pub reference_images: Vec<String>,
}
