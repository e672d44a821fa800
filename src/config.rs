//! Environment-derived configuration
//!
//! All environment lookups happen once in `Config::from_env`; components
//! receive the resolved values at construction and never read the
//! environment mid-call.

use crate::{Error, Result};
use std::time::Duration;

pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_IMAGE_FALLBACK_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-generate-preview";
pub const DEFAULT_PROMPT_MODEL: &str = "gemini-2.0-flash";

const DEFAULT_VIDEO_TIMEOUT_SECS: u64 = 900;
const DEFAULT_VIDEO_POLL_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    /// Both keys must be present to enable the Kling backend.
    pub kling_access_key: Option<String>,
    pub kling_secret_key: Option<String>,
    pub image_model: String,
    pub image_fallback_model: String,
    pub video_model: String,
    pub prompt_model: String,
    pub video_timeout: Duration,
    pub video_poll_interval: Duration,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_secs_or(name: &str, default: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .map_err(|_| Error::Config("GEMINI_API_KEY not set".to_string()))?,
            kling_access_key: std::env::var("KLING_ACCESS_KEY").ok(),
            kling_secret_key: std::env::var("KLING_SECRET_KEY").ok(),
            image_model: env_or("IMAGE_MODEL_ID", DEFAULT_IMAGE_MODEL),
            image_fallback_model: env_or("IMAGE_FALLBACK_MODEL_ID", DEFAULT_IMAGE_FALLBACK_MODEL),
            video_model: env_or("VIDEO_MODEL_ID", DEFAULT_VIDEO_MODEL),
            prompt_model: env_or("PROMPT_MODEL_ID", DEFAULT_PROMPT_MODEL),
            video_timeout: env_secs_or("VIDEO_GENERATION_TIMEOUT", DEFAULT_VIDEO_TIMEOUT_SECS),
            video_poll_interval: env_secs_or(
                "VIDEO_POLL_INTERVAL",
                DEFAULT_VIDEO_POLL_INTERVAL_SECS,
            ),
        })
    }
}
