//! In-memory service doubles for wiring tests.
//!
//! Each mock records the arguments of its last call so tests can assert
//! on what the engine actually forwarded to the backend.

use super::{ImageGenerationService, PromptSynthesisService, VideoGenerationService};
use crate::models::{GenerationConfig, MediaPayload, PromptRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct RecordedImageCall {
    pub prompt: String,
    pub reference_count: usize,
    pub has_mask: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecordedVideoCall {
    pub prompt: String,
    pub duration_seconds: Option<u32>,
    pub has_reference: bool,
}

#[derive(Default)]
pub struct MockImageService {
    pub calls: Mutex<Vec<RecordedImageCall>>,
    pub fail_with: Option<String>,
}

#[derive(Default)]
pub struct MockVideoService {
    pub calls: Mutex<Vec<RecordedVideoCall>>,
    pub fail_with: Option<String>,
}

#[derive(Default)]
pub struct MockPromptService {
    pub response: String,
    pub fail_with: Option<String>,
    pub requests: Mutex<Vec<PromptRequest>>,
}

fn poisoned() -> Error {
    Error::Generation("mock call log poisoned".to_string())
}

#[async_trait]
impl ImageGenerationService for MockImageService {
    async fn generate_image(
        &self,
        prompt: &str,
        _generation: &GenerationConfig,
        reference_images: &[String],
        mask_image: Option<&str>,
    ) -> Result<MediaPayload> {
        self.calls
            .lock()
            .map_err(|_| poisoned())?
            .push(RecordedImageCall {
                prompt: prompt.to_string(),
                reference_count: reference_images.len(),
                has_mask: mask_image.is_some(),
            });
        if let Some(message) = &self.fail_with {
            return Err(Error::Generation(message.clone()));
        }
        Ok(MediaPayload {
            bytes: vec![0xFF, 0xD8, 0xFF],
            mime_type: "image/jpeg".to_string(),
            model_id: "mock-image-model".to_string(),
        })
    }
}

#[async_trait]
impl VideoGenerationService for MockVideoService {
    async fn generate_video(
        &self,
        prompt: &str,
        generation: &GenerationConfig,
        reference_image: Option<&str>,
    ) -> Result<MediaPayload> {
        self.calls
            .lock()
            .map_err(|_| poisoned())?
            .push(RecordedVideoCall {
                prompt: prompt.to_string(),
                duration_seconds: generation.duration_seconds,
                has_reference: reference_image.is_some(),
            });
        if let Some(message) = &self.fail_with {
            return Err(Error::Generation(message.clone()));
        }
        Ok(MediaPayload {
            bytes: vec![0x00, 0x00, 0x00, 0x18],
            mime_type: "video/mp4".to_string(),
            model_id: "mock-video-model".to_string(),
        })
    }
}

#[async_trait]
impl PromptSynthesisService for MockPromptService {
    async fn synthesize_prompt(&self, request: &PromptRequest) -> Result<String> {
        self.requests
            .lock()
            .map_err(|_| poisoned())?
            .push(request.clone());
        if let Some(message) = &self.fail_with {
            return Err(Error::AiProvider(message.clone()));
        }
        Ok(self.response.clone())
    }
}
