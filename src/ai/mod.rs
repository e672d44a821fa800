//! AI backend clients and the service seams the engine talks through.

use crate::models::{GenerationConfig, MediaPayload, PromptRequest};
use crate::Result;
use async_trait::async_trait;

pub mod gemini;
pub mod kling;
pub mod mock;

pub use gemini::{ImageGenerator, PromptSynthesizer, VeoVideoGenerator};
pub use kling::KlingClient;

/// Video requests route to the Kling backend by model-identifier prefix.
pub fn is_kling_model(model: &str) -> bool {
    model.trim().to_lowercase().starts_with("kling")
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        generation: &GenerationConfig,
        reference_images: &[String],
        mask_image: Option<&str>,
    ) -> Result<MediaPayload>;
}

#[async_trait]
pub trait VideoGenerationService: Send + Sync {
    async fn generate_video(
        &self,
        prompt: &str,
        generation: &GenerationConfig,
        reference_image: Option<&str>,
    ) -> Result<MediaPayload>;
}

#[async_trait]
pub trait PromptSynthesisService: Send + Sync {
    async fn synthesize_prompt(&self, request: &PromptRequest) -> Result<String>;
}

#[async_trait]
impl<T: ImageGenerationService + ?Sized> ImageGenerationService for std::sync::Arc<T> {
    async fn generate_image(
        &self,
        prompt: &str,
        generation: &GenerationConfig,
        reference_images: &[String],
        mask_image: Option<&str>,
    ) -> Result<MediaPayload> {
        (**self)
            .generate_image(prompt, generation, reference_images, mask_image)
            .await
    }
}

#[async_trait]
impl<T: VideoGenerationService + ?Sized> VideoGenerationService for std::sync::Arc<T> {
    async fn generate_video(
        &self,
        prompt: &str,
        generation: &GenerationConfig,
        reference_image: Option<&str>,
    ) -> Result<MediaPayload> {
        (**self).generate_video(prompt, generation, reference_image).await
    }
}

#[async_trait]
impl<T: PromptSynthesisService + ?Sized> PromptSynthesisService for std::sync::Arc<T> {
    async fn synthesize_prompt(&self, request: &PromptRequest) -> Result<String> {
        (**self).synthesize_prompt(request).await
    }
}

#[async_trait]
impl ImageGenerationService for ImageGenerator {
    async fn generate_image(
        &self,
        prompt: &str,
        generation: &GenerationConfig,
        reference_images: &[String],
        mask_image: Option<&str>,
    ) -> Result<MediaPayload> {
        self.generate(prompt, generation, reference_images, mask_image)
            .await
    }
}

#[async_trait]
impl VideoGenerationService for VeoVideoGenerator {
    async fn generate_video(
        &self,
        prompt: &str,
        generation: &GenerationConfig,
        reference_image: Option<&str>,
    ) -> Result<MediaPayload> {
        self.generate(prompt, generation, reference_image).await
    }
}

#[async_trait]
impl VideoGenerationService for KlingClient {
    async fn generate_video(
        &self,
        prompt: &str,
        generation: &GenerationConfig,
        reference_image: Option<&str>,
    ) -> Result<MediaPayload> {
        self.generate(prompt, generation, reference_image).await
    }
}

#[async_trait]
impl PromptSynthesisService for PromptSynthesizer {
    async fn synthesize_prompt(&self, request: &PromptRequest) -> Result<String> {
        self.synthesize(request).await
    }
}
