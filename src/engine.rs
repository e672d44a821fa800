//! Generation engine
//!
//! The facade callers go through: extracts a clean prompt from raw node
//! text, normalizes reference media, and routes the call to the right
//! backend. Video routing is by model-identifier prefix; everything else
//! goes to Gemini.

use crate::ai::{
    self, ImageGenerationService, KlingClient, PromptSynthesisService, VideoGenerationService,
};
use crate::ai::{ImageGenerator, PromptSynthesizer, VeoVideoGenerator};
use crate::config::Config;
use crate::extract::{image::extract_image_prompt, video::extract_video_prompt};
use crate::models::{GenerationConfig, MediaPayload, PromptRequest};
use crate::{media, Error, Result};

pub struct Engine {
    image: Box<dyn ImageGenerationService>,
    veo: Box<dyn VideoGenerationService>,
    kling: Option<Box<dyn VideoGenerationService>>,
    prompts: Box<dyn PromptSynthesisService>,
}

impl Engine {
    /// Build the production engine over one shared HTTP connection pool.
    pub fn from_config(config: &Config) -> Self {
        let client = reqwest::Client::new();

        let image = ImageGenerator::new_with_client(
            config.gemini_api_key.clone(),
            config.image_model.clone(),
            config.image_fallback_model.clone(),
            client.clone(),
        );
        let veo = VeoVideoGenerator::new_with_client(
            config.gemini_api_key.clone(),
            config.video_model.clone(),
            config.video_timeout,
            config.video_poll_interval,
            client.clone(),
        );
        let kling = match (&config.kling_access_key, &config.kling_secret_key) {
            (Some(access), Some(secret)) => {
                Some(Box::new(KlingClient::new_with_client(
                    access.clone(),
                    secret.clone(),
                    client.clone(),
                )) as Box<dyn VideoGenerationService>)
            }
            _ => None,
        };
        let prompts = PromptSynthesizer::new_with_client(
            config.gemini_api_key.clone(),
            config.prompt_model.clone(),
            client,
        );

        Self {
            image: Box::new(image),
            veo: Box::new(veo),
            kling,
            prompts: Box::new(prompts),
        }
    }

    /// Assemble an engine from explicit service implementations.
    pub fn new(
        image: Box<dyn ImageGenerationService>,
        veo: Box<dyn VideoGenerationService>,
        kling: Option<Box<dyn VideoGenerationService>>,
        prompts: Box<dyn PromptSynthesisService>,
    ) -> Self {
        Self {
            image,
            veo,
            kling,
            prompts,
        }
    }

    /// Generate an image from raw node text.
    ///
    /// The raw text goes through image prompt extraction first, and each
    /// reference is normalized (downsized, re-encoded) before the model
    /// call; undecodable references are dropped, never fatal.
    pub async fn generate_image(
        &self,
        raw_prompt: &str,
        generation: &GenerationConfig,
        reference_images: &[String],
        mask_image: Option<&str>,
    ) -> Result<MediaPayload> {
        let prompt = extract_image_prompt(raw_prompt);
        let references: Vec<String> = reference_images
            .iter()
            .filter_map(|uri| media::normalize_reference(uri))
            .map(|r| r.to_data_uri())
            .collect();

        self.image
            .generate_image(&prompt, generation, &references, mask_image)
            .await
    }

    /// Generate a video from raw node text, routed by model prefix.
    pub async fn generate_video(
        &self,
        raw_prompt: &str,
        generation: &GenerationConfig,
        reference_image: Option<&str>,
    ) -> Result<MediaPayload> {
        let use_kling = generation
            .model_id
            .as_deref()
            .is_some_and(ai::is_kling_model);

        // The extracted prompt's scene windows must match the duration
        // the backend will actually render.
        let duration = if use_kling {
            crate::ai::kling::effective_duration(generation.duration_seconds)
        } else {
            crate::ai::gemini::video::clamp_duration(generation.duration_seconds)
        };
        let prompt = extract_video_prompt(raw_prompt, duration);

        let reference = reference_image
            .and_then(|uri| media::normalize_reference(uri))
            .map(|r| r.to_data_uri());

        let backend = if use_kling {
            self.kling.as_deref().ok_or_else(|| {
                Error::Config(
                    "Kling model requested but KLING_ACCESS_KEY/KLING_SECRET_KEY are not set"
                        .to_string(),
                )
            })?
        } else {
            self.veo.as_ref()
        };

        backend
            .generate_video(&prompt, generation, reference.as_deref())
            .await
    }

    /// Synthesize a prompt, mapping failure onto a caller-safe string.
    pub async fn generate_prompt(&self, request: &PromptRequest) -> String {
        match self.prompts.synthesize_prompt(request).await {
            Ok(text) => text,
            Err(err) => {
                tracing::error!("Prompt synthesis failed: {}", err);
                format!("Error generating prompt: {}", err)
            }
        }
    }
}
