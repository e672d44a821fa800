use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nanogen_engine::config::Config;
use nanogen_engine::models::{GenerationConfig, MediaType, PromptRequest};
use nanogen_engine::Engine;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "nanogen-engine")]
#[command(about = "Generate images, videos, and prompts from node text")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate an image from raw node text.
    Image {
        /// Raw node text; the prompt is extracted from it.
        prompt: String,
        #[arg(long)]
        model: Option<String>,
        /// Aspect ratio like 16:9.
        #[arg(long)]
        aspect_ratio: Option<String>,
        /// Output resolution: 2K or 4K.
        #[arg(long)]
        resolution: Option<String>,
        /// Data-URI reference image files, repeatable.
        #[arg(long = "reference")]
        references: Vec<PathBuf>,
        #[arg(long, default_value = "output.png")]
        out: PathBuf,
    },
    /// Generate a video from raw node text.
    Video {
        prompt: String,
        /// Model identifier; "kling*" models route to the Kling backend.
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        aspect_ratio: Option<String>,
        #[arg(long)]
        duration: Option<u32>,
        #[arg(long = "reference")]
        reference: Option<PathBuf>,
        #[arg(long, default_value = "output.mp4")]
        out: PathBuf,
    },
    /// Synthesize a generation prompt from a subject and presets.
    Prompt {
        subject: String,
        #[arg(long = "preset")]
        presets: Vec<String>,
        #[arg(long, value_enum, default_value = "image")]
        media: MediaArg,
        #[arg(long)]
        aspect_ratio: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum MediaArg {
    Image,
    Video,
}

fn read_data_uri(path: &PathBuf) -> Result<String> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .with_context(|| format!("Failed to read reference file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nanogen_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let engine = Engine::from_config(&config);

    let outcome = match args.command {
        Command::Image {
            prompt,
            model,
            aspect_ratio,
            resolution,
            references,
            out,
        } => {
            let generation = GenerationConfig {
                model_id: model,
                aspect_ratio,
                resolution,
                ..Default::default()
            };
            let references = references
                .iter()
                .map(read_data_uri)
                .collect::<Result<Vec<_>>>()?;
            match engine
                .generate_image(&prompt, &generation, &references, None)
                .await
            {
                Ok(payload) => {
                    std::fs::write(&out, &payload.bytes)
                        .with_context(|| format!("Failed to write {}", out.display()))?;
                    info!("Wrote {} ({})", out.display(), payload.model_id);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::Video {
            prompt,
            model,
            aspect_ratio,
            duration,
            reference,
            out,
        } => {
            let generation = GenerationConfig {
                model_id: model,
                aspect_ratio,
                duration_seconds: duration,
                ..Default::default()
            };
            let reference = reference.as_ref().map(read_data_uri).transpose()?;
            match engine
                .generate_video(&prompt, &generation, reference.as_deref())
                .await
            {
                Ok(payload) => {
                    std::fs::write(&out, &payload.bytes)
                        .with_context(|| format!("Failed to write {}", out.display()))?;
                    info!("Wrote {} ({})", out.display(), payload.model_id);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::Prompt {
            subject,
            presets,
            media,
            aspect_ratio,
        } => {
            let request = PromptRequest {
                subject,
                presets,
                media_type: match media {
                    MediaArg::Image => MediaType::Image,
                    MediaArg::Video => MediaType::Video,
                },
                config: GenerationConfig {
                    aspect_ratio,
                    ..Default::default()
                },
                reference_images: Vec::new(),
            };
            println!("{}", engine.generate_prompt(&request).await);
            Ok(())
        }
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Generation failed: {}", e);
            std::process::exit(1);
        }
    }
}
