//! Generation engine for node-based creative workflows
//!
//! Turns raw, instruction-laden node text into clean generation prompts,
//! normalizes reference media, and drives image and video backends with
//! model-fallback and polling logic.

pub mod ai;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod media;
pub mod models;
pub mod prompts;

pub use engine::Engine;
pub use error::{Error, Result};
