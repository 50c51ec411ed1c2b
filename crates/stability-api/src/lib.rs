//! Client and data models for the Stability AI REST API.
//!
//! Provides strongly typed models and an asynchronous client covering account
//! queries, engine listing and image generation (text-to-image, image-to-image,
//! upscaling and masking).
//!
//! ```no_run
//! use stability_api::{KnownEngine, StabilityClient, TextPrompt, TextToImageRequest};
//!
//! # async fn run() -> stability_api::Result<()> {
//! let client = StabilityClient::new("sk-...")?;
//! let request = TextToImageRequest::new(vec![TextPrompt::new("a lighthouse at dusk")]);
//! let artifacts = client
//!     .text_to_image(KnownEngine::DEFAULT_TEXT_TO_IMAGE.as_str(), &request)
//!     .await?;
//! for artifact in &artifacts {
//!     let _png = artifact.decode_image()?;
//! }
//! client.close();
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod client;
pub mod engines;
pub mod models;

pub use client::{decode_response, StabilityClient, StabilityClientBuilder};
pub use engines::KnownEngine;
pub use models::{
    Artifact, ClipGuidancePreset, EngineInfo, EngineType, FinishReason, GenerationParams,
    GenerationResponse, ImageToImageRequest, InitImageMode, MaskImageRequest, MaskSource,
    Organization, Sampler, TextPrompt, TextToImageRequest, UpscaleRequest, UserAccount,
    UserBalance,
};
pub use stability_core::{Error, StabilityConfig};
pub use tokio_util::sync::CancellationToken;

/// Convenient result alias using the shared Stability error type.
pub type Result<T> = stability_core::Result<T>;
