#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # unbg
//!
//! Background removal for still images, driving a pretrained `U^2-Net`
//! segmentation model through ONNX Runtime or the pure-Rust Tract engine.
//!
//! The pipeline decodes an image into an RGBA buffer, resizes it to a
//! square working resolution (the input width unless configured), runs the
//! model, writes the predicted foreground probability into the alpha
//! channel, and restores the original dimensions. Each invocation loads
//! and releases its own inference session; nothing mutable is shared
//! across concurrent calls.
//!
//! ## Features
//!
//! - **Backends**: ONNX Runtime (CUDA, `CoreML`, CPU) and Tract (pure Rust)
//! - **Output modes**: transparent background, alpha-carried mask, or
//!   inverted alpha (transparent foreground)
//! - **Formats**: JPEG, PNG, WebP, BMP, TIFF in; PNG, JPEG, WebP, TIFF,
//!   raw RGBA out
//! - **Model management**: the default `u2netp` checkpoint is fetched once
//!   and cached on disk; custom checkpoints load from a path, a cache id,
//!   or raw bytes
//! - **CLI**: optional command-line interface (enable with the `cli`
//!   feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use unbg::{remove_background_from_bytes, OutputFormat, RemovalConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let input = tokio::fs::read("photo.jpg").await?;
//!
//! // Default config: cached u2netp model, alpha = foreground probability
//! let config = RemovalConfig::builder().build()?;
//! let result = remove_background_from_bytes(&input, &config).await?;
//!
//! let png = result.to_bytes(OutputFormat::Png, 100)?;
//! tokio::fs::write("photo_cutout.png", png).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom model and working resolution
//!
//! ```rust,no_run
//! use unbg::{
//!     remove_background_from_bytes, ModelSource, ModelSpec, OutputTarget, RemovalConfig,
//! };
//!
//! # async fn example(input: Vec<u8>) -> anyhow::Result<()> {
//! let config = RemovalConfig::builder()
//!     .model_spec(ModelSpec {
//!         source: ModelSource::External("models/u2net.onnx".into()),
//!     })
//!     .resolution(Some(320))
//!     .output(OutputTarget::Background)
//!     .build()?;
//! let result = remove_background_from_bytes(&input, &config).await?;
//! result.save_png("inverted.png")?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod services;
pub mod tensor;
pub mod types;
pub mod utils;

// Internal imports for lib functions
use tokio::io::AsyncRead;

// Public API exports
pub use backends::*;
pub use cache::{format_size, CacheMetadata, CachedModelInfo, ModelCache};
pub use config::{
    ExecutionProvider, OutputFormat, OutputTarget, RemovalConfig, RemovalConfigBuilder,
    ResizeFilter,
};
pub use download::ModelDownloader;
pub use error::{RemovalError, Result};
pub use inference::InferenceBackend;
pub use models::{default_model_id, ModelManager, ModelSource, ModelSpec, DEFAULT_MODEL_URL};
pub use processor::{
    BackendFactory, BackendType, BackgroundRemovalProcessor, DefaultBackendFactory,
};
pub use services::{ImageIOService, OutputFormatHandler};
pub use tensor::PixelTensor;
pub use types::{AlphaMatte, ProcessingTimings, RemovalResult};
pub use utils::{ExecutionProviderManager, ProviderInfo};

/// Remove the background from encoded image bytes
///
/// Accepts any format the image crate can decode (JPEG, PNG, WebP, BMP,
/// TIFF). The default model is fetched into the on-disk cache on first use;
/// subsequent calls load it locally.
///
/// # Errors
/// - `Decode` for bytes that are not an image
/// - `AssetResolution` when the model asset cannot be resolved
/// - `Model` / `Inference` for backend failures
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let config = resolve_model_for(config).await?;
    let processor = BackgroundRemovalProcessor::new(config)?;
    processor.process_bytes(image_bytes)
}

/// Remove the background from a decoded `DynamicImage`
///
/// The most direct API for in-memory processing; no decoding happens.
///
/// # Errors
/// - `InvalidDimensions` for zero-area images
/// - `AssetResolution` / `Model` / `Inference` as for
///   [`remove_background_from_bytes`]
pub async fn remove_background_from_image(
    image: image::DynamicImage,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let config = resolve_model_for(config).await?;
    let processor = BackgroundRemovalProcessor::new(config)?;
    processor.process_image(&image)
}

/// Remove the background from an async reader stream
///
/// Reads the stream to the end and decodes it, suiting network streams and
/// large files.
///
/// # Errors
/// - `Io` for stream read failures, plus everything from
///   [`remove_background_from_bytes`]
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    remove_background_from_bytes(&buffer, config).await
}

/// Resolve the configured model source, fetching the default asset if needed
async fn resolve_model_for(config: &RemovalConfig) -> Result<RemovalConfig> {
    let mut resolved = config.clone();
    resolved.model_spec = models::ensure_model_available(&config.model_spec).await?;
    Ok(resolved)
}
