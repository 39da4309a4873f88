//! Configuration types for background removal operations

use crate::models::ModelSpec;
use crate::processor::BackendType;
use serde::{Deserialize, Serialize};

/// Execution provider options for the inference backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// What the written alpha channel represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputTarget {
    /// Alpha = foreground probability (background becomes transparent)
    Foreground,
    /// Alpha = foreground probability; RGB channels are left untouched and
    /// the alpha channel IS the mask. Numerically identical to `Foreground`;
    /// no separate grayscale image is produced.
    Mask,
    /// Alpha = 1 - foreground probability (foreground becomes transparent)
    Background,
}

impl Default for OutputTarget {
    fn default() -> Self {
        Self::Foreground
    }
}

impl std::fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Foreground => write!(f, "foreground"),
            Self::Mask => write!(f, "mask"),
            Self::Background => write!(f, "background"),
        }
    }
}

/// Resampling filter used for working-resolution resizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Nearest-neighbor sampling (fast, blocky)
    Nearest,
    /// Bilinear interpolation (recommended)
    Bilinear,
}

impl Default for ResizeFilter {
    fn default() -> Self {
        Self::Bilinear
    }
}

impl ResizeFilter {
    /// Map to the image crate's filter type
    #[must_use]
    pub fn to_filter_type(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Bilinear => image::imageops::FilterType::Triangle,
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    Png,
    /// JPEG (no transparency, RGB output)
    Jpeg,
    /// WebP with alpha channel transparency
    WebP,
    /// TIFF with alpha channel transparency
    Tiff,
    /// Raw RGBA8 pixel data (4 bytes per pixel)
    Rgba8,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

/// Configuration for background removal operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Model specification (path, cached id, or in-memory bytes)
    pub model_spec: ModelSpec,

    /// Backend used to execute the model
    pub backend_type: BackendType,

    /// Execution provider, forwarded opaquely to the backend loader
    pub execution_provider: ExecutionProvider,

    /// What the written alpha channel represents
    pub output: OutputTarget,

    /// Square working resolution for inference; `None` uses the input
    /// image's width
    pub resolution: Option<u32>,

    /// Resampling filter for working-resolution resizes
    pub filter: ResizeFilter,

    /// Output format
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// WebP quality (0-100, only used for WebP output)
    pub webp_quality: u8,

    /// Enable debug mode (additional logging, forwarded to the backend)
    pub debug: bool,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model_spec: ModelSpec::default(),
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            output: OutputTarget::default(),
            resolution: None,
            filter: ResizeFilter::default(),
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
            webp_quality: 85,
            debug: false,
            intra_threads: 0,
            inter_threads: 0,
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder for fluent construction
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Working resolution of zero (resizing to a zero-area target is rejected)
    /// - Invalid JPEG quality value (must be 0-100)
    /// - Invalid WebP quality value (must be 0-100)
    pub fn validate(&self) -> crate::Result<()> {
        if self.resolution == Some(0) {
            return Err(crate::error::RemovalError::invalid_dimensions(
                "working resolution must be positive",
            ));
        }

        if self.jpeg_quality > 100 {
            return Err(crate::error::RemovalError::invalid_config(format!(
                "JPEG quality {} out of range 0-100",
                self.jpeg_quality
            )));
        }

        if self.webp_quality > 100 {
            return Err(crate::error::RemovalError::invalid_config(format!(
                "WebP quality {} out of range 0-100",
                self.webp_quality
            )));
        }

        Ok(())
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    /// Set the model specification
    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    /// Set the backend type
    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    /// Set the execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set what the written alpha channel represents
    #[must_use]
    pub fn output(mut self, output: OutputTarget) -> Self {
        self.config.output = output;
        self
    }

    /// Set the square working resolution (`None` = input width)
    #[must_use]
    pub fn resolution(mut self, resolution: Option<u32>) -> Self {
        self.config.resolution = resolution;
        self
    }

    /// Set the resampling filter
    #[must_use]
    pub fn filter(mut self, filter: ResizeFilter) -> Self {
        self.config.filter = filter;
        self
    }

    /// Set the output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality (clamped to 100)
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.min(100);
        self
    }

    /// Set WebP quality (clamped to 100)
    #[must_use]
    pub fn webp_quality(mut self, quality: u8) -> Self {
        self.config.webp_quality = quality.min(100);
        self
    }

    /// Enable debug mode
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Set number of intra-op threads
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Set number of inter-op threads
    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set both intra and inter threads (intra = `threads`, inter = `threads/2`, min 1)
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Returns `RemovalError` when validation fails, see [`RemovalConfig::validate`].
    pub fn build(self) -> crate::Result<RemovalConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
