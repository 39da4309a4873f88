//! Core result types for background removal operations

use crate::{config::OutputFormat, error::Result, tensor::PixelTensor};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Single-channel foreground probability map at the working resolution
///
/// Row-major, values in `[0, 1]`. The length always equals
/// `resolution * resolution`; a mismatch is a contract violation by the
/// inference backend and is rejected at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMatte {
    data: Vec<f32>,
    resolution: u32,
}

impl AlphaMatte {
    /// Wrap a probability buffer, enforcing the length contract
    ///
    /// # Errors
    /// - `Inference` when `data.len() != resolution * resolution`
    pub fn new(data: Vec<f32>, resolution: u32) -> Result<Self> {
        let expected = resolution as usize * resolution as usize;
        if data.len() != expected {
            return Err(crate::error::RemovalError::inference(format!(
                "matte length {} does not match working resolution {} ({} expected)",
                data.len(),
                resolution,
                expected
            )));
        }
        Ok(Self { data, resolution })
    }

    /// Extract the probability map from a model output tensor
    ///
    /// Accepts the `(1, 1, h, w)` layout produced by segmentation models and
    /// enforces that the flattened map matches the working resolution.
    ///
    /// # Errors
    /// - `Inference` on a non-`1x1xHxW` tensor or a length mismatch
    pub fn from_tensor(tensor: &Array4<f32>, resolution: u32) -> Result<Self> {
        let (batch, channels, _h, _w) = tensor.dim();
        if batch != 1 || channels != 1 {
            return Err(crate::error::RemovalError::inference(format!(
                "expected 1x1xHxW output tensor, got shape {:?}",
                tensor.shape()
            )));
        }

        let data: Vec<f32> = tensor.iter().copied().collect();
        Self::new(data, resolution)
    }

    /// Probability values, row-major
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// The square working resolution this matte was produced at
    #[must_use]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Number of entries in the map
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the map is empty (only possible at resolution 0)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Detailed timing breakdown for a pipeline invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image decoding from encoded bytes
    pub decode_ms: u64,

    /// Working-resolution resize plus the resize back to original dimensions
    pub resize_ms: u64,

    /// Model loading into the inference session
    pub model_load_ms: u64,

    /// Inference execution
    pub inference_ms: u64,

    /// Alpha compositing
    pub composite_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// One-line summary for logs and CLI output
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Decode: {}ms | Resize: {}ms | Model load: {}ms | Inference: {}ms | Composite: {}ms",
            self.total_ms,
            self.decode_ms,
            self.resize_ms,
            self.model_load_ms,
            self.inference_ms,
            self.composite_ms
        )
    }
}

/// Result of a background removal operation
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// The processed RGBA buffer at the original dimensions
    pub tensor: PixelTensor,

    /// Original input dimensions
    pub original_dimensions: (u32, u32),

    /// Timing breakdown for this invocation
    pub timings: ProcessingTimings,
}

impl RemovalResult {
    /// Create a new removal result
    #[must_use]
    pub fn new(
        tensor: PixelTensor,
        original_dimensions: (u32, u32),
        timings: ProcessingTimings,
    ) -> Self {
        Self {
            tensor,
            original_dimensions,
            timings,
        }
    }

    /// Output dimensions as `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.tensor.dimensions()
    }

    /// Encode the result into the given format
    ///
    /// # Errors
    /// - Encoding failures from the underlying codec
    pub fn to_bytes(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        crate::services::OutputFormatHandler::encode(&self.tensor, format, quality)
    }

    /// The processed image as raw interleaved RGBA bytes
    #[must_use]
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.tensor.data().to_vec()
    }

    /// The alpha channel alone, as a flat byte mask
    #[must_use]
    pub fn alpha_mask(&self) -> Vec<u8> {
        self.tensor.alpha_channel()
    }

    /// Save the result in the specified format
    ///
    /// # Errors
    /// - Encoding failures and file I/O errors
    pub fn save<P: AsRef<Path>>(&self, path: P, format: OutputFormat, quality: u8) -> Result<()> {
        crate::services::ImageIOService::save_result(self, path, format, quality)
    }

    /// Save the result as PNG with alpha channel
    ///
    /// # Errors
    /// - Encoding failures and file I/O errors
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save(path, OutputFormat::Png, 100)
    }
}
