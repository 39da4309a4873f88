//! Background removal pipeline
//!
//! `BackgroundRemovalProcessor` owns the end-to-end flow: resolve the
//! working resolution, resize, run the model, write the matte into the
//! alpha channel, and restore the original dimensions. Every invocation
//! creates its own inference backend and releases it unconditionally after
//! the forward pass, so concurrent invocations never share mutable state.

use crate::{
    config::RemovalConfig,
    error::Result,
    inference::InferenceBackend,
    models::ModelManager,
    tensor::PixelTensor,
    types::{AlphaMatte, ProcessingTimings, RemovalResult},
};
use image::DynamicImage;
use instant::Instant;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, span, Level};

/// Backend type enumeration for runtime selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl Default for BackendType {
    fn default() -> Self {
        Self::Onnx
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// Factory trait for creating inference backends
///
/// The pipeline requests a fresh backend per invocation; tests inject
/// scripted backends through this seam.
pub trait BackendFactory: Send + Sync {
    /// Create a backend of the given type around the given model
    ///
    /// # Errors
    /// - Backend type compiled out or construction failures
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List backend types this factory can construct
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Default factory constructing the feature-gated production backends
pub struct DefaultBackendFactory;

#[cfg(feature = "onnx")]
fn create_onnx_backend(model_manager: ModelManager) -> Result<Box<dyn InferenceBackend>> {
    Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
        model_manager,
    )))
}

#[cfg(not(feature = "onnx"))]
fn create_onnx_backend(_model_manager: ModelManager) -> Result<Box<dyn InferenceBackend>> {
    Err(crate::error::RemovalError::invalid_config(
        "ONNX backend requested but this build does not include the 'onnx' feature",
    ))
}

#[cfg(feature = "tract")]
fn create_tract_backend(model_manager: ModelManager) -> Result<Box<dyn InferenceBackend>> {
    Ok(Box::new(crate::backends::TractBackend::with_model_manager(
        model_manager,
    )))
}

#[cfg(not(feature = "tract"))]
fn create_tract_backend(_model_manager: ModelManager) -> Result<Box<dyn InferenceBackend>> {
    Err(crate::error::RemovalError::invalid_config(
        "Tract backend requested but this build does not include the 'tract' feature",
    ))
}

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            BackendType::Onnx => create_onnx_backend(model_manager),
            BackendType::Tract => create_tract_backend(model_manager),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        #[allow(unused_mut)]
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// End-to-end background removal pipeline
pub struct BackgroundRemovalProcessor {
    config: RemovalConfig,
    backend_factory: Box<dyn BackendFactory>,
}

impl BackgroundRemovalProcessor {
    /// Create a processor with the default backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: RemovalConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a processor with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_factory(
        config: RemovalConfig,
        backend_factory: Box<dyn BackendFactory>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend_factory,
        })
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Backend types the factory can construct
    #[must_use]
    pub fn available_backends(&self) -> Vec<BackendType> {
        self.backend_factory.available_backends()
    }

    /// Process encoded image bytes (JPEG, PNG, WebP, BMP, TIFF)
    ///
    /// # Errors
    /// - `Decode` when the bytes are not an image
    /// - All pipeline errors from [`Self::process_pixels`]
    pub fn process_bytes(&self, image_bytes: &[u8]) -> Result<RemovalResult> {
        let decode_start = Instant::now();
        let tensor = PixelTensor::from_bytes(image_bytes)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_pixels(tensor)?;
        result.timings.decode_ms = decode_ms;
        result.timings.total_ms += decode_ms;
        Ok(result)
    }

    /// Process a decoded `DynamicImage`
    ///
    /// # Errors
    /// - `InvalidDimensions` for zero-area images
    /// - All pipeline errors from [`Self::process_pixels`]
    pub fn process_image(&self, image: &DynamicImage) -> Result<RemovalResult> {
        let tensor = PixelTensor::from_image(image)?;
        self.process_pixels(tensor)
    }

    /// Run the pipeline over a pixel buffer
    ///
    /// # Errors
    /// - `Model` when the model cannot be loaded
    /// - `Inference` on runtime faults or a matte that violates the
    ///   working-resolution contract
    #[instrument(
        skip(self, tensor),
        fields(
            backend = %self.config.backend_type,
            model = %self.config.model_spec.source.display_name(),
            dimensions = %format!("{}x{}", tensor.width(), tensor.height())
        )
    )]
    pub fn process_pixels(&self, tensor: PixelTensor) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        let (original_width, original_height) = tensor.dimensions();
        let target = self.resolve_target_resolution(original_width);
        // The resize decision compares against width alone, mirroring the
        // square working-resolution rule above.
        let needs_resize = target != original_width;

        debug!(target, needs_resize, "resolved working resolution");

        let resize_start = Instant::now();
        let mut working = if needs_resize {
            let _span = span!(Level::DEBUG, "resize_to_working", target).entered();
            tensor.resize(target, target, self.config.filter)?
        } else {
            tensor
        };
        timings.resize_ms += resize_start.elapsed().as_millis() as u64;

        let matte = self.run_inference(&working, target, &mut timings)?;

        let composite_start = Instant::now();
        working.apply_matte(&matte, self.config.output);
        timings.composite_ms = composite_start.elapsed().as_millis() as u64;

        let resize_back_start = Instant::now();
        let final_tensor = if needs_resize {
            let _span = span!(Level::DEBUG, "resize_to_original").entered();
            working.resize(original_width, original_height, self.config.filter)?
        } else {
            working
        };
        timings.resize_ms += resize_back_start.elapsed().as_millis() as u64;

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        debug!(summary = %timings.summary(), "background removal complete");

        Ok(RemovalResult::new(
            final_tensor,
            (original_width, original_height),
            timings,
        ))
    }

    /// Load the model, run one forward pass, and release the session
    ///
    /// The backend is released exactly once per loaded session, before the
    /// inference outcome is inspected, so a failed forward pass cannot leak
    /// native resources.
    fn run_inference(
        &self,
        working: &PixelTensor,
        target: u32,
        timings: &mut ProcessingTimings,
    ) -> Result<AlphaMatte> {
        let model_manager = ModelManager::from_spec(&self.config.model_spec)?;
        let mut backend = self
            .backend_factory
            .create_backend(self.config.backend_type, model_manager)?;

        let load_start = Instant::now();
        {
            let _span = span!(Level::DEBUG, "model_load").entered();
            backend.initialize(&self.config)?;
        }
        timings.model_load_ms = load_start.elapsed().as_millis() as u64;

        let input = working.to_model_tensor();

        let inference_start = Instant::now();
        let inference = {
            let _span = span!(Level::INFO, "inference", backend = %self.config.backend_type).entered();
            backend.infer(&input)
        };
        backend.release();
        timings.inference_ms = inference_start.elapsed().as_millis() as u64;

        let output = inference?;
        AlphaMatte::from_tensor(&output, target)
    }

    /// Resolve the square working resolution for an input image
    ///
    /// Defaults to the input WIDTH. Height is intentionally not consulted:
    /// the model operates on square inputs keyed off width alone.
    fn resolve_target_resolution(&self, original_width: u32) -> u32 {
        self.config.resolution.unwrap_or(original_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{MatteFill, MockBackendFactory};
    use crate::config::{OutputTarget, RemovalConfig};
    use crate::error::RemovalError;
    use crate::models::{ModelSource, ModelSpec};
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn test_config() -> RemovalConfig {
        RemovalConfig::builder()
            .model_spec(ModelSpec {
                source: ModelSource::Memory(vec![0_u8; 2048]),
            })
            .build()
            .unwrap()
    }

    fn red_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255])))
    }

    fn processor_with(
        factory: MockBackendFactory,
        config: RemovalConfig,
    ) -> (Arc<std::sync::atomic::AtomicUsize>, BackgroundRemovalProcessor) {
        let releases = factory.release_counter();
        let processor =
            BackgroundRemovalProcessor::with_factory(config, Box::new(factory)).unwrap();
        (releases, processor)
    }

    #[test]
    fn test_output_dimensions_match_input_without_resize() {
        let (_, processor) =
            processor_with(MockBackendFactory::new(MatteFill::Constant(1.0)), test_config());
        let result = processor.process_image(&red_image(64, 64)).unwrap();
        assert_eq!(result.dimensions(), (64, 64));
    }

    #[test]
    fn test_output_dimensions_restored_after_resize() {
        let mut config = test_config();
        config.resolution = Some(32);
        let (_, processor) =
            processor_with(MockBackendFactory::new(MatteFill::Constant(1.0)), config);

        let result = processor.process_image(&red_image(64, 48)).unwrap();
        assert_eq!(result.dimensions(), (64, 48));
        assert_eq!(result.original_dimensions, (64, 48));
    }

    #[test]
    fn test_foreground_alpha_from_unit_matte() {
        let (_, processor) =
            processor_with(MockBackendFactory::new(MatteFill::Constant(1.0)), test_config());
        let result = processor.process_image(&red_image(8, 8)).unwrap();
        assert!(result.alpha_mask().iter().all(|&a| a == 255));

        let (_, processor) = processor_with(
            MockBackendFactory::new(MatteFill::Constant(0.0)),
            test_config(),
        );
        let result = processor.process_image(&red_image(8, 8)).unwrap();
        assert!(result.alpha_mask().iter().all(|&a| a == 0));
    }

    #[test]
    fn test_background_alpha_inverts_matte() {
        let mut config = test_config();
        config.output = OutputTarget::Background;
        let (_, processor) =
            processor_with(MockBackendFactory::new(MatteFill::Constant(1.0)), config);
        let result = processor.process_image(&red_image(8, 8)).unwrap();
        assert!(result.alpha_mask().iter().all(|&a| a == 0));

        let mut config = test_config();
        config.output = OutputTarget::Background;
        let (_, processor) =
            processor_with(MockBackendFactory::new(MatteFill::Constant(0.0)), config);
        let result = processor.process_image(&red_image(8, 8)).unwrap();
        assert!(result.alpha_mask().iter().all(|&a| a == 255));
    }

    #[test]
    fn test_mask_mode_matches_foreground_and_keeps_rgb() {
        let mut config = test_config();
        config.output = OutputTarget::Mask;
        let (_, processor) =
            processor_with(MockBackendFactory::new(MatteFill::Checkerboard), config);
        let mask_result = processor.process_image(&red_image(8, 8)).unwrap();

        let (_, processor) = processor_with(
            MockBackendFactory::new(MatteFill::Checkerboard),
            test_config(),
        );
        let fg_result = processor.process_image(&red_image(8, 8)).unwrap();

        assert_eq!(mask_result.alpha_mask(), fg_result.alpha_mask());
        // RGB is untouched in mask mode
        assert_eq!(&mask_result.to_rgba_bytes()[0..3], &[255, 0, 0]);
    }

    #[test]
    fn test_release_called_exactly_once_on_success() {
        let (releases, processor) =
            processor_with(MockBackendFactory::new(MatteFill::Constant(1.0)), test_config());
        processor.process_image(&red_image(16, 16)).unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_called_exactly_once_on_inference_failure() {
        let (releases, processor) = processor_with(
            MockBackendFactory::new(MatteFill::Constant(1.0)).failing_infer(),
            test_config(),
        );
        let err = processor.process_image(&red_image(16, 16)).unwrap_err();
        assert!(matches!(err, RemovalError::Inference(_)));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_release_owed_when_model_load_fails() {
        let (releases, processor) = processor_with(
            MockBackendFactory::new(MatteFill::Constant(1.0)).failing_initialize(),
            test_config(),
        );
        let err = processor.process_image(&red_image(16, 16)).unwrap_err();
        assert!(matches!(err, RemovalError::Model(_)));
        // Nothing was loaded, so nothing is released.
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_area_image_rejected_before_inference() {
        let (releases, processor) =
            processor_with(MockBackendFactory::new(MatteFill::Constant(1.0)), test_config());
        let err = processor
            .process_image(&DynamicImage::new_rgba8(0, 10))
            .unwrap_err();
        assert!(matches!(err, RemovalError::InvalidDimensions(_)));
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_matte_resolution_contract_violation_is_fatal() {
        // Backend claims an 8x8 matte while the working resolution is 16.
        let (releases, processor) = processor_with(
            MockBackendFactory::new(MatteFill::Constant(1.0)).with_output_resolution(8),
            test_config(),
        );
        let err = processor.process_image(&red_image(16, 16)).unwrap_err();
        assert!(matches!(err, RemovalError::Inference(_)));
        // The session was loaded and must still be released.
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_width_keyed_resolution_on_non_square_input() {
        // 6x3 input, no explicit resolution: the working resolution is the
        // width (6), the buffer is not resized, and matte entries past the
        // 18-pixel buffer are dropped.
        let (_, processor) = processor_with(
            MockBackendFactory::new(MatteFill::Constant(1.0)).with_output_resolution(6),
            test_config(),
        );
        let result = processor.process_image(&red_image(6, 3)).unwrap();
        assert_eq!(result.dimensions(), (6, 3));
        assert!(result.alpha_mask().iter().all(|&a| a == 255));
    }

    #[test]
    fn test_explicit_resolution_equal_to_width_skips_resize() {
        let mut config = test_config();
        config.resolution = Some(32);
        let (_, processor) = processor_with(
            MockBackendFactory::new(MatteFill::Checkerboard),
            config,
        );

        // Checkerboard alphas survive exactly when no resampling happens.
        let result = processor.process_image(&red_image(32, 32)).unwrap();
        assert!(result.alpha_mask().iter().all(|&a| a == 0 || a == 255));
    }

    #[test]
    fn test_processor_rejects_invalid_config() {
        let mut config = test_config();
        config.resolution = Some(0);
        let result = BackgroundRemovalProcessor::new(config);
        assert!(matches!(result, Err(RemovalError::InvalidDimensions(_))));
    }

    #[test]
    fn test_default_factory_lists_compiled_backends() {
        let factory = DefaultBackendFactory;
        let backends = factory.available_backends();
        #[cfg(feature = "onnx")]
        assert!(backends.contains(&BackendType::Onnx));
        #[cfg(feature = "tract")]
        assert!(backends.contains(&BackendType::Tract));
    }
}
