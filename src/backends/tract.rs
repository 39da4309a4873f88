//! Tract backend implementation
//!
//! Pure Rust inference through Tract, with no external runtime
//! dependencies. Slower than ONNX Runtime but portable anywhere Rust
//! compiles, WASM included.

use crate::config::RemovalConfig;
use crate::error::{RemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::ModelManager;
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for running segmentation models with pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: ModelManager,
    initialized: bool,
}

impl TractBackend {
    /// Create a new Tract backend for the given model
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager,
            initialized: false,
        }
    }

    /// List Tract execution providers with availability status
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Load the model and build the optimized Tract graph
    fn load_model(&mut self, _config: &RemovalConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_data = self.model_manager.load_model()?;

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| RemovalError::model(format!("Failed to load ONNX model: {e}")))?
            .into_optimized()
            .map_err(|e| RemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| RemovalError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::debug!(
            "Tract backend ready for {} in {:.0}ms",
            self.model_manager.display_name(),
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    #[allow(clippy::get_first)]
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| RemovalError::inference("Tract model not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("Running Tract inference, input shape {:?}", input.shape());

        let input_tensor = Tensor::from(input.clone());

        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| RemovalError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| RemovalError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor
            .to_array_view::<f32>()
            .map_err(|e| RemovalError::inference(format!("Failed to convert output tensor: {e}")))?;

        let output_shape = output_data.shape();
        if output_shape.len() != 4 {
            return Err(RemovalError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }

        let output_array = Array4::from_shape_vec(
            (
                output_shape.get(0).copied().unwrap_or(1),
                output_shape.get(1).copied().unwrap_or(1),
                output_shape.get(2).copied().unwrap_or(1),
                output_shape.get(3).copied().unwrap_or(1),
            ),
            output_data.to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| RemovalError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "Tract inference complete in {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(output_array)
    }

    fn release(&mut self) {
        if self.model.take().is_some() {
            log::debug!("Released Tract model");
        }
        self.initialized = false;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(all(test, feature = "tract"))]
mod tests {
    use super::*;
    use crate::models::{ModelSource, ModelSpec};

    #[test]
    fn test_backend_starts_uninitialized() {
        let spec = ModelSpec {
            source: ModelSource::Memory(vec![0_u8; 8]),
        };
        let manager = ModelManager::from_spec(&spec).unwrap();
        let backend = TractBackend::with_model_manager(manager);
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_initialize_rejects_garbage_model() {
        let spec = ModelSpec {
            source: ModelSource::Memory(b"definitely not onnx".to_vec()),
        };
        let manager = ModelManager::from_spec(&spec).unwrap();
        let mut backend = TractBackend::with_model_manager(manager);

        let config = RemovalConfig::default();
        let result = backend.initialize(&config);
        assert!(matches!(result, Err(RemovalError::Model(_))));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_release_without_session_is_harmless() {
        let spec = ModelSpec {
            source: ModelSource::Memory(vec![0_u8; 8]),
        };
        let manager = ModelManager::from_spec(&spec).unwrap();
        let mut backend = TractBackend::with_model_manager(manager);
        backend.release();
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_list_providers() {
        let providers = TractBackend::list_providers();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers.first().unwrap().0, "CPU");
        assert!(providers.first().unwrap().1);
    }
}
