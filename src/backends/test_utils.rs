//! Mock backends for unit testing the pipeline without a real model

use crate::config::RemovalConfig;
use crate::error::{RemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::ModelManager;
use crate::processor::{BackendFactory, BackendType};
use instant::Duration;
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Matte pattern produced by the mock backend
#[derive(Debug, Clone, Copy)]
pub enum MatteFill {
    /// Every pixel gets the same probability
    Constant(f32),
    /// Alternating 0.0 / 1.0 per pixel, `(x + y) % 2`
    Checkerboard,
}

/// Scripted backend that fabricates mattes and records its lifecycle
pub struct MockBackend {
    fill: MatteFill,
    fail_initialize: bool,
    fail_infer: bool,
    output_resolution: Option<u32>,
    initialized: bool,
    release_count: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new(fill: MatteFill, release_count: Arc<AtomicUsize>) -> Self {
        Self {
            fill,
            fail_initialize: false,
            fail_infer: false,
            output_resolution: None,
            initialized: false,
            release_count,
        }
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn failing_infer(mut self) -> Self {
        self.fail_infer = true;
        self
    }

    /// Force a square output resolution instead of echoing the input dims
    pub fn with_output_resolution(mut self, resolution: u32) -> Self {
        self.output_resolution = Some(resolution);
        self
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.fail_initialize {
            return Err(RemovalError::model("mock model refused to load"));
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(0)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(RemovalError::internal("mock backend not initialized"));
        }
        if self.fail_infer {
            return Err(RemovalError::inference("mock inference fault"));
        }

        let (h, w) = match self.output_resolution {
            Some(resolution) => (resolution as usize, resolution as usize),
            None => {
                let (_, _, h, w) = input.dim();
                (h, w)
            },
        };
        let output = match self.fill {
            MatteFill::Constant(value) => Array4::from_elem((1, 1, h, w), value),
            MatteFill::Checkerboard => {
                Array4::from_shape_fn((1, 1, h, w), |(_, _, y, x)| ((x + y) % 2) as f32)
            },
        };
        Ok(output)
    }

    fn release(&mut self) {
        self.release_count.fetch_add(1, Ordering::SeqCst);
        self.initialized = false;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Factory handing out scripted mock backends and a shared release counter
pub struct MockBackendFactory {
    fill: MatteFill,
    fail_initialize: bool,
    fail_infer: bool,
    output_resolution: Option<u32>,
    pub release_count: Arc<AtomicUsize>,
}

impl MockBackendFactory {
    pub fn new(fill: MatteFill) -> Self {
        Self {
            fill,
            fail_initialize: false,
            fail_infer: false,
            output_resolution: None,
            release_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Force a square output resolution instead of echoing the input dims
    pub fn with_output_resolution(mut self, resolution: u32) -> Self {
        self.output_resolution = Some(resolution);
        self
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn failing_infer(mut self) -> Self {
        self.fail_infer = true;
        self
    }

    pub fn releases(&self) -> usize {
        self.release_count.load(Ordering::SeqCst)
    }

    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.release_count)
    }
}

impl BackendFactory for MockBackendFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        _model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        let mut backend = MockBackend::new(self.fill, Arc::clone(&self.release_count));
        if self.fail_initialize {
            backend = backend.failing_initialize();
        }
        if self.fail_infer {
            backend = backend.failing_infer();
        }
        if let Some(resolution) = self.output_resolution {
            backend = backend.with_output_resolution(resolution);
        }
        Ok(Box::new(backend))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Onnx, BackendType::Tract]
    }
}
