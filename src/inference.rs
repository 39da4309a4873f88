//! Inference backend abstraction

use crate::{config::RemovalConfig, error::Result};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
///
/// A backend wraps one loaded model session. The pipeline drives it through
/// a fixed lifecycle: `initialize` once, `infer` once, then `release`
/// unconditionally, on the error path included. Backends make no attempt to
/// survive past `release`; a released backend must be re-initialized before
/// further inference.
pub trait InferenceBackend {
    /// Load the model and prepare the session
    ///
    /// Returns the model loading time when a load actually happened.
    ///
    /// # Errors
    /// - Malformed or unsupported model data
    /// - Session construction or execution-provider failures
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>>;

    /// Run a forward pass on the input tensor
    ///
    /// Input is `(1, 3, h, w)` normalized RGB; output is the model's
    /// `(1, 1, h, w)` probability map.
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Shape mismatch or runtime fault during execution
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Release the session and any backing native resources
    ///
    /// Safe to call exactly once per loaded session; the pipeline guarantees
    /// it is called after every inference attempt, successful or not.
    fn release(&mut self);

    /// Check if the backend holds a loaded session
    fn is_initialized(&self) -> bool;
}
