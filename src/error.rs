//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, RemovalError>;

/// Error taxonomy for the background removal pipeline
///
/// Every variant is terminal for the current call; nothing is retried
/// internally and no partial result is returned alongside an error.
#[derive(Error, Debug)]
pub enum RemovalError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The image source could not be decoded into a pixel buffer
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// Zero or otherwise unusable image/resize dimensions
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Model loading or initialization errors (malformed or unsupported model data)
    #[error("Model error: {0}")]
    Model(String),

    /// Runtime or shape fault during inference
    #[error("Inference error: {0}")]
    Inference(String),

    /// The default model asset could not be resolved or fetched
    #[error("Asset resolution error: {0}")]
    AssetResolution(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RemovalError {
    /// Create a new invalid-dimensions error
    pub fn invalid_dimensions<S: Into<String>>(msg: S) -> Self {
        Self::InvalidDimensions(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new asset-resolution error
    pub fn asset_resolution<S: Into<String>>(msg: S) -> Self {
        Self::AssetResolution(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create an asset-resolution error wrapping a network failure
    pub fn network_error<E: std::fmt::Display>(context: &str, error: E) -> Self {
        Self::AssetResolution(format!("{context}: {error}"))
    }

    /// Create a decode error with source context
    pub fn decode_error<P: AsRef<std::path::Path>>(path: P, error: &image::ImageError) -> Self {
        let path_display = path.as_ref().display();
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");
        Self::Decode(image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "Failed to decode '{path_display}' (format: {extension}): {error}. Supported formats: PNG, JPEG, WebP, TIFF, BMP"
            ),
        )))
    }

    /// Create a model error with troubleshooting context
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
    ) -> Self {
        let path_display = model_path.as_ref().display();
        Self::Model(format!("Failed to {operation} model '{path_display}': {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = RemovalError::invalid_config("bad option");
        assert!(matches!(err, RemovalError::InvalidConfig(_)));

        let err = RemovalError::invalid_dimensions("width is zero");
        assert!(matches!(err, RemovalError::InvalidDimensions(_)));

        let err = RemovalError::asset_resolution("default model unreachable");
        assert!(matches!(err, RemovalError::AssetResolution(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RemovalError::inference("output shape mismatch");
        assert_eq!(err.to_string(), "Inference error: output shape mismatch");

        let err = RemovalError::model("truncated protobuf");
        assert_eq!(err.to_string(), "Model error: truncated protobuf");
    }

    #[test]
    fn test_file_io_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = RemovalError::file_io_error(
            "read model file",
            Path::new("/models/u2netp.onnx"),
            &io_error,
        );
        let message = err.to_string();
        assert!(message.contains("read model file"));
        assert!(message.contains("/models/u2netp.onnx"));
    }

    #[test]
    fn test_model_error_with_context() {
        let err = RemovalError::model_error_with_context(
            "load",
            Path::new("/models/missing.onnx"),
            "file not found",
        );
        let message = err.to_string();
        assert!(message.contains("load"));
        assert!(message.contains("/models/missing.onnx"));
    }
}
