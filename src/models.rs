//! Model source resolution and loading

use crate::cache::ModelCache;
use crate::error::{RemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// URL of the default segmentation checkpoint (`u2netp`)
pub const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/danielgatis/rembg/resolve/main/u2netp.onnx";

/// Model source specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelSource {
    /// External `.onnx` file from a filesystem path
    External(PathBuf),
    /// Downloaded model from the cache, by model id
    Downloaded(String),
    /// Caller-supplied model bytes, bypassing the cache entirely
    Memory(Vec<u8>),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::External(path) => {
                format!(
                    "external:{}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                )
            },
            ModelSource::Downloaded(model_id) => format!("cached:{model_id}"),
            ModelSource::Memory(bytes) => format!("memory:{} bytes", bytes.len()),
        }
    }
}

/// Complete model specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
}

impl Default for ModelSpec {
    fn default() -> Self {
        // An empty id resolves to the default model at runtime
        Self {
            source: ModelSource::Downloaded(String::new()),
        }
    }
}

/// The cache id of the default model
#[must_use]
pub fn default_model_id() -> String {
    ModelCache::url_to_model_id(DEFAULT_MODEL_URL)
}

/// Resolve a model spec so processing can load it synchronously
///
/// The default model is fetched into the cache on first use (the
/// downloader's atomic population keeps concurrent first uses safe). Any
/// other uncached id is an error: fetching arbitrary models implicitly is
/// not this crate's call to make.
///
/// # Errors
/// - `AssetResolution` when a non-default model id is not cached, or the
///   default asset cannot be fetched
pub async fn ensure_model_available(spec: &ModelSpec) -> Result<ModelSpec> {
    let ModelSource::Downloaded(model_id) = &spec.source else {
        return Ok(spec.clone());
    };

    let resolved_id = if model_id.is_empty() {
        default_model_id()
    } else {
        model_id.clone()
    };

    let cache = ModelCache::new()?;
    if !cache.is_model_cached(&resolved_id) {
        if resolved_id == default_model_id() {
            log::info!("Default model not cached, fetching {DEFAULT_MODEL_URL}");
            let downloader = crate::download::ModelDownloader::new()?;
            downloader.download_model(DEFAULT_MODEL_URL, false).await?;
        } else {
            return Err(RemovalError::asset_resolution(format!(
                "model '{resolved_id}' is not cached; download it first or pass a file path"
            )));
        }
    }

    Ok(ModelSpec {
        source: ModelSource::Downloaded(resolved_id),
    })
}

/// Resolves a `ModelSpec` to loadable model bytes
#[derive(Debug, Clone)]
pub struct ModelManager {
    source: ModelSource,
}

impl ModelManager {
    /// Create a manager for the given spec, validating the source up front
    ///
    /// # Errors
    /// - `Model` for a missing external file or an empty memory buffer
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        let source = match &spec.source {
            ModelSource::External(path) => {
                if !path.is_file() {
                    return Err(RemovalError::model_error_with_context(
                        "locate",
                        path,
                        "file does not exist",
                    ));
                }
                ModelSource::External(path.clone())
            },
            ModelSource::Downloaded(model_id) => {
                let resolved = if model_id.is_empty() {
                    default_model_id()
                } else {
                    model_id.clone()
                };
                ModelSource::Downloaded(resolved)
            },
            ModelSource::Memory(bytes) => {
                if bytes.is_empty() {
                    return Err(RemovalError::model("empty in-memory model buffer"));
                }
                ModelSource::Memory(bytes.clone())
            },
        };

        Ok(Self { source })
    }

    /// Load the model data as bytes
    ///
    /// # Errors
    /// - `Model` when an external file cannot be read
    /// - `AssetResolution` when a cached model id is not present in the cache
    pub fn load_model(&self) -> Result<Vec<u8>> {
        match &self.source {
            ModelSource::External(path) => fs::read(path).map_err(|e| {
                RemovalError::model_error_with_context("read", path, &e.to_string())
            }),
            ModelSource::Downloaded(model_id) => {
                let cache = ModelCache::new()?;
                if !cache.is_model_cached(model_id) {
                    return Err(RemovalError::asset_resolution(format!(
                        "model '{model_id}' is not cached"
                    )));
                }
                cache.load_model(model_id)
            },
            ModelSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }

    /// Display name of the underlying source
    #[must_use]
    pub fn display_name(&self) -> String {
        self.source.display_name()
    }

    /// The resolved source backing this manager
    #[must_use]
    pub fn source(&self) -> &ModelSource {
        &self.source
    }
}
