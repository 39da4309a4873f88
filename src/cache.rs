//! On-disk cache for downloaded model checkpoints
//!
//! Cached models live in an XDG-compliant directory as flat
//! `<model-id>.onnx` files with an optional `<model-id>.json` metadata
//! sidecar (source URL, size, sha256). Population happens through the
//! downloader's temp-file-plus-rename sequence, so an entry is either
//! absent or complete; readers never observe a partial write.

use crate::error::{RemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Sidecar metadata stored next to a cached checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Source URL the checkpoint was fetched from
    pub url: String,
    /// Size of the checkpoint in bytes
    pub size_bytes: u64,
    /// Hex sha256 digest of the checkpoint
    pub sha256: String,
}

/// Information about a cached model
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    /// Model identifier (derived from the source URL)
    pub model_id: String,
    /// Path to the cached checkpoint
    pub path: PathBuf,
    /// Checkpoint size in bytes
    pub size_bytes: u64,
    /// Sidecar metadata, when present and parseable
    pub metadata: Option<CacheMetadata>,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a cache manager at the default location
    ///
    /// Uses the XDG base directory specification:
    /// - Linux/macOS: `~/.cache/unbg/models/`
    /// - Windows: `%LOCALAPPDATA%/unbg/models/`
    ///
    /// The `UNBG_CACHE_DIR` environment variable overrides the base
    /// directory.
    ///
    /// # Errors
    /// - Failed to determine or create the cache directory
    pub fn new() -> Result<Self> {
        Self::with_dir(Self::default_cache_dir()?)
    }

    /// Create a cache manager rooted at an explicit directory
    ///
    /// # Errors
    /// - Failed to create the directory
    pub fn with_dir(cache_dir: PathBuf) -> Result<Self> {
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                RemovalError::file_io_error("create cache directory", &cache_dir, &e)
            })?;
        }
        Ok(Self { cache_dir })
    }

    /// The default cache directory, honoring `UNBG_CACHE_DIR`
    ///
    /// # Errors
    /// - No user cache directory could be determined
    pub fn default_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var("UNBG_CACHE_DIR") {
            return Ok(PathBuf::from(cache_override).join("models"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                RemovalError::invalid_config(
                    "Failed to determine cache directory. Set the UNBG_CACHE_DIR environment variable.",
                )
            })?
            .join("unbg")
            .join("models"))
    }

    /// The directory this cache is rooted at
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Generate a model id from a URL
    ///
    /// HuggingFace file URLs like
    /// `https://huggingface.co/danielgatis/rembg/resolve/main/u2netp.onnx`
    /// become `danielgatis--rembg--u2netp`; other HuggingFace URLs replace
    /// `/` with `--`; everything else gets a hash-based identifier.
    #[must_use]
    pub fn url_to_model_id(url: &str) -> String {
        let prefix = "https://huggingface.co/";
        if let Some(rest) = url.strip_prefix(prefix) {
            let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
            if segments.len() >= 5 && segments.get(2).copied() == Some("resolve") {
                let owner = segments.first().copied().unwrap_or_default();
                let repo = segments.get(1).copied().unwrap_or_default();
                let file = segments.last().copied().unwrap_or_default();
                let stem = Path::new(file)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(file);
                return format!("{owner}--{repo}--{stem}");
            }
            return rest.replace('/', "--");
        }

        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let hash_string = format!("url-{:x}", hasher.finalize());
        hash_string.get(..16).unwrap_or(&hash_string).to_string()
    }

    /// Path of a cached checkpoint (may not exist)
    #[must_use]
    pub fn model_path(&self, model_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{model_id}.onnx"))
    }

    /// Path of a checkpoint's metadata sidecar (may not exist)
    #[must_use]
    pub fn metadata_path(&self, model_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{model_id}.json"))
    }

    /// Check whether a model is present in the cache
    #[must_use]
    pub fn is_model_cached(&self, model_id: &str) -> bool {
        let path = self.model_path(model_id);
        fs::metadata(&path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
    }

    /// Load a cached checkpoint into memory
    ///
    /// # Errors
    /// - The checkpoint is missing or unreadable
    pub fn load_model(&self, model_id: &str) -> Result<Vec<u8>> {
        let path = self.model_path(model_id);
        fs::read(&path).map_err(|e| RemovalError::file_io_error("read cached model", &path, &e))
    }

    /// Write a checkpoint's metadata sidecar
    ///
    /// # Errors
    /// - Serialization or file I/O failures
    pub fn write_metadata(&self, model_id: &str, metadata: &CacheMetadata) -> Result<()> {
        let path = self.metadata_path(model_id);
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| RemovalError::internal(format!("serialize cache metadata: {e}")))?;
        fs::write(&path, json)
            .map_err(|e| RemovalError::file_io_error("write cache metadata", &path, &e))
    }

    /// Read a checkpoint's metadata sidecar, when present
    #[must_use]
    pub fn read_metadata(&self, model_id: &str) -> Option<CacheMetadata> {
        let json = fs::read_to_string(self.metadata_path(model_id)).ok()?;
        serde_json::from_str(&json).ok()
    }

    /// Scan the cache and return all available models, sorted by id
    ///
    /// # Errors
    /// - Failed to read the cache directory
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(models);
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            RemovalError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                RemovalError::file_io_error("read cache directory entry", &self.cache_dir, &e)
            })?;
            let path = entry.path();

            let is_checkpoint = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
            if !path.is_file() || !is_checkpoint {
                continue;
            }

            let Some(model_id) = path.file_stem().and_then(|s| s.to_str()) else {
                log::debug!("Skipping cache entry with unusable name: {}", path.display());
                continue;
            };

            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            models.push(CachedModelInfo {
                model_id: model_id.to_string(),
                path: path.clone(),
                size_bytes,
                metadata: self.read_metadata(model_id),
            });
        }

        models.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(models)
    }

    /// Remove a single cached model (checkpoint plus sidecar)
    ///
    /// Returns whether a checkpoint was actually removed.
    ///
    /// # Errors
    /// - File I/O failures during removal
    pub fn remove_model(&self, model_id: &str) -> Result<bool> {
        let path = self.model_path(model_id);
        if !path.exists() {
            return Ok(false);
        }

        fs::remove_file(&path)
            .map_err(|e| RemovalError::file_io_error("remove cached model", &path, &e))?;

        let metadata = self.metadata_path(model_id);
        if metadata.exists() {
            fs::remove_file(&metadata)
                .map_err(|e| RemovalError::file_io_error("remove cache metadata", &metadata, &e))?;
        }

        Ok(true)
    }

    /// Remove every cached model, returning the removed ids
    ///
    /// # Errors
    /// - File I/O failures during scanning or removal
    pub fn clear(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for info in self.scan_cached_models()? {
            self.remove_model(&info.model_id)?;
            removed.push(info.model_id);
        }
        Ok(removed)
    }
}

/// Human-readable size formatting for cache listings
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS.get(unit).copied().unwrap_or("GB"))
    }
}
