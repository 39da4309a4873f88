//! Execution provider parsing and diagnostics

use crate::config::ExecutionProvider;
use crate::error::{RemovalError, Result};
use crate::processor::BackendType;

/// Availability information for a single execution provider
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Provider name (CPU, CUDA, CoreML)
    pub name: String,
    /// Whether the provider is usable on this machine
    pub available: bool,
    /// Human-readable description
    pub description: String,
}

/// Parsing and listing of `backend:provider` selections
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse a `backend:provider` string such as `onnx:auto` or `tract:cpu`
    ///
    /// A bare backend name selects the `auto` provider.
    ///
    /// # Errors
    /// - `InvalidConfig` for unknown backends, unknown providers, or
    ///   provider choices the backend cannot honor
    pub fn parse_provider_string(spec: &str) -> Result<(BackendType, ExecutionProvider)> {
        let (backend_str, provider_str) = match spec.split_once(':') {
            Some((backend, provider)) => (backend, provider),
            None => (spec, "auto"),
        };

        let backend = match backend_str.to_ascii_lowercase().as_str() {
            "onnx" => BackendType::Onnx,
            "tract" => BackendType::Tract,
            other => {
                return Err(RemovalError::invalid_config(format!(
                    "unknown backend '{other}' (expected onnx or tract)"
                )))
            },
        };

        let provider = match provider_str.to_ascii_lowercase().as_str() {
            "" | "auto" => ExecutionProvider::Auto,
            "cpu" => ExecutionProvider::Cpu,
            "cuda" => ExecutionProvider::Cuda,
            "coreml" => ExecutionProvider::CoreMl,
            other => {
                return Err(RemovalError::invalid_config(format!(
                    "unknown execution provider '{other}' (expected auto, cpu, cuda, or coreml)"
                )))
            },
        };

        if backend == BackendType::Tract
            && matches!(provider, ExecutionProvider::Cuda | ExecutionProvider::CoreMl)
        {
            return Err(RemovalError::invalid_config(format!(
                "the tract backend only supports cpu execution, got '{provider}'"
            )));
        }

        Ok((backend, provider))
    }

    /// List providers per compiled-in backend for diagnostics output
    #[must_use]
    pub fn list_backend_providers() -> Vec<(String, Vec<ProviderInfo>)> {
        let mut listings = Vec::new();

        #[cfg(feature = "onnx")]
        listings.push((
            "onnx".to_string(),
            crate::backends::OnnxBackend::list_providers()
                .into_iter()
                .map(|(name, available, description)| ProviderInfo {
                    name,
                    available,
                    description,
                })
                .collect(),
        ));

        #[cfg(feature = "tract")]
        listings.push((
            "tract".to_string(),
            crate::backends::TractBackend::list_providers()
                .into_iter()
                .map(|(name, available, description)| ProviderInfo {
                    name,
                    available,
                    description,
                })
                .collect(),
        ));

        listings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_and_provider() {
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("onnx:auto").unwrap(),
            (BackendType::Onnx, ExecutionProvider::Auto)
        );
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("onnx:coreml").unwrap(),
            (BackendType::Onnx, ExecutionProvider::CoreMl)
        );
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("tract:cpu").unwrap(),
            (BackendType::Tract, ExecutionProvider::Cpu)
        );
    }

    #[test]
    fn test_parse_bare_backend_defaults_to_auto() {
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("onnx").unwrap(),
            (BackendType::Onnx, ExecutionProvider::Auto)
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("ONNX:CUDA").unwrap(),
            (BackendType::Onnx, ExecutionProvider::Cuda)
        );
    }

    #[test]
    fn test_parse_rejects_unknown_backend() {
        let err = ExecutionProviderManager::parse_provider_string("torch:cpu").unwrap_err();
        assert!(matches!(err, RemovalError::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_rejects_unknown_provider() {
        let err = ExecutionProviderManager::parse_provider_string("onnx:npu").unwrap_err();
        assert!(matches!(err, RemovalError::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_rejects_accelerated_tract() {
        let err = ExecutionProviderManager::parse_provider_string("tract:cuda").unwrap_err();
        assert!(matches!(err, RemovalError::InvalidConfig(_)));
    }
}
