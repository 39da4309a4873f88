//! Shared utilities

pub mod providers;

pub use providers::{ExecutionProviderManager, ProviderInfo};
