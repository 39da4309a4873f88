//! Background removal CLI
//!
//! Command-line interface over the library pipeline: single files, batch
//! directories, model cache management, and provider diagnostics.

use crate::{
    cache::{format_size, ModelCache},
    config::{OutputFormat, OutputTarget, RemovalConfig, ResizeFilter},
    download::ModelDownloader,
    models::{ensure_model_available, ModelSource, ModelSpec, DEFAULT_MODEL_URL},
    processor::BackgroundRemovalProcessor,
    services::{ImageIOService, OutputFormatHandler},
    utils::ExecutionProviderManager,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Image file extensions the batch collector picks up
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff"];

/// Background removal CLI tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "unbg")]
pub struct Cli {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required_unless_present_any = &["show_providers", "only_download", "list_models", "clear_cache", "show_cache_dir"])]
    pub input: Vec<PathBuf>,

    /// Output file (single input) or directory (batch processing)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// What the written alpha channel represents
    #[arg(long, value_enum, default_value_t = CliOutputTarget::Foreground)]
    pub mode: CliOutputTarget,

    /// Square working resolution [default: input image width]
    #[arg(short = 'R', long)]
    pub resolution: Option<u32>,

    /// Resampling filter for working-resolution resizes
    #[arg(long, value_enum, default_value_t = CliResizeFilter::Bilinear)]
    pub filter: CliResizeFilter,

    /// Execution provider in format backend:provider (e.g., onnx:auto, tract:cpu)
    #[arg(short, long, default_value = "onnx:auto")]
    pub execution_provider: String,

    /// Model file path, cached model id, or HuggingFace URL [default: cached u2netp]
    #[arg(short, long)]
    pub model: Option<String>,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = 90)]
    pub jpeg_quality: u8,

    /// WebP quality (0-100)
    #[arg(long, default_value_t = 85)]
    pub webp_quality: u8,

    /// Number of threads (0 = auto-detect optimal threading)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Pattern for batch processing (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Download the model but don't process any images [default: u2netp]
    #[arg(long)]
    pub only_download: bool,

    /// List cached models available for processing and exit
    #[arg(long)]
    pub list_models: bool,

    /// Clear cached models (combine with --model to clear a specific model)
    #[arg(long)]
    pub clear_cache: bool,

    /// Show current cache directory
    #[arg(long)]
    pub show_cache_dir: bool,
}

/// CLI-facing output format
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
    Tiff,
    Rgba8,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpeg => OutputFormat::Jpeg,
            CliOutputFormat::Webp => OutputFormat::WebP,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
            CliOutputFormat::Rgba8 => OutputFormat::Rgba8,
        }
    }
}

/// CLI-facing output mode
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliOutputTarget {
    Foreground,
    Mask,
    Background,
}

impl From<CliOutputTarget> for OutputTarget {
    fn from(target: CliOutputTarget) -> Self {
        match target {
            CliOutputTarget::Foreground => OutputTarget::Foreground,
            CliOutputTarget::Mask => OutputTarget::Mask,
            CliOutputTarget::Background => OutputTarget::Background,
        }
    }
}

/// CLI-facing resize filter
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliResizeFilter {
    Nearest,
    Bilinear,
}

impl From<CliResizeFilter> for ResizeFilter {
    fn from(filter: CliResizeFilter) -> Self {
        match filter {
            CliResizeFilter::Nearest => ResizeFilter::Nearest,
            CliResizeFilter::Bilinear => ResizeFilter::Bilinear,
        }
    }
}

/// CLI entry point
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.show_cache_dir {
        println!("{}", ModelCache::default_cache_dir()?.display());
        return Ok(());
    }

    if cli.list_models {
        return list_models();
    }

    if cli.clear_cache {
        return clear_cache(cli.model.as_deref());
    }

    if cli.show_providers {
        show_providers();
        return Ok(());
    }

    if cli.only_download {
        let url = cli.model.as_deref().unwrap_or(DEFAULT_MODEL_URL);
        let downloader = ModelDownloader::new()?;
        let model_id = downloader.download_model(url, true).await?;
        println!("Downloaded model: {model_id}");
        return Ok(());
    }

    process_inputs(cli).await
}

/// Initialize tracing output keyed off the -v count
fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("unbg={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn list_models() -> Result<()> {
    let cache = ModelCache::new()?;
    let models = cache.scan_cached_models()?;

    if models.is_empty() {
        println!("No cached models. Run with --only-download to fetch the default model.");
        return Ok(());
    }

    println!("Cached models in {}:", cache.cache_dir().display());
    for model in models {
        let source = model
            .metadata
            .as_ref()
            .map(|m| format!(" ({})", m.url))
            .unwrap_or_default();
        println!(
            "  {}  {}{}",
            model.model_id,
            format_size(model.size_bytes),
            source
        );
    }
    Ok(())
}

fn clear_cache(model: Option<&str>) -> Result<()> {
    let cache = ModelCache::new()?;
    match model {
        Some(model_id) => {
            if cache.remove_model(model_id)? {
                println!("Removed cached model: {model_id}");
            } else {
                println!("Model not cached: {model_id}");
            }
        },
        None => {
            let removed = cache.clear()?;
            println!("Removed {} cached model(s)", removed.len());
        },
    }
    Ok(())
}

fn show_providers() {
    for (backend, providers) in ExecutionProviderManager::list_backend_providers() {
        println!("{backend}:");
        for provider in providers {
            let marker = if provider.available { "available" } else { "unavailable" };
            println!("  {:<8} {:<12} {}", provider.name, marker, provider.description);
        }
    }
}

/// Resolve the --model argument into a model spec, downloading URLs
async fn resolve_model_spec(model: Option<&str>) -> Result<ModelSpec> {
    let Some(model) = model else {
        return Ok(ModelSpec::default());
    };

    if model.starts_with("http://") || model.starts_with("https://") {
        let downloader = ModelDownloader::new()?;
        let model_id = downloader.download_model(model, true).await?;
        return Ok(ModelSpec {
            source: ModelSource::Downloaded(model_id),
        });
    }

    let path = Path::new(model);
    if path.exists() {
        return Ok(ModelSpec {
            source: ModelSource::External(path.to_path_buf()),
        });
    }

    Ok(ModelSpec {
        source: ModelSource::Downloaded(model.to_string()),
    })
}

/// Collect input files from file and directory arguments
fn collect_inputs(cli: &Cli) -> Result<Vec<PathBuf>> {
    let pattern = cli
        .pattern
        .as_deref()
        .map(glob::Pattern::new)
        .transpose()
        .context("invalid --pattern glob")?;

    let matches_pattern = |path: &Path| -> bool {
        match (&pattern, path.file_name().and_then(|n| n.to_str())) {
            (Some(pattern), Some(name)) => pattern.matches(name),
            (Some(_), None) => false,
            (None, _) => true,
        }
    };

    let is_image = |path: &Path| -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    };

    let mut files = Vec::new();
    for input in &cli.input {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            let max_depth = if cli.recursive { usize::MAX } else { 1 };
            for entry in walkdir::WalkDir::new(input)
                .max_depth(max_depth)
                .sort_by_file_name()
            {
                let entry = entry.context("failed to walk input directory")?;
                let path = entry.path();
                if path.is_file() && is_image(path) && matches_pattern(path) {
                    files.push(path.to_path_buf());
                }
            }
        } else {
            bail!("input does not exist: {}", input.display());
        }
    }

    if files.is_empty() {
        bail!("no input images found");
    }
    Ok(files)
}

/// Output path for a processed input
fn output_path_for(
    input: &Path,
    output: Option<&Path>,
    batch: bool,
    format: OutputFormat,
) -> PathBuf {
    let extension = OutputFormatHandler::extension(format);
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let default_name = format!("{stem}_cutout.{extension}");

    match output {
        Some(output) if batch || output.is_dir() => output.join(default_name),
        Some(output) => output.to_path_buf(),
        None => input.with_file_name(default_name),
    }
}

async fn process_inputs(cli: Cli) -> Result<()> {
    let (backend_type, execution_provider) =
        ExecutionProviderManager::parse_provider_string(&cli.execution_provider)?;

    let model_spec = resolve_model_spec(cli.model.as_deref()).await?;
    // Fetch the default asset up front so per-file processing stays local.
    let model_spec = ensure_model_available(&model_spec).await?;

    let output_format: OutputFormat = cli.format.into();
    let config = RemovalConfig::builder()
        .model_spec(model_spec)
        .backend_type(backend_type)
        .execution_provider(execution_provider)
        .output(cli.mode.into())
        .resolution(cli.resolution)
        .filter(cli.filter.into())
        .output_format(output_format)
        .jpeg_quality(cli.jpeg_quality)
        .webp_quality(cli.webp_quality)
        .num_threads(cli.threads)
        .debug(cli.verbose >= 2)
        .build()?;

    let files = collect_inputs(&cli)?;
    let batch = files.len() > 1;
    let quality = match output_format {
        OutputFormat::Jpeg => cli.jpeg_quality,
        OutputFormat::WebP => cli.webp_quality,
        _ => 100,
    };

    let processor = BackgroundRemovalProcessor::new(config)?;

    let progress = if batch {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let total_start = Instant::now();
    let mut failures = Vec::new();

    for file in &files {
        if let Some(pb) = &progress {
            pb.set_message(file.file_name().unwrap_or_default().to_string_lossy().into_owned());
        }

        match process_one(&processor, file, &cli, batch, output_format, quality) {
            Ok(output) => {
                debug!(input = %file.display(), output = %output.display(), "processed");
            },
            Err(e) => {
                tracing::error!(input = %file.display(), error = %e, "processing failed");
                failures.push((file.clone(), e));
            },
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    let elapsed = total_start.elapsed();
    let processed = files.len() - failures.len();
    info!(
        "Processed {processed}/{} image(s) in {:.2}s",
        files.len(),
        elapsed.as_secs_f64()
    );
    if batch {
        println!(
            "Processed {processed}/{} image(s) in {:.2}s",
            files.len(),
            elapsed.as_secs_f64()
        );
    }

    if let Some((file, error)) = failures.first() {
        bail!(
            "{} of {} input(s) failed; first failure: {}: {error}",
            failures.len(),
            files.len(),
            file.display()
        );
    }
    Ok(())
}

fn process_one(
    processor: &BackgroundRemovalProcessor,
    input: &Path,
    cli: &Cli,
    batch: bool,
    format: OutputFormat,
    quality: u8,
) -> Result<PathBuf> {
    let image = ImageIOService::load_image(input)?;
    let result = processor.process_image(&image)?;

    let output = output_path_for(input, cli.output.as_deref(), batch, format);
    result.save(&output, format, quality)?;

    if !batch {
        println!(
            "{} -> {} ({})",
            input.display(),
            output.display(),
            result.timings.summary()
        );
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_single_with_explicit_file() {
        let path = output_path_for(
            Path::new("photos/cat.jpg"),
            Some(Path::new("out.png")),
            false,
            OutputFormat::Png,
        );
        assert_eq!(path, PathBuf::from("out.png"));
    }

    #[test]
    fn test_output_path_default_sibling() {
        let path = output_path_for(Path::new("photos/cat.jpg"), None, false, OutputFormat::Png);
        assert_eq!(path, PathBuf::from("photos/cat_cutout.png"));
    }

    #[test]
    fn test_output_path_batch_into_directory() {
        let path = output_path_for(
            Path::new("photos/cat.jpg"),
            Some(Path::new("out")),
            true,
            OutputFormat::WebP,
        );
        assert_eq!(path, PathBuf::from("out/cat_cutout.webp"));
    }

    #[tokio::test]
    async fn test_resolve_model_spec_defaults() {
        let spec = resolve_model_spec(None).await.unwrap();
        assert_eq!(spec, ModelSpec::default());
    }

    #[tokio::test]
    async fn test_resolve_model_spec_id_passthrough() {
        let spec = resolve_model_spec(Some("someone--model--x")).await.unwrap();
        assert_eq!(
            spec.source,
            ModelSource::Downloaded("someone--model--x".to_string())
        );
    }
}
