//! Image I/O and output encoding
//!
//! Separates file handling and codec dispatch from the pipeline so the
//! processor only ever deals with pixel buffers.

use crate::{
    config::OutputFormat,
    error::{RemovalError, Result},
    tensor::PixelTensor,
    types::RemovalResult,
};
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;

/// Service for image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Tries extension-based decoding first and falls back to content-based
    /// format detection for files with missing or lying extensions.
    ///
    /// # Errors
    /// - `Io` when the file does not exist or cannot be read
    /// - `Decode` when the contents cannot be interpreted as an image
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(RemovalError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {e}. Attempting content-based detection.",
                    path_ref.display()
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    RemovalError::file_io_error("read image data", path_ref, &io_err)
                })?;

                image::load_from_memory(&data)
                    .map_err(|content_err| RemovalError::decode_error(path_ref, &content_err))
            },
        }
    }

    /// Write encoded bytes to disk, creating parent directories as needed
    ///
    /// # Errors
    /// - File I/O failures
    pub fn save_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RemovalError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }

        std::fs::write(path_ref, bytes)
            .map_err(|e| RemovalError::file_io_error("write output file", path_ref, &e))
    }

    /// Encode a removal result and write it to disk
    ///
    /// # Errors
    /// - Encoding failures and file I/O failures
    pub fn save_result<P: AsRef<Path>>(
        result: &RemovalResult,
        path: P,
        format: OutputFormat,
        quality: u8,
    ) -> Result<()> {
        let bytes = OutputFormatHandler::encode(&result.tensor, format, quality)?;
        Self::save_bytes(path, &bytes)
    }
}

/// Output-format dispatch for encoding pixel buffers
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode a pixel buffer into the given format
    ///
    /// `quality` applies to JPEG only; PNG and TIFF are lossless and WebP is
    /// encoded losslessly by the image crate.
    ///
    /// # Errors
    /// - Codec failures from the image crate
    pub fn encode(tensor: &PixelTensor, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Png => Self::encode_with(tensor, image::ImageFormat::Png, "PNG"),
            OutputFormat::Jpeg => {
                // JPEG carries no alpha; flatten to RGB
                let rgb = DynamicImage::ImageRgba8(tensor.to_image()?).to_rgb8();
                let mut buffer = Vec::new();
                let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                    &mut Cursor::new(&mut buffer),
                    quality,
                );
                encoder
                    .encode_image(&rgb)
                    .map_err(|e| RemovalError::internal(format!("JPEG encoding failed: {e}")))?;
                Ok(buffer)
            },
            OutputFormat::WebP => Self::encode_with(tensor, image::ImageFormat::WebP, "WebP"),
            OutputFormat::Tiff => Self::encode_with(tensor, image::ImageFormat::Tiff, "TIFF"),
            OutputFormat::Rgba8 => Ok(tensor.data().to_vec()),
        }
    }

    fn encode_with(
        tensor: &PixelTensor,
        format: image::ImageFormat,
        label: &str,
    ) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(tensor.to_image()?)
            .write_to(&mut Cursor::new(&mut buffer), format)
            .map_err(|e| RemovalError::internal(format!("{label} encoding failed: {e}")))?;
        Ok(buffer)
    }

    /// File extension conventionally used for a format
    #[must_use]
    pub fn extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Rgba8 => "rgba8",
        }
    }

    /// Map a file extension to an output format
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<OutputFormat> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "webp" => Some(OutputFormat::WebP),
            "tif" | "tiff" => Some(OutputFormat::Tiff),
            "rgba8" => Some(OutputFormat::Rgba8),
            _ => None,
        }
    }
}
