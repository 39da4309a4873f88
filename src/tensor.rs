//! RGBA pixel buffer and its tensor conversions
//!
//! `PixelTensor` is the working representation of an image inside the
//! pipeline: a flat `width * height * 4` byte buffer in row-major,
//! interleaved R,G,B,A order. Resizes always allocate a fresh buffer; the
//! only in-place mutation is the alpha-channel write performed by the
//! compositing step.

use crate::{
    config::{OutputTarget, ResizeFilter},
    error::{RemovalError, Result},
    types::AlphaMatte,
};
use image::{DynamicImage, RgbaImage};
use ndarray::Array4;

/// Number of channels per pixel (R, G, B, A)
pub const CHANNELS: usize = 4;

/// A decoded image as a `width x height x 4` (RGBA) byte buffer
///
/// Invariant: `data.len() == width * height * 4` at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelTensor {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelTensor {
    /// Wrap a decoded image, expanding it to RGBA
    ///
    /// # Errors
    /// - `InvalidDimensions` when the image has zero width or height
    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::check_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            data: rgba.into_raw(),
        })
    }

    /// Decode raw encoded image bytes (PNG, JPEG, ...) into a pixel buffer
    ///
    /// # Errors
    /// - `Decode` when the bytes cannot be interpreted as an image
    /// - `InvalidDimensions` when the decoded image has zero area
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?;
        Self::from_image(&image)
    }

    /// Wrap an existing RGBA buffer
    ///
    /// # Errors
    /// - `InvalidDimensions` when `width` or `height` is zero
    /// - `Internal` when the buffer length does not match `width * height * 4`
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::check_dimensions(width, height)?;
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(RemovalError::internal(format!(
                "RGBA buffer length {} does not match {}x{}x4 = {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    fn check_dimensions(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(RemovalError::invalid_dimensions(format!(
                "zero-area image ({width}x{height})"
            )));
        }
        Ok(())
    }

    /// Buffer dimensions as `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Buffer width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Buffer height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels in the buffer
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Raw interleaved RGBA bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Produce a resampled copy at the target dimensions
    ///
    /// Pure with respect to the receiver. When the target equals the current
    /// dimensions the buffer is copied without resampling.
    ///
    /// # Errors
    /// - `InvalidDimensions` when either target dimension is zero
    pub fn resize(&self, target_width: u32, target_height: u32, filter: ResizeFilter) -> Result<Self> {
        Self::check_dimensions(target_width, target_height)?;

        if (target_width, target_height) == (self.width, self.height) {
            return Ok(self.clone());
        }

        let source: RgbaImage = self.to_image()?;
        let resized = image::imageops::resize(
            &source,
            target_width,
            target_height,
            filter.to_filter_type(),
        );

        Ok(Self {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
        })
    }

    /// Convert to the model's input layout: `(1, 3, height, width)` planar
    /// RGB floats, normalized from `[0, 255]` to `[0, 1]` as `value / 255.0`.
    /// The alpha channel is dropped.
    #[must_use]
    #[allow(clippy::indexing_slicing)] // tensor pre-allocated to buffer dimensions
    pub fn to_model_tensor(&self) -> Array4<f32> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut tensor = Array4::<f32>::zeros((1, 3, h, w));

        for y in 0..h {
            for x in 0..w {
                let base = (y * w + x) * CHANNELS;
                tensor[[0, 0, y, x]] = f32::from(self.data[base]) / 255.0;
                tensor[[0, 1, y, x]] = f32::from(self.data[base + 1]) / 255.0;
                tensor[[0, 2, y, x]] = f32::from(self.data[base + 2]) / 255.0;
            }
        }

        tensor
    }

    /// Set the alpha byte of pixel `index` in place
    ///
    /// Indices past the end of the buffer are ignored.
    #[inline]
    pub fn write_alpha(&mut self, index: usize, value: u8) {
        if let Some(slot) = self.data.get_mut(index * CHANNELS + 3) {
            *slot = value;
        }
    }

    /// Write a probability matte into the alpha channel in place
    ///
    /// For `Background` the probability is inverted; `Mask` writes the same
    /// bytes as `Foreground` (the alpha channel carries the mask). RGB
    /// channels are never touched. Matte entries past the end of the buffer
    /// are dropped, which is reachable only when the working resolution was
    /// keyed off the width of a non-square buffer.
    pub fn apply_matte(&mut self, matte: &AlphaMatte, output: OutputTarget) {
        for (index, &probability) in matte.data().iter().enumerate() {
            let alpha = probability.clamp(0.0, 1.0);
            let alpha = match output {
                OutputTarget::Background => 1.0 - alpha,
                OutputTarget::Foreground | OutputTarget::Mask => alpha,
            };
            self.write_alpha(index, (alpha * 255.0) as u8);
        }
    }

    /// View the buffer as an `RgbaImage` (copies the data)
    ///
    /// # Errors
    /// - `Internal` when the buffer no longer matches its dimensions
    pub fn to_image(&self) -> Result<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            RemovalError::internal("pixel buffer length does not match dimensions")
        })
    }

    /// Consume the buffer into an `RgbaImage`
    ///
    /// # Errors
    /// - `Internal` when the buffer no longer matches its dimensions
    pub fn into_image(self) -> Result<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data).ok_or_else(|| {
            RemovalError::internal("pixel buffer length does not match dimensions")
        })
    }

    /// Extract the alpha channel as a flat byte sequence
    #[must_use]
    pub fn alpha_channel(&self) -> Vec<u8> {
        self.data
            .chunks_exact(CHANNELS)
            .map(|pixel| pixel.get(3).copied().unwrap_or(0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid_tensor(width: u32, height: u32, rgba: [u8; 4]) -> PixelTensor {
        let image = RgbaImage::from_pixel(width, height, Rgba(rgba));
        PixelTensor::from_image(&DynamicImage::ImageRgba8(image)).unwrap()
    }

    #[test]
    fn test_buffer_invariant() {
        let tensor = solid_tensor(7, 5, [10, 20, 30, 255]);
        assert_eq!(tensor.dimensions(), (7, 5));
        assert_eq!(tensor.data().len(), 7 * 5 * 4);
    }

    #[test]
    fn test_zero_area_rejected() {
        let image = DynamicImage::new_rgba8(0, 4);
        assert!(matches!(
            PixelTensor::from_image(&image),
            Err(RemovalError::InvalidDimensions(_))
        ));

        let image = DynamicImage::new_rgba8(4, 0);
        assert!(matches!(
            PixelTensor::from_image(&image),
            Err(RemovalError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_from_rgba_length_check() {
        assert!(PixelTensor::from_rgba(2, 2, vec![0; 16]).is_ok());
        assert!(PixelTensor::from_rgba(2, 2, vec![0; 15]).is_err());
        assert!(PixelTensor::from_rgba(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(matches!(
            PixelTensor::from_bytes(b"not an image"),
            Err(RemovalError::Decode(_))
        ));
    }

    #[test]
    fn test_resize_is_pure_and_preserves_invariant() {
        let original = solid_tensor(8, 8, [200, 100, 50, 255]);
        let resized = original.resize(4, 6, ResizeFilter::Bilinear).unwrap();

        assert_eq!(original.dimensions(), (8, 8));
        assert_eq!(resized.dimensions(), (4, 6));
        assert_eq!(resized.data().len(), 4 * 6 * 4);
    }

    #[test]
    fn test_resize_noop_fast_path_copies_without_resampling() {
        let original = solid_tensor(8, 8, [1, 2, 3, 4]);
        let copy = original.resize(8, 8, ResizeFilter::Bilinear).unwrap();
        assert_eq!(copy.data(), original.data());
    }

    #[test]
    fn test_resize_round_trip_preserves_dimensions() {
        let original = solid_tensor(13, 9, [0, 0, 0, 255]);
        for (w, h) in [(1, 1), (4, 4), (32, 7), (13, 9)] {
            let there = original.resize(w, h, ResizeFilter::Bilinear).unwrap();
            let back = there.resize(13, 9, ResizeFilter::Bilinear).unwrap();
            assert_eq!(back.dimensions(), (13, 9));
        }
    }

    #[test]
    fn test_resize_zero_target_rejected() {
        let tensor = solid_tensor(4, 4, [0, 0, 0, 0]);
        assert!(matches!(
            tensor.resize(0, 4, ResizeFilter::Nearest),
            Err(RemovalError::InvalidDimensions(_))
        ));
        assert!(matches!(
            tensor.resize(4, 0, ResizeFilter::Nearest),
            Err(RemovalError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_to_model_tensor_layout_and_scale() {
        let tensor = solid_tensor(2, 2, [255, 128, 0, 7]);
        let model = tensor.to_model_tensor();

        assert_eq!(model.shape(), &[1, 3, 2, 2]);
        assert!((model[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((model[[0, 1, 0, 0]] - 128.0 / 255.0).abs() < 1e-6);
        assert!((model[[0, 2, 0, 0]]).abs() < 1e-6);
        // Alpha is dropped entirely; channel count stays 3.
    }

    #[test]
    fn test_write_alpha_in_place() {
        let mut tensor = solid_tensor(2, 1, [9, 9, 9, 0]);
        tensor.write_alpha(1, 200);
        assert_eq!(tensor.data()[7], 200);
        assert_eq!(tensor.data()[3], 0);

        // Out-of-range writes are dropped.
        tensor.write_alpha(99, 123);
        assert_eq!(tensor.data().len(), 8);
    }

    #[test]
    fn test_apply_matte_modes() {
        let matte = AlphaMatte::new(vec![1.0, 0.0, 0.25, 1.0], 2).unwrap();

        let mut fg = solid_tensor(2, 2, [5, 5, 5, 9]);
        fg.apply_matte(&matte, OutputTarget::Foreground);
        assert_eq!(fg.alpha_channel(), vec![255, 0, 63, 255]);

        let mut mask = solid_tensor(2, 2, [5, 5, 5, 9]);
        mask.apply_matte(&matte, OutputTarget::Mask);
        assert_eq!(mask.alpha_channel(), vec![255, 0, 63, 255]);
        // RGB untouched in mask mode
        assert_eq!(&mask.data()[0..3], &[5, 5, 5]);

        let mut bg = solid_tensor(2, 2, [5, 5, 5, 9]);
        bg.apply_matte(&matte, OutputTarget::Background);
        assert_eq!(bg.alpha_channel(), vec![0, 255, 191, 0]);
    }

    #[test]
    fn test_apply_matte_clamps_out_of_range_probabilities() {
        let matte = AlphaMatte::new(vec![1.5, -0.5, 0.5, 0.0], 2).unwrap();
        let mut tensor = solid_tensor(2, 2, [0, 0, 0, 0]);
        tensor.apply_matte(&matte, OutputTarget::Foreground);
        assert_eq!(tensor.alpha_channel(), vec![255, 0, 127, 0]);
    }

    #[test]
    fn test_alpha_channel_extraction() {
        let mut tensor = solid_tensor(3, 1, [1, 2, 3, 40]);
        tensor.write_alpha(2, 90);
        assert_eq!(tensor.alpha_channel(), vec![40, 40, 90]);
    }
}
