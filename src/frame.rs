//! Owned pixel buffers passed from frame sources to sessions.

use image::DynamicImage;
use ndarray::{Array2, Array3, Axis};

use crate::error::FrameError;

/// Row-major pixel storage with shape `(height, width, channels)`.
///
/// Color frames carry RGB channels in that order; single-channel frames are
/// grayscale.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: Array3<u8>,
}

impl Frame {
    pub fn new(pixels: Array3<u8>) -> Self {
        Self { pixels }
    }

    /// Wrap a raw interleaved buffer.
    ///
    /// # Errors
    /// [`FrameError::Shape`] if `data.len() != width * height * channels`.
    pub fn from_raw(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        let len = data.len();
        let pixels = Array3::from_shape_vec((height, width, channels), data).map_err(|_| {
            FrameError::Shape {
                width,
                height,
                channels,
                len,
            }
        })?;
        Ok(Self { pixels })
    }

    /// An all-black frame.
    pub fn blank(width: usize, height: usize, channels: usize) -> Self {
        Self {
            pixels: Array3::zeros((height, width, channels)),
        }
    }

    /// Convert a decoded image to an RGB frame.
    pub fn from_image(image: &DynamicImage) -> Result<Self, FrameError> {
        let rgb = image.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        Self::from_raw(width, height, 3, rgb.into_raw())
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut Array3<u8> {
        &mut self.pixels
    }

    /// Luma plane (ITU-R BT.601 weights) as `f32`, shape `(height, width)`.
    pub fn luma(&self) -> Array2<f32> {
        if self.channels() < 3 {
            return self.pixels.index_axis(Axis(2), 0).mapv(f32::from);
        }
        let r = self.pixels.index_axis(Axis(2), 0);
        let g = self.pixels.index_axis(Axis(2), 1);
        let b = self.pixels.index_axis(Axis(2), 2);
        let mut luma = Array2::<f32>::zeros((self.height(), self.width()));
        ndarray::Zip::from(&mut luma)
            .and(&r)
            .and(&g)
            .and(&b)
            .for_each(|l, &r, &g, &b| {
                *l = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
            });
        luma
    }
}
