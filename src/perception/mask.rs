//! Per-pixel belief maps about where the bobber is.
//!
//! A [`ProbabilityMask`] comes out of the bobber model for every frame and is
//! dropped right after localization. A [`PriorMask`] is built once at startup
//! and biases every frame towards where the bobber usually lands.

use image::{
    GrayImage, ImageBuffer, Luma,
    imageops::{FilterType, resize},
};

use crate::{Error, utils::geometry::Dimensions};

pub type MaskBuffer = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Model output: per-pixel likelihood in `[0, 1]`
#[derive(Clone, Debug)]
pub struct ProbabilityMask(MaskBuffer);

/// Static spatial bias, same shape as the screen until resized
#[derive(Clone, Debug)]
pub struct PriorMask(MaskBuffer);

impl ProbabilityMask {
    /// Build a mask from row-major values
    #[cfg(test)]
    pub(crate) fn from_values(width: u32, height: u32, values: Vec<f32>) -> Result<Self, Error> {
        let len = values.len();
        MaskBuffer::from_raw(width, height, values)
            .map(|buffer| Self(clamp_unit(buffer)))
            .ok_or_else(|| Error::Model(format!("{len} values can't fill a {width}x{height} mask")))
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        Self(clamp_unit(MaskBuffer::from_fn(width, height, |x, y| {
            Luma([f(x, y)])
        })))
    }

    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        let (width, height) = self.0.dimensions();
        Dimensions { width, height }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, x: u32, y: u32) -> f32 {
        self.0.get_pixel(x, y)[0]
    }

    /// Element-wise product with the prior
    ///
    /// # Errors
    /// If both masks don't share the same resolution
    pub fn apply_prior(&mut self, prior: &PriorMask) -> Result<(), Error> {
        if self.dimensions() != prior.dimensions() {
            let (mask, prior) = (self.dimensions(), prior.dimensions());
            return Err(Error::Model(format!(
                "prior is {}x{} but mask is {}x{}",
                prior.width, prior.height, mask.width, mask.height
            )));
        }

        self.0
            .pixels_mut()
            .zip(prior.0.pixels())
            .for_each(|(p, q)| p[0] *= q[0]);

        Ok(())
    }

    /// Pixels strictly above `threshold` become 255, the rest 0
    #[must_use]
    pub fn binarize(&self, threshold: f32) -> GrayImage {
        GrayImage::from_fn(self.0.width(), self.0.height(), |x, y| {
            if self.0.get_pixel(x, y)[0] > threshold {
                Luma([u8::MAX])
            } else {
                Luma([0])
            }
        })
    }

    /// 8-bit rendering, useful for snapshots
    #[must_use]
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.0.width(), self.0.height(), |x, y| {
            // value is within [0, 1]
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Luma([(self.0.get_pixel(x, y)[0] * 255.).round() as u8])
        })
    }
}

impl PriorMask {
    /// Gaussian bump peaking slightly above the screen center.
    ///
    /// The grid spans `[-2, 2]` on both axes, the peak sits at row `-0.2`,
    /// column `0`, with a wider spread horizontally. Values are normalized to `[0, 1]`.
    #[must_use]
    pub fn gaussian(height: u32, width: u32) -> Self {
        let (row0, col0) = (-0.2_f64, 0.);
        let (sigma_row, sigma_col) = (1.0_f64, 1.2_f64);

        let raw = MaskBuffer::from_fn(width, height, |x, y| {
            let row = linspace(y, height);
            let col = linspace(x, width);
            let exponent = (row - row0).powi(2) / (2. * sigma_row.powi(2))
                + (col - col0).powi(2) / (2. * sigma_col.powi(2));

            #[allow(clippy::cast_possible_truncation)]
            Luma([(-exponent).exp() as f32])
        });

        let (min, max) = raw
            .pixels()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), p| {
                (min.min(p[0]), max.max(p[0]))
            });
        let span = max - min;

        Self(MaskBuffer::from_fn(width, height, |x, y| {
            let v = raw.get_pixel(x, y)[0];
            Luma([if span > 0. { (v - min) / span } else { 1. }])
        }))
    }

    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        let (width, height) = self.0.dimensions();
        Dimensions { width, height }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, x: u32, y: u32) -> f32 {
        self.0.get_pixel(x, y)[0]
    }

    /// Bring the prior to the resolution the model works at
    #[must_use]
    pub fn resized(&self, dims: &Dimensions) -> Self {
        if self.dimensions() == *dims {
            return self.clone();
        }

        Self(clamp_unit(resize(
            &self.0,
            dims.width.max(1),
            dims.height.max(1),
            FilterType::Triangle,
        )))
    }
}

/// `i`-th of `n` evenly spaced samples over `[-2, 2]`
fn linspace(i: u32, n: u32) -> f64 {
    if n < 2 {
        return -2.;
    }

    -2. + 4. * f64::from(i) / f64::from(n - 1)
}

fn clamp_unit(mut buffer: MaskBuffer) -> MaskBuffer {
    buffer.pixels_mut().for_each(|p| {
        p[0] = if p[0].is_nan() { 0. } else { p[0].clamp(0., 1.) };
    });
    buffer
}
