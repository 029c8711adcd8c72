//! Statistical background-difference check.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use tracing::trace;

/// Pixel delta above which a pixel counts as changed.
const PIXEL_DELTA_THRESHOLD: u8 = 45;

/// Default shrink ratio applied before differencing.
const DEFAULT_SHRINK_RATIO: f64 = 1.0 / 20.0;

/// Default background fade rate.
const DEFAULT_FADE_RATE: f64 = 0.7;

/// Exponentially-decayed background image compared against each evaluated
/// region.
///
/// The region is grayscaled and shrunk before differencing; activity is
/// declared when the changed-pixel count exceeds a fraction of the region
/// area. The first evaluation only seeds the background.
pub struct BackgroundDiff {
    shrink_ratio: f64,
    fade_rate: f64,
    motion_fraction: f64,
    background: Option<GrayImage>,
}

impl BackgroundDiff {
    /// Create a check with the default shrink ratio and fade rate.
    pub fn new(motion_fraction: f64) -> Self {
        Self::with_params(motion_fraction, DEFAULT_SHRINK_RATIO, DEFAULT_FADE_RATE)
    }

    /// Create a check with explicit parameters.
    pub fn with_params(motion_fraction: f64, shrink_ratio: f64, fade_rate: f64) -> Self {
        Self {
            shrink_ratio,
            fade_rate,
            motion_fraction,
            background: None,
        }
    }

    /// Compare the region against the background, updating the background
    /// in the process.
    pub fn evaluate(&mut self, region: &RgbImage) -> bool {
        let gray = self.gray_and_shrink(region);

        let background = match self.background.take() {
            Some(bg) if bg.dimensions() == gray.dimensions() => bg,
            _ => {
                // No usable background yet; seed and report no activity.
                self.background = Some(gray);
                return false;
            }
        };

        let changed = background
            .pixels()
            .zip(gray.pixels())
            .filter(|(bg, px)| bg.0[0].abs_diff(px.0[0]) > PIXEL_DELTA_THRESHOLD)
            .count();

        self.background = Some(self.faded_background(&background, &gray));

        let area = (gray.width() * gray.height()) as f64;
        let threshold = self.motion_fraction * area;
        trace!(changed, threshold, "Background difference evaluated");

        changed as f64 > threshold
    }

    fn gray_and_shrink(&self, region: &RgbImage) -> GrayImage {
        let gray = imageops::grayscale(region);
        let width = ((gray.width() as f64 * self.shrink_ratio) as u32).max(1);
        let height = ((gray.height() as f64 * self.shrink_ratio) as u32).max(1);
        imageops::resize(&gray, width, height, FilterType::Triangle)
    }

    fn faded_background(&self, background: &GrayImage, current: &GrayImage) -> GrayImage {
        let keep = self.fade_rate / (1.0 + self.fade_rate);
        let blend = 1.0 / (1.0 + self.fade_rate);
        let mut next = background.clone();
        for (out, px) in next.pixels_mut().zip(current.pixels()) {
            out.0[0] = (out.0[0] as f64 * keep + px.0[0] as f64 * blend) as u8;
        }
        next
    }
}
