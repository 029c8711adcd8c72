//! External classifier interface.

use image::RgbImage;

use crate::DetectResult;

/// Top-scoring class for an image region.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Class label.
    pub label: String,

    /// Confidence in [0, 1].
    pub confidence: f32,
}

/// Black-box object classifier scoring a cropped frame region.
///
/// Implementations live outside the core; the detector only resizes the
/// region to [`Classifier::input_dimensions`] and thresholds the result.
pub trait Classifier: Send {
    /// Input size (width, height) expected by the model.
    fn input_dimensions(&self) -> (u32, u32);

    /// Score the image and return the top class.
    fn classify(&mut self, image: &RgbImage) -> DetectResult<Classification>;
}
