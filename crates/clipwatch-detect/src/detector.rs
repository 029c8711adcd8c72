//! Activity detector with check cadence and region cropping.

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{debug, warn};

use clipwatch_capture::Frame;
use clipwatch_types::RegionOfInterest;

use crate::classifier::Classifier;
use crate::diff::BackgroundDiff;

enum Strategy {
    FrameDiff(BackgroundDiff),
    Classifier {
        classifier: Box<dyn Classifier>,
        confidence_threshold: f32,
        target_classes: Vec<String>,
    },
}

/// Yields a boolean activity signal for the stream of captured frames.
///
/// Only every Nth call performs real work; all intervening calls return
/// `false` immediately. On an evaluation call the frame is cropped to the
/// resolved region of interest and handed to the configured strategy.
pub struct MotionDetector {
    check_interval: u32,
    calls_since_check: u32,
    region: RegionOfInterest,
    strategy: Strategy,
}

impl MotionDetector {
    /// Detector using the background-difference check.
    pub fn frame_diff(check_interval: u32, region: RegionOfInterest, diff: BackgroundDiff) -> Self {
        Self {
            check_interval: check_interval.max(1),
            calls_since_check: 0,
            region,
            strategy: Strategy::FrameDiff(diff),
        }
    }

    /// Detector delegating to an external classifier.
    pub fn classifier(
        check_interval: u32,
        region: RegionOfInterest,
        classifier: Box<dyn Classifier>,
        confidence_threshold: f32,
        target_classes: Vec<String>,
    ) -> Self {
        Self {
            check_interval: check_interval.max(1),
            calls_since_check: 0,
            region,
            strategy: Strategy::Classifier {
                classifier,
                confidence_threshold,
                target_classes,
            },
        }
    }

    /// Whether this frame shows activity. Non-evaluation frames are `false`
    /// by construction.
    pub fn has_activity(&mut self, frame: &Frame) -> bool {
        self.calls_since_check += 1;
        if self.calls_since_check < self.check_interval {
            return false;
        }
        self.calls_since_check = 0;

        let region = match self.crop_region(frame) {
            Some(region) => region,
            None => return false,
        };

        match &mut self.strategy {
            Strategy::FrameDiff(diff) => diff.evaluate(&region),
            Strategy::Classifier {
                classifier,
                confidence_threshold,
                target_classes,
            } => {
                let (input_w, input_h) = classifier.input_dimensions();
                let input = imageops::resize(&region, input_w, input_h, FilterType::Triangle);
                match classifier.classify(&input) {
                    Ok(result) => {
                        debug!(
                            label = %result.label,
                            confidence = result.confidence,
                            "Region classified"
                        );
                        result.confidence > *confidence_threshold
                            && (target_classes.is_empty()
                                || target_classes.iter().any(|c| c == &result.label))
                    }
                    Err(e) => {
                        // Fail safe toward not recording.
                        warn!("Classifier failed, treating as no activity: {e}");
                        false
                    }
                }
            }
        }
    }

    fn crop_region(&self, frame: &Frame) -> Option<RgbImage> {
        let image = RgbImage::from_raw(frame.width, frame.height, frame.data.to_vec())?;
        if self.region.is_full_frame() {
            return Some(image);
        }
        let rect = self.region.resolve(frame.width, frame.height);
        Some(imageops::crop_imm(&image, rect.x, rect.y, rect.width, rect.height).to_image())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::classifier::Classification;
    use crate::DetectResult;

    use super::*;

    fn flat_frame(width: u32, height: u32, value: u8) -> Frame {
        let data = vec![value; Frame::rgb24_buffer_size(width, height)];
        Frame::new(Bytes::from(data), width, height, 0, 0)
    }

    /// Frame whose right half has the given value and left half is black.
    fn split_frame(width: u32, height: u32, right_value: u8) -> Frame {
        let mut data = vec![0u8; Frame::rgb24_buffer_size(width, height)];
        for y in 0..height {
            for x in (width / 2)..width {
                let offset = ((y * width + x) * 3) as usize;
                data[offset..offset + 3].fill(right_value);
            }
        }
        Frame::new(Bytes::from(data), width, height, 0, 0)
    }

    struct FixedClassifier {
        label: &'static str,
        confidence: f32,
        calls: usize,
    }

    impl Classifier for FixedClassifier {
        fn input_dimensions(&self) -> (u32, u32) {
            (8, 8)
        }

        fn classify(&mut self, _image: &RgbImage) -> DetectResult<Classification> {
            self.calls += 1;
            Ok(Classification {
                label: self.label.to_string(),
                confidence: self.confidence,
            })
        }
    }

    struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn input_dimensions(&self) -> (u32, u32) {
            (8, 8)
        }

        fn classify(&mut self, _image: &RgbImage) -> DetectResult<Classification> {
            Err(crate::DetectError::Classifier("model unavailable".into()))
        }
    }

    #[test]
    fn test_interval_five_first_evaluation_is_negative() {
        // Frames 1-4 are not evaluated; frame 5 evaluates but only seeds the
        // background, so nothing reports activity.
        let mut detector = MotionDetector::frame_diff(
            5,
            RegionOfInterest::default(),
            BackgroundDiff::with_params(0.1, 1.0, 0.7),
        );

        for _ in 0..5 {
            assert!(!detector.has_activity(&flat_frame(16, 16, 255)));
        }
    }

    #[test]
    fn test_cadence_amortizes_classifier_calls() {
        let mut detector = MotionDetector::classifier(
            5,
            RegionOfInterest::default(),
            Box::new(FixedClassifier {
                label: "bird",
                confidence: 0.9,
                calls: 0,
            }),
            0.5,
            vec![],
        );

        let mut positives = 0;
        for _ in 0..10 {
            if detector.has_activity(&flat_frame(16, 16, 128)) {
                positives += 1;
            }
        }
        // Two evaluation frames out of ten calls.
        assert_eq!(positives, 2);
    }

    #[test]
    fn test_classifier_confidence_and_allow_list_gate() {
        let make = |label: &'static str, confidence: f32, classes: Vec<String>| {
            MotionDetector::classifier(
                1,
                RegionOfInterest::default(),
                Box::new(FixedClassifier {
                    label,
                    confidence,
                    calls: 0,
                }),
                0.5,
                classes,
            )
        };
        let frame = flat_frame(16, 16, 128);

        assert!(make("bird", 0.9, vec![]).has_activity(&frame));
        assert!(make("bird", 0.9, vec!["bird".into()]).has_activity(&frame));
        assert!(!make("bird", 0.9, vec!["cat".into()]).has_activity(&frame));
        assert!(!make("bird", 0.3, vec!["bird".into()]).has_activity(&frame));
    }

    #[test]
    fn test_classifier_failure_reads_as_no_activity() {
        let mut detector = MotionDetector::classifier(
            1,
            RegionOfInterest::default(),
            Box::new(FailingClassifier),
            0.5,
            vec![],
        );
        assert!(!detector.has_activity(&flat_frame(16, 16, 128)));
    }

    #[test]
    fn test_region_crop_limits_what_the_check_sees() {
        let right_half = RegionOfInterest {
            top_left_x: 50.0,
            top_left_y: 0.0,
            bottom_right_x: 100.0,
            bottom_right_y: 100.0,
        };
        let mut detector = MotionDetector::frame_diff(
            1,
            right_half,
            BackgroundDiff::with_params(0.1, 1.0, 0.7),
        );

        // Seed with an all-black right half.
        assert!(!detector.has_activity(&split_frame(32, 16, 0)));

        // Change only the left half: outside the region, stays quiet.
        let mut left_bright = vec![0u8; Frame::rgb24_buffer_size(32, 16)];
        for y in 0..16u32 {
            for x in 0..16u32 {
                let offset = ((y * 32 + x) * 3) as usize;
                left_bright[offset..offset + 3].fill(255);
            }
        }
        let frame = Frame::new(Bytes::from(left_bright), 32, 16, 0, 0);
        assert!(!detector.has_activity(&frame));

        // Change the right half: inside the region, triggers.
        assert!(detector.has_activity(&split_frame(32, 16, 255)));
    }
}
