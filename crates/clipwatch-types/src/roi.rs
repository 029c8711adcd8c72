//! Region-of-interest geometry.

use serde::{Deserialize, Serialize};

/// The sub-rectangle of the frame examined for activity, expressed in
/// percentage coordinates (0-100 on each axis) of the full frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegionOfInterest {
    /// X coordinate of the top-left corner, percent.
    pub top_left_x: f64,

    /// Y coordinate of the top-left corner, percent.
    pub top_left_y: f64,

    /// X coordinate of the bottom-right corner, percent.
    pub bottom_right_x: f64,

    /// Y coordinate of the bottom-right corner, percent.
    pub bottom_right_y: f64,
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self {
            top_left_x: 0.0,
            top_left_y: 0.0,
            bottom_right_x: 100.0,
            bottom_right_y: 100.0,
        }
    }
}

/// A region resolved against a concrete frame resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    /// Left edge in pixels.
    pub x: u32,

    /// Top edge in pixels.
    pub y: u32,

    /// Width in pixels, always >= 1.
    pub width: u32,

    /// Height in pixels, always >= 1.
    pub height: u32,
}

impl RegionOfInterest {
    /// Whether the region spans the entire frame.
    pub fn is_full_frame(&self) -> bool {
        self.top_left_x <= 0.0
            && self.top_left_y <= 0.0
            && self.bottom_right_x >= 100.0
            && self.bottom_right_y >= 100.0
    }

    /// Resolve the percentage rectangle to pixel coordinates for the given
    /// frame size. Degenerate rectangles are expanded to at least one pixel
    /// on the affected axis.
    pub fn resolve(&self, frame_width: u32, frame_height: u32) -> PixelRect {
        let pct = |v: f64| v.clamp(0.0, 100.0) / 100.0;

        let x0 = (pct(self.top_left_x) * frame_width as f64) as u32;
        let y0 = (pct(self.top_left_y) * frame_height as f64) as u32;
        let x1 = (pct(self.bottom_right_x) * frame_width as f64) as u32;
        let y1 = (pct(self.bottom_right_y) * frame_height as f64) as u32;

        let x0 = x0.min(frame_width.saturating_sub(1));
        let y0 = y0.min(frame_height.saturating_sub(1));

        let mut width = x1.saturating_sub(x0);
        let mut height = y1.saturating_sub(y0);

        // Expand degenerate axes so downstream crops never see a zero-sized
        // rectangle.
        if width == 0 {
            width = 1;
        }
        if height == 0 {
            height = 1;
        }

        let width = width.min(frame_width - x0);
        let height = height.min(frame_height - y0);

        PixelRect {
            x: x0,
            y: y0,
            width: width.max(1),
            height: height.max(1),
        }
    }
}
