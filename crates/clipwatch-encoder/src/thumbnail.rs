//! Clip thumbnail rendering.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use clipwatch_capture::Frame;

use crate::error::EncoderError;
use crate::EncoderResult;

/// Render a frame as a JPEG thumbnail.
pub fn render_jpeg_thumbnail(frame: &Frame, quality: u8) -> EncoderResult<Vec<u8>> {
    let image = RgbImage::from_raw(frame.width, frame.height, frame.data.to_vec())
        .ok_or_else(|| {
            EncoderError::Thumbnail(format!(
                "frame data does not match {}x{} RGB24",
                frame.width, frame.height
            ))
        })?;

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&image)
        .map_err(|e| EncoderError::Thumbnail(e.to_string()))?;

    Ok(out)
}
