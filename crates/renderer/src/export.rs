use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::clock::TimeSample;
use crate::gpu::{FramePixels, RenderEngine};
use crate::params::ParameterValues;

/// Bounds enforced on export duration at the host boundary.
pub const MIN_EXPORT_SECONDS: u32 = 2;
pub const MAX_EXPORT_SECONDS: u32 = 10;

/// One export job's parameters.
///
/// Callers validate duration and fps before constructing a request; the
/// capture loop itself assumes they are in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportRequest {
    pub duration_seconds: u32,
    pub fps: u32,
}

impl ExportRequest {
    pub fn new(duration_seconds: u32, fps: u32) -> Self {
        Self {
            duration_seconds,
            fps,
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.duration_seconds * self.fps
    }

    /// Logical timestamp of frame `index`, independent of wall-clock time.
    pub fn frame_time(&self, index: u32) -> f32 {
        index as f32 / self.fps as f32
    }
}

/// The ordered frame sequence handed to the encoding collaborator.
#[derive(Debug, Clone)]
pub struct CapturedFrames {
    /// Base64-encoded PNG stills, one per frame, in render order.
    pub frames: Vec<String>,
    pub fps: u32,
    pub duration_seconds: u32,
}

/// Deterministically re-renders the animation into encoded stills.
///
/// Frame `i` is always rendered at exactly `t = i / fps`: the loop advances
/// logical time by a fixed step instead of consulting the clock, so capture
/// duration has no influence on the output and the same shader and
/// parameters always reproduce the same sequence. `progress` is invoked
/// after each captured frame with `(rendered, total)`.
pub fn capture_frames(
    engine: &mut RenderEngine,
    request: ExportRequest,
    params: ParameterValues,
    mut progress: impl FnMut(u32, u32),
) -> Result<CapturedFrames> {
    let total = request.frame_count();
    let mut frames = Vec::with_capacity(total as usize);

    for index in 0..total {
        let sample = TimeSample::new(request.frame_time(index), u64::from(index));
        let pixels = engine
            .render_capture(sample, params)
            .with_context(|| format!("failed to capture frame {index} of {total}"))?;
        frames.push(encode_frame(&pixels)?);
        progress(index + 1, total);
    }

    Ok(CapturedFrames {
        frames,
        fps: request.fps,
        duration_seconds: request.duration_seconds,
    })
}

/// Encodes captured pixels as a base64 PNG still.
fn encode_frame(pixels: &FramePixels) -> Result<String> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(
            &pixels.rgba,
            pixels.width,
            pixels.height,
            ExtendedColorType::Rgba8,
        )
        .context("failed to encode captured frame as PNG")?;
    Ok(BASE64.encode(&png))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_seconds_at_ten_fps_is_twenty_frames() {
        let request = ExportRequest::new(2, 10);
        assert_eq!(request.frame_count(), 20);
    }

    #[test]
    fn frame_times_step_by_exactly_one_over_fps() {
        let request = ExportRequest::new(2, 10);
        for index in 0..request.frame_count() {
            let expected = index as f32 / 10.0;
            assert_eq!(request.frame_time(index), expected);
        }
    }

    #[test]
    fn encode_frame_produces_base64_png() {
        let pixels = FramePixels {
            rgba: vec![255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 0, 0, 0, 255],
            width: 2,
            height: 2,
        };
        let encoded = encode_frame(&pixels).expect("encoding should succeed");
        let decoded = BASE64.decode(encoded).expect("payload should be base64");
        // PNG signature.
        assert_eq!(&decoded[..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n']);
    }
}
