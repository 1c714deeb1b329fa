//! Re-encoding of processed frame sequences.
//!
//! All codecs encode into memory first and hit the filesystem in a single
//! write, so a rejected encode leaves no partial output behind.

use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Frame, ImageFormat, RgbaImage};
use log::debug;

use crate::error::{RescaleError, Result};

/// Output codecs the shim can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    WebP,
    Jpeg,
    Png,
    Gif,
}

impl OutputFormat {
    /// Conventional uppercase codec name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebP => "WEBP",
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
        }
    }

    /// Whether the codec can hold more than one frame.
    #[must_use]
    pub const fn supports_animation(self) -> bool {
        matches!(self, Self::WebP | Self::Gif)
    }
}

impl FromStr for OutputFormat {
    type Err = RescaleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "WEBP" => Ok(Self::WebP),
            "JPEG" | "JPG" => Ok(Self::Jpeg),
            "PNG" => Ok(Self::Png),
            "GIF" => Ok(Self::Gif),
            other => Err(RescaleError::Transform(format!(
                "unsupported output format: {other}"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode `frames` at the given quality and write them to `path` as a single
/// file. Still-only codecs keep the first frame of a multi-frame sequence.
pub fn write_frames(
    path: &Path,
    frames: Vec<Frame>,
    format: OutputFormat,
    quality: u8,
) -> Result<()> {
    let frames = if format.supports_animation() {
        frames
    } else {
        single_frame(frames)?
    };

    let bytes = match format {
        OutputFormat::WebP => encode_webp(frames, quality)?,
        OutputFormat::Gif => encode_gif(frames)?,
        OutputFormat::Jpeg => encode_jpeg(frames, quality)?,
        OutputFormat::Png => encode_png(frames)?,
    };

    fs::write(path, bytes)?;
    Ok(())
}

fn single_frame(mut frames: Vec<Frame>) -> Result<Vec<Frame>> {
    if frames.is_empty() {
        return Err(RescaleError::Encode("no frames to encode".to_string()));
    }
    if frames.len() > 1 {
        debug!(
            "Output codec is single-frame, keeping first of {} frames",
            frames.len()
        );
        frames.truncate(1);
    }
    Ok(frames)
}

fn first_buffer(frames: Vec<Frame>) -> Result<RgbaImage> {
    frames
        .into_iter()
        .next()
        .map(Frame::into_buffer)
        .ok_or_else(|| RescaleError::Encode("no frames to encode".to_string()))
}

fn encode_webp(frames: Vec<Frame>, quality: u8) -> Result<Vec<u8>> {
    if frames.len() <= 1 {
        let buffer = first_buffer(frames)?;
        let (width, height) = buffer.dimensions();
        let encoder = webp::Encoder::from_rgba(buffer.as_raw(), width, height);
        return Ok(encoder.encode(f32::from(quality)).to_vec());
    }

    let mut config = webp::WebPConfig::new()
        .map_err(|()| RescaleError::Encode("WebP encoder configuration rejected".to_string()))?;
    config.quality = f32::from(quality);

    // The pipeline resizes every frame to the same geometry, so the first
    // frame fixes the canvas.
    let (width, height) = match frames.first() {
        Some(frame) => frame.buffer().dimensions(),
        None => return Err(RescaleError::Encode("no frames to encode".to_string())),
    };

    let mut timestamp_ms: i32 = 0;
    let mut buffers = Vec::with_capacity(frames.len());
    for frame in frames {
        let (numer, denom) = frame.delay().numer_denom_ms();
        let delay_ms = if denom == 0 { 0 } else { numer / denom };
        buffers.push((frame.into_buffer(), timestamp_ms));
        timestamp_ms = timestamp_ms.saturating_add(delay_ms as i32);
    }

    let mut encoder = webp::AnimEncoder::new(width, height, &config);
    for (buffer, timestamp) in &buffers {
        encoder.add_frame(webp::AnimFrame::from_rgba(
            buffer.as_raw(),
            width,
            height,
            *timestamp,
        ));
    }
    Ok(encoder.encode().to_vec())
}

fn encode_gif(frames: Vec<Frame>) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(frames)?;
    }
    Ok(bytes)
}

fn encode_jpeg(frames: Vec<Frame>, quality: u8) -> Result<Vec<u8>> {
    // JPEG carries no alpha channel.
    let rgb = DynamicImage::ImageRgba8(first_buffer(frames)?).into_rgb8();
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut bytes), quality);
    rgb.write_with_encoder(encoder)?;
    Ok(bytes)
}

fn encode_png(frames: Vec<Frame>) -> Result<Vec<u8>> {
    let image = DynamicImage::ImageRgba8(first_buffer(frames)?);
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}
