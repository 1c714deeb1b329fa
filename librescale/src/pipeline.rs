//! The linear rescale pipeline.
//!
//! One call, one pass: decode all frames, coalesce when needed, then per
//! frame auto-orient, clamp the target geometry, resize, and finally encode
//! the whole sequence in a single write. No stage is retried or re-entered.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, Frame};
use log::{debug, info};

use crate::encode::{self, OutputFormat};
use crate::error::{RescaleError, Result};
use crate::frames::{self, FrameSequence};
use crate::limits::ResourceLimits;

/// How the requested target geometry is clamped against frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClampMode {
    /// A clamp carries forward: once one frame shrinks the target, later
    /// frames are compared against the shrunk value. This matches the
    /// historical behavior of the shim.
    #[default]
    Cumulative,
    /// Each frame is clamped against its own geometry only.
    PerFrame,
}

/// When to coalesce the decoded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoalescePolicy {
    /// Coalesce only when the input has more than one frame.
    #[default]
    Auto,
    /// Coalesce unconditionally.
    Always,
}

/// Parameters for one pipeline invocation.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Encoder quality, 0-100.
    pub quality: u8,
    /// Output codec.
    pub format: OutputFormat,
    pub clamp: ClampMode,
    pub coalesce: CoalescePolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            quality: crate::DEFAULT_QUALITY,
            format: crate::DEFAULT_FORMAT,
            clamp: ClampMode::default(),
            coalesce: CoalescePolicy::default(),
        }
    }
}

/// Resize `input` to at most `width` x `height` and write it to `output`.
///
/// Neither dimension is ever upscaled: the requested geometry is clamped
/// against each frame per `options.clamp`. The decoded sequence is written
/// as one file; multi-frame sequences stay multi-frame when the output codec
/// supports it.
pub fn rescale_file(
    input: &Path,
    output: &Path,
    width: u32,
    height: u32,
    options: &PipelineOptions,
    limits: &ResourceLimits,
) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(RescaleError::Transform(format!(
            "target dimensions must be positive, got {width}x{height}"
        )));
    }
    if options.quality > 100 {
        return Err(RescaleError::Transform(format!(
            "quality must be in 0-100, got {}",
            options.quality
        )));
    }

    info!("Input: {}", input.display());
    debug!(
        "Target {}x{}, format {}, quality {}",
        width, height, options.format, options.quality
    );

    let FrameSequence {
        frames,
        orientation,
    } = frames::decode_sequence(input, limits)?;

    if frames.len() > 1 {
        info!("Multiple frames detected: {}", frames.len());
    }

    let frames = match options.coalesce {
        CoalescePolicy::Always => frames::coalesce(frames),
        CoalescePolicy::Auto if frames.len() > 1 => frames::coalesce(frames),
        CoalescePolicy::Auto => frames,
    };

    let requested = (width, height);
    let mut running = requested;
    let mut processed = Vec::with_capacity(frames.len());
    for frame in frames {
        let delay = frame.delay();
        let mut image = DynamicImage::ImageRgba8(frame.into_buffer());
        image.apply_orientation(orientation);

        let (target_width, target_height) = frame_target(
            options.clamp,
            requested,
            &mut running,
            (image.width(), image.height()),
        );

        let resized = image.resize_exact(target_width, target_height, FilterType::Lanczos3);
        processed.push(Frame::from_parts(resized.into_rgba8(), 0, 0, delay));
    }

    encode::write_frames(output, processed, options.format, options.quality)?;
    info!("Done. Saved to {}", output.display());
    Ok(())
}

/// Target geometry for one frame. In cumulative mode the clamp mutates the
/// running target, so a shrink on one frame is inherited by the next.
fn frame_target(
    mode: ClampMode,
    requested: (u32, u32),
    running: &mut (u32, u32),
    native: (u32, u32),
) -> (u32, u32) {
    match mode {
        ClampMode::Cumulative => {
            running.0 = running.0.min(native.0);
            running.1 = running.1.min(native.1);
            *running
        }
        ClampMode::PerFrame => (requested.0.min(native.0), requested.1.min(native.1)),
    }
}
