//! Frame decoding and animation coalescing.
//!
//! Every input decodes to a [`FrameSequence`]: one frame for still images,
//! several for GIF/APNG/animated-WebP. Animation formats may store frames as
//! sparse deltas against the previous canvas; [`coalesce`] composites them so
//! each frame is independently renderable before any geometric transform.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::imageops;
use image::metadata::Orientation;
use image::{
    AnimationDecoder, DynamicImage, Frame, ImageDecoder, ImageFormat, ImageReader, RgbaImage,
};
use log::debug;

use crate::error::{RescaleError, Result};
use crate::limits::ResourceLimits;

/// All frames decoded from one input, plus the orientation tag that applies
/// to them.
pub struct FrameSequence {
    pub frames: Vec<Frame>,
    pub orientation: Orientation,
}

impl FrameSequence {
    fn still(image: DynamicImage, orientation: Orientation) -> Self {
        Self {
            frames: vec![Frame::new(image.into_rgba8())],
            orientation,
        }
    }

    fn animated(frames: Vec<Frame>) -> Self {
        // Animation containers carry no orientation metadata.
        Self {
            frames,
            orientation: Orientation::NoTransforms,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Decode every frame from `path`, honoring the given resource limits.
pub fn decode_sequence(path: &Path, limits: &ResourceLimits) -> Result<FrameSequence> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format().ok_or_else(|| {
        RescaleError::Decode(format!("unrecognized image format: {}", path.display()))
    })?;
    debug!("Detected {:?} input: {}", format, path.display());

    let sequence = match format {
        ImageFormat::Gif => decode_gif(path, limits)?,
        ImageFormat::Png => decode_png(path, limits)?,
        ImageFormat::WebP => decode_webp(path, limits)?,
        _ => decode_still(reader, limits)?,
    };

    // Unreachable given decoder semantics (decode failures error out above),
    // but an empty sequence must never reach the transform stage.
    if sequence.is_empty() {
        return Err(RescaleError::EmptyInput {
            path: path.display().to_string(),
        });
    }

    Ok(sequence)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

fn decode_still(
    mut reader: ImageReader<BufReader<File>>,
    limits: &ResourceLimits,
) -> Result<FrameSequence> {
    reader.limits(limits.to_image_limits());
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation()?;
    let image = DynamicImage::from_decoder(decoder)?;
    Ok(FrameSequence::still(image, orientation))
}

fn decode_gif(path: &Path, limits: &ResourceLimits) -> Result<FrameSequence> {
    let mut decoder = GifDecoder::new(open(path)?)?;
    decoder.set_limits(limits.to_image_limits())?;
    let frames = decoder.into_frames().collect_frames()?;
    Ok(FrameSequence::animated(frames))
}

fn decode_png(path: &Path, limits: &ResourceLimits) -> Result<FrameSequence> {
    let mut decoder = PngDecoder::new(open(path)?)?;
    decoder.set_limits(limits.to_image_limits())?;
    if decoder.is_apng()? {
        let frames = decoder.apng()?.into_frames().collect_frames()?;
        Ok(FrameSequence::animated(frames))
    } else {
        let orientation = decoder.orientation()?;
        let image = DynamicImage::from_decoder(decoder)?;
        Ok(FrameSequence::still(image, orientation))
    }
}

fn decode_webp(path: &Path, limits: &ResourceLimits) -> Result<FrameSequence> {
    let mut decoder = WebPDecoder::new(open(path)?)?;
    decoder.set_limits(limits.to_image_limits())?;
    if decoder.has_animation() {
        let frames = decoder.into_frames().collect_frames()?;
        Ok(FrameSequence::animated(frames))
    } else {
        let orientation = decoder.orientation()?;
        let image = DynamicImage::from_decoder(decoder)?;
        Ok(FrameSequence::still(image, orientation))
    }
}

/// Composite each frame over the accumulated canvas so every frame stands on
/// its own. Frame offsets collapse to zero; delays are preserved.
#[must_use]
pub fn coalesce(frames: Vec<Frame>) -> Vec<Frame> {
    let (canvas_width, canvas_height) = frames.iter().fold((1, 1), |(w, h), frame| {
        (
            w.max(frame.left() + frame.buffer().width()),
            h.max(frame.top() + frame.buffer().height()),
        )
    });

    let mut canvas = RgbaImage::new(canvas_width, canvas_height);
    let mut coalesced = Vec::with_capacity(frames.len());
    for frame in frames {
        imageops::overlay(
            &mut canvas,
            frame.buffer(),
            i64::from(frame.left()),
            i64::from(frame.top()),
        );
        coalesced.push(Frame::from_parts(canvas.clone(), 0, 0, frame.delay()));
    }
    coalesced
}
