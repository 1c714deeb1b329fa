#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::uninlined_format_args
)]

//! Rescale - a thin resize-and-re-encode shim over the `image` codec stack
//!
//! The library decodes a raster image (still or animated), coalesces sparse
//! animation frames into self-contained ones, applies the orientation implied
//! by embedded metadata, resizes each frame without ever upscaling, and
//! re-encodes the result at a caller-chosen quality and codec. The heavy
//! lifting (codecs, resampling, color handling) belongs to the `image` and
//! `webp` crates; this crate contributes the pipeline, the resource-limit
//! plumbing, and the error translation.
//!
//! A C ABI in [`ffi`] exposes the pipeline to other language runtimes as
//! three functions returning plain 0/1 status codes.

pub mod encode;
pub mod error;
pub mod frames;
pub mod limits;
pub mod pipeline;

#[cfg(feature = "ffi")]
pub mod ffi;

pub use encode::OutputFormat;
pub use error::{RescaleError, Result};
pub use frames::FrameSequence;
pub use limits::ResourceLimits;
pub use pipeline::{rescale_file, ClampMode, CoalescePolicy, PipelineOptions};

/// Quality used by the fixed-parameter `resize` entry point.
pub const DEFAULT_QUALITY: u8 = 70;

/// Codec used by the fixed-parameter `resize` entry point.
pub const DEFAULT_FORMAT: OutputFormat = OutputFormat::WebP;
