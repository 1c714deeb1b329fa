#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{error, info, warn};

use rescale::{
    ClampMode, CoalescePolicy, OutputFormat, PipelineOptions, RescaleError, ResourceLimits,
};

/// Rescale CLI
#[derive(Parser)]
#[command(name = "rescale")]
#[command(about = "Resize raster images (still or animated) and re-encode them")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Input image file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output image file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Target width in pixels (clamped to the source width)
    #[arg(short = 'W', long)]
    width: u32,

    /// Target height in pixels (clamped to the source height)
    #[arg(short = 'H', long)]
    height: u32,

    /// Encoder quality (0-100)
    #[arg(short, long, default_value = "70")]
    quality: u8,

    /// Output codec
    #[arg(short, long, default_value = "webp")]
    format: FormatArg,

    /// Memory budget for decoded pixel data, in bytes (0 = unlimited)
    #[arg(long, default_value = "0")]
    memory_limit: u64,

    /// Clamp each frame against its own geometry instead of carrying a
    /// clamped target forward across frames
    #[arg(long)]
    per_frame_clamp: bool,

    /// Coalesce animation frames even for single-frame inputs
    #[arg(long)]
    always_coalesce: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (only errors)
    #[arg(long)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy)]
enum FormatArg {
    Webp,
    Jpeg,
    Png,
    Gif,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Webp => Self::WebP,
            FormatArg::Jpeg => Self::Jpeg,
            FormatArg::Png => Self::Png,
            FormatArg::Gif => Self::Gif,
        }
    }
}

fn main() {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Error
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Err(e) = run(args) {
        error!("Rescale failed: {}", e);

        let exit_code = match e.downcast_ref::<RescaleError>() {
            Some(_) => 1,
            None => 2,
        };

        process::exit(exit_code);
    }
}

fn run(args: Args) -> Result<()> {
    validate_args(&args)?;

    let limits = if args.memory_limit == 0 {
        ResourceLimits::unlimited()
    } else {
        ResourceLimits::with_memory(args.memory_limit)
    };

    let options = PipelineOptions {
        quality: args.quality,
        format: args.format.into(),
        clamp: if args.per_frame_clamp {
            ClampMode::PerFrame
        } else {
            ClampMode::Cumulative
        },
        coalesce: if args.always_coalesce {
            CoalescePolicy::Always
        } else {
            CoalescePolicy::Auto
        },
    };

    rescale::rescale_file(
        &args.input,
        &args.output,
        args.width,
        args.height,
        &options,
        &limits,
    )?;

    let output_size = std::fs::metadata(&args.output)?.len();
    info!(
        "Output file: {} ({} bytes)",
        args.output.display(),
        output_size
    );

    Ok(())
}

fn validate_args(args: &Args) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            anyhow::bail!("Output directory does not exist: {}", parent.display());
        }
    }

    if args.width == 0 || args.height == 0 {
        anyhow::bail!(
            "Target dimensions must be positive, got {}x{}",
            args.width,
            args.height
        );
    }

    if args.quality > 100 {
        anyhow::bail!("Quality must be between 0 and 100, got {}", args.quality);
    }

    if args.quiet && args.verbose {
        warn!("Both --quiet and --verbose specified, using --quiet");
    }

    Ok(())
}
