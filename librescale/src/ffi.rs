//! C ABI for the rescale pipeline.
//!
//! Three exported functions mirror the historical shim: `init_resize`,
//! `resize`, and `advanced_resize`, each returning 0 on success and 1 on
//! failure. Failure causes are logged and kept in a thread-local slot
//! readable through [`rescale_last_error_message`]; the status code itself
//! stays binary. No error or panic is allowed to unwind across the boundary.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use log::{error, info};

use crate::error::{RescaleError, Result};
use crate::limits::{self, ResourceLimits};
use crate::pipeline::{self, PipelineOptions};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(message: &str) {
    let message = CString::new(message)
        .unwrap_or_else(|_| CString::new("failed to format error message").unwrap_or_default());
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = Some(message);
    });
}

/// Run `f`, translating every error and panic into the binary status code.
fn guarded(f: impl FnOnce() -> Result<()>) -> c_int {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error!("Error ({}): {}", e.stage(), e);
            set_last_error(&e.to_string());
            1
        }
        Err(_) => {
            error!("Error: internal panic in rescale pipeline");
            set_last_error("internal panic in rescale pipeline");
            1
        }
    }
}

/// # Safety
///
/// `ptr` must be null or point to a valid NUL-terminated C string that stays
/// alive for the duration of the call.
unsafe fn string_arg(ptr: *const c_char, what: &str) -> Result<String> {
    if ptr.is_null() {
        return Err(RescaleError::Transform(format!("{what} must not be null")));
    }
    let raw = unsafe { CStr::from_ptr(ptr) };
    raw.to_str()
        .map(str::to_owned)
        .map_err(|_| RescaleError::Transform(format!("{what} is not valid UTF-8")))
}

fn dimension_arg(value: c_int, what: &str) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            RescaleError::Transform(format!("{what} must be positive, got {value}"))
        })
}

fn quality_arg(value: c_int) -> Result<u8> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| {
            RescaleError::Transform(format!("quality must be in 0-100, got {value}"))
        })
}

/// One-time process setup: installs logging and the process-wide decode
/// memory budget, in bytes. Zero means unlimited; negative values are
/// rejected.
///
/// Returns 0 on success, 1 on failure.
#[no_mangle]
pub extern "C" fn init_resize(memory_limit: c_int) -> c_int {
    guarded(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .try_init();

        let limits = match u64::try_from(memory_limit) {
            Ok(0) => ResourceLimits::unlimited(),
            Ok(bytes) => ResourceLimits::with_memory(bytes),
            Err(_) => {
                return Err(RescaleError::Init(format!(
                    "memory limit must not be negative, got {memory_limit}"
                )))
            }
        };

        limits::install(limits)?;
        match limits.memory() {
            Some(bytes) => info!("Initialized with memory limit of {} bytes", bytes),
            None => info!("Initialized with no memory limit"),
        }
        Ok(())
    })
}

/// Resize `input_filename` into a WEBP file at `output_filename`, quality 70.
/// Target dimensions are clamped against the source so the image is never
/// upscaled.
///
/// Returns 0 on success, 1 on failure.
#[no_mangle]
pub extern "C" fn resize(
    input_filename: *const c_char,
    output_filename: *const c_char,
    target_width: c_int,
    target_height: c_int,
) -> c_int {
    guarded(|| {
        let input = unsafe { string_arg(input_filename, "input_filename") }?;
        let output = unsafe { string_arg(output_filename, "output_filename") }?;
        let width = dimension_arg(target_width, "target_width")?;
        let height = dimension_arg(target_height, "target_height")?;

        pipeline::rescale_file(
            Path::new(&input),
            Path::new(&output),
            width,
            height,
            &PipelineOptions::default(),
            &limits::current(),
        )
    })
}

/// Same pipeline as [`resize`] with caller-supplied quality (0-100) and
/// output codec name (`"WEBP"`, `"JPEG"`, `"PNG"`, `"GIF"`,
/// case-insensitive).
///
/// Returns 0 on success, 1 on failure.
#[no_mangle]
pub extern "C" fn advanced_resize(
    input_filename: *const c_char,
    output_filename: *const c_char,
    target_width: c_int,
    target_height: c_int,
    quality: c_int,
    format: *const c_char,
) -> c_int {
    guarded(|| {
        let input = unsafe { string_arg(input_filename, "input_filename") }?;
        let output = unsafe { string_arg(output_filename, "output_filename") }?;
        let width = dimension_arg(target_width, "target_width")?;
        let height = dimension_arg(target_height, "target_height")?;
        let quality = quality_arg(quality)?;
        let format = unsafe { string_arg(format, "format") }?.parse()?;

        info!("Output: {}", output);
        info!("Format: {}, Quality: {}", format, quality);

        let options = PipelineOptions {
            quality,
            format,
            ..PipelineOptions::default()
        };

        pipeline::rescale_file(
            Path::new(&input),
            Path::new(&output),
            width,
            height,
            &options,
            &limits::current(),
        )
    })
}

/// Human-readable message for the most recent failure on this thread.
///
/// The pointer stays valid until the next failing call on the same thread.
/// Diagnostic side channel only; callers must not parse it.
#[no_mangle]
pub extern "C" fn rescale_last_error_message() -> *const c_char {
    LAST_ERROR.with(|slot| match slot.borrow().as_ref() {
        Some(message) => message.as_ptr(),
        None => b"No error information available\0".as_ptr().cast::<c_char>(),
    })
}
