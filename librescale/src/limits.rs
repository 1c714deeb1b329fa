//! Process-wide resource limits for decoded pixel data.
//!
//! The limit is installed once (normally via `init_resize`) and shared by
//! every subsequent pipeline call. Pipelines take an explicit
//! [`ResourceLimits`] snapshot rather than reading the global mid-flight, so
//! a concurrent re-installation cannot change a call's budget halfway
//! through.

use std::sync::RwLock;

use image::Limits;

use crate::error::{RescaleError, Result};

/// Memory budget applied to decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    max_alloc: Option<u64>,
}

impl ResourceLimits {
    /// No memory ceiling.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self { max_alloc: None }
    }

    /// Cap decoder allocations at `bytes`.
    #[must_use]
    pub const fn with_memory(bytes: u64) -> Self {
        Self {
            max_alloc: Some(bytes),
        }
    }

    /// The configured ceiling in bytes, if any.
    #[must_use]
    pub const fn memory(&self) -> Option<u64> {
        self.max_alloc
    }

    /// Translate into the limit structure understood by `image` decoders.
    ///
    /// Only the allocation ceiling is constrained; dimension limits stay
    /// open so oversized-but-affordable images still decode.
    #[must_use]
    pub fn to_image_limits(&self) -> Limits {
        let mut limits = Limits::no_limits();
        limits.max_alloc = self.max_alloc;
        limits
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

static INSTALLED: RwLock<ResourceLimits> = RwLock::new(ResourceLimits::unlimited());

/// Install the process-wide limits. Later installations overwrite earlier
/// ones; in-flight pipelines keep the snapshot they started with.
pub fn install(limits: ResourceLimits) -> Result<()> {
    let mut guard = INSTALLED
        .write()
        .map_err(|_| RescaleError::Init("resource limit lock poisoned".to_string()))?;
    *guard = limits;
    Ok(())
}

/// Snapshot of the currently installed limits.
#[must_use]
pub fn current() -> ResourceLimits {
    match INSTALLED.read() {
        Ok(guard) => *guard,
        // A poisoned lock still holds a valid copy of the limits.
        Err(poisoned) => *poisoned.into_inner(),
    }
}
