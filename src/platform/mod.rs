//! Platform layer for the memory cleaner
//!
//! ```text
//! src/platform/
//! +-- mod.rs           <- This file (module definitions, native alias)
//! +-- traits.rs        <- OS boundary traits and error types
//! +-- win32.rs         <- Win32 implementation (cfg(windows))
//! +-- unsupported.rs   <- NotSupported stand-in (cfg(not(windows)))
//! ```
//!
//! Use [`NativeSystem`] to get the implementation for the build target:
//!
//! ```ignore
//! use windows_ram_cleaner::platform::NativeSystem;
//!
//! let system = std::sync::Arc::new(NativeSystem::new());
//! ```

pub mod traits;

#[cfg(windows)]
mod win32;

#[cfg(not(windows))]
mod unsupported;

#[cfg(test)]
pub mod mock;

pub use traits::{
    MemoryApi, NtStatus, OsError, PerfMemoryCounters, PrivilegeStep, ProcessApi, ProcessEntry,
    SystemApi, TokenApi, ERROR_NOT_SUPPORTED,
};

#[cfg(windows)]
pub type NativeSystem = win32::Win32System;

#[cfg(not(windows))]
pub type NativeSystem = unsupported::UnsupportedSystem;

/// Returns the current platform name
pub fn platform_name() -> &'static str {
    if cfg!(windows) {
        "windows"
    } else {
        "unsupported"
    }
}

/// Check if the current platform can actually clean memory
pub fn is_platform_supported() -> bool {
    cfg!(windows)
}
