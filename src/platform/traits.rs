//! OS boundary traits for the memory cleaner
//!
//! Every call that touches the operating system goes through one of the
//! traits in this module. The cleaner components (privilege grantor, memory
//! info provider, standby purger, process trimmer) only ever see these
//! traits, so they can run against the native Win32 implementation or a
//! recording mock.
//!
//! ```text
//! +---------------------------+
//! |  cleaner / security       |  <- policy (privileges, purge, trim)
//! +---------------------------+
//!          |
//! +--------v------------------+
//! |  TokenApi / MemoryApi /   |  <- this module
//! |  ProcessApi               |
//! +---------------------------+
//!          |
//!    +-----+------+
//!    |            |
//! +--v---+   +----v--------+
//! | Win32|   | Unsupported |  <- platform implementations
//! +------+   +-------------+
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Error code used when the target platform has no implementation.
pub const ERROR_NOT_SUPPORTED: u32 = 50;

/// A failed OS call: the raw error code plus the system message for it.
///
/// On Windows `code` holds the Win32 error or the HRESULT bits of a
/// `windows::core::Error`; NT calls report their NTSTATUS separately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("OS error {code:#x}: {message}")]
pub struct OsError {
    pub code: u32,
    pub message: String,
}

impl OsError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn not_supported(what: &str) -> Self {
        Self::new(ERROR_NOT_SUPPORTED, format!("{} is only available on Windows", what))
    }
}

impl From<std::io::Error> for OsError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.raw_os_error().unwrap_or(-1) as u32, err.to_string())
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for OsError {
    fn from(err: windows::core::Error) -> Self {
        Self::new(err.code().0 as u32, err.to_string())
    }
}

/// NTSTATUS as returned by the native `Nt*` system services. Zero is success.
pub type NtStatus = i32;

/// Step of the privilege-enable sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeStep {
    /// Resolving the privilege name to its LUID
    Lookup,
    /// Opening the current process token for adjustment
    OpenToken,
    /// Enabling the privilege on the token
    Adjust,
}

impl std::fmt::Display for PrivilegeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrivilegeStep::Lookup => write!(f, "LookupPrivilegeValue"),
            PrivilegeStep::OpenToken => write!(f, "OpenProcessToken"),
            PrivilegeStep::Adjust => write!(f, "AdjustTokenPrivileges"),
        }
    }
}

// ============================================================================
// Memory Types
// ============================================================================

/// One row of the `Memory` performance object, in bytes.
///
/// Same fields as the `Win32_PerfRawData_PerfOS_Memory` management class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfMemoryCounters {
    pub standby_cache_core_bytes: u64,
    pub standby_cache_normal_priority_bytes: u64,
    pub standby_cache_reserve_bytes: u64,
    pub available_bytes: u64,
}

impl PerfMemoryCounters {
    /// Standby cache across all three priority tiers.
    pub fn standby_bytes(&self) -> u64 {
        self.standby_cache_core_bytes
            .saturating_add(self.standby_cache_normal_priority_bytes)
            .saturating_add(self.standby_cache_reserve_bytes)
    }
}

// ============================================================================
// Process Types
// ============================================================================

/// One entry of a process snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Image file name, e.g. `explorer.exe`
    pub image_name: String,
}

impl ProcessEntry {
    pub fn new(pid: u32, image_name: impl Into<String>) -> Self {
        Self { pid, image_name: image_name.into() }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Access to the current process's security token.
pub trait TokenApi: Send + Sync {
    /// Enable one named privilege (e.g. `SeDebugPrivilege`) on the current
    /// process token. Enabling an already-enabled privilege succeeds.
    fn enable_privilege(&self, name: &str) -> Result<(), (PrivilegeStep, OsError)>;

    /// Whether the current process token is elevated.
    fn is_elevated(&self) -> bool;
}

/// System-wide memory counters and the memory-list control call.
pub trait MemoryApi: Send + Sync {
    /// Rows of the `Memory` performance object. An empty vector means the
    /// query succeeded but returned nothing.
    fn perf_memory_counters(&self) -> Result<Vec<PerfMemoryCounters>, OsError>;

    /// Raw pointer-sized words of the kernel memory-list information block
    /// (`NtQuerySystemInformation`, class `SystemMemoryListInformation`).
    fn query_memory_list(&self) -> Result<Vec<usize>, NtStatus>;

    /// Issue a memory-list command (`NtSetSystemInformation`, class
    /// `SystemMemoryListInformation`) and return the raw status.
    fn set_memory_list_command(&self, command: u32) -> NtStatus;
}

/// Process enumeration and working set control.
pub trait ProcessApi: Send + Sync {
    /// Point-in-time snapshot of all running processes.
    fn process_snapshot(&self) -> Result<Vec<ProcessEntry>, OsError>;

    /// Open `pid` with query + set-quota rights and empty its working set.
    /// The process handle is closed before returning.
    fn empty_working_set(&self, pid: u32) -> Result<(), OsError>;

    /// Set the calling process's working set bounds to `(min, max)`.
    fn set_own_working_set_size(&self, min: usize, max: usize) -> Result<(), OsError>;

    /// Empty the calling process's working set.
    fn empty_own_working_set(&self) -> Result<(), OsError>;
}

/// Everything the cleaner needs from the OS.
pub trait SystemApi: TokenApi + MemoryApi + ProcessApi {}

impl<T: TokenApi + MemoryApi + ProcessApi> SystemApi for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_counters_standby_sum() {
        let row = PerfMemoryCounters {
            standby_cache_core_bytes: 100,
            standby_cache_normal_priority_bytes: 2_000,
            standby_cache_reserve_bytes: 30_000,
            available_bytes: 1,
        };
        assert_eq!(row.standby_bytes(), 32_100);

        let saturated = PerfMemoryCounters {
            standby_cache_core_bytes: u64::MAX,
            standby_cache_normal_priority_bytes: 1,
            ..Default::default()
        };
        assert_eq!(saturated.standby_bytes(), u64::MAX);
    }

    #[test]
    fn test_os_error_display() {
        let err = OsError::new(5, "Access is denied.");
        assert_eq!(err.to_string(), "OS error 0x5: Access is denied.");

        let unsupported = OsError::not_supported("EmptyWorkingSet");
        assert_eq!(unsupported.code, ERROR_NOT_SUPPORTED);
        assert!(unsupported.message.contains("EmptyWorkingSet"));
    }

    #[test]
    fn test_privilege_step_names() {
        assert_eq!(PrivilegeStep::Lookup.to_string(), "LookupPrivilegeValue");
        assert_eq!(PrivilegeStep::Adjust.to_string(), "AdjustTokenPrivileges");
    }
}
