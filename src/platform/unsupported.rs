//! Stand-in OS boundary for non-Windows hosts
//!
//! Lets the crate build and its tests run anywhere. Every call fails with
//! a `NotSupported` error, which the cleaner surfaces like any other OS error.

use super::traits::{
    MemoryApi, NtStatus, OsError, PerfMemoryCounters, PrivilegeStep, ProcessApi, ProcessEntry,
    TokenApi,
};

/// `STATUS_NOT_IMPLEMENTED`
const STATUS_NOT_IMPLEMENTED: NtStatus = 0xC000_0002_u32 as i32;

#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedSystem;

impl UnsupportedSystem {
    pub fn new() -> Self {
        Self
    }
}

impl TokenApi for UnsupportedSystem {
    fn enable_privilege(&self, _name: &str) -> Result<(), (PrivilegeStep, OsError)> {
        Err((PrivilegeStep::Lookup, OsError::not_supported("Token privileges")))
    }

    fn is_elevated(&self) -> bool {
        false
    }
}

impl MemoryApi for UnsupportedSystem {
    fn perf_memory_counters(&self) -> Result<Vec<PerfMemoryCounters>, OsError> {
        Err(OsError::not_supported("Memory performance counters"))
    }

    fn query_memory_list(&self) -> Result<Vec<usize>, NtStatus> {
        Err(STATUS_NOT_IMPLEMENTED)
    }

    fn set_memory_list_command(&self, _command: u32) -> NtStatus {
        STATUS_NOT_IMPLEMENTED
    }
}

impl ProcessApi for UnsupportedSystem {
    fn process_snapshot(&self) -> Result<Vec<ProcessEntry>, OsError> {
        Err(OsError::not_supported("Process snapshots"))
    }

    fn empty_working_set(&self, _pid: u32) -> Result<(), OsError> {
        Err(OsError::not_supported("EmptyWorkingSet"))
    }

    fn set_own_working_set_size(&self, _min: usize, _max: usize) -> Result<(), OsError> {
        Err(OsError::not_supported("SetProcessWorkingSetSizeEx"))
    }

    fn empty_own_working_set(&self) -> Result<(), OsError> {
        Err(OsError::not_supported("EmptyWorkingSet"))
    }
}
