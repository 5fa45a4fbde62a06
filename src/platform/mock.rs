//! Recording OS boundary for tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::traits::{
    MemoryApi, NtStatus, OsError, PerfMemoryCounters, PrivilegeStep, ProcessApi, ProcessEntry,
    TokenApi,
};

/// `ERROR_ACCESS_DENIED`
pub const ACCESS_DENIED: u32 = 5;

/// `STATUS_PRIVILEGE_NOT_HELD`
pub const PRIVILEGE_NOT_HELD: NtStatus = 0xC000_0061_u32 as i32;

/// Privilege the kernel demands for the memory-list information class.
const MEMORY_LIST_PRIVILEGE: &str = "SeProfileSingleProcessPrivilege";

/// Scriptable fake of every OS trait. Counts and records each call.
pub struct MockSystem {
    elevated: bool,
    failing_privilege: Mutex<Option<(String, PrivilegeStep)>>,
    pub enabled_privileges: Mutex<Vec<String>>,

    perf_rows: Mutex<Result<Vec<PerfMemoryCounters>, OsError>>,
    memory_list: Mutex<Result<Vec<usize>, NtStatus>>,
    pub memory_list_queries: AtomicUsize,
    purge_status: AtomicI32,
    pub purge_calls: AtomicUsize,
    pub purge_commands: Mutex<Vec<u32>>,

    processes: Mutex<Result<Vec<ProcessEntry>, OsError>>,
    failing_pids: Mutex<HashSet<u32>>,
    pub opened_pids: Mutex<Vec<u32>>,
    own_working_set_failure: Mutex<Option<OsError>>,
    pub own_working_set_sizes: Mutex<Vec<(usize, usize)>>,
    pub own_empty_calls: AtomicUsize,
}

impl MockSystem {
    pub fn new() -> Self {
        Self {
            elevated: true,
            failing_privilege: Mutex::new(None),
            enabled_privileges: Mutex::new(Vec::new()),
            perf_rows: Mutex::new(Ok(vec![PerfMemoryCounters::default()])),
            memory_list: Mutex::new(Ok(Vec::new())),
            memory_list_queries: AtomicUsize::new(0),
            purge_status: AtomicI32::new(0),
            purge_calls: AtomicUsize::new(0),
            purge_commands: Mutex::new(Vec::new()),
            processes: Mutex::new(Ok(Vec::new())),
            failing_pids: Mutex::new(HashSet::new()),
            opened_pids: Mutex::new(Vec::new()),
            own_working_set_failure: Mutex::new(None),
            own_working_set_sizes: Mutex::new(Vec::new()),
            own_empty_calls: AtomicUsize::new(0),
        }
    }

    pub fn not_elevated(mut self) -> Self {
        self.elevated = false;
        self
    }

    pub fn fail_privilege(self, name: &str, step: PrivilegeStep) -> Self {
        *self.failing_privilege.lock().unwrap() = Some((name.to_string(), step));
        self
    }

    /// Serve one perf counter row with the given standby/free split.
    pub fn with_memory(self, standby_bytes: u64, free_bytes: u64) -> Self {
        self.set_memory(standby_bytes, free_bytes);
        self
    }

    pub fn set_memory(&self, standby_bytes: u64, free_bytes: u64) {
        *self.perf_rows.lock().unwrap() = Ok(vec![PerfMemoryCounters {
            standby_cache_normal_priority_bytes: standby_bytes,
            available_bytes: free_bytes,
            ..Default::default()
        }]);
    }

    pub fn with_perf_result(self, rows: Result<Vec<PerfMemoryCounters>, OsError>) -> Self {
        *self.perf_rows.lock().unwrap() = rows;
        self
    }

    pub fn with_memory_list(self, words: Result<Vec<usize>, NtStatus>) -> Self {
        *self.memory_list.lock().unwrap() = words;
        self
    }

    pub fn with_purge_status(self, status: NtStatus) -> Self {
        self.purge_status.store(status, Ordering::SeqCst);
        self
    }

    pub fn with_processes(self, processes: &[(u32, &str)]) -> Self {
        *self.processes.lock().unwrap() = Ok(processes
            .iter()
            .map(|(pid, name)| ProcessEntry::new(*pid, *name))
            .collect());
        self
    }

    pub fn with_snapshot_error(self, err: OsError) -> Self {
        *self.processes.lock().unwrap() = Err(err);
        self
    }

    pub fn deny_pid(self, pid: u32) -> Self {
        self.failing_pids.lock().unwrap().insert(pid);
        self
    }

    pub fn fail_own_working_set(self, err: OsError) -> Self {
        *self.own_working_set_failure.lock().unwrap() = Some(err);
        self
    }

    pub fn purge_count(&self) -> usize {
        self.purge_calls.load(Ordering::SeqCst)
    }

    pub fn memory_list_query_count(&self) -> usize {
        self.memory_list_queries.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<u32> {
        self.opened_pids.lock().unwrap().clone()
    }

    pub fn privileges(&self) -> Vec<String> {
        self.enabled_privileges.lock().unwrap().clone()
    }
}

impl Default for MockSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenApi for MockSystem {
    fn enable_privilege(&self, name: &str) -> Result<(), (PrivilegeStep, OsError)> {
        if let Some((failing, step)) = self.failing_privilege.lock().unwrap().as_ref() {
            if failing == name {
                return Err((*step, OsError::new(1300, "Not all privileges or groups referenced are assigned to the caller.")));
            }
        }
        let mut enabled = self.enabled_privileges.lock().unwrap();
        if !enabled.iter().any(|p| p == name) {
            enabled.push(name.to_string());
        }
        Ok(())
    }

    fn is_elevated(&self) -> bool {
        self.elevated
    }
}

impl MemoryApi for MockSystem {
    fn perf_memory_counters(&self) -> Result<Vec<PerfMemoryCounters>, OsError> {
        self.perf_rows.lock().unwrap().clone()
    }

    fn query_memory_list(&self) -> Result<Vec<usize>, NtStatus> {
        self.memory_list_queries.fetch_add(1, Ordering::SeqCst);
        if !self.privileges().iter().any(|p| p == MEMORY_LIST_PRIVILEGE) {
            return Err(PRIVILEGE_NOT_HELD);
        }
        self.memory_list.lock().unwrap().clone()
    }

    fn set_memory_list_command(&self, command: u32) -> NtStatus {
        self.purge_calls.fetch_add(1, Ordering::SeqCst);
        self.purge_commands.lock().unwrap().push(command);
        self.purge_status.load(Ordering::SeqCst)
    }
}

impl ProcessApi for MockSystem {
    fn process_snapshot(&self) -> Result<Vec<ProcessEntry>, OsError> {
        self.processes.lock().unwrap().clone()
    }

    fn empty_working_set(&self, pid: u32) -> Result<(), OsError> {
        self.opened_pids.lock().unwrap().push(pid);
        if self.failing_pids.lock().unwrap().contains(&pid) {
            return Err(OsError::new(ACCESS_DENIED, "Access is denied."));
        }
        Ok(())
    }

    fn set_own_working_set_size(&self, min: usize, max: usize) -> Result<(), OsError> {
        if let Some(err) = self.own_working_set_failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.own_working_set_sizes.lock().unwrap().push((min, max));
        Ok(())
    }

    fn empty_own_working_set(&self) -> Result<(), OsError> {
        self.own_empty_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
