//! Win32 implementation of the OS boundary

use std::ffi::c_void;
use std::mem::size_of;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_NOT_ALL_ASSIGNED, ERROR_NO_MORE_FILES, HANDLE, LUID,
};
use windows::Win32::Security::{
    AdjustTokenPrivileges, GetTokenInformation, LookupPrivilegeValueW, TokenElevation,
    LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES, TOKEN_ELEVATION,
    TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Memory::{SetProcessWorkingSetSizeEx, SETPROCESSWORKINGSETSIZEEX_FLAGS};
use windows::Win32::System::Performance::{
    PdhAddEnglishCounterW, PdhCloseQuery, PdhCollectQueryData, PdhGetRawCounterValue,
    PdhOpenQueryW, PDH_HCOUNTER, PDH_HQUERY, PDH_RAW_COUNTER,
};
use windows::Win32::System::ProcessStatus::EmptyWorkingSet;
use windows::Win32::System::Threading::{
    GetCurrentProcess, OpenProcess, OpenProcessToken, PROCESS_QUERY_INFORMATION,
    PROCESS_SET_QUOTA,
};

use super::traits::{
    MemoryApi, NtStatus, OsError, PerfMemoryCounters, PrivilegeStep, ProcessApi, ProcessEntry,
    TokenApi,
};

/// `SYSTEM_INFORMATION_CLASS::SystemMemoryListInformation`
const SYSTEM_MEMORY_LIST_INFORMATION: i32 = 0x50;

/// Upper bound on the memory-list block we ask the kernel for. The block is
/// 22 words on every release so far; the spare room absorbs growth.
const MEMORY_LIST_BUFFER_WORDS: usize = 64;

/// English counter paths of the `Memory` performance object, in the field
/// order of [`PerfMemoryCounters`].
const MEMORY_COUNTER_PATHS: [&str; 4] = [
    "\\Memory\\Standby Cache Core Bytes",
    "\\Memory\\Standby Cache Normal Priority Bytes",
    "\\Memory\\Standby Cache Reserve Bytes",
    "\\Memory\\Available Bytes",
];

#[link(name = "ntdll")]
extern "system" {
    fn NtQuerySystemInformation(
        class: i32,
        information: *mut c_void,
        length: u32,
        return_length: *mut u32,
    ) -> i32;

    fn NtSetSystemInformation(class: i32, information: *mut c_void, length: u32) -> i32;
}

/// Kernel handle closed on drop.
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// PDH query closed on drop.
struct PdhQuery(PDH_HQUERY);

impl Drop for PdhQuery {
    fn drop(&mut self) {
        unsafe {
            PdhCloseQuery(self.0);
        }
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn pdh_check(status: u32, call: &str) -> Result<(), OsError> {
    if status == 0 {
        Ok(())
    } else {
        Err(OsError::new(status, format!("{} failed", call)))
    }
}

fn image_name(entry: &PROCESSENTRY32W) -> String {
    let len = entry
        .szExeFile
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(entry.szExeFile.len());
    String::from_utf16_lossy(&entry.szExeFile[..len])
}

/// Native Windows system access.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32System;

impl Win32System {
    pub fn new() -> Self {
        Self
    }
}

impl TokenApi for Win32System {
    fn enable_privilege(&self, name: &str) -> Result<(), (PrivilegeStep, OsError)> {
        let wide = to_wide(name);
        let mut luid = LUID::default();
        unsafe { LookupPrivilegeValueW(PCWSTR::null(), PCWSTR(wide.as_ptr()), &mut luid) }
            .map_err(|e| (PrivilegeStep::Lookup, OsError::from(e)))?;

        let mut token = HANDLE::default();
        unsafe {
            OpenProcessToken(GetCurrentProcess(), TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY, &mut token)
        }
        .map_err(|e| (PrivilegeStep::OpenToken, OsError::from(e)))?;
        let token = OwnedHandle(token);

        let privileges = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: luid,
                Attributes: SE_PRIVILEGE_ENABLED,
            }],
        };
        unsafe {
            AdjustTokenPrivileges(
                token.0,
                false,
                Some(&privileges as *const TOKEN_PRIVILEGES),
                0,
                None,
                None,
            )
        }
        .map_err(|e| (PrivilegeStep::Adjust, OsError::from(e)))?;

        // AdjustTokenPrivileges reports success even when the token does not
        // hold the privilege at all.
        let last = unsafe { GetLastError() };
        if last == ERROR_NOT_ALL_ASSIGNED {
            return Err((
                PrivilegeStep::Adjust,
                OsError::new(last.0, format!("token does not hold {}", name)),
            ));
        }
        Ok(())
    }

    fn is_elevated(&self) -> bool {
        unsafe {
            let mut token = HANDLE::default();
            if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_err() {
                return false;
            }
            let token = OwnedHandle(token);

            let mut elevation = TOKEN_ELEVATION::default();
            let mut size = 0u32;
            let result = GetTokenInformation(
                token.0,
                TokenElevation,
                Some(&mut elevation as *mut _ as *mut c_void),
                size_of::<TOKEN_ELEVATION>() as u32,
                &mut size,
            );
            result.is_ok() && elevation.TokenIsElevated != 0
        }
    }
}

impl MemoryApi for Win32System {
    fn perf_memory_counters(&self) -> Result<Vec<PerfMemoryCounters>, OsError> {
        let mut handle = PDH_HQUERY::default();
        pdh_check(unsafe { PdhOpenQueryW(PCWSTR::null(), 0, &mut handle) }, "PdhOpenQuery")?;
        let query = PdhQuery(handle);

        let mut counters = [PDH_HCOUNTER::default(); 4];
        for (path, counter) in MEMORY_COUNTER_PATHS.iter().zip(counters.iter_mut()) {
            let wide = to_wide(path);
            pdh_check(
                unsafe { PdhAddEnglishCounterW(query.0, PCWSTR(wide.as_ptr()), 0, counter) },
                "PdhAddEnglishCounter",
            )?;
        }
        pdh_check(unsafe { PdhCollectQueryData(query.0) }, "PdhCollectQueryData")?;

        let mut values = [0u64; 4];
        for (counter, value) in counters.iter().zip(values.iter_mut()) {
            let mut raw = PDH_RAW_COUNTER::default();
            pdh_check(
                unsafe { PdhGetRawCounterValue(*counter, None, &mut raw) },
                "PdhGetRawCounterValue",
            )?;
            *value = raw.FirstValue.max(0) as u64;
        }

        Ok(vec![PerfMemoryCounters {
            standby_cache_core_bytes: values[0],
            standby_cache_normal_priority_bytes: values[1],
            standby_cache_reserve_bytes: values[2],
            available_bytes: values[3],
        }])
    }

    fn query_memory_list(&self) -> Result<Vec<usize>, NtStatus> {
        let mut buffer = vec![0usize; MEMORY_LIST_BUFFER_WORDS];
        let mut returned = 0u32;
        let status = unsafe {
            NtQuerySystemInformation(
                SYSTEM_MEMORY_LIST_INFORMATION,
                buffer.as_mut_ptr() as *mut c_void,
                (buffer.len() * size_of::<usize>()) as u32,
                &mut returned,
            )
        };
        if status != 0 {
            return Err(status);
        }
        buffer.truncate(returned as usize / size_of::<usize>());
        Ok(buffer)
    }

    fn set_memory_list_command(&self, command: u32) -> NtStatus {
        let mut command = command;
        unsafe {
            NtSetSystemInformation(
                SYSTEM_MEMORY_LIST_INFORMATION,
                &mut command as *mut u32 as *mut c_void,
                size_of::<u32>() as u32,
            )
        }
    }
}

impl ProcessApi for Win32System {
    fn process_snapshot(&self) -> Result<Vec<ProcessEntry>, OsError> {
        let snapshot = OwnedHandle(unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }?);

        let mut entry = PROCESSENTRY32W {
            dwSize: size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };
        let mut processes = Vec::new();

        if let Err(e) = unsafe { Process32FirstW(snapshot.0, &mut entry) } {
            if e.code() == ERROR_NO_MORE_FILES.to_hresult() {
                return Ok(processes);
            }
            return Err(e.into());
        }
        loop {
            processes.push(ProcessEntry::new(entry.th32ProcessID, image_name(&entry)));
            if unsafe { Process32NextW(snapshot.0, &mut entry) }.is_err() {
                break;
            }
        }
        Ok(processes)
    }

    fn empty_working_set(&self, pid: u32) -> Result<(), OsError> {
        let handle = OwnedHandle(unsafe {
            OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_SET_QUOTA, false, pid)
        }?);
        unsafe { EmptyWorkingSet(handle.0) }?;
        Ok(())
    }

    fn set_own_working_set_size(&self, min: usize, max: usize) -> Result<(), OsError> {
        unsafe {
            SetProcessWorkingSetSizeEx(
                GetCurrentProcess(),
                min,
                max,
                SETPROCESSWORKINGSETSIZEEX_FLAGS(0),
            )
        }?;
        Ok(())
    }

    fn empty_own_working_set(&self) -> Result<(), OsError> {
        unsafe { EmptyWorkingSet(GetCurrentProcess()) }?;
        Ok(())
    }
}
