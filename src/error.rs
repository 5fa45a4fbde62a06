//! Error types for the cleaner components
//!
//! Each component returns its own error. The orchestrator logs them and
//! pushes their text to the display sink; none of them stops a loop.

use thiserror::Error;

use crate::platform::{NtStatus, OsError, PrivilegeStep};

/// A named privilege could not be resolved or enabled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to enable privilege {privilege}: {step} error: {source}")]
pub struct PrivilegeError {
    pub privilege: String,
    pub step: PrivilegeStep,
    #[source]
    pub source: OsError,
}

/// Memory info could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("no data returned from memory counter query")]
    NoData,

    #[error("memory counter query failed: {0}")]
    Os(#[from] OsError),

    #[error("failed to enable memory query privilege: {0}")]
    Privilege(#[from] PrivilegeError),

    #[error("memory list query failed with status {0:#010x}")]
    Status(NtStatus),

    #[error("memory list block has {actual} words, layout {layout} needs {expected}")]
    Layout {
        layout: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// The standby list purge was not issued or was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurgeError {
    #[error("failed to grant privileges to the process: {0}")]
    Privilege(#[from] PrivilegeError),

    #[error("NtSetSystemInformation call failed with status {0:#010x}")]
    Rejected(NtStatus),
}

/// The process snapshot could not be taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to create process snapshot: {0}")]
pub struct EnumerationError(#[from] pub OsError);

/// Trimming a single process failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrimError {
    #[error("failed to trim process {pid}: {source}")]
    Process {
        pid: u32,
        #[source]
        source: OsError,
    },

    #[error("failed to set process working set size: {0}")]
    SetWorkingSetSize(#[source] OsError),

    #[error("failed to empty working set: {0}")]
    EmptyWorkingSet(#[source] OsError),
}

/// Failure of a combined cleaning action (manual or automatic).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CleanError {
    #[error("failed to clean standby list: {0}")]
    Purge(#[from] PurgeError),

    #[error("failed to clean system memory: {0}")]
    Enumeration(#[from] EnumerationError),

    #[error("failed to clean process memory: {0}")]
    Trim(#[from] TrimError),

    #[error("cleanup task did not finish: {0}")]
    Task(String),
}

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_error_names_privilege_and_code() {
        let err = PrivilegeError {
            privilege: "SeDebugPrivilege".into(),
            step: PrivilegeStep::Adjust,
            source: OsError::new(1300, "not assigned"),
        };
        let text = err.to_string();
        assert!(text.contains("SeDebugPrivilege"));
        assert!(text.contains("AdjustTokenPrivileges"));
        assert!(text.contains("0x514"));
    }

    #[test]
    fn test_purge_error_wraps_privilege_error() {
        let err = PurgeError::from(PrivilegeError {
            privilege: "SeProfileSingleProcessPrivilege".into(),
            step: PrivilegeStep::Lookup,
            source: OsError::new(1313, "A specified privilege does not exist."),
        });
        assert!(matches!(err, PurgeError::Privilege(_)));

        let rejected = PurgeError::Rejected(0xC000_0061_u32 as i32);
        assert_eq!(
            rejected.to_string(),
            "NtSetSystemInformation call failed with status 0xc0000061"
        );
    }
}
