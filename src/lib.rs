//! Windows RAM Cleaner
//!
//! Keeps the Windows standby list in check. A background loop compares the
//! standby list with free memory and purges it once it grows past a
//! configured share; manual triggers purge the list or trim process working
//! sets on demand.
//!
//! ## Components
//!
//! - **PrivilegeGrantor**: enables the token privileges the kernel calls need
//! - **MemoryInfoProvider**: free and standby byte counts (PDH counters or
//!   the kernel memory-list block)
//! - **StandbyListPurger**: `MemoryPurgeStandbyList` through
//!   `NtSetSystemInformation`
//! - **ProcessTrimmer**: empties working sets, skipping critical processes
//! - **CleanupOrchestrator**: threshold, cooldown and the two loops
//!
//! ## Safety
//!
//! - Critical system processes are never trimmed unless forced
//! - Automatic cleanups respect a cooldown
//! - Nothing is purged when privileges cannot be granted
//!
//! On non-Windows targets every OS call fails with a not-supported error, so
//! the crate builds and its logic is testable anywhere.

pub mod cleaner;
pub mod core;
pub mod error;
pub mod monitor;
pub mod platform;
pub mod security;

// Re-exports
pub use cleaner::{
    CleanOptions, CriticalProcessRegistry, MemoryInfoProvider, MemorySnapshot, MemorySource,
    ProcessTrimmer, StandbyListPurger, TrimReport,
};
pub use crate::core::{AutoAction, CleanerConfig, CleanupOrchestrator, CleanupState, CycleOutcome, StopSignal};
pub use error::{
    CleanError, ConfigError, EnumerationError, PrivilegeError, PurgeError, QueryError, TrimError,
};
pub use monitor::{LogStatusSink, StatusSink};
pub use platform::{NativeSystem, OsError, SystemApi};
pub use security::{PrivilegeGrantor, PrivilegeSet};
