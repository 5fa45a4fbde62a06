//! Free memory and standby list measurement

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::QueryError;
use crate::platform::MemoryApi;
use crate::security::PrivilegeGrantor;

/// Page size used to turn kernel page counts into bytes.
pub const PAGE_SIZE: u64 = 4096;

/// Bytes per mebibyte, for display.
pub const MIB: u64 = 1024 * 1024;

/// Point-in-time memory measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub free_bytes: u64,
    pub standby_bytes: u64,
}

impl MemorySnapshot {
    pub fn new(free_bytes: u64, standby_bytes: u64) -> Self {
        Self { free_bytes, standby_bytes }
    }

    /// `standby * 100 / free`, truncated. `None` when free memory is zero.
    pub fn standby_percent(&self) -> Option<u64> {
        if self.free_bytes == 0 {
            return None;
        }
        let percent = self.standby_bytes as u128 * 100 / self.free_bytes as u128;
        Some(u64::try_from(percent).unwrap_or(u64::MAX))
    }

    pub fn free_mb(&self) -> u64 {
        self.free_bytes / MIB
    }

    pub fn standby_mb(&self) -> u64 {
        self.standby_bytes / MIB
    }
}

/// Where memory figures are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemorySource {
    /// `Memory` performance object (standby cache tiers + available bytes)
    #[default]
    PerfCounters,
    /// Raw page counts from the kernel memory-list information class
    Kernel,
}

/// Word offsets inside the kernel memory-list information block.
///
/// The block is undocumented; its layout is pinned here per OS release so a
/// new layout only means a new table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryListLayout {
    pub name: &'static str,
    /// Minimum number of words the block must contain
    pub words: usize,
    /// Zeroed and free page counts
    pub free_words: &'static [usize],
    /// Standby page counts, one per priority 0..=7
    pub standby_words: Range<usize>,
}

impl MemoryListLayout {
    /// Sum the given words as page counts and convert to bytes.
    fn pages_to_bytes(words: &[usize], indices: impl Iterator<Item = usize>) -> u64 {
        indices
            .map(|i| words[i] as u64)
            .fold(0u64, |acc, pages| acc.saturating_add(pages))
            .saturating_mul(PAGE_SIZE)
    }

    /// Decode a raw block into a snapshot. Free memory counts zeroed, free
    /// and standby pages, matching the "Available Bytes" counter.
    pub fn decode(&self, words: &[usize]) -> Result<MemorySnapshot, QueryError> {
        if words.len() < self.words {
            return Err(QueryError::Layout {
                layout: self.name,
                expected: self.words,
                actual: words.len(),
            });
        }
        let standby = Self::pages_to_bytes(words, self.standby_words.clone());
        let free = Self::pages_to_bytes(words, self.free_words.iter().copied());
        Ok(MemorySnapshot::new(free.saturating_add(standby), standby))
    }
}

/// Known memory-list layouts, newest first.
///
/// `SYSTEM_MEMORY_LIST_INFORMATION` since Windows Vista: ZeroPageCount,
/// FreePageCount, ModifiedPageCount, ModifiedNoWritePageCount, BadPageCount,
/// PageCountByPriority[8], RepurposedPagesByPriority[8],
/// ModifiedPageCountPageFile.
pub const MEMORY_LIST_LAYOUTS: &[MemoryListLayout] = &[MemoryListLayout {
    name: "nt6",
    words: 22,
    free_words: &[0, 1],
    standby_words: 5..13,
}];

/// Reads [`MemorySnapshot`]s from the configured source.
#[derive(Clone)]
pub struct MemoryInfoProvider {
    api: Arc<dyn MemoryApi>,
    grantor: PrivilegeGrantor,
    source: MemorySource,
    layout: &'static MemoryListLayout,
}

impl MemoryInfoProvider {
    /// `grantor` is used before every kernel query; the memory-list class
    /// is refused without `SeProfileSingleProcessPrivilege`.
    pub fn new(api: Arc<dyn MemoryApi>, grantor: PrivilegeGrantor, source: MemorySource) -> Self {
        Self {
            api,
            grantor,
            source,
            layout: &MEMORY_LIST_LAYOUTS[0],
        }
    }

    /// Use a specific memory-list layout instead of the newest one.
    pub fn with_layout(mut self, layout: &'static MemoryListLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn source(&self) -> MemorySource {
        self.source
    }

    pub fn memory_info(&self) -> Result<MemorySnapshot, QueryError> {
        let snapshot = match self.source {
            MemorySource::PerfCounters => {
                let rows = self.api.perf_memory_counters()?;
                let row = rows.first().ok_or(QueryError::NoData)?;
                MemorySnapshot::new(row.available_bytes, row.standby_bytes())
            }
            MemorySource::Kernel => {
                self.grantor.grant_privileges()?;
                let words = self.api.query_memory_list().map_err(QueryError::Status)?;
                self.layout.decode(&words)?
            }
        };
        debug!(
            "Standby List: {} MB, Free Memory: {} MB",
            snapshot.standby_mb(),
            snapshot.free_mb()
        );
        Ok(snapshot)
    }
}
