//! Working set trimming across running processes

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::safety::CriticalProcessRegistry;
use crate::error::{EnumerationError, TrimError};
use crate::platform::ProcessApi;

/// Default pause between two trims.
pub const DEFAULT_TRIM_DELAY: Duration = Duration::from_millis(10);

/// Per-invocation cleaning options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanOptions {
    /// Trim critical system processes too
    pub ignore_critical: bool,
}

impl CleanOptions {
    pub fn force() -> Self {
        Self { ignore_critical: true }
    }
}

/// What one trim pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimReport {
    pub trimmed: usize,
    pub skipped_critical: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl TrimReport {
    pub fn attempted(&self) -> usize {
        self.trimmed + self.failed
    }
}

/// Empties working sets of every non-critical process.
#[derive(Clone)]
pub struct ProcessTrimmer {
    api: Arc<dyn ProcessApi>,
    critical: Arc<CriticalProcessRegistry>,
    delay: Duration,
}

impl ProcessTrimmer {
    pub fn new(api: Arc<dyn ProcessApi>, critical: CriticalProcessRegistry) -> Self {
        Self {
            api,
            critical: Arc::new(critical),
            delay: DEFAULT_TRIM_DELAY,
        }
    }

    /// Pause between two trims so evictions are spread out.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn critical(&self) -> &CriticalProcessRegistry {
        &self.critical
    }

    /// Trim every process in a fresh snapshot.
    ///
    /// Only a failed snapshot is an error. A process that cannot be opened
    /// or trimmed is counted in `failed` and skipped.
    pub fn trim_all_processes(&self, options: CleanOptions) -> Result<TrimReport, EnumerationError> {
        let start = Instant::now();
        let processes = self.api.process_snapshot()?;
        let mut report = TrimReport::default();

        for process in &processes {
            if !options.ignore_critical && self.critical.is_critical(&process.image_name) {
                report.skipped_critical += 1;
                continue;
            }

            match self.api.empty_working_set(process.pid) {
                Ok(()) => report.trimmed += 1,
                Err(source) => {
                    let err = TrimError::Process { pid: process.pid, source };
                    debug!("Skipping {}: {}", process.image_name, err);
                    report.failed += 1;
                }
            }

            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Trimmed {} processes ({} critical skipped, {} failed) in {}ms",
            report.trimmed, report.skipped_critical, report.failed, report.duration_ms
        );
        Ok(report)
    }

    /// Shrink this process's own working set right away.
    pub fn trim_current_process(&self) -> Result<(), TrimError> {
        // (MAX, MAX) asks the memory manager to remove as many pages as it can
        self.api
            .set_own_working_set_size(usize::MAX, usize::MAX)
            .map_err(TrimError::SetWorkingSetSize)?;
        self.api
            .empty_own_working_set()
            .map_err(TrimError::EmptyWorkingSet)?;
        Ok(())
    }
}
