//! Threshold-driven cleanup scheduler
//!
//! Runs two independent loops over one shared [`CleanupState`]:
//!
//! - the pressure loop measures standby vs free memory and cleans when the
//!   ratio is above the threshold and the cooldown has passed
//! - the status loop pushes a fresh status line to the display sink
//!
//! Manual triggers bypass the threshold and cooldown but still stamp the
//! last-cleanup time, so the pressure loop's cooldown accounts for them.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeZone, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::CleanerConfig;
use crate::cleaner::{
    CleanOptions, MemoryInfoProvider, MemorySnapshot, ProcessTrimmer, StandbyListPurger, TrimReport,
};
use crate::error::{CleanError, QueryError};
use crate::monitor::{render_status, StatusSink};
use crate::platform::SystemApi;
use crate::security::{PrivilegeGrantor, PrivilegeSet};

/// Shared cleanup bookkeeping.
///
/// The cooldown runs on a monotonic clock: milliseconds since `origin`,
/// stored atomically by whichever cleanup finishes last. The wall-clock
/// time of the same cleanup is kept for display only. Two cleanups racing
/// on these is accepted: the worst case is one extra or one skipped cleanup.
#[derive(Debug)]
pub struct CleanupState {
    origin: Instant,
    /// Milliseconds after `origin` of the last successful cleanup
    last_cleanup_ms: AtomicU64,
    /// Unix milliseconds of the same cleanup
    last_cleanup_wall_ms: AtomicI64,
    pub percent_threshold: u64,
    pub cooldown: Duration,
}

impl CleanupState {
    const NEVER: u64 = u64::MAX;

    pub fn new(percent_threshold: u64, cooldown: Duration) -> Self {
        Self {
            origin: Instant::now(),
            last_cleanup_ms: AtomicU64::new(Self::NEVER),
            last_cleanup_wall_ms: AtomicI64::new(0),
            percent_threshold,
            cooldown,
        }
    }

    fn millis_since_origin(&self, at: Instant) -> u64 {
        let ms = at.saturating_duration_since(self.origin).as_millis();
        u64::try_from(ms).unwrap_or(Self::NEVER - 1)
    }

    /// Wall-clock time of the last cleanup.
    pub fn last_cleanup(&self) -> Option<DateTime<Utc>> {
        if self.last_cleanup_ms.load(Ordering::Relaxed) == Self::NEVER {
            return None;
        }
        Utc.timestamp_millis_opt(self.last_cleanup_wall_ms.load(Ordering::Relaxed))
            .single()
    }

    pub fn last_cleanup_local(&self) -> Option<DateTime<Local>> {
        self.last_cleanup().map(|at| at.with_timezone(&Local))
    }

    pub fn mark_cleaned(&self, at: Instant) {
        self.mark_cleaned_with_wall(at, Utc::now());
    }

    pub fn mark_cleaned_with_wall(&self, at: Instant, wall: DateTime<Utc>) {
        self.last_cleanup_wall_ms
            .store(wall.timestamp_millis(), Ordering::Relaxed);
        self.last_cleanup_ms
            .store(self.millis_since_origin(at), Ordering::Relaxed);
    }

    /// Time left before the next automatic cleanup is allowed. `None` once
    /// strictly more than `cooldown` has passed.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last_cleanup_ms.load(Ordering::Relaxed);
        if last == Self::NEVER {
            return None;
        }
        let elapsed = Duration::from_millis(self.millis_since_origin(now).saturating_sub(last));
        if elapsed > self.cooldown {
            None
        } else {
            // elapsed == cooldown still waits one more millisecond
            Some((self.cooldown - elapsed).saturating_add(Duration::from_millis(1)))
        }
    }

    /// Instant the monotonic timestamps are measured from.
    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.cooldown_remaining(now).is_none()
    }
}

/// Result of one pressure check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Memory could not be measured; retried next cycle
    QueryFailed(QueryError),
    /// Free memory read as zero, ratio undefined
    NoFreeMemory,
    BelowThreshold { percent: u64 },
    CoolingDown { percent: u64, remaining: Duration },
    Cleaned { percent: u64, trim: Option<TrimReport> },
    CleanFailed { percent: u64, error: CleanError },
}

/// Decision for one measured snapshot, before any cleanup runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Clean { percent: u64 },
    Skip(CycleOutcome),
}

/// Single stop flag shared by every loop.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Sleep for `duration` unless stopped first. Returns `true` if the
    /// signal was set before or during the sleep.
    pub async fn sleep_or_stop(&self, duration: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let stopped = async {
            loop {
                let stopped = *rx.borrow_and_update();
                if stopped || rx.changed().await.is_err() {
                    return;
                }
            }
        };
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_stopped(),
            _ = stopped => true,
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Policy layer over the cleaner components.
#[derive(Clone)]
pub struct CleanupOrchestrator {
    config: Arc<CleanerConfig>,
    provider: MemoryInfoProvider,
    purger: StandbyListPurger,
    trimmer: ProcessTrimmer,
    state: Arc<CleanupState>,
    sink: Arc<dyn StatusSink>,
}

impl CleanupOrchestrator {
    pub fn new<S>(system: Arc<S>, config: CleanerConfig, sink: Arc<dyn StatusSink>) -> Self
    where
        S: SystemApi + 'static,
    {
        let grantor = PrivilegeGrantor::new(system.clone(), PrivilegeSet::memory_purge());
        let query_grantor = PrivilegeGrantor::new(system.clone(), PrivilegeSet::memory_query());
        let provider = MemoryInfoProvider::new(system.clone(), query_grantor, config.memory_source);
        let purger = StandbyListPurger::new(system.clone(), grantor);
        let trimmer = ProcessTrimmer::new(system, config.critical_registry())
            .with_delay(config.trim_delay());
        let state = Arc::new(CleanupState::new(config.percent_threshold, config.cooldown()));

        Self {
            config: Arc::new(config),
            provider,
            purger,
            trimmer,
            state,
            sink,
        }
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<CleanupState> {
        &self.state
    }

    pub fn memory_info(&self) -> Result<MemorySnapshot, QueryError> {
        self.provider.memory_info()
    }

    /// Threshold and cooldown gate for one snapshot.
    pub fn evaluate(&self, snapshot: &MemorySnapshot, now: Instant) -> Decision {
        let percent = match snapshot.standby_percent() {
            Some(p) => p,
            None => return Decision::Skip(CycleOutcome::NoFreeMemory),
        };
        if percent <= self.state.percent_threshold {
            return Decision::Skip(CycleOutcome::BelowThreshold { percent });
        }
        if let Some(remaining) = self.state.cooldown_remaining(now) {
            return Decision::Skip(CycleOutcome::CoolingDown { percent, remaining });
        }
        Decision::Clean { percent }
    }

    /// One pressure check at time `now`. Blocking.
    pub fn pressure_cycle_at(&self, now: Instant) -> CycleOutcome {
        let snapshot = match self.provider.memory_info() {
            Ok(s) => s,
            Err(e) => {
                error!("Error getting memory info: {}", e);
                return CycleOutcome::QueryFailed(e);
            }
        };

        let percent = match self.evaluate(&snapshot, now) {
            Decision::Skip(outcome) => {
                debug!("Skipping cleanup: {:?}", outcome);
                return outcome;
            }
            Decision::Clean { percent } => percent,
        };

        info!(
            "Standby list ({} MB) is {}% of free memory ({} MB), above {}%: cleaning",
            snapshot.standby_mb(),
            percent,
            snapshot.free_mb(),
            self.state.percent_threshold
        );
        match self.run_auto_action(now) {
            Ok(trim) => {
                info!("Automatic cleanup finished");
                CycleOutcome::Cleaned { percent, trim }
            }
            Err(error) => {
                error!("Automatic cleanup failed: {}", error);
                CycleOutcome::CleanFailed { percent, error }
            }
        }
    }

    /// Runs the configured action and stamps `now` after each step that
    /// succeeds, so a purge that worked starts the cooldown even when the
    /// trim after it fails.
    fn run_auto_action(&self, now: Instant) -> Result<Option<TrimReport>, CleanError> {
        let action = self.config.auto_action;
        if action.purges() {
            self.purger.purge_standby_list()?;
            self.state.mark_cleaned(now);
        }
        if action.trims() {
            let report = self.clean_ram(self.config.clean_options())?;
            self.state.mark_cleaned(now);
            return Ok(Some(report));
        }
        Ok(None)
    }

    fn clean_ram(&self, options: CleanOptions) -> Result<TrimReport, CleanError> {
        let report = self.trimmer.trim_all_processes(options)?;
        self.trimmer.trim_current_process()?;
        Ok(report)
    }

    /// Measure once and push the status text to the sink. Blocking.
    pub fn status_cycle(&self) -> Result<MemorySnapshot, QueryError> {
        let snapshot = self.provider.memory_info()?;
        self.sink
            .update_status(&render_status(&snapshot, self.state.last_cleanup_local()));
        Ok(snapshot)
    }

    fn refresh_status_after_manual(&self) {
        if let Err(e) = self.status_cycle() {
            warn!("Status refresh after cleanup failed: {}", e);
        }
    }

    /// Manual standby purge. Ignores threshold and cooldown. Blocking.
    pub fn purge_now(&self) -> Result<(), CleanError> {
        match self.purger.purge_standby_list() {
            Ok(()) => {
                self.state.mark_cleaned(Instant::now());
                self.refresh_status_after_manual();
                Ok(())
            }
            Err(e) => {
                let e = CleanError::from(e);
                self.sink.alert("Error cleaning standby list", &e.to_string());
                Err(e)
            }
        }
    }

    /// Manual RAM clean: trim every process, then this one. Blocking.
    pub fn clean_ram_now(&self, options: CleanOptions) -> Result<TrimReport, CleanError> {
        match self.clean_ram(options) {
            Ok(report) => {
                self.state.mark_cleaned(Instant::now());
                self.refresh_status_after_manual();
                Ok(report)
            }
            Err(e) => {
                self.sink.alert("Error cleaning RAM", &e.to_string());
                Err(e)
            }
        }
    }

    /// Manual trim of every process, without touching this one. Blocking.
    pub fn trim_now(&self, options: CleanOptions) -> Result<TrimReport, CleanError> {
        match self.trimmer.trim_all_processes(options) {
            Ok(report) => {
                self.state.mark_cleaned(Instant::now());
                self.refresh_status_after_manual();
                Ok(report)
            }
            Err(e) => {
                let e = CleanError::from(e);
                self.sink.alert("Error cleaning system memory", &e.to_string());
                Err(e)
            }
        }
    }

    /// [`Self::purge_now`] on the blocking pool.
    pub async fn purge_now_async(&self) -> Result<(), CleanError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.purge_now())
            .await
            .map_err(|e| CleanError::Task(e.to_string()))?
    }

    /// [`Self::trim_now`] on the blocking pool.
    pub async fn trim_now_async(&self, options: CleanOptions) -> Result<TrimReport, CleanError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.trim_now(options))
            .await
            .map_err(|e| CleanError::Task(e.to_string()))?
    }

    /// [`Self::clean_ram_now`] on the blocking pool.
    pub async fn clean_ram_now_async(&self, options: CleanOptions) -> Result<TrimReport, CleanError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.clean_ram_now(options))
            .await
            .map_err(|e| CleanError::Task(e.to_string()))?
    }

    /// Pressure loop: sleep, measure, maybe clean. Runs until `stop` is set.
    pub async fn run_pressure_loop(&self, interval: Duration, stop: StopSignal) {
        info!(
            "Starting pressure loop (interval: {:?}, threshold: {}%, cooldown: {:?})",
            interval, self.state.percent_threshold, self.state.cooldown
        );
        loop {
            if stop.sleep_or_stop(interval).await {
                break;
            }
            let this = self.clone();
            match tokio::task::spawn_blocking(move || this.pressure_cycle_at(Instant::now())).await {
                Ok(outcome) => debug!("Pressure cycle: {:?}", outcome),
                Err(e) => error!("Pressure cycle task failed: {}", e),
            }
        }
        info!("Pressure loop stopped");
    }

    /// Status loop: sleep, measure, push status. Never cleans.
    pub async fn run_status_loop(&self, interval: Duration, stop: StopSignal) {
        info!("Starting status loop (interval: {:?})", interval);
        loop {
            if stop.sleep_or_stop(interval).await {
                break;
            }
            let this = self.clone();
            match tokio::task::spawn_blocking(move || this.status_cycle()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Can't get standby list and free RAM size: {}", e),
                Err(e) => error!("Status task failed: {}", e),
            }
        }
        info!("Status loop stopped");
    }

    /// Spawn both loops with the configured intervals.
    pub fn spawn(&self, stop: &StopSignal) -> (JoinHandle<()>, JoinHandle<()>) {
        let pressure = {
            let this = self.clone();
            let stop = stop.clone();
            let interval = self.config.pressure_interval();
            tokio::spawn(async move { this.run_pressure_loop(interval, stop).await })
        };
        let status = {
            let this = self.clone();
            let stop = stop.clone();
            let interval = self.config.status_interval();
            tokio::spawn(async move { this.run_status_loop(interval, stop).await })
        };
        (pressure, status)
    }
}
