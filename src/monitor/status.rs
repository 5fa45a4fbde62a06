//! Status text for the tray tooltip / status bar

use chrono::{DateTime, Local};
use tracing::{error, info};

use crate::cleaner::MemorySnapshot;

/// Receives status text and failure alerts from the cleaner.
///
/// A tray icon implements this by setting its tooltip and showing a
/// message box; the cleaner only ever hands it plain text.
pub trait StatusSink: Send + Sync {
    fn update_status(&self, text: &str);
    fn alert(&self, title: &str, message: &str);
}

/// `"FreeRAM: <N> MB\nStandby List: <N> MB"`
pub fn format_status(snapshot: &MemorySnapshot) -> String {
    format!(
        "FreeRAM: {} MB\nStandby List: {} MB",
        snapshot.free_mb(),
        snapshot.standby_mb()
    )
}

/// Status text plus the time of the last cleanup.
pub fn render_status(snapshot: &MemorySnapshot, last_cleanup: Option<DateTime<Local>>) -> String {
    let last = match last_cleanup {
        Some(at) => at.format("%H:%M:%S").to_string(),
        None => "never".to_string(),
    };
    format!("{}\nLast Cleanup: {}", format_status(snapshot), last)
}

/// Sink that writes everything to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn update_status(&self, text: &str) {
        info!("{}", text.replace('\n', ", "));
    }

    fn alert(&self, title: &str, message: &str) {
        error!("{}: {}", title, message);
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::StatusSink;
    use std::sync::Mutex;

    /// Sink that keeps everything it receives.
    #[derive(Default)]
    pub struct RecordingSink {
        pub statuses: Mutex<Vec<String>>,
        pub alerts: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        pub fn status_count(&self) -> usize {
            self.statuses.lock().unwrap().len()
        }

        pub fn alert_count(&self) -> usize {
            self.alerts.lock().unwrap().len()
        }
    }

    impl StatusSink for RecordingSink {
        fn update_status(&self, text: &str) {
            self.statuses.lock().unwrap().push(text.to_string());
        }

        fn alert(&self, title: &str, message: &str) {
            self.alerts.lock().unwrap().push((title.to_string(), message.to_string()));
        }
    }
}
