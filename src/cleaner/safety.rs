//! Critical process registry
//!
//! Trimming the working set of these processes can stall the desktop or the
//! session, so the trimmer skips them unless explicitly told not to.

use std::collections::HashSet;

/// System processes that are never trimmed by default.
pub const DEFAULT_CRITICAL_PROCESSES: &[&str] = &[
    "csrss.exe",
    "wininit.exe",
    "services.exe",
    "lsass.exe",
    "winlogon.exe",
    "explorer.exe",
    "smss.exe",
    "svchost.exe",
    "System",
    "System Idle Process",
    "conhost.exe",
    "dwm.exe",
    "taskhost.exe",
    "taskhostw.exe",
    "spoolsv.exe",
    "msmpeng.exe",
    "audiodg.exe",
    "fontdrvhost.exe",
    "sihost.exe",
    "dllhost.exe",
    "logonui.exe",
    "lsm.exe",
    "SearchIndexer.exe",
    "SecurityHealthService.exe",
    "ShellExperienceHost.exe",
    "StartMenuExperienceHost.exe",
    "SystemSettings.exe",
    "taskeng.exe",
    "taskhostex.exe",
    "TrustedInstaller.exe",
    "userinit.exe",
    "WmiPrvSE.exe",
    "WUDFHost.exe",
];

/// Immutable set of image names, matched exactly and case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalProcessRegistry {
    names: HashSet<String>,
}

impl CriticalProcessRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// A registry that protects nothing.
    pub fn empty() -> Self {
        Self { names: HashSet::new() }
    }

    /// Check if an image name is critical. No substring or prefix matching.
    pub fn is_critical(&self, image_name: &str) -> bool {
        !image_name.is_empty() && self.names.contains(&image_name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for CriticalProcessRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CRITICAL_PROCESSES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_case_insensitive_match() {
        let registry = CriticalProcessRegistry::default();

        assert!(registry.is_critical("explorer.exe"));
        assert!(registry.is_critical("EXPLORER.EXE"));
        assert!(registry.is_critical("lsass.exe"));
        assert!(registry.is_critical("system"));
        assert!(registry.is_critical("WmiPrvSE.exe"));
        assert!(!registry.is_critical("explorer.exe.bak"));
        assert!(!registry.is_critical("explorer"));
        assert!(!registry.is_critical("notepad.exe"));
        assert!(!registry.is_critical(""));
    }

    #[test]
    fn test_default_contents() {
        let registry = CriticalProcessRegistry::default();
        for name in ["csrss.exe", "wininit.exe", "services.exe", "lsass.exe", "explorer.exe"] {
            assert!(registry.is_critical(name), "{} should be critical", name);
        }
        for name in ["notepad.exe", "calc.exe", "mspaint.exe"] {
            assert!(!registry.is_critical(name), "{} should not be critical", name);
        }
        assert_eq!(registry.len(), DEFAULT_CRITICAL_PROCESSES.len());
    }

    #[test]
    fn test_injected_registry() {
        let registry = CriticalProcessRegistry::new(["Game.exe"]);
        assert!(registry.is_critical("game.EXE"));
        assert!(!registry.is_critical("explorer.exe"));
        assert!(CriticalProcessRegistry::empty().is_empty());
    }
}
