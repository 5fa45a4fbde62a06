//! Token privilege management
//!
//! Purging the standby list needs three privileges enabled on the process
//! token. They are enabled once and stay enabled for the lifetime of the
//! process; nothing here ever revokes them.

use std::sync::Arc;
use tracing::debug;

use crate::error::PrivilegeError;
use crate::platform::TokenApi;

/// Profile a single process; required by the memory-list information class.
pub const SE_PROFILE_SINGLE_PROCESS: &str = "SeProfileSingleProcessPrivilege";
/// Adjust memory quotas of a process.
pub const SE_INCREASE_QUOTA: &str = "SeIncreaseQuotaPrivilege";
/// Open any process regardless of its security descriptor.
pub const SE_DEBUG: &str = "SeDebugPrivilege";

/// Ordered list of privileges to enable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeSet {
    names: Vec<&'static str>,
}

impl PrivilegeSet {
    pub fn new(names: Vec<&'static str>) -> Self {
        Self { names }
    }

    /// The privileges a standby list purge needs.
    pub fn memory_purge() -> Self {
        Self::new(vec![SE_PROFILE_SINGLE_PROCESS, SE_INCREASE_QUOTA, SE_DEBUG])
    }

    /// The privilege a kernel memory-list query needs.
    pub fn memory_query() -> Self {
        Self::new(vec![SE_PROFILE_SINGLE_PROCESS])
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }
}

impl Default for PrivilegeSet {
    fn default() -> Self {
        Self::memory_purge()
    }
}

/// Enables a [`PrivilegeSet`] on the current process token.
#[derive(Clone)]
pub struct PrivilegeGrantor {
    token: Arc<dyn TokenApi>,
    privileges: PrivilegeSet,
}

impl PrivilegeGrantor {
    pub fn new(token: Arc<dyn TokenApi>, privileges: PrivilegeSet) -> Self {
        Self { token, privileges }
    }

    /// Enable every privilege in order, stopping at the first failure.
    ///
    /// Privileges enabled before the failing one stay enabled. Calling this
    /// again is harmless.
    pub fn grant_privileges(&self) -> Result<(), PrivilegeError> {
        for name in self.privileges.names() {
            self.token
                .enable_privilege(name)
                .map_err(|(step, source)| PrivilegeError {
                    privilege: (*name).to_string(),
                    step,
                    source,
                })?;
            debug!("Enabled privilege: {}", name);
        }
        Ok(())
    }

    pub fn privileges(&self) -> &PrivilegeSet {
        &self.privileges
    }
}
