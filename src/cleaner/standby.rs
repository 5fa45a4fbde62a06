//! Standby list purge

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::PurgeError;
use crate::platform::MemoryApi;
use crate::security::PrivilegeGrantor;

/// `SYSTEM_MEMORY_LIST_COMMAND::MemoryPurgeStandbyList`
pub const MEMORY_PURGE_STANDBY_LIST: u32 = 4;

/// Asks the kernel to drop the standby page list.
#[derive(Clone)]
pub struct StandbyListPurger {
    api: Arc<dyn MemoryApi>,
    grantor: PrivilegeGrantor,
}

impl StandbyListPurger {
    pub fn new(api: Arc<dyn MemoryApi>, grantor: PrivilegeGrantor) -> Self {
        Self { api, grantor }
    }

    /// Enable the required privileges, then issue the purge command.
    ///
    /// A privilege failure returns before the kernel is called. Success
    /// means the request was accepted, not that memory was freed.
    pub fn purge_standby_list(&self) -> Result<(), PurgeError> {
        self.grantor.grant_privileges()?;
        debug!("All privileges enabled successfully");

        let status = self.api.set_memory_list_command(MEMORY_PURGE_STANDBY_LIST);
        if status != 0 {
            return Err(PurgeError::Rejected(status));
        }
        info!("Standby list purge accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockSystem;
    use crate::platform::PrivilegeStep;
    use crate::security::privileges::{PrivilegeSet, SE_DEBUG};

    fn purger(system: &Arc<MockSystem>) -> StandbyListPurger {
        let grantor = PrivilegeGrantor::new(system.clone(), PrivilegeSet::memory_purge());
        StandbyListPurger::new(system.clone(), grantor)
    }

    #[test]
    fn test_purge_sends_command_after_privileges() {
        let system = Arc::new(MockSystem::new());

        purger(&system).purge_standby_list().unwrap();

        assert_eq!(system.privileges().len(), 3);
        assert_eq!(system.purge_count(), 1);
        assert_eq!(*system.purge_commands.lock().unwrap(), vec![MEMORY_PURGE_STANDBY_LIST]);
    }

    #[test]
    fn test_privilege_failure_skips_kernel_call() {
        let system = Arc::new(MockSystem::new().fail_privilege(SE_DEBUG, PrivilegeStep::Lookup));

        let err = purger(&system).purge_standby_list().unwrap_err();

        match err {
            PurgeError::Privilege(e) => assert_eq!(e.privilege, SE_DEBUG),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(system.purge_count(), 0);
    }

    #[test]
    fn test_rejected_status() {
        // STATUS_PRIVILEGE_NOT_HELD
        let status = 0xC000_0061_u32 as i32;
        let system = Arc::new(MockSystem::new().with_purge_status(status));

        let err = purger(&system).purge_standby_list().unwrap_err();

        assert_eq!(err, PurgeError::Rejected(status));
        assert_eq!(system.purge_count(), 1);
    }
}
