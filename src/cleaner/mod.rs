//! Memory cleaning components with safety exclusions

pub mod memory;
pub mod process;
pub mod safety;
pub mod standby;

pub use memory::{MemoryInfoProvider, MemorySnapshot, MemorySource, MIB, PAGE_SIZE};
pub use process::{CleanOptions, ProcessTrimmer, TrimReport};
pub use safety::CriticalProcessRegistry;
pub use standby::StandbyListPurger;
