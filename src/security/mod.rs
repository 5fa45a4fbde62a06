//! Token privileges and elevation

pub mod elevation;
pub mod privileges;

pub use elevation::{is_elevated, relaunch_elevated};
pub use privileges::{PrivilegeGrantor, PrivilegeSet};
