//! Status reporting for the display collaborator

pub mod status;

pub use status::{format_status, render_status, LogStatusSink, StatusSink};
