//! Command implementations for drift-cli

pub mod directory;
pub mod maintenance;
mod output;
pub mod report;
pub mod scan;

pub use directory::{run_list, run_register, run_unregister};
pub use maintenance::{run_gc, run_purge};
pub use report::{run_compare, run_diff, run_export, run_history, run_status};
pub use scan::{run_scan, run_scan_all};
