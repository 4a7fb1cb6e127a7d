pub mod cmd_apply;
pub mod cmd_devices;
pub mod cmd_locate;
pub mod cmd_merge;
pub mod cmd_scan;
pub mod common;
pub mod prompt;
