//! Waypoint shell library target.
//!
//! The binary entry point is in `main.rs`; the shell, its configuration and
//! the command parser live here so `tests/mod.rs` can drive them.

pub mod command;
pub mod config;
pub mod external;
pub mod shell;
pub mod util;

pub use config::{ConfigError, ShellConfig, SourceOrder};
pub use external::{ExternalOpener, SystemBrowser, is_managed};
pub use shell::{Inbound, Shell, ShellEvent, ShellSnapshot};
