//! Application shell: event dispatch, visit routing and load completion.
//!
//! The shell owns the sequential loop and the state it mutates. Content
//! loads run on their own tasks and report back into the same loop.

mod app;
mod events;
mod state;

pub use app::Shell;
pub use events::{Inbound, ShellEvent};
pub use state::{ScreenSummary, ShellSnapshot, ShellState};
