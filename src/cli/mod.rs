//! Handles the interactive command shell.
//!
//! Includes the command grammar (`commands`), the command handler holding the
//! selected course (`handler`), table output (`render`), upload progress
//! display (`progress`) and the prompt loop (`shell`).

mod commands;
mod handler;
mod progress;
mod render;
mod shell;

pub use commands::Cli;
pub use handler::App;
pub use shell::{execute_line, run_shell};
