//! The read-eval loop behind the `canvas>` prompt.

use crate::api::LmsApi;
use crate::cli::commands::parse_line;
use crate::cli::handler::{App, Flow};
use crate::error::{AppError, Result};
use colored::*;
use dialoguer::theme::Theme;
use dialoguer::Input;
use std::fmt;
use tracing::{debug, error};

/// Prints the prompt verbatim (`canvas> `) instead of dialoguer's `prompt: `.
struct ShellTheme;

impl Theme for ShellTheme {
    fn format_input_prompt(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        _default: Option<&str>,
    ) -> fmt::Result {
        write!(f, "{}", prompt.bold())
    }

    fn format_input_prompt_selection(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        sel: &str,
    ) -> fmt::Result {
        write!(f, "{}{}", prompt.bold(), sel)
    }
}

/// Parse and run one line. Blank lines and `--help` output are not errors.
pub async fn execute_line<A: LmsApi>(app: &mut App<A>, line: &str) -> Result<Flow> {
    if line.trim().is_empty() {
        return Ok(Flow::Continue);
    }
    match parse_line(line)? {
        Ok(command) => {
            debug!("Running {:?}", command);
            app.run(command).await
        },
        Err(e) if e.use_stderr() => Err(AppError::Cli(e.to_string())),
        Err(e) => {
            let _ = e.print();
            Ok(Flow::Continue)
        },
    }
}

/// Read commands until `exit`, end of input or Ctrl+C.
pub async fn run_shell<A: LmsApi>(app: &mut App<A>) -> Result<()> {
    loop {
        let line = match Input::<String>::with_theme(&ShellTheme)
            .with_prompt(app.prompt())
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(e) => {
                debug!("Input closed: {}", e);
                break;
            },
        };

        match execute_line(app, &line).await {
            Ok(Flow::Exit) => break,
            Ok(Flow::Continue) => {},
            Err(e) => {
                error!("Command failed: {:?}", e);
                println!("{} {}", "Error:".red(), e.to_string().red());
            },
        }
    }

    println!("{}", "Goodbye!".green());
    Ok(())
}
