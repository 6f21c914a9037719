mod api;
mod cli;
mod config;
mod error;
mod export;
mod grades;
mod logging;
mod models;

use anyhow::Context;
use clap::Parser;
use cli::{App, Cli};
use colored::*;
use config::Config;
use logging::LogSettings;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // .env may carry the logging variables too
    dotenv::dotenv().ok();
    let _log_guard =
        logging::init_tracing(&LogSettings::from_env()).context("Failed to initialize logging")?;

    let config = Config::from_env()
        .context("Failed to load configuration (CANVAS_BASE_URL and CANVAS_TOKEN are required)")?;
    let mut app = App::from_config(&config).context("Failed to create the Canvas client")?;
    info!("Connected to {}", config.base_url);

    if let Some(course_id) = args.course {
        app.select_course(Some(course_id))
            .await
            .with_context(|| format!("Failed to select course {}", course_id))?;
    }

    if let Some(line) = args.command {
        cli::execute_line(&mut app, &line)
            .await
            .with_context(|| format!("Command failed: {}", line))?;
        return Ok(());
    }

    println!("{}", "Welcome to the Canvas LMS shell!".cyan().bold());
    println!("Type 'help' for the list of commands, 'exit' to leave.");
    cli::run_shell(&mut app).await?;

    Ok(())
}
