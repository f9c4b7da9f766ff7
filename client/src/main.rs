// main.rs

mod client;
mod console;
mod error;
mod menu;
mod running;
mod target;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tokio::io::BufReader;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::{client::ChatClient, console::Console, menu::Menu, target::ConnectionTarget};

#[derive(Parser)]
#[command(name = "dialup-chat", version, about = "Line-oriented chat client")]
struct Cli {
    /// Skip the menu and connect straight away
    #[arg(long, value_name = "HOST:PORT")]
    connect: Option<ConnectionTarget>,

    /// Diagnostic log filter, written to stderr
    #[arg(long, value_name = "FILTER", default_value = "warn")]
    log_level: String,

    /// Print everything without colors
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).context("invalid --log-level filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let console = Console::stdout();
    let input = BufReader::new(tokio::io::stdin());

    let outcome = match cli.connect {
        Some(target) => {
            let mut client = ChatClient::new(target, input, console);
            let outcome = client.start().await;
            debug!(state = ?client.state(), "client finished");
            outcome
        }
        None => Menu::new(input, console).run().await,
    };

    // the user has already seen the message; only the exit status is left
    Ok(match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = ?e, "exiting after failed connect");
            ExitCode::FAILURE
        }
    })
}
