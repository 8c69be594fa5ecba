use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use waypoint_net::{HttpConfigFetcher, HttpContentLoader, build_client};
use waypoint_shell::command::{Command, CommandParser, HELP};
use waypoint_shell::util::{init_tracing, install_panic_hook};
use waypoint_shell::{Inbound, Shell, ShellConfig, ShellEvent, SystemBrowser};

/// How long `state` waits for in-flight loads before giving up on a report.
const REPORT_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "waypoint", version, about = "Server-driven navigation shell")]
struct Cli {
    /// Shell config file (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Environment to connect to.
    #[arg(long)]
    environment: Option<String>,

    /// Base URL for the selected environment.
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    install_panic_hook();

    let cli = Cli::parse();
    let mut config =
        ShellConfig::load(cli.config.as_deref()).context("Failed to load shell config")?;
    if let Some(environment) = &cli.environment {
        config.select_environment(environment);
    }
    if let Some(base_url) = &cli.base_url {
        config.override_base_url(base_url);
    }

    let http = build_client(&config.user_agent, config.fetch_timeout())?;
    let loader =
        Arc::new(HttpContentLoader::new(http.clone()).with_load_timeout(config.load_timeout()));
    let fetcher = Arc::new(HttpConfigFetcher::new(http));

    let mut shell = Shell::new(config.clone(), loader, fetcher, Arc::new(SystemBrowser))?;
    shell.boot().await?;

    let (tx, rx) = mpsc::channel(16);
    let shell_task = tokio::spawn(shell.run(rx));

    print_state(&tx).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match CommandParser::parse(&line, &config) {
            Command::Event(ShellEvent::Shutdown) => {
                let _ = tx.send(ShellEvent::Shutdown.into()).await;
                break;
            }
            Command::Event(event) => {
                if tx.send(event.into()).await.is_err() {
                    break;
                }
                print_state(&tx).await;
            }
            Command::State => print_state(&tx).await,
            Command::Help => println!("{}", HELP),
            Command::Empty => {}
            Command::Invalid(reason) => eprintln!("{}", reason),
        }
    }

    drop(tx);
    shell_task.await.context("Shell task failed")?;
    Ok(())
}

/// Ask the shell for a snapshot once its loads settle and print it.
async fn print_state(tx: &mpsc::Sender<Inbound>) {
    let (reply, rx) = oneshot::channel();
    if tx.send(Inbound::Snapshot(reply)).await.is_err() {
        return;
    }

    match tokio::time::timeout(REPORT_WAIT, rx).await {
        Ok(Ok(snapshot)) => match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => println!("{}", text),
            Err(e) => tracing::warn!(error = %e, "failed to render shell state"),
        },
        Ok(Err(_)) => tracing::debug!("shell stopped before reporting"),
        Err(_) => eprintln!("still loading; try `state` again later"),
    }
}
