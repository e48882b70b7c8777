//! Interactive fleet dashboard.
//!
//! Polls the crew backend and prints the grouped fleet to stdout.
//! Operator commands are read from stdin, one per line; `help` lists
//! them.

use std::io;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crew_monitor::api_client::Client;
use crew_monitor::api_client::types::MinerId;
use crew_monitor::commands::DashboardHandle;
use crew_monitor::config::DashboardConfig;
use crew_monitor::dispatch::{UpdateCommand, UpdateScope};
use crew_monitor::poller::Poller;
use crew_monitor::render::TextRenderer;
use crew_monitor::tracing::{init_journald_or_stderr, prelude::*};

const HELP: &str = "\
commands:
  select <id>              inspect one miner
  deselect
  refresh                  poll now
  auto on|off              periodic polling
  update <miner|group|all> [restart]
  test                     run the rules under test on the selection
  reload                   reload the active rules
  quit";

#[tokio::main]
async fn main() -> Result<()> {
    init_journald_or_stderr();

    let config = DashboardConfig::from_env()?;
    let client = Client::from_config(&config)?;
    info!(
        url = client.base_url(),
        auto_refresh = config.auto_refresh,
        interval = ?config.poll_interval,
        "Starting crew monitor"
    );

    let (poller, handle) = Poller::new(&config, Arc::new(client), TextRenderer::new(io::stdout()));
    let shutdown = CancellationToken::new();
    let dashboard = tokio::spawn(poller.run(shutdown.clone()));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {e}");
            }
        }
        () = read_commands(&handle) => {}
    }

    info!("Shutting down");
    shutdown.cancel();
    dashboard.await?;
    Ok(())
}

/// Forward stdin lines to the dashboard until `quit`. At end of input the
/// dashboard keeps running until interrupted.
async fn read_commands(handle: &DashboardHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("End of operator input");
                return std::future::pending().await;
            }
            Err(e) => {
                warn!("Failed to read operator input: {e}");
                return std::future::pending().await;
            }
        };

        let words: Vec<&str> = line.split_whitespace().collect();
        if words.first() == Some(&"quit") {
            return;
        }
        if let Err(message) = dispatch(handle, &words).await {
            eprintln!("{message}");
        }
    }
}

async fn dispatch(handle: &DashboardHandle, words: &[&str]) -> Result<(), String> {
    let result = match words {
        [] => return Ok(()),
        ["help"] => {
            eprintln!("{HELP}");
            return Ok(());
        }
        ["select", id] => {
            let id: MinerId = id.parse().map_err(|e| format!("invalid miner id {id:?}: {e}"))?;
            handle.select(id).await
        }
        ["deselect"] => handle.deselect().await,
        ["refresh"] => handle.refresh().await,
        ["auto", "on"] => handle.set_auto_refresh(true).await,
        ["auto", "off"] => handle.set_auto_refresh(false).await,
        ["update", scope, rest @ ..] => {
            let scope: UpdateScope = scope.parse()?;
            let restart = match rest {
                [] => false,
                ["restart"] => true,
                _ => return Err("usage: update <miner|group|all> [restart]".into()),
            };
            handle.update(UpdateCommand { scope, restart }).await
        }
        ["test"] => handle.run_test().await,
        ["reload"] => handle.reload().await,
        _ => return Err(format!("unknown command {:?}; try help", words.join(" "))),
    };

    result.map_err(|e| e.to_string())
}
