//! One-shot command-line client for the crew backend.
//!
//! Each invocation performs a single request and prints the result,
//! using the same classification and text layout as the dashboard.

use std::env;
use std::io;

use anyhow::{Context, Result, anyhow, bail};

use crew_monitor::api_client::types::{MinerId, PathKind};
use crew_monitor::api_client::{Backend, Client};
use crew_monitor::classify::{classify, delta_rows, format_serial};
use crew_monitor::config::{DashboardConfig, ENV_API_URL, DEFAULT_API_URL};
use crew_monitor::dispatch::{TestOutcome, UpdateRequest, UpdateTarget, reload_alert};
use crew_monitor::render::{DetailView, FleetView, Renderer, TestView, TextRenderer};
use crew_monitor::store::MinerStore;

fn usage() -> ! {
    eprintln!("Usage: crew-cli <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                      Show the fleet, grouped by convergence");
    eprintln!("  miner <id>                  Show one miner's pending delta");
    eprintln!("  update all [restart]        Push configuration to every miner");
    eprintln!("  update group <hash> [restart]");
    eprintln!("                              Push to every miner sharing a delta");
    eprintln!("  update miner <id> [restart] Push to one miner");
    eprintln!("  run <id>                    Evaluate the rules under test");
    eprintln!("  reload                      Reload the active rules");
    eprintln!("  path <active|test>          Show where a rules file lives");
    eprintln!("  rules <active|test>         Print a rules file");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {ENV_API_URL}    API base URL (default: {DEFAULT_API_URL})");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        usage();
    };

    let config = DashboardConfig::from_env()?;
    let client = Client::from_config(&config)?;

    match command.as_str() {
        "status" => cmd_status(&client).await,
        "miner" => cmd_miner(&client, parse_id(rest.first())?).await,
        "update" => cmd_update(&client, parse_update(rest)?).await,
        "run" => cmd_run(&client, parse_id(rest.first())?).await,
        "reload" => cmd_reload(&client).await,
        "path" => cmd_path(&client, parse_kind(rest.first())?).await,
        "rules" => cmd_rules(&client, parse_kind(rest.first())?).await,
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }
}

fn parse_id(arg: Option<&String>) -> Result<MinerId> {
    let arg = arg.ok_or_else(|| anyhow!("missing miner id"))?;
    arg.parse::<MinerId>()
        .with_context(|| format!("invalid miner id {arg:?}"))
}

fn parse_kind(arg: Option<&String>) -> Result<PathKind> {
    let arg = arg.ok_or_else(|| anyhow!("missing rules kind (active or test)"))?;
    arg.parse().map_err(|e| anyhow!("{e}"))
}

fn parse_update(args: &[String]) -> Result<UpdateRequest> {
    let restart = args.last().is_some_and(|arg| arg == "restart");
    let args = if restart { &args[..args.len() - 1] } else { args };

    let target = match args {
        [scope] if scope == "all" => UpdateTarget::All,
        [scope, hash] if scope == "group" => UpdateTarget::Group(hash.clone()),
        [scope, id] if scope == "miner" => UpdateTarget::Miner(parse_id(Some(id))?),
        _ => bail!("expected: update all | update group <hash> | update miner <id> [restart]"),
    };

    Ok(UpdateRequest { target, restart })
}

async fn cmd_status(client: &Client) -> Result<()> {
    let mut store = MinerStore::new();
    store.replace(client.miners().await?);
    let groups = classify(store.iter());

    let mut out = TextRenderer::new(io::stdout());
    if store.is_empty() {
        out.fleet(&FleetView::Waiting);
    } else {
        out.fleet(&FleetView::Groups {
            groups: &groups,
            store: &store,
        });
    }
    Ok(())
}

async fn cmd_miner(client: &Client, id: MinerId) -> Result<()> {
    let detail = client.miner(id).await?;
    let rows = delta_rows(&detail.delta);
    let serial = format_serial(&detail.serial);

    if let Some(name) = &detail.name {
        println!("Name: {name}");
    }
    if let Some(hash) = &detail.delta_hash {
        println!("Delta: {hash}");
    }
    TextRenderer::new(io::stdout()).detail(&DetailView::Loaded {
        miner: id,
        serial: serial.as_deref(),
        script_error: None,
        rows: &rows,
    });
    Ok(())
}

async fn cmd_update(client: &Client, request: UpdateRequest) -> Result<()> {
    client.update(&request).await?;
    println!("Update of {request} accepted");
    Ok(())
}

async fn cmd_run(client: &Client, id: MinerId) -> Result<()> {
    let outcome = TestOutcome::from_result(client.run(id).await);
    TextRenderer::new(io::stdout()).test_result(&TestView::Done(&outcome));
    Ok(())
}

async fn cmd_reload(client: &Client) -> Result<()> {
    match reload_alert(client.reload().await) {
        Some(message) => bail!("{message}"),
        None => {
            println!("Active rules reloaded");
            Ok(())
        }
    }
}

async fn cmd_path(client: &Client, kind: PathKind) -> Result<()> {
    println!("{}", client.path(kind).await?.trim());
    Ok(())
}

async fn cmd_rules(client: &Client, kind: PathKind) -> Result<()> {
    let path = client.path(kind).await?;
    let rules = client
        .rules(&path)
        .await
        .with_context(|| format!("failed to fetch {kind} rules from {}", path.trim()))?;
    print!("{rules}");
    Ok(())
}
