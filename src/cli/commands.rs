//! Command execution
//!
//! Opens the ledger in the data directory, builds the engine and runs one
//! subcommand. JSON and CSV are written to the given output; logs go through
//! `tracing`.
//!
//! The ledger directory is locked by whichever process opens it. A running
//! `watch --requests` therefore also answers ledger commands read line by
//! line from stdin, so they share its engine instead of contending for the
//! lock. `replay` never opens the data directory.

use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chain::{ChainError, ChainScript, ChainSource, JsonRpcChain, ScriptedChain};
use crate::cli::args::{CliArgs, Command, WatchArgs};
use crate::core::{CatalogLoadError, MemoryCatalog, SledLedger, TransferEngine};
use crate::io::{write_accounts_csv, write_transfers_csv};
use crate::replay::{replay, ReplayError};
use crate::types::LedgerError;
use crate::watcher::ChainWatcher;

/// Failure of a CLI command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Catalog(#[from] CatalogLoadError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("Failed to read requests: {0}")]
    Input(String),

    #[error("Watcher task failed: {0}")]
    Task(String),

    #[error("Failed to write output: {0}")]
    Output(String),
}

/// One ledger command read from a request line
#[derive(Parser, Debug)]
#[command(name = "request", no_binary_name = true)]
struct RequestLine {
    #[command(subcommand)]
    command: Command,
}

/// Run the parsed command, writing its result to `output`
pub async fn execute(args: &CliArgs, output: &mut dyn Write) -> Result<(), CommandError> {
    let catalog = Arc::new(match &args.offers {
        Some(path) => MemoryCatalog::from_json_file(path)?,
        None => MemoryCatalog::seeded(),
    });

    // A dry run: the persistent ledger is neither opened nor locked.
    if let Command::Replay {
        script,
        spends,
        receiving_address,
    } = &args.command
    {
        let engine = TransferEngine::new(Arc::new(SledLedger::temporary()?), catalog);
        let script = ChainScript::from_json_file(script)?;
        replay(
            &engine,
            script,
            receiving_address.as_deref(),
            spends.as_deref(),
            output,
        )
        .await?;
        return Ok(());
    }

    let store = Arc::new(SledLedger::open(&args.data_dir)?);
    let engine = TransferEngine::new(store.clone(), catalog);

    let result = match &args.command {
        Command::Watch(watch) => run_watcher(&engine, watch, output).await,
        command => run_request(&engine, command, output),
    };
    store.flush()?;
    result
}

/// Run a single ledger command
///
/// `watch` and `replay` are long-running and only start from the command line.
fn run_request(
    engine: &TransferEngine,
    command: &Command,
    output: &mut dyn Write,
) -> Result<(), CommandError> {
    match command {
        Command::Watch(_) | Command::Replay { .. } => Err(CommandError::Input(
            "watch and replay cannot be issued as requests".to_string(),
        )),
        Command::Balance { wallet } => {
            let balance = engine.balance(wallet)?;
            write_json(output, &json!({ "wallet": wallet, "balance": balance }))
        }
        Command::Credit {
            wallet,
            amount,
            token,
        } => write_json(output, &engine.credit(wallet, *amount, token)?),
        Command::Spend { renter, provider } => {
            write_json(output, &engine.spend(renter, provider)?)
        }
        Command::Overview => write_json(output, &engine.overview()?),
        Command::Cursor => write_json(output, &json!({ "cursor": engine.current_cursor()? })),
        Command::Offers => write_json(output, &engine.online_offers()),
        Command::Transfers { limit } => {
            write_transfers_csv(&engine.recent_transfers(*limit)?, output)
                .map_err(CommandError::Output)
        }
        Command::Accounts => {
            write_accounts_csv(&engine.accounts()?, output).map_err(CommandError::Output)
        }
        Command::Activity { limit } => write_json(output, &engine.recent_activity(*limit)?),
        Command::Ban { wallet } => set_banned(engine, wallet, true, output),
        Command::Unban { wallet } => set_banned(engine, wallet, false, output),
    }
}

/// Parse a request line such as `balance 0xabc` into a ledger command
fn parse_request(line: &str) -> Result<Command, String> {
    let request =
        RequestLine::try_parse_from(line.split_whitespace()).map_err(|e| e.to_string())?;
    match request.command {
        Command::Watch(_) | Command::Replay { .. } => {
            Err("watch and replay cannot be issued as requests".to_string())
        }
        command => Ok(command),
    }
}

/// Answer request lines from `reader` until it closes or `cancel` fires
///
/// A failed request is reported as `{"error": ...}` and does not end the loop.
async fn serve_requests<R>(
    engine: &TransferEngine,
    reader: R,
    output: &mut dyn Write,
    cancel: &CancellationToken,
) -> Result<(), CommandError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.map_err(|e| CommandError::Input(e.to_string()))?,
        };
        let Some(line) = line else {
            debug!("request input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let result = parse_request(&line)
            .map_err(CommandError::Input)
            .and_then(|command| run_request(engine, &command, output));
        if let Err(e) = result {
            warn!(request = %line.trim(), error = %e, "request failed");
            write_json(output, &json!({ "error": e.to_string() }))?;
        }
        output
            .flush()
            .map_err(|e| CommandError::Output(e.to_string()))?;
    }
    Ok(())
}

fn set_banned(
    engine: &TransferEngine,
    wallet: &str,
    banned: bool,
    output: &mut dyn Write,
) -> Result<(), CommandError> {
    engine.set_banned(wallet, banned)?;
    write_json(output, &json!({ "wallet": wallet, "banned": banned }))
}

async fn run_watcher(
    engine: &TransferEngine,
    watch: &WatchArgs,
    output: &mut dyn Write,
) -> Result<(), CommandError> {
    let config = watch.to_watcher_config();
    let chain: Arc<dyn ChainSource> = match &watch.script {
        Some(path) => Arc::new(load_script(path)?),
        None => Arc::new(JsonRpcChain::new(&watch.rpc_url, config.fetch_timeout)?),
    };

    let watcher = ChainWatcher::new(engine.clone(), chain, &watch.receiving_address, config);
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    });

    info!(receiving_address = %watch.receiving_address, "watcher starting");
    if !watch.requests {
        watcher.run(cancel).await;
        return Ok(());
    }

    let task = tokio::spawn(watcher.run(cancel.clone()));
    info!("answering requests from stdin");
    // Closing stdin stops the requests; the watcher runs until interrupted.
    let served = serve_requests(engine, BufReader::new(tokio::io::stdin()), output, &cancel).await;
    if served.is_err() {
        cancel.cancel();
    }
    task.await.map_err(|e| CommandError::Task(e.to_string()))?;
    served
}

fn load_script(path: &Path) -> Result<ScriptedChain, CommandError> {
    Ok(ScriptedChain::from_script(ChainScript::from_json_file(path)?))
}

fn write_json<T: Serialize + ?Sized>(output: &mut dyn Write, value: &T) -> Result<(), CommandError> {
    serde_json::to_writer_pretty(&mut *output, value)
        .map_err(|e| CommandError::Output(e.to_string()))?;
    writeln!(output).map_err(|e| CommandError::Output(e.to_string()))
}
