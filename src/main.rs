// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use enginehost::gateway::{CompletionGateway, EngineCommand};
use enginehost::wire::QueryContext;
use enginehost::HostConfig;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "enginehost",
    about = "Supervisor and authenticated client for a local code-intelligence engine",
    version
)]
struct Args {
    /// Path to the engine binary
    #[arg(long, env = "ENGINEHOST_ENGINE")]
    engine_binary: Option<PathBuf>,

    /// Extra source directory for the engine to index
    #[arg(long, env = "ENGINEHOST_SOURCE_PATH")]
    source_path: Option<PathBuf>,

    /// Keep engine log files after the server stops
    #[arg(long)]
    keep_logfiles: bool,

    /// TOML config file (flags override file values)
    #[arg(long, env = "ENGINEHOST_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error)
    #[arg(long, env = "ENGINEHOST_LOG", default_value = "info")]
    log: String,

    /// Seconds to wait for the engine to become ready
    #[arg(long, default_value_t = 30)]
    ready_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List completion candidates at a cursor position.
    ///
    /// The file's on-disk contents are sent as the request buffer.
    ///
    /// Example:
    ///   enginehost --engine-binary ./engine complete src/main.rs --line 10 --column 4
    Complete {
        file: PathBuf,
        /// 1-based line
        #[arg(long)]
        line: u32,
        /// 1-based column
        #[arg(long)]
        column: u32,
    },
    /// Jump to the definition of the symbol under the cursor.
    Definition {
        file: PathBuf,
        /// 1-based line
        #[arg(long)]
        line: u32,
        /// 1-based column
        #[arg(long)]
        column: u32,
    },
    /// Run a named engine subcommand (GoTo, GoToDefinition, GoToDeclaration,
    /// StopServer, RestartServer).
    Run {
        name: String,
        /// File context for navigation commands
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        line: u32,
        #[arg(long, default_value_t = 1)]
        column: u32,
    },
    /// Start the engine and print a status snapshot.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&args.log))
        .compact()
        .init();

    let mut config = match args.config {
        Some(ref path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    if args.engine_binary.is_some() {
        config.engine_binary = args.engine_binary.clone();
    }
    if args.source_path.is_some() {
        config.source_path = args.source_path.clone();
    }
    config.keep_logfiles |= args.keep_logfiles;

    let gateway = CompletionGateway::start(&config).await?;
    let outcome = run(&gateway, &args).await;

    // Tear the engine down even when the operation failed.
    if let Err(e) = gateway.shutdown().await {
        tracing::warn!("shutdown failed: {e}");
    }
    outcome
}

async fn run(gateway: &CompletionGateway, args: &Args) -> Result<()> {
    match &args.command {
        Command::Complete { file, line, column } => {
            wait_ready(gateway, args.ready_timeout).await?;
            let ctx = context_from_file(file, *line, *column)?;
            let candidates = gateway.fetch_completions(&ctx).await?;
            println!("{}", serde_json::to_string_pretty(&candidates)?);
        }
        Command::Definition { file, line, column } => {
            wait_ready(gateway, args.ready_timeout).await?;
            let ctx = context_from_file(file, *line, *column)?;
            let location = gateway.go_to_definition(&ctx).await?;
            println!("{}", serde_json::to_string_pretty(&location)?);
        }
        Command::Run {
            name,
            file,
            line,
            column,
        } => {
            let command: EngineCommand = name.parse().map_err(anyhow::Error::msg)?;
            let ctx = match file {
                Some(file) => {
                    wait_ready(gateway, args.ready_timeout).await?;
                    context_from_file(file, *line, *column)?
                }
                None => QueryContext {
                    file_path: String::new(),
                    buffers: HashMap::new(),
                    line: *line,
                    column: *column,
                },
            };
            if let Some(location) = gateway.run_command(command, &ctx).await? {
                println!("{}", serde_json::to_string_pretty(&location)?);
            }
        }
        Command::Status => {
            let ready = gateway.is_ready().await?;
            println!("{}", gateway.debug_info().await);
            println!("  ready: {ready}");
        }
    }
    Ok(())
}

fn context_from_file(file: &Path, line: u32, column: u32) -> Result<QueryContext> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("could not read {}", file.display()))?;
    let file_path = file.display().to_string();
    let mut buffers = HashMap::new();
    buffers.insert(file_path.clone(), contents);
    Ok(QueryContext {
        file_path,
        buffers,
        line,
        column,
    })
}

async fn wait_ready(gateway: &CompletionGateway, timeout_secs: u64) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    loop {
        if gateway.is_ready().await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("engine did not become ready within {timeout_secs}s");
        }
        debug!("waiting for engine readiness");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
