//! mcp-crud CLI - line-oriented CRUD agent over a users table

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use mcp_crud::config::{self, McpCrudConfig};
use mcp_crud::storage::{PostgresStore, SqliteStore, UserStore};
use mcp_crud::ui;
use mcp_crud::{Session, Termination};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mcp-crud")]
#[command(version)]
#[command(about = "Line-oriented CRUD agent - text commands in, JSON records out")]
#[command(long_about = r#"
mcp-crud reads one command per line from stdin and answers with one JSON
record per line on stdout:

  CREATE USER name=<value> email=<value>
  READ USERS
  UPDATE USER id=<integer> [name=<value>] [email=<value>]
  DELETE USER id=<integer>
  exit

Example usage:
  mcp-crud serve --config config.json
  mcp-crud serve --sqlite users.db
  mcp-crud init-config --path config.json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the command loop on stdin/stdout (default)
    Serve(ServeArgs),

    /// Write a template connection config
    InitConfig {
        /// Where to write the config (.json or .toml)
        #[arg(short, long, default_value = "config.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// PostgreSQL connection config (defaults to ./config.json, then MCP_CRUD_* env)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use an SQLite database file instead of PostgreSQL
    #[arg(long, conflicts_with = "config")]
    sqlite: Option<PathBuf>,

    /// Per-command timeout in seconds (overrides the config file)
    #[arg(long)]
    command_timeout: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout belongs to the protocol
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(cli.command));
    // A pending stdin read cannot be cancelled; don't wait for it
    runtime.shutdown_background();

    if let Err(e) = result {
        ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Option<Commands>) -> anyhow::Result<()> {
    match command.unwrap_or_else(|| Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => serve(args).await,
        Commands::InitConfig { path, force } => {
            if force && path.exists() {
                ui::warn(&format!("Overwriting {}", path.display()));
            }
            config::write_config(&path, &McpCrudConfig::template(), force)?;
            ui::success(&format!("Wrote template config to {}", path.display()));
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let cli_timeout = args.command_timeout;

    let reason = match args.sqlite {
        Some(path) => {
            ui::header("mcp-crud (sqlite)");
            ui::info("Database", &path.display().to_string());
            let store = SqliteStore::open(&path)
                .with_context(|| format!("cannot open {}", path.display()))?;
            run_session(&store, cli_timeout.map(Duration::from_secs)).await?
        }
        None => {
            let config = config::load_config(args.config.as_deref())?;
            tracing::debug!(?config, "Loaded configuration");
            ui::header("mcp-crud (postgres)");
            ui::info("Database", &config.target());

            let timeout = cli_timeout
                .or(config.command_timeout_secs)
                .map(Duration::from_secs);
            let store = PostgresStore::connect(&config).await?;
            let result = run_session(&store, timeout).await;
            store.close().await;
            result?
        }
    };

    tracing::debug!(?reason, "Shutting down");
    Ok(())
}

/// Provision the schema, then hand stdin/stdout to the command loop
async fn run_session<S: UserStore>(store: &S, timeout: Option<Duration>) -> anyhow::Result<Termination> {
    store
        .provision()
        .await
        .context("schema provisioning failed")?;
    tracing::info!("users table ready");

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut session = Session::new(store, tokio::io::stdout()).with_command_timeout(timeout);
    let reason = session.run(input, interrupted()).await?;
    Ok(reason)
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for interrupt: {}", e);
        std::future::pending::<()>().await;
    }
}
