use anyhow::{anyhow, Context, Result};
use api_ingress::{ApiIngress, ApiIngressConfig};
use attendance::domain::store::DocumentStore;
use attendance::infra::storage::{InMemoryStore, SqliteStore};
use attendance::{Attendance, AttendanceConfig};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs, DatabaseConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const MEMORY_DSN: &str = "sqlite::memory:";

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps "sqlite::memory:" as-is.
/// - Normalizes backslashes into forward slashes (important on Windows).
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path) -> Result<String> {
    if dsn.eq_ignore_ascii_case(MEMORY_DSN) || dsn.eq_ignore_ascii_case("sqlite://:memory:") {
        return Ok(MEMORY_DSN.to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(anyhow!("Empty SQLite path in DSN"));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }

    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    Ok(out)
}

/// Only SQLite backs the document store.
fn ensure_sqlite_dsn(cfg: &DatabaseConfig) -> Result<()> {
    let raw = cfg.url.trim();
    if raw.is_empty() {
        return Err(anyhow!("Database URL not configured"));
    }
    if raw.eq_ignore_ascii_case("sqlite://:memory:") {
        return Ok(());
    }
    let url = Url::parse(raw).map_err(|e| anyhow!("Invalid database DSN '{}': {}", raw, e))?;
    match url.scheme() {
        "sqlite" => Ok(()),
        other => Err(anyhow!("Unsupported database type: {}", other)),
    }
}

/// Attendance Server - classes, students and daily attendance over HTTP
#[derive(Parser)]
#[command(name = "attendance-server")]
#[command(about = "Attendance Server - classes, students and daily attendance over HTTP")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use an in-memory SQLite database instead of the configured one
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        port: cli.port,
        verbose: cli.verbose,
        mock: cli.mock,
    };
    let config = AppConfig::load(cli.config.as_deref(), &args)?;

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!("Attendance Server starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config, args).await,
        Commands::Check => check_config(config, args),
    }
}

/// Module configs with server-level settings folded in.
fn module_configs(config: &AppConfig) -> Result<(ApiIngressConfig, AttendanceConfig)> {
    let mut ingress: ApiIngressConfig = config.module_config("api_ingress")?;
    if ingress.bind_addr.trim().is_empty() {
        ingress.bind_addr = format!("{}:{}", config.server.host, config.server.port);
    }
    if config.server.timeout_sec > 0 {
        ingress.request_timeout_secs = config.server.timeout_sec;
    }
    let attendance: AttendanceConfig = config.module_config("attendance")?;
    Ok((ingress, attendance))
}

/// DSN the store will open, or None for the in-process map.
fn resolve_dsn(config: &AppConfig, args: &CliArgs) -> Result<Option<String>> {
    if args.mock {
        return Ok(Some(MEMORY_DSN.to_string()));
    }
    let Some(db) = config.database.as_ref() else {
        return Ok(None);
    };
    ensure_sqlite_dsn(db)?;
    let base_dir = PathBuf::from(&config.server.home_dir);
    absolutize_sqlite_dsn(db.url.trim(), &base_dir).map(Some)
}

async fn open_store(config: &AppConfig, args: &CliArgs) -> Result<Arc<dyn DocumentStore>> {
    let Some(dsn) = resolve_dsn(config, args)? else {
        tracing::warn!("No database configuration found, documents are kept in memory");
        return Ok(Arc::new(InMemoryStore::new()));
    };

    let (max_conns, busy_timeout) = match config.database.as_ref() {
        Some(db) => (
            db.max_conns,
            db.busy_timeout_ms
                .map(|ms| Duration::from_millis(u64::from(ms))),
        ),
        None => (None, None),
    };

    tracing::info!("Connecting to database: {}", dsn);
    let store = SqliteStore::connect(&dsn, max_conns, busy_timeout)
        .await
        .context("failed to open document store")?;
    Ok(Arc::new(store))
}

async fn run_server(config: AppConfig, args: CliArgs) -> Result<()> {
    tracing::info!("Initializing modules...");

    let (ingress_cfg, attendance_cfg) = module_configs(&config)?;
    let ingress = ApiIngress::new(ingress_cfg);
    // Fail on a bad bind address before touching the database.
    ingress.bind_addr()?;

    let store = open_store(&config, &args).await?;
    let module = Attendance::new(store, &attendance_cfg);
    let router = ingress.build_router(module.router(), Some(Attendance::openapi()));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        modkit::runtime::shutdown_signal().await;
        on_signal.cancel();
    });

    ingress.serve(router, cancel).await?;
    tracing::info!("Attendance Server stopped");
    Ok(())
}

fn check_config(config: AppConfig, args: CliArgs) -> Result<()> {
    tracing::info!("Checking configuration...");

    let (ingress_cfg, _) = module_configs(&config)?;
    ApiIngress::new(ingress_cfg).bind_addr()?;
    match resolve_dsn(&config, &args)? {
        Some(dsn) => println!("Database: {dsn}"),
        None => println!("Database: in-memory"),
    }

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}
