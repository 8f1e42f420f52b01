// # ipsyncd - IP Sync Daemon
//
// Thin integration layer around ipsync-core:
// 1. Loading the JSON configuration file and environment overrides
// 2. Initializing logging and the runtime
// 3. Registering DNS providers and IP sources
// 4. Running the reconciler once, or on a fixed interval until signalled
//
// ## Configuration
//
// The config file path comes from `IPSYNC_CONFIG`, else the first command
// line argument, else `./ipsync.json`. These environment variables override
// values from the file:
//
// - `IPSYNC_LOG_LEVEL`: trace, debug, info, warn, error
// - `IPSYNC_LOG_FILE`: also write logs to this file, rotated daily
// - `IPSYNC_INTERVAL_MINUTES`: minutes between cycles (0 = run once)
// - `IPSYNC_MODE`: `dry-run` to read records but only log intended writes
//
// ## Example
//
// ```bash
// export IPSYNC_MODE=dry-run
// ipsyncd /etc/ipsync/ipsync.json
// ```

use anyhow::{Result, anyhow, bail};
use ipsync_core::{CycleEvent, ProviderRegistry, Reconciler, SyncConfig};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{Level, debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Config file used when neither `IPSYNC_CONFIG` nor an argument is given
const DEFAULT_CONFIG_PATH: &str = "./ipsync.json";

/// Rotated log files kept next to the active one
const MAX_LOG_FILES: usize = 3;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown, or a successful single run
/// - 1: Configuration or startup error
/// - 2: Runtime error, including a failed single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure or failed cycle)
    RuntimeError = 2,
}

impl From<IpsyncExitCode> for ExitCode {
    fn from(code: IpsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Pick the config path: environment first, then the first argument
fn config_path(from_env: Option<String>, first_arg: Option<String>) -> PathBuf {
    from_env
        .filter(|p| !p.trim().is_empty())
        .or(first_arg)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

/// Apply `IPSYNC_*` environment overrides on top of the file configuration
fn apply_env_overrides<F>(config: &mut SyncConfig, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = var("IPSYNC_LOG_LEVEL") {
        config.log_level = level;
    }

    if let Some(path) = var("IPSYNC_LOG_FILE") {
        config.log_file = Some(path).filter(|p| !p.trim().is_empty());
    }

    if let Some(minutes) = var("IPSYNC_INTERVAL_MINUTES") {
        config.schedule.interval_minutes = minutes.trim().parse().map_err(|_| {
            anyhow!(
                "IPSYNC_INTERVAL_MINUTES must be a non-negative integer. Got: {}",
                minutes
            )
        })?;
    }

    if let Some(mode) = var("IPSYNC_MODE") {
        match mode.trim().to_lowercase().as_str() {
            "dry-run" => config.provider.set_dry_run(true),
            "" | "live" => {}
            other => bail!(
                "IPSYNC_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        }
    }

    Ok(())
}

fn log_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Split a log file path into its directory and file name prefix
fn log_file_parts(path: &Path) -> Result<(PathBuf, String)> {
    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("Log file path has no file name: {}", path.display()))?
        .to_string();

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((dir, prefix))
}

/// Daily rolling appender; the active file is `<prefix>.<date>`
fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let (dir, prefix) = log_file_parts(path)?;
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow!("Failed to create log directory {}: {}", dir.display(), e))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(MAX_LOG_FILES)
        .build(&dir)
        .map_err(|e| anyhow!("Failed to open log file in {}: {}", dir.display(), e))
}

/// Install the global subscriber: stdout always, plus the log file if set
///
/// The returned guards flush buffered lines on drop and must outlive every
/// log call.
fn init_logging(level: Level, log_file: Option<&Path>) -> Result<Vec<WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    let (stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = tracing_subscriber::fmt::layer().with_writer(stdout);
    let filter = LevelFilter::from_level(level);

    match log_file {
        Some(path) => {
            let (file, file_guard) = tracing_appender::non_blocking(file_appender(path)?);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file);

            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .try_init()?;

            Ok(vec![stdout_guard, file_guard])
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .try_init()?;

            Ok(vec![stdout_guard])
        }
    }
}

fn load_config() -> Result<SyncConfig> {
    let path = config_path(env::var("IPSYNC_CONFIG").ok(), env::args().nth(1));

    let mut config = SyncConfig::from_file(&path)?;
    apply_env_overrides(&mut config, |name| env::var(name).ok())?;
    config.validate()?;

    Ok(config)
}

fn main() -> ExitCode {
    let config = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return IpsyncExitCode::ConfigError.into();
        }
    };

    let _log_guards = match init_logging(
        log_level(&config.log_level),
        config.log_file.as_deref().map(Path::new),
    ) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return IpsyncExitCode::ConfigError.into();
        }
    };

    info!("Starting ipsyncd daemon");
    if let Some(path) = &config.log_file {
        info!("Also logging to {}", path);
    }
    info!("Configuration loaded: {} record(s)", config.records.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IpsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            IpsyncExitCode::RuntimeError
        } else {
            IpsyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build adapters from configuration and run the reconciler
async fn run_daemon(config: SyncConfig) -> Result<()> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    {
        debug!("Registering Cloudflare provider");
        ipsync_provider_cloudflare::register(&registry);
    }

    #[cfg(feature = "http")]
    {
        debug!("Registering HTTP IP source");
        ipsync_ip_http::register(&registry);
    }

    let ip_source = registry.create_ip_source(&config.ip_source)?;
    let provider = registry.create_provider(&config.provider)?;
    let store = registry.create_state_store(&config.state_store).await?;
    let targets = config.resolve_targets()?;

    info!("IP source: {}", ip_source.source_name());
    info!("Provider: {}", provider.provider_name());
    for target in &targets {
        info!("Managing record: {}", target);
    }

    let (reconciler, mut events) = Reconciler::new(ip_source, provider, store, targets)?;

    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_task = tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => {
                info!("Received shutdown signal: {}", signal);
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!("Signal handling unavailable: {}", e),
        }
    });

    let interval = config.schedule.interval();
    if interval.is_zero() {
        info!("Running a single reconciliation cycle");
    }

    let result = reconciler.run_with_shutdown(interval, shutdown_rx).await;

    signal_task.abort();
    drop(reconciler);
    let _ = event_task.await;

    result?;
    info!("ipsyncd stopped");
    Ok(())
}

fn log_event(event: &CycleEvent) {
    debug!("Cycle event: {:?}", event);
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
