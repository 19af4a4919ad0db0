// # svcdnsd - service DNS sync daemon
//
// Publishes the healthy instances of Consul services as weighted A records
// in one or more hosted zones, and removes records whose instances are gone.
//
// The daemon is a thin layer over svcdns-core:
// 1. Parse flags and `SVCDNS_*` environment variables into a `SyncConfig`
// 2. Initialize logging and the runtime
// 3. Register the endpoint source and record store adapters
// 4. Resolve every zone, then run the scheduler until SIGTERM or SIGINT
//
// ## Configuration
//
// ### Consul
// - `SVCDNS_CONSUL_ADDRESSES`: Comma-separated server addresses (required)
// - `SVCDNS_CONSUL_HTTP_PORT`: HTTP API port (default 8500)
// - `SVCDNS_CONSUL_HTTP_TIMEOUT`: Request timeout in seconds (default 5)
// - `SVCDNS_CONSUL_SCHEME`: http or https (default http)
// - `SVCDNS_CONSUL_DATACENTER`: Datacenter to query
// - `SVCDNS_CONSUL_TOKEN`: ACL token
//
// ### Records
// - `SVCDNS_SERVICES`: Comma-separated services to publish (required)
// - `SVCDNS_ZONE_IDS`: Comma-separated hosted zone ids (required)
// - `SVCDNS_STORE`: route53 or memory (default route53)
// - `SVCDNS_RECORD_TTL`, `SVCDNS_RECORD_WEIGHT`: Record shape (default 60, 100)
// - `SVCDNS_DRY_RUN`: Log Route53 changes instead of sending them
//
// Route53 credentials come from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`
// and optionally `AWS_SESSION_TOKEN`.
//
// ### Scheduling
// - `SVCDNS_REFRESH_INTERVAL`: Seconds between passes (default 20)
// - `SVCDNS_CALL_TIMEOUT`: Bound on any single remote call (default 10)
// - `SVCDNS_MAX_CONCURRENT_ZONES`: Zones of one service in flight (default 1)
//
// ### Logging
// - `SVCDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `SVCDNS_LOG_FORMAT`: text or json (default text)
//
// ## Example
//
// ```bash
// export SVCDNS_CONSUL_ADDRESSES=10.0.0.10,10.0.0.11
// export SVCDNS_SERVICES=api,web
// export SVCDNS_ZONE_IDS=Z0123456789ABC
// export AWS_ACCESS_KEY_ID=...
// export AWS_SECRET_ACCESS_KEY=...
//
// svcdnsd
// ```

mod cli;

use anyhow::{Result, anyhow};
use clap::Parser;
use cli::{Args, LogFormat};
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use svcdns_core::{AdapterRegistry, EndpointSource, Scheduler, SchedulerEvent, SyncConfig};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SvcdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Invalid configuration, or a zone that could not be resolved
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SvcdnsExitCode> for ExitCode {
    fn from(code: SvcdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not errors
            return if e.use_stderr() {
                SvcdnsExitCode::ConfigError.into()
            } else {
                SvcdnsExitCode::CleanShutdown.into()
            };
        }
    };

    let config = match args.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SvcdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = init_tracing(&args.log_level, args.log_format) {
        eprintln!("{}", e);
        return SvcdnsExitCode::ConfigError.into();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        services = config.services.len(),
        zones = config.zones.len(),
        store = config.store.type_name(),
        "Starting svcdnsd"
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SvcdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level.to_lowercase())?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow!("Failed to set tracing subscriber: {}", e))
}

/// Run the daemon until a shutdown signal
async fn run_daemon(config: SyncConfig) -> SvcdnsExitCode {
    let (scheduler, events) = match start(&config).await {
        Ok(started) => started,
        Err(e) => {
            error!("Startup failed: {}", e);
            return SvcdnsExitCode::ConfigError;
        }
    };

    let shutdown = match shutdown_signal() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            error!("Failed to install signal handlers: {}", e);
            return SvcdnsExitCode::RuntimeError;
        }
    };

    let event_log = tokio::spawn(log_events(events));

    let result = scheduler
        .run_until(async move {
            let signal = shutdown.await;
            info!(signal, "Received shutdown signal");
        })
        .await;

    // Closes the event channel so the logger drains and exits
    drop(scheduler);
    let _ = event_log.await;

    match result {
        Ok(()) => {
            info!("Shutdown complete");
            SvcdnsExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Scheduler error: {}", e);
            SvcdnsExitCode::RuntimeError
        }
    }
}

/// Build the adapters and the scheduler
///
/// Every configured zone is resolved here. A zone that cannot be resolved
/// fails startup.
async fn start(config: &SyncConfig) -> Result<(Scheduler, mpsc::Receiver<SchedulerEvent>)> {
    let registry = AdapterRegistry::with_builtin();

    #[cfg(feature = "consul")]
    svcdns_source_consul::register(&registry);

    #[cfg(feature = "route53")]
    svcdns_store_route53::register(&registry);

    debug!(
        sources = ?registry.list_sources(),
        stores = ?registry.list_stores(),
        "Adapters registered"
    );

    let source: Arc<dyn EndpointSource> = Arc::from(registry.create_source(&config.source)?);
    let stores = registry.create_stores(&config.store, &config.zones).await?;

    let (scheduler, events) =
        Scheduler::new(source, stores, config.services.clone(), &config.scheduler)?;
    Ok((scheduler, events))
}

async fn log_events(mut events: mpsc::Receiver<SchedulerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SchedulerEvent::TickCompleted { tick, summary } => {
                debug!(tick, ?summary, "Tick summary");
            }
            other => debug!(event = ?other, "Scheduler event"),
        }
    }
}

/// Resolve on SIGTERM or SIGINT, yielding the signal name
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Resolve on Ctrl-C, yielding the signal name
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for Ctrl-C: {}", e);
        }
        "SIGINT"
    })
}
