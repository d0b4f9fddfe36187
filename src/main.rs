use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reactormonitor::config::MonitorConfig;
use reactormonitor::detect::{report, Evaluation, ScenarioClass};
use reactormonitor::replay::http::ApiConsole;
use reactormonitor::replay::{FileSource, HttpSource, ScenarioSource};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

#[derive(Parser)]
#[command(
    name = "reactormonitor",
    about = "Fault detection and diagnosis timing for Tennessee Eastman reactor replays",
    version,
    long_about = None
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service (/, /health, /predict, /evaluate)
    Serve {
        /// Bind address (overrides [server] bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Replay one scenario and report detection / diagnosis delays
    Evaluate {
        /// Fault scenario, 1 to 20
        #[arg(long)]
        scenario: ScenarioClass,

        /// Replay file (JSON array or JSON lines)
        #[arg(long, conflicts_with = "api")]
        file: Option<PathBuf>,

        /// Scenario API base URL (overrides [source] api_url)
        #[arg(long)]
        api: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Include the per-sample running trace
        #[arg(long)]
        trace: bool,
    },

    /// List the fault scenarios
    Scenarios,

    /// Check a running service: GET / and GET /health
    Ping {
        /// Service base URL
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        url: String,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the subscriber from `RUST_LOG` (or `info`) so config loading is
/// logged; the configured level is applied afterwards through `handle`.
fn init_tracing(json: bool) -> FilterHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);
    let ansi = std::io::stderr().is_terminal();
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_ansi(ansi).with_writer(std::io::stderr))
            .init();
    }
    handle
}

/// `RUST_LOG` wins over the `[logging] level` setting.
fn apply_log_level(handle: &FilterHandle, level: &str) {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    if let Err(e) = handle.reload(EnvFilter::new(level)) {
        tracing::warn!(%level, error = %e, "failed to apply configured log level");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_handle = init_tracing(cli.log_json);
    let config = MonitorConfig::resolve(cli.config.as_deref())?;
    apply_log_level(&log_handle, &config.logging.level);

    match cli.command {
        Commands::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting reactormonitor service");
            reactormonitor::serve(&config).await?;
        }
        Commands::Evaluate {
            scenario,
            file,
            api,
            json,
            trace,
        } => {
            let params = config
                .evaluator
                .params()
                .context("invalid [evaluator] configuration")?;

            let source: Box<dyn ScenarioSource> = match (file, api.or(config.source.api_url.clone())) {
                (Some(path), _) => Box::new(FileSource::new(path)),
                (None, Some(url)) => Box::new(HttpSource::new(
                    &url,
                    Duration::from_secs(config.source.request_timeout_secs),
                )?),
                (None, None) => anyhow::bail!("no replay source: pass --file or --api"),
            };

            tracing::info!(%scenario, source = %source.name(), "Replaying scenario");
            let records = source.fetch(scenario).await?;

            let token = CancellationToken::new();
            let ctrl_c_token = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c_token.cancel();
                }
            });

            let (outcome, steps) = tokio::task::spawn_blocking(move || {
                let evaluation =
                    Evaluation::new(params, scenario, records).with_cancellation(token);
                if trace {
                    evaluation.run_with_trace()
                } else {
                    evaluation.run().map(|o| (o, Vec::new()))
                }
            })
            .await??;

            if json {
                let mut out = serde_json::json!({
                    "scenario": scenario,
                    "report": outcome.report,
                    "samples_evaluated": outcome.samples_evaluated,
                    "cancelled": outcome.cancelled,
                });
                if trace {
                    out["trace"] = serde_json::to_value(&steps)?;
                }
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                if trace {
                    println!(
                        "{:>8} | {:>6} | {:>5} | {:>6} | Flags",
                        "Minute", "Score", "Class", "Streak"
                    );
                    println!("{:-<8}-|-{:-<6}-|-{:-<5}-|-{:-<6}-|-{:-<5}", "", "", "", "", "");
                    for step in &steps {
                        println!("{}", report::format_step(step));
                    }
                    println!();
                }
                println!("{}", report::format_summary(scenario, &outcome));
            }
        }
        Commands::Scenarios => {
            println!("{:<8} | Disturbance", "Scenario");
            println!("{:-<8}-|-{:-<50}", "", "");
            for scenario in ScenarioClass::all() {
                println!("{:<8} | {}", scenario, scenario.description());
            }
        }
        Commands::Ping { url, json } => {
            let console = ApiConsole::new(
                &url,
                Duration::from_secs(config.source.request_timeout_secs),
            )?;
            let checks = vec![console.ping().await, console.health().await];

            if json {
                println!("{}", serde_json::to_string_pretty(&checks)?);
            } else {
                println!("\nreactormonitor API console: {}", url);
                for check in &checks {
                    let status = match (check.ok, check.status) {
                        (true, _) => "OK".to_string(),
                        (false, Some(code)) => format!("HTTP {}", code),
                        (false, None) => "UNREACHABLE".to_string(),
                    };
                    println!(
                        "{:<10} | {:<12} | {:.0} ms",
                        check.endpoint, status, check.latency_ms
                    );
                    if let Some(err) = &check.error {
                        println!("{:<10} |   -> {}", "", err);
                    }
                }
                println!();
            }

            if checks.iter().any(|c| !c.ok) {
                anyhow::bail!("service check failed for {}", url);
            }
        }
    }

    Ok(())
}
