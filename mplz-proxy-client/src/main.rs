use anyhow::Context;
use clap::{Parser, Subcommand};
use mplz_proxy_core::{ProxyConfig, ProxyError, Readiness, WorkerCommand};
use mplz_proxy_runner::GameProxy;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{info, warn};

mod shell;

#[derive(Parser, Debug)]
#[command(name = "mplz-proxy")]
#[command(about = "Drive an mplz game-analysis worker over HTTP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker base URL (default http://127.0.0.1:5391)
    #[arg(long)]
    base_url: Option<String>,

    /// Worker program, replacing `cargo run --bin=mplz`
    #[arg(long)]
    worker: Option<String>,

    /// Argument passed to --worker (repeatable)
    #[arg(long = "worker-arg", allow_hyphen_values = true)]
    worker_args: Vec<String>,

    /// Fixed wait after spawning the worker
    #[arg(long)]
    startup_delay_ms: Option<u64>,

    /// Poll the worker port instead of waiting a fixed delay
    #[arg(long)]
    wait_ready: bool,

    /// Give up probing after this long (with --wait-ready)
    #[arg(long, default_value = "30000")]
    ready_timeout_ms: u64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a saved game into the worker
    Load {
        /// Game file, as the worker sees it
        file: String,
    },

    /// Run an analysis and write its result file
    Analyze {
        /// Result file the worker writes
        result_file: String,

        /// Number of simulations
        iteration: u32,

        /// Turns per simulation
        simulation_turn: u32,

        /// Load this game file first
        #[arg(short, long)]
        game: Option<String>,
    },

    /// Read load/analyze commands from stdin
    Shell,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let base_url = config.base_url.clone();
    let mut proxy = GameProxy::with_config(config)
        .await
        .context("Failed to start worker")?;
    info!(pid = ?proxy.worker().id(), "Worker started");

    let startup = proxy.worker_mut().try_exit_status();
    let result = match startup {
        Ok(Some(status)) => Err(anyhow::anyhow!("Worker exited during startup: {}", status)),
        Ok(None) => run_command(&mut proxy, cli.command).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = proxy.kill() {
        warn!(error = %e, "Failed to kill worker");
    }

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        let unreachable = e
            .downcast_ref::<ProxyError>()
            .is_some_and(ProxyError::is_connect);
        if unreachable {
            eprintln!(
                "No worker answered at {}; try --wait-ready or a longer --startup-delay-ms",
                base_url
            );
        }
        process::exit(1);
    }

    Ok(())
}

async fn run_command(proxy: &mut GameProxy, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Load { file } => {
            proxy.load(&file).await?;
        }
        Commands::Analyze {
            result_file,
            iteration,
            simulation_turn,
            game,
        } => {
            if let Some(game) = game {
                proxy.load(&game).await?;
            }
            proxy
                .analyze(&result_file, iteration, simulation_turn)
                .await?;
        }
        Commands::Shell => shell::run(proxy).await?,
    }
    Ok(())
}

fn build_config(cli: &Cli) -> anyhow::Result<ProxyConfig> {
    let mut config = match &cli.config {
        Some(path) => ProxyConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ProxyConfig::default(),
    };

    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.clone());
    }

    if let Some(program) = &cli.worker {
        let mut worker = cli
            .worker_args
            .iter()
            .fold(WorkerCommand::new(program.clone()), |worker, arg| {
                worker.arg(arg.clone())
            });
        worker.working_directory = config.worker.working_directory.take();
        worker.env = std::mem::take(&mut config.worker.env);
        config = config.with_worker(worker);
    }

    if cli.wait_ready {
        config = config.with_readiness(Readiness::probe_with_default_interval(
            Duration::from_millis(cli.ready_timeout_ms),
        ));
    } else if let Some(delay_ms) = cli.startup_delay_ms {
        config = config.with_readiness(Readiness::Delay { delay_ms });
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mplz-proxy").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = parse(&["load", "game.json"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config, ProxyConfig::default());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = parse(&[
            "--base-url",
            "http://127.0.0.1:6001",
            "--worker",
            "./target/release/mplz",
            "--worker-arg",
            "--port=6001",
            "--startup-delay-ms",
            "500",
            "analyze",
            "out.csv",
            "10",
            "20",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:6001");
        assert_eq!(config.worker.program, "./target/release/mplz");
        assert_eq!(config.worker.args, vec!["--port=6001"]);
        assert_eq!(config.readiness, Readiness::Delay { delay_ms: 500 });
    }

    #[test]
    fn test_wait_ready_selects_probe() {
        let cli = parse(&["--wait-ready", "--ready-timeout-ms", "1500", "shell"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(
            config.readiness,
            Readiness::Probe {
                timeout_ms: 1500,
                interval_ms: 100
            }
        );
    }

    #[test]
    fn test_analyze_with_game() {
        let cli = parse(&["analyze", "out.csv", "3", "4", "--game", "game.json"]);
        match cli.command {
            Commands::Analyze {
                result_file,
                iteration,
                simulation_turn,
                game,
            } => {
                assert_eq!(result_file, "out.csv");
                assert_eq!(iteration, 3);
                assert_eq!(simulation_turn, 4);
                assert_eq!(game.as_deref(), Some("game.json"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let cli = parse(&["--base-url", "nope", "shell"]);
        assert!(build_config(&cli).is_err());
    }
}
