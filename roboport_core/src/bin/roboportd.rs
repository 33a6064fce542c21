//! roboportd - the component manager daemon
//!
//! Loads a deployment file, bootstraps a manager from it and serves until
//! interrupted.

use anyhow::Context;
use clap::Parser;
use colored::*;
use roboport_core::manager::{DaemonHealth, Manager};
use roboport_core::DeploymentConfig;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "roboportd")]
#[command(about = "roboport component manager daemon")]
#[command(version)]
struct Cli {
    /// Deployment file (.yaml, .yml, .toml or .json)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: PathBuf,

    /// Extra directories to search for component modules
    #[arg(short = 'm', long = "module-path", value_name = "DIR")]
    module_paths: Vec<PathBuf>,

    /// Show debug messages
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_target(false)
        .init();

    log::debug!("roboportd v{}", env!("CARGO_PKG_VERSION"));

    let manager = match start(&cli) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = serve(&manager) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        manager.shutdown();
        std::process::exit(1);
    }

    manager.shutdown();
    println!(
        "{} {} stopped at {}",
        "\u{2713}".green(),
        "roboportd".bold(),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
}

fn start(cli: &Cli) -> anyhow::Result<Arc<Manager>> {
    let mut config = DeploymentConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config
        .modules
        .search_paths
        .extend(cli.module_paths.iter().cloned());

    let manager = Manager::bootstrap(&config, Vec::new()).context("bootstrap failed")?;

    println!(
        "{} {} serving on host '{}' since {}",
        "\u{25b6}".cyan(),
        "roboportd".bold(),
        manager.config().host_name,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    for name in manager.instance_names() {
        if let Ok(instance) = manager.lookup(&name) {
            println!(
                "  {} {} ({}) {}",
                "\u{00b7}".dimmed(),
                name,
                instance.type_name(),
                instance.state().to_string().dimmed()
            );
        }
    }
    Ok(manager)
}

fn serve(manager: &Manager) -> anyhow::Result<()> {
    let (tx, rx) = crossbeam::channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .context("installing Ctrl+C handler")?;

    if manager.health() != DaemonHealth::Running {
        anyhow::bail!("manager is not running");
    }

    // Disconnected means the handler is gone; shut down either way.
    let _ = rx.recv();
    println!("\n{} shutting down", "\u{26a0}".yellow());
    Ok(())
}
