//! Windows RAM Cleaner - standby list purger and working set trimmer

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use windows_ram_cleaner::cleaner::CleanOptions;
use windows_ram_cleaner::core::{CleanerConfig, CleanupOrchestrator, StopSignal};
use windows_ram_cleaner::monitor::{format_status, LogStatusSink};
use windows_ram_cleaner::platform::{self, NativeSystem, TokenApi};
use windows_ram_cleaner::security::{is_elevated, relaunch_elevated};

#[derive(Parser)]
#[command(name = "windows-ram-cleaner")]
#[command(about = "Purges the Windows standby list when it crowds out free memory", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/windows-ram-cleaner/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep running without admin rights instead of relaunching elevated
    #[arg(long, global = true)]
    no_elevate: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show free memory and standby list size
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Purge the standby list now
    Purge,

    /// Empty the working set of every process
    Trim {
        /// Trim critical system processes too
        #[arg(long)]
        ignore_critical: bool,
    },

    /// Trim every process, then this one
    Clean {
        /// Trim critical system processes too
        #[arg(long)]
        ignore_critical: bool,
    },

    /// Watch memory and purge automatically until Ctrl+C
    Daemon {
        /// Pressure check interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// Status refresh interval in seconds
        #[arg(long)]
        status_interval: Option<u64>,
    },

    /// Show configuration
    Config {
        /// Save the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

impl Commands {
    fn changes_memory(&self) -> bool {
        matches!(
            self,
            Commands::Purge | Commands::Trim { .. } | Commands::Clean { .. } | Commands::Daemon { .. }
        )
    }
}

/// `Ok(false)` means an elevated copy was started and this one should exit.
fn ensure_elevated(token: &dyn TokenApi, no_elevate: bool) -> Result<bool, Box<dyn std::error::Error>> {
    if is_elevated(token) {
        return Ok(true);
    }
    if no_elevate {
        warn!("Continuing without admin privileges, cleanups will likely fail");
        return Ok(true);
    }
    relaunch_elevated()?;
    info!("Exiting, the elevated instance takes over");
    Ok(false)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if !platform::is_platform_supported() {
        warn!(
            "Platform '{}' cannot clean memory, every OS call will fail",
            platform::platform_name()
        );
    }

    let mut config = CleanerConfig::load_or_default(cli.config.as_deref())?;

    if let Commands::Daemon { interval, status_interval } = &cli.command {
        if let Some(secs) = interval {
            config.pressure_interval_secs = *secs;
        }
        if let Some(secs) = status_interval {
            config.status_interval_secs = *secs;
        }
        config.validate()?;
    }

    let system = Arc::new(NativeSystem::new());
    if cli.command.changes_memory() && !ensure_elevated(system.as_ref(), cli.no_elevate)? {
        return Ok(());
    }

    let orchestrator = CleanupOrchestrator::new(system, config, Arc::new(LogStatusSink));

    match cli.command {
        Commands::Status { json } => {
            let snapshot = orchestrator.memory_info()?;
            if json {
                let report = serde_json::json!({
                    "free_bytes": snapshot.free_bytes,
                    "standby_bytes": snapshot.standby_bytes,
                    "free_mb": snapshot.free_mb(),
                    "standby_mb": snapshot.standby_mb(),
                    "standby_percent": snapshot.standby_percent(),
                    "percent_threshold": orchestrator.config().percent_threshold,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", format_status(&snapshot));
                match snapshot.standby_percent() {
                    Some(percent) => println!(
                        "Standby/Free: {}% (threshold {}%)",
                        percent,
                        orchestrator.config().percent_threshold
                    ),
                    None => println!("Standby/Free: n/a (no free memory reported)"),
                }
            }
        }

        Commands::Purge => {
            orchestrator.purge_now_async().await?;
            println!("Standby list purged");
        }

        Commands::Trim { ignore_critical } => {
            let report = orchestrator.trim_now_async(CleanOptions { ignore_critical }).await?;
            println!("Trim complete:");
            println!("  Trimmed:   {} processes", report.trimmed);
            println!("  Skipped:   {} critical", report.skipped_critical);
            println!("  Failed:    {}", report.failed);
            println!("  Duration:  {} ms", report.duration_ms);
        }

        Commands::Clean { ignore_critical } => {
            let report = orchestrator.clean_ram_now_async(CleanOptions { ignore_critical }).await?;
            println!("RAM cleaned:");
            println!("  Trimmed:   {} processes", report.trimmed);
            println!("  Skipped:   {} critical", report.skipped_critical);
            println!("  Failed:    {}", report.failed);
            println!("  Duration:  {} ms", report.duration_ms);
        }

        Commands::Daemon { .. } => {
            info!("Starting cleaner daemon (Ctrl+C to stop)");
            if let Err(e) = orchestrator.status_cycle() {
                warn!("Initial status failed: {}", e);
            }

            let stop = StopSignal::new();
            let (pressure, status) = orchestrator.spawn(&stop);

            tokio::signal::ctrl_c().await?;
            info!("Stopping");
            stop.stop();
            let (pressure, status) = tokio::join!(pressure, status);
            pressure?;
            status?;
        }

        Commands::Config { write } => {
            let config = orchestrator.config();
            println!("Current Configuration:");
            println!("{}", toml::to_string_pretty(config)?);
            if write {
                let path = cli
                    .config
                    .or_else(CleanerConfig::default_path)
                    .ok_or("no config directory on this system")?;
                config.save(&path)?;
                println!("Saved to {}", path.display());
            }
        }
    }

    Ok(())
}
