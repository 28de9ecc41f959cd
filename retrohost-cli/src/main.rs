//! Headless runner for libretro cores.
//!
//! # Commands
//!
//! - `retrohost run --core <lib> [--game <path>]` - load a core, run frames, optionally
//!   exercise a save state
//! - `retrohost info --core <lib>` - print what a core reports about itself
//! - `retrohost config --write` - write the default config file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use retrohost_runtime::{
    CoreLibrary, HostConfig, LogLevel, LogProcessor, Processors, Session, SessionState,
};

#[derive(Parser)]
#[command(name = "retrohost")]
#[command(about = "Run libretro cores without a frontend")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a core and content and run frames
    Run(RunArgs),

    /// Print a core's system info
    Info {
        /// Path to the core shared library
        #[arg(long)]
        core: PathBuf,
    },

    /// Show or write the config file
    Config {
        /// Write the defaults to the config path
        #[arg(long)]
        write: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the core shared library
    #[arg(long)]
    core: PathBuf,

    /// Content to load; omit for cores that run without content
    #[arg(long)]
    game: Option<PathBuf>,

    /// Frames to run
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Save to this slot after running, then load it back
    #[arg(long)]
    save_slot: Option<u32>,

    /// Write the last frame as PNG
    #[arg(long)]
    screenshot: Option<PathBuf>,
}

/// Forwards core log lines to `tracing` under the `core` target.
struct TracingLogProcessor;

impl LogProcessor for TracingLogProcessor {
    fn log(&mut self, level: LogLevel, message: &str) {
        let message = message.trim_end();
        match level {
            LogLevel::Debug => tracing::debug!(target: "core", "{message}"),
            LogLevel::Info => tracing::info!(target: "core", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "core", "{message}"),
            LogLevel::Error => tracing::error!(target: "core", "{message}"),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(HostConfig::default_path);

    match cli.command {
        Commands::Run(args) => run(&config_path, args),
        Commands::Info { core } => info(&core),
        Commands::Config { write } => config(&config_path, write),
    }
}

fn load_config(path: &Path) -> Result<HostConfig> {
    HostConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn run(config_path: &Path, args: RunArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let processors = Processors::default().with_log(TracingLogProcessor);
    let mut session = Session::new(config, processors).context("Failed to create session")?;

    session
        .start(&args.core, args.game.as_deref())
        .with_context(|| format!("Failed to start {}", args.core.display()))?;

    let mut ran = 0;
    while ran < args.frames {
        if session.shutdown_requested() {
            tracing::info!(frames = ran, "core requested shutdown");
            break;
        }
        session.run_frame()?;
        ran += 1;
    }
    tracing::info!(frames = ran, "run finished");

    if let Some(slot) = args.save_slot {
        let path = session
            .save_state(slot)
            .with_context(|| format!("Failed to save slot {slot}"))?;
        session
            .load_state(slot)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        println!("state round-tripped through {}", path.display());
    }

    if let Some(path) = &args.screenshot {
        if !session.screenshot(path)? {
            bail!("core has not presented a frame yet");
        }
        println!("screenshot written to {}", path.display());
    }

    session.stop();
    debug_assert_eq!(session.state(), SessionState::Unloaded);
    Ok(())
}

fn info(core: &Path) -> Result<()> {
    let library = CoreLibrary::load(core, None)
        .with_context(|| format!("Failed to load core {}", core.display()))?;
    let info = library.system_info();
    println!("name:          {}", info.library_name);
    println!("version:       {}", info.library_version);
    println!("extensions:    {}", info.valid_extensions.join(", "));
    println!("need fullpath: {}", info.need_fullpath);
    println!("api version:   {}", library.api_version());
    Ok(())
}

fn config(path: &Path, write: bool) -> Result<()> {
    if write {
        HostConfig::default()
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("wrote {}", path.display());
        return Ok(());
    }
    let config = load_config(path)?;
    println!("# {}", path.display());
    println!("{config:#?}");
    Ok(())
}
