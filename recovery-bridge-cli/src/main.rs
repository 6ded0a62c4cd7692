//! Recovery Bridge CLI Application
//!
//! Command-line front end for the recovery-bridge library. It adds:
//! - Replaying scripted engine events through the bridge entry point
//! - Loading host callbacks from a shared library (C FFI)
//! - Built-in recording and validation hosts
//! - Building and releasing session argument vectors

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recovery_bridge::{DeliveryMode, DispatchContext, HostHandle, RecordingHost, ValidationCollector};
use std::path::{Path, PathBuf};

mod callbacks;
mod config;
mod events;
mod report;

use callbacks::HostLibrary;
use config::{AppConfig, OutputFormat};
use events::{EventScript, ReplayDriver, ReplayEngine};
use report::ReplayReport;

/// Recovery Bridge - route engine events to host callbacks
#[derive(Parser, Debug)]
#[command(name = "recovery-bridge-cli")]
#[command(about = "Route password-recovery engine events to host callbacks", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override the engine's shared path
    #[arg(long, value_name = "DIR", global = true)]
    shared_path: Option<PathBuf>,

    /// Report format (default: from config, else txt)
    #[arg(long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a TOML event script through the bridge
    Replay {
        /// Event script ([[event]] tables with id and payload)
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Deliver on the validation path instead of the standard path
        #[arg(long)]
        validate: bool,

        /// Session name recorded in the report
        #[arg(long, default_value = "replay")]
        session: String,
    },

    /// Build the session argument vector for ARGS, print it and release it
    Argv {
        /// Engine arguments (the executable path is prepended)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Recovery Bridge CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using bridge library v{}", recovery_bridge::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    if let Some(shared_path) = &args.shared_path {
        config.engine.shared_path = shared_path.clone();
    }
    let format = args.format.unwrap_or(config.output.format);

    match &args.command {
        Command::Replay {
            script,
            validate,
            session,
        } => {
            if *validate {
                config.engine.mode = DeliveryMode::Validation;
            }
            let report = replay_mode(&config, script, session)?;
            println!("{}", report.render(format)?);
        }
        Command::Argv { args: engine_args } => argv_mode(&mut config, engine_args)?,
    }

    Ok(())
}

/// Replay mode - build a dispatch context, register it with the replay
/// engine and fire the script through it
fn replay_mode(config: &AppConfig, script_path: &Path, session: &str) -> Result<ReplayReport> {
    let script = events::load_script(script_path)?;
    let mode = config.engine.mode;
    log::info!("Replaying {} events on the {} path", script.events.len(), mode);

    if let Some(library_path) = &config.host.library {
        let library = HostLibrary::load(
            library_path,
            &config.host.standard_symbol,
            &config.host.validation_symbol,
        )?;
        // SAFETY: library hosts get a null handle and keep their own state;
        // `library` stays loaded until the context is dropped below.
        let mut ctx = unsafe {
            DispatchContext::with_paths(
                ReplayEngine::new(session),
                HostHandle::null(),
                mode,
                library.paths(),
            )
        };
        let fired = fire(&mut ctx, &script)?;
        drop(ctx);
        return Ok(ReplayReport::new(session, mode, format!("library {:?}", library_path), fired));
    }

    match mode {
        DeliveryMode::Standard => {
            let mut host = RecordingHost::new();
            let fired = {
                let mut ctx = DispatchContext::for_host(ReplayEngine::new(session), &mut host, mode);
                fire(&mut ctx, &script)?
            };
            Ok(ReplayReport::new(session, mode, "recording", fired).with_deliveries(host.records()))
        }
        DeliveryMode::Validation => {
            let mut host = ValidationCollector::new(config.host.warning_ids.iter().copied());
            let fired = {
                let mut ctx = DispatchContext::for_host(ReplayEngine::new(session), &mut host, mode);
                fire(&mut ctx, &script)?
            };
            Ok(ReplayReport::new(session, mode, "validation", fired).with_validation(host.into_result()))
        }
    }
}

fn fire(ctx: &mut DispatchContext<'_, ReplayEngine>, script: &EventScript) -> Result<u64> {
    let mut driver = ReplayDriver::register(DispatchContext::<ReplayEngine>::event_handler(), ctx.engine_ptr());
    let fired = driver.run(script)?;
    log::info!("Session '{}' fired {} events", ctx.engine().session, ctx.engine().events_fired);
    Ok(fired)
}

/// Argv mode - build the session argument vector, show it and hand it to
/// the C release entry point
fn argv_mode(config: &mut AppConfig, engine_args: &[String]) -> Result<()> {
    config
        .engine
        .validate()
        .context("Invalid engine options")?;

    let argv = config.engine.session_argv(engine_args.iter().cloned())?;
    for (index, arg) in argv.to_strings().iter().enumerate() {
        println!("argv[{}] = {}", index, arg);
    }

    let (argc, raw) = argv.into_raw();
    // SAFETY: the pair was just produced by `into_raw` and is released once.
    unsafe { recovery_bridge::try_release_argv(argc, raw) }?;
    println!("Released {} arguments", argc);

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
