//! droid-deploy command line
//!
//! Runs sketches on emulators and attached devices from the terminal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use droid_deploy::build::GradleBuild;
use droid_deploy::console::{spawn_status_printer, TerminalPrompter};
use droid_deploy::core::{
    ComponentKind, DeployConfig, EventBus, FilePreferences, MemoryPreferences, PreferenceStore, Prompter, Sketch,
    APP_NAME, VERSION,
};
use droid_deploy::emulator::{AdbInstaller, SdkDeviceManager};
use droid_deploy::toolchain::{SdkLocator, SdkStateHolder};
use droid_deploy::{Collaborators, DeploymentPipeline};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "droid-deploy", version, about = "Build and run Android sketches")]
struct Cli {
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Accept every confirmation prompt
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a sketch and run it on an emulator
    RunEmulator {
        /// AVD to run instead of the one used last time
        #[arg(long)]
        avd: Option<String>,
        #[command(flatten)]
        sketch: SketchArgs,
    },
    /// Build a sketch and run it on an attached device
    RunDevice {
        #[command(flatten)]
        sketch: SketchArgs,
    },
    /// Load the Android SDK and print where it is
    Sdk {
        /// Core library to put on the printed search path
        #[arg(long, default_value = "core.zip")]
        core_zip: PathBuf,
    },
    /// List attached devices
    Devices {
        /// List watches instead of phones and tablets
        #[arg(long)]
        wear: bool,
    },
}

#[derive(clap::Args)]
struct SketchArgs {
    /// Sketch folder
    sketch_dir: PathBuf,

    /// Component kind, overriding the sketch metadata
    #[arg(long)]
    component: Option<ComponentKind>,

    /// Target a wearable
    #[arg(long)]
    wear: bool,
}

impl SketchArgs {
    async fn open(&self) -> Result<Sketch> {
        let mut sketch = Sketch::open(&self.sketch_dir)
            .await
            .with_context(|| format!("Cannot open sketch {}", self.sketch_dir.display()))?;
        if let Some(component) = self.component {
            sketch = sketch.with_component(component);
        }
        sketch.wear |= self.wear;
        Ok(sketch)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("{} v{} starting...", APP_NAME, VERSION);

    let config = DeployConfig::load().await.context("Cannot load configuration")?;
    let events = Arc::new(EventBus::new());
    let printer = spawn_status_printer(events.subscribe());
    let pipeline = build_pipeline(&config, cli.yes, events);

    let interrupt = pipeline.interrupt_token();
    let outcome = tokio::select! {
        outcome = run(&pipeline, cli.command) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted");
            interrupt.cancel();
            pipeline.stop().await;
            Ok(())
        }
    };

    // Dropping the last bus handle lets the printer drain and exit
    drop(pipeline);
    if printer.join().is_err() {
        warn!("Status printer panicked");
    }
    outcome
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();
}

fn build_pipeline(config: &DeployConfig, assume_yes: bool, events: Arc<EventBus>) -> DeploymentPipeline {
    let holder = Arc::new(SdkStateHolder::new());
    let ui: Arc<dyn Prompter> = Arc::new(TerminalPrompter::new(assume_yes));

    let prefs: Arc<dyn PreferenceStore> = match DeployConfig::config_file() {
        Some(path) => Arc::new(FilePreferences::new(path, config.clone())),
        None => {
            warn!("No configuration folder, the chosen AVD will not be remembered");
            Arc::new(MemoryPreferences::new())
        }
    };

    let parts = Collaborators {
        holder: Arc::clone(&holder),
        acquirer: Arc::new(SdkLocator::new(config.android.sdk_path.clone())),
        devices: Arc::new(SdkDeviceManager::new(Arc::clone(&holder), &config.emulator)),
        builder: Arc::new(GradleBuild::new(Arc::clone(&holder))),
        installer: Arc::new(AdbInstaller::new(holder)),
        prefs,
        ui,
    };

    DeploymentPipeline::new(parts, config, events)
}

async fn run(pipeline: &DeploymentPipeline, command: Command) -> Result<()> {
    match command {
        Command::RunEmulator { avd, sketch } => {
            let sketch = sketch.open().await?;
            pipeline.component_selected(sketch.component);
            pipeline.deploy_to_emulator(&sketch, avd.as_deref()).await?;
        }
        Command::RunDevice { sketch } => {
            let sketch = sketch.open().await?;
            pipeline.component_selected(sketch.component);
            pipeline.deploy_to_device(&sketch).await?;
        }
        Command::Sdk { core_zip } => {
            pipeline.ensure_sdk().await?;
            println!("{}", pipeline.search_path(&core_zip).await);
        }
        Command::Devices { wear } => {
            let devices = pipeline.attached_devices(wear).await?;
            if devices.is_empty() {
                println!("No devices attached");
            }
            for device in devices {
                println!("{}\t{}", device.serial, device.display_name());
            }
        }
    }
    Ok(())
}
