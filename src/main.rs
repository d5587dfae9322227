use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use gvm_lib::Setting;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, info, warn};

use gvm_rs::cli::{ConnectArgs, HostSession, print_state};
use gvm_rs::logging::setup_logging;

/// Control a GVM LED light on its own Wi-Fi network.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connect: ConnectArgs,
    /// Print states as JSON.
    #[arg(long, global = true)]
    json: bool,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the light's current settings.
    Status,
    /// Change one setting and print the confirmed state.
    Set {
        /// power, channel, brightness, cct, hue or saturation
        setting: Setting,
        /// Raw value; out-of-range values are clamped.
        #[arg(allow_negative_numbers = true)]
        value: i32,
        /// How long to wait for the light to confirm, in milliseconds.
        #[arg(long, default_value_t = 2000)]
        confirm_ms: u64,
    },
    /// Switch the light on.
    On,
    /// Switch the light off.
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.as_deref(), &cli.verbose)?;

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut session = cli.connect.connect(()).await?;

    match cli.command {
        Command::Status => {}
        Command::Set {
            setting,
            value,
            confirm_ms,
        } => set(&mut session, setting, value, Duration::from_millis(confirm_ms)).await?,
        Command::On => set(&mut session, Setting::Power, 1, Duration::from_secs(2)).await?,
        Command::Off => set(&mut session, Setting::Power, 0, Duration::from_secs(2)).await?,
    }

    print_state(&session.state(), cli.json)?;
    session.disconnect();
    Ok(())
}

async fn set(session: &mut HostSession, setting: Setting, value: i32, confirm: Duration) -> Result<()> {
    let sent = session.set(setting, value)?;
    if i32::from(sent) != value {
        warn!(%setting, requested = value, sent, "Value clamped");
    }

    // the hello sent after the command makes the light report its full status
    let deadline = tokio::time::Instant::now() + confirm;
    while session.get(setting) != Some(sent) {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() || session.wait_for_message(remaining).await? == 0 {
            warn!(%setting, "Light did not confirm the change");
            return Ok(());
        }
    }
    info!(%setting, value = sent, "Confirmed");
    Ok(())
}
