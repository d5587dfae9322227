use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use gvm_lib::{DeviceState, GvmError, SessionObserver, SessionPhase};
use std::path::PathBuf;
use std::time::Duration;
use tokio::{signal, time::sleep};
use tracing::{error, info, warn};

use gvm_rs::cli::{ConnectArgs, print_state};
use gvm_rs::logging::setup_logging;

/// Follow a GVM LED light and print every state change it reports.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connect: ConnectArgs,
    /// Print states as JSON lines.
    #[arg(long)]
    json: bool,
    /// Polling interval in milliseconds.
    #[arg(short, long, default_value_t = 100)]
    interval_ms: u64,
    /// Ask for a full status this often, in seconds. 0 disables.
    #[arg(long, default_value_t = 10)]
    refresh_secs: u64,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

/// Prints the state after every frame that changed it.
struct Printer {
    json: bool,
    last: Option<DeviceState>,
}

impl SessionObserver for Printer {
    fn on_phase_change(&mut self, phase: SessionPhase) {
        info!(%phase, "Session");
    }

    fn on_status_updated(&mut self, state: &DeviceState) {
        if self.last.as_ref() == Some(state) {
            return;
        }
        self.last = Some(*state);
        if let Err(e) = print_state(state, self.json) {
            warn!("{:#}", e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.as_deref(), &cli.verbose)?;

    tokio::select! {
        res = run(cli) => {
            if let Err(e) = res {
                error!("Monitor failed: {:#}", e);
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down gracefully.");
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let printer = Printer {
        json: cli.json,
        last: None,
    };
    let mut session = cli.connect.connect(printer).await?;
    let interval = Duration::from_millis(cli.interval_ms);
    let refresh = (cli.refresh_secs > 0).then(|| Duration::from_secs(cli.refresh_secs));
    let mut last_refresh = tokio::time::Instant::now();

    loop {
        match session.poll() {
            Ok(_) => {}
            Err(GvmError::NotReady { .. }) => {
                warn!("Link lost, looking for the light again");
                session.discover().await?;
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(refresh) = refresh {
            if last_refresh.elapsed() >= refresh {
                session.send_hello()?;
                last_refresh = tokio::time::Instant::now();
            }
        }
        sleep(interval).await;
    }
}
