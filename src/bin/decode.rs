use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use gvm_lib::{DeviceState, frames, process_datagram};
use std::io::{self, BufRead};

use gvm_rs::cli::print_state;
use gvm_rs::logging::setup_logging;

/// Decode captured GVM datagrams (hex text) and show the resulting state.
///
/// Datagrams are taken from the arguments, or one per line from stdin.
/// The state carries over from one datagram to the next.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Datagrams as received, e.g. 4C540B0030030102322C3819D268
    datagrams: Vec<String>,
    /// Print states as JSON lines.
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(None, &cli.verbose)?;

    let mut state = DeviceState::new();
    if cli.datagrams.is_empty() {
        for line in io::stdin().lock().lines() {
            let line = line.context("Failed to read stdin")?;
            let line = line.trim();
            if !line.is_empty() {
                decode(line, &mut state, cli.json)?;
            }
        }
    } else {
        for datagram in &cli.datagrams {
            decode(datagram.trim(), &mut state, cli.json)?;
        }
    }
    Ok(())
}

fn decode(datagram: &str, state: &mut DeviceState, json: bool) -> Result<()> {
    let mut iter = frames(datagram.as_bytes());
    for frame in iter.by_ref() {
        println!("  {frame}");
    }
    let rest = iter.remainder();
    if !rest.is_empty() {
        println!("  ({} undecoded characters: {})", rest.len(), String::from_utf8_lossy(rest));
    }

    let mut updates = 0;
    let processed = process_datagram(datagram.as_bytes(), state, |_| updates += 1);
    println!("{processed} frame(s), {updates} update(s)");
    print_state(state, json)
}
