use anyhow::{Context, Result};
use clap::Args;
use gvm_lib::constants::{BROADCAST_ADDR, DEFAULT_PASSWORD, DEFAULT_SSID};
use gvm_lib::{DeviceState, HostStation, Session, SessionConfig, SessionObserver, UdpSocketFactory};
use std::net::Ipv4Addr;
use tracing::info;

/// A session over real UDP sockets, with the host already on the light's network.
pub type HostSession = Session<HostStation, UdpSocketFactory>;

/// How to reach the light.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Network name of the light's access point.
    #[arg(long, default_value = DEFAULT_SSID)]
    pub ssid: String,
    /// Password of the light's access point.
    #[arg(long, default_value = DEFAULT_PASSWORD)]
    pub password: String,
    /// Broadcast address of the light's network.
    #[arg(short, long, default_value_t = BROADCAST_ADDR)]
    pub broadcast: Ipv4Addr,
}

impl ConnectArgs {
    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            ssid: self.ssid.clone(),
            password: self.password.clone(),
            ..SessionConfig::default()
        }
    }

    /// Discover the light and return a ready session.
    pub async fn connect(&self, observer: impl SessionObserver + Send + 'static) -> Result<HostSession> {
        let mut session = Session::new(
            HostStation::new(self.ssid.clone()),
            UdpSocketFactory::new(self.broadcast),
            self.config(),
        )?
        .with_observer(observer);

        info!(ssid = %self.ssid, broadcast = %self.broadcast, "Looking for a light...");
        let report = session.discover().await.context("Could not reach a light")?;
        info!(frames = report.frames_received, "Light answered");
        Ok(session)
    }
}

/// Print the state on stdout, as text or as one line of JSON.
pub fn print_state(state: &DeviceState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(state).context("Failed to serialize state")?);
    } else {
        println!("{state}");
    }
    Ok(())
}
