//! Discovery handshake and steady-state session.
//!
//! ```text
//! Idle -> Joining -> Verifying -> Ready
//!           |            |
//!           +------------+--> Idle (all candidates exhausted)
//! ```
//!
//! Joining tries each candidate access point a fixed number of times, each
//! attempt bounded by a poll budget. Verifying opens the two channels, sends
//! the hello message and waits a short, bounded time for any valid frame on
//! the status channel: an access point named like a light that does not answer
//! is not a light. Nothing is retried in place beyond the per-candidate budget;
//! after exhausting every candidate the caller has to start discovery again.
//!
//! All waiting is sleep-and-poll on the caller's task. The only state shared
//! with other contexts is the [`DisconnectSignal`].

use crate::command::{Command, Setting};
use crate::constants::{
    COMMAND_PORT, DEFAULT_PASSWORD, DEFAULT_SSID, HELLO_FRAME, MAX_DATAGRAM_LEN, MIN_FRAME_HEX_LEN, STATUS_PORT,
};
use crate::error::GvmError;
use crate::frame::process_datagram;
use crate::hex;
use crate::state::DeviceState;
use crate::station::{AccessPoint, Bssid, DisconnectSignal, LinkStatus, WifiStation};
use crate::transport::{BroadcastSocket, SocketFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use strum_macros::Display;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, trace, warn};

/// Where the session is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    Joining,
    Verifying,
    Ready,
}

/// Session settings. The defaults match the lights' firmware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Network name of the light's access point
    pub ssid: String,
    pub password: String,
    pub command_port: u16,
    pub status_port: u16,
    /// Join attempts per candidate access point
    pub join_attempts: u32,
    pub join_poll_interval_ms: u64,
    /// Polls per join attempt before giving up on it
    pub join_poll_budget: u32,
    pub verify_poll_interval_ms: u64,
    /// Polls of the status channel while waiting for the first frame
    pub verify_poll_budget: u32,
    /// Receive buffer capacity in bytes of hex text
    pub recv_buffer_len: usize,
    /// Try the access point the station is already configured for before scanning
    pub try_remembered: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ssid: DEFAULT_SSID.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            command_port: COMMAND_PORT,
            status_port: STATUS_PORT,
            join_attempts: 2,
            join_poll_interval_ms: 100,
            join_poll_budget: 35,
            verify_poll_interval_ms: 20,
            verify_poll_budget: 61,
            recv_buffer_len: MAX_DATAGRAM_LEN,
            try_remembered: true,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), GvmError> {
        if !(MIN_FRAME_HEX_LEN..=MAX_DATAGRAM_LEN).contains(&self.recv_buffer_len) {
            return Err(GvmError::InvalidConfig(format!(
                "receive buffer of {} bytes outside {}..={}",
                self.recv_buffer_len, MIN_FRAME_HEX_LEN, MAX_DATAGRAM_LEN
            )));
        }
        if self.join_attempts == 0 {
            return Err(GvmError::InvalidConfig("join_attempts must be at least 1".to_string()));
        }
        if self.ssid.is_empty() {
            return Err(GvmError::InvalidConfig("ssid must not be empty".to_string()));
        }
        Ok(())
    }

    fn join_poll_interval(&self) -> Duration {
        Duration::from_millis(self.join_poll_interval_ms)
    }

    fn verify_poll_interval(&self) -> Duration {
        Duration::from_millis(self.verify_poll_interval_ms)
    }
}

/// Notifications from the session. Every method defaults to doing nothing.
pub trait SessionObserver {
    fn on_phase_change(&mut self, _phase: SessionPhase) {}

    /// Called before each join attempt, `attempt` counting from 1 per access point.
    fn on_connect_attempt(&mut self, _bssid: &Bssid, _attempt: u32) {}

    /// Called right after a frame updated the state, before the next frame of
    /// the same datagram is decoded.
    fn on_status_updated(&mut self, _state: &DeviceState) {}
}

impl SessionObserver for () {}

/// Counters of one discovery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandshakeStats {
    /// Scanned access points whose name matched
    pub candidates_tried: usize,
    pub join_attempts: u32,
    pub failed_join_attempts: u32,
    /// Associated networks that never produced a valid frame
    pub verify_timeouts: u32,
}

/// Discovery ran out of candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeFailure {
    /// Phase in which the last candidate failed
    pub phase: SessionPhase,
    pub stats: HandshakeStats,
}

impl fmt::Display for HandshakeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No light found (last failure while {}): {} matching network(s) tried, {} of {} join attempt(s) failed, {} verification timeout(s)",
            self.phase,
            self.stats.candidates_tried,
            self.stats.failed_join_attempts,
            self.stats.join_attempts,
            self.stats.verify_timeouts
        )
    }
}

/// Outcome of a successful discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub access_point: AccessPoint,
    pub stats: HandshakeStats,
    /// Valid frames seen while verifying
    pub frames_received: usize,
}

struct Channels<S> {
    command: S,
    status: S,
}

/// Which of the two channels to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Command,
    Status,
}

/// A session with one light: owns the device state, the two channels and the
/// collaborators used to reach the light.
pub struct Session<W: WifiStation, F: SocketFactory> {
    station: W,
    sockets: F,
    config: SessionConfig,
    phase: SessionPhase,
    state: DeviceState,
    channels: Option<Channels<F::Socket>>,
    disconnect: DisconnectSignal,
    observer: Box<dyn SessionObserver + Send>,
    recv_buf: Vec<u8>,
}

impl<W: WifiStation, F: SocketFactory> Session<W, F> {
    pub fn new(station: W, sockets: F, config: SessionConfig) -> Result<Self, GvmError> {
        config.validate()?;
        let recv_buf = vec![0u8; config.recv_buffer_len];
        Ok(Self {
            station,
            sockets,
            config,
            phase: SessionPhase::Idle,
            state: DeviceState::new(),
            channels: None,
            disconnect: DisconnectSignal::new(),
            observer: Box::new(()),
            recv_buf,
        })
    }

    pub fn with_observer(mut self, observer: impl SessionObserver + Send + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Handle for the platform's disconnect notification.
    pub fn disconnect_signal(&self) -> DisconnectSignal {
        self.disconnect.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot of the last reported settings.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn get(&self, setting: Setting) -> Option<u8> {
        self.state.get(setting)
    }

    pub fn station(&self) -> &W {
        &self.station
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "Session phase");
            self.phase = phase;
            self.observer.on_phase_change(phase);
        }
    }

    /// Find a light and bring the session to [`SessionPhase::Ready`].
    ///
    /// The remembered access point is tried first, then every scanned access
    /// point whose name matches. Fails with [`GvmError::Handshake`] once all of
    /// them are exhausted, or at once with [`GvmError::Socket`] if a channel
    /// cannot be opened.
    pub async fn discover(&mut self) -> Result<DiscoveryReport, GvmError> {
        self.close_channels();
        self.state = DeviceState::new();
        let mut stats = HandshakeStats::default();
        let result = self.run_discovery(&mut stats).await;
        if result.is_err() {
            self.close_channels();
            self.set_phase(SessionPhase::Idle);
        }
        result
    }

    async fn run_discovery(&mut self, stats: &mut HandshakeStats) -> Result<DiscoveryReport, GvmError> {
        self.set_phase(SessionPhase::Joining);
        let mut last_failure = SessionPhase::Joining;

        if self.config.try_remembered {
            if let Some(ap) = self.station.remembered() {
                info!(ssid = %ap.ssid, bssid = %ap.bssid, "Trying remembered access point");
                match self.try_access_point(&ap, stats).await? {
                    Ok(frames_received) => return Ok(self.report(ap, *stats, frames_received)),
                    Err(phase) => last_failure = phase,
                }
            }
        }

        self.station.reset()?;
        let scanned = self.station.scan()?;
        if scanned.is_empty() {
            warn!("No networks found");
        } else {
            debug!(count = scanned.len(), "Networks available");
        }

        for (i, ap) in scanned.iter().enumerate() {
            debug!(
                index = i + 1,
                ssid = %ap.ssid,
                signal = ap.signal,
                bssid = %ap.bssid,
                channel = ap.channel,
                "Found network"
            );
            if ap.ssid != self.config.ssid {
                continue;
            }
            stats.candidates_tried += 1;
            match self.try_access_point(ap, stats).await? {
                Ok(frames_received) => return Ok(self.report(ap.clone(), *stats, frames_received)),
                Err(phase) => last_failure = phase,
            }
        }

        let failure = HandshakeFailure {
            phase: last_failure,
            stats: *stats,
        };
        warn!(%failure, "Discovery failed");
        Err(failure.into())
    }

    fn report(&self, access_point: AccessPoint, stats: HandshakeStats, frames_received: usize) -> DiscoveryReport {
        info!(ssid = %access_point.ssid, bssid = %access_point.bssid, "Light connected");
        DiscoveryReport {
            access_point,
            stats,
            frames_received,
        }
    }

    /// Join and verify one access point. The outer error aborts discovery; the
    /// inner one names the phase in which this candidate failed.
    async fn try_access_point(
        &mut self,
        ap: &AccessPoint,
        stats: &mut HandshakeStats,
    ) -> Result<Result<usize, SessionPhase>, GvmError> {
        self.set_phase(SessionPhase::Joining);
        if !self.join(ap, stats).await {
            info!(bssid = %ap.bssid, "Connect failed, moving on");
            return Ok(Err(SessionPhase::Joining));
        }

        self.set_phase(SessionPhase::Verifying);
        let frames = self.verify().await?;
        if frames == 0 {
            info!(bssid = %ap.bssid, "No light answered on this network");
            stats.verify_timeouts += 1;
            self.close_channels();
            self.set_phase(SessionPhase::Idle);
            return Ok(Err(SessionPhase::Verifying));
        }

        self.set_phase(SessionPhase::Ready);
        Ok(Ok(frames))
    }

    async fn join(&mut self, ap: &AccessPoint, stats: &mut HandshakeStats) -> bool {
        for attempt in 1..=self.config.join_attempts {
            stats.join_attempts += 1;
            self.observer.on_connect_attempt(&ap.bssid, attempt);
            info!(ssid = %ap.ssid, bssid = %ap.bssid, channel = ap.channel, attempt, "Joining access point");

            self.disconnect.clear();
            if let Err(e) = self.station.begin(ap, &self.config.password) {
                warn!(error = %e, "Could not start association");
                stats.failed_join_attempts += 1;
                continue;
            }

            if self.wait_for_association().await {
                return true;
            }
            stats.failed_join_attempts += 1;
            debug!(
                status = ?self.station.status(),
                disconnected = self.disconnect.is_raised(),
                "Join attempt failed"
            );
        }
        false
    }

    async fn wait_for_association(&mut self) -> bool {
        let interval = self.config.join_poll_interval();
        let mut remaining = self.config.join_poll_budget;
        while self.station.status() != LinkStatus::Associated && !self.disconnect.is_raised() && remaining > 0 {
            trace!(status = ?self.station.status(), "Waiting for association");
            remaining -= 1;
            sleep(interval).await;
        }
        self.station.status() == LinkStatus::Associated
    }

    /// Open both channels, say hello and wait for the first valid frame on
    /// the status channel. Returns the number of frames seen.
    async fn verify(&mut self) -> Result<usize, GvmError> {
        self.open_channels()?;
        self.send_hello()?;

        let interval = self.config.verify_poll_interval();
        for _ in 0..self.config.verify_poll_budget {
            let frames = self.read_channel(Channel::Status);
            if frames > 0 {
                debug!(frames, "Received light message, proceeding");
                return Ok(frames);
            }
            sleep(interval).await;
        }
        Ok(0)
    }

    fn open_channels(&mut self) -> Result<(), GvmError> {
        self.close_channels();
        let command_port = self.config.command_port;
        let status_port = self.config.status_port;
        let command = self.sockets.open(command_port).map_err(|source| GvmError::Socket {
            port: command_port,
            source,
        })?;
        let status = self.sockets.open(status_port).map_err(|source| GvmError::Socket {
            port: status_port,
            source,
        })?;
        debug!(command_port, status_port, "Channels open");
        self.channels = Some(Channels { command, status });
        Ok(())
    }

    fn close_channels(&mut self) {
        if self.channels.take().is_some() {
            debug!("Channels closed");
        }
    }

    /// Drain every pending datagram on one channel. Returns the number of
    /// valid frames decoded.
    fn read_channel(&mut self, channel: Channel) -> usize {
        let Some(channels) = &self.channels else {
            return 0;
        };
        let socket = match channel {
            Channel::Command => &channels.command,
            Channel::Status => &channels.status,
        };
        let observer = self.observer.as_mut();
        let mut processed = 0;
        loop {
            match socket.try_recv(&mut self.recv_buf) {
                Ok(Some((len, from))) => {
                    let datagram = &self.recv_buf[..len];
                    debug!(?channel, %from, len, "Received datagram");
                    trace!(text = %hex::printable(datagram), "Message");
                    processed += process_datagram(datagram, &mut self.state, |state| {
                        observer.on_status_updated(state)
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(?channel, error = %e, "Receive failed");
                    break;
                }
            }
        }
        processed
    }

    fn ready_channels(&self) -> Result<&Channels<F::Socket>, GvmError> {
        match (&self.channels, self.phase) {
            (Some(channels), SessionPhase::Verifying | SessionPhase::Ready) => Ok(channels),
            _ => Err(GvmError::NotReady { phase: self.phase }),
        }
    }

    fn broadcast(&self, text: &str) -> Result<(), GvmError> {
        let channels = self.ready_channels()?;
        debug!(text, "Broadcasting");
        channels.command.broadcast(text.as_bytes(), self.config.command_port)?;
        Ok(())
    }

    /// Broadcast the hello message; the light answers with a full status.
    pub fn send_hello(&self) -> Result<(), GvmError> {
        self.broadcast(HELLO_FRAME)
    }

    /// Broadcast a set command for `setting`, clamping `value` first, then a
    /// hello so the light reports its full status even if the acknowledge is
    /// lost. The local state is left alone until the light confirms.
    /// Returns the clamped value.
    pub fn set(&mut self, setting: Setting, value: i32) -> Result<u8, GvmError> {
        if self.phase != SessionPhase::Ready {
            return Err(GvmError::NotReady { phase: self.phase });
        }
        let command = Command::new(setting, value);
        info!(%setting, value = command.value(), "Setting");
        self.broadcast(&command.encode())?;
        self.send_hello()?;
        Ok(command.value())
    }

    pub fn set_power(&mut self, on: bool) -> Result<u8, GvmError> {
        self.set(Setting::Power, on as i32)
    }

    pub fn set_channel(&mut self, channel: i32) -> Result<u8, GvmError> {
        self.set(Setting::Channel, channel)
    }

    pub fn set_brightness(&mut self, percent: i32) -> Result<u8, GvmError> {
        self.set(Setting::Brightness, percent)
    }

    /// `code` in hundreds of kelvin, 32..=56
    pub fn set_color_temperature(&mut self, code: i32) -> Result<u8, GvmError> {
        self.set(Setting::ColorTemperature, code)
    }

    /// `code` in units of 5 degrees, 0..=72
    pub fn set_hue(&mut self, code: i32) -> Result<u8, GvmError> {
        self.set(Setting::Hue, code)
    }

    pub fn set_saturation(&mut self, percent: i32) -> Result<u8, GvmError> {
        self.set(Setting::Saturation, percent)
    }

    /// Process whatever is pending on the status channel, then the command
    /// channel. Never waits. Returns the number of valid frames decoded.
    ///
    /// A raised [`DisconnectSignal`] closes the channels and drops the session
    /// back to [`SessionPhase::Idle`]; the last known state is kept.
    pub fn poll(&mut self) -> Result<usize, GvmError> {
        if self.phase == SessionPhase::Ready && self.disconnect.is_raised() {
            warn!("Link lost, closing channels");
            self.close_channels();
            self.set_phase(SessionPhase::Idle);
        }
        if self.phase != SessionPhase::Ready {
            return Err(GvmError::NotReady { phase: self.phase });
        }
        Ok(self.read_channel(Channel::Status) + self.read_channel(Channel::Command))
    }

    /// Poll until at least one valid frame arrives or `timeout` elapses.
    pub async fn wait_for_message(&mut self, timeout: Duration) -> Result<usize, GvmError> {
        let deadline = Instant::now() + timeout;
        let interval = self.config.verify_poll_interval();
        loop {
            let frames = self.poll()?;
            let now = Instant::now();
            if frames > 0 || now >= deadline {
                return Ok(frames);
            }
            sleep(interval.min(deadline - now)).await;
        }
    }

    /// Close both channels and forget the light's state.
    pub fn disconnect(&mut self) {
        self.close_channels();
        self.state = DeviceState::new();
        self.set_phase(SessionPhase::Idle);
    }
}
