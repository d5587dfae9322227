//! Scripted collaborators and captured frames shared by the integration tests

// Not every test file uses every helper
#![allow(dead_code)]

use gvm_lib::constants::{COMMAND_PORT, HELLO_FRAME, STATUS_PORT};
use gvm_lib::{
    AccessPoint, BroadcastSocket, Bssid, DeviceState, DisconnectSignal, GvmError, LinkStatus, SessionObserver,
    SessionPhase, SocketFactory, WifiStation,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex};

/// Status broadcast: on, channel 2, 50 %, 4400 K, 280°, 25 %
pub const STATUS: &str = "4C540B0030030102322C3819D268";

/// Acknowledge of "brightness = 0"
pub const SET_ACK_BRIGHTNESS_0: &str = "4C54080030020002003A89";

/// Acknowledge of "brightness = 3"
pub const SET_ACK_BRIGHTNESS_3: &str = "4C54080030020002030AEA";

pub const LIGHT_SSID: &str = "GVM_LED";

pub fn access_point(ssid: &str, last: u8) -> AccessPoint {
    AccessPoint {
        ssid: ssid.to_string(),
        signal: -40 - last as i32,
        bssid: bssid(last),
        channel: 6,
    }
}

pub fn bssid(last: u8) -> Bssid {
    Bssid([0xAC, 0x67, 0xB2, 0x00, 0x00, last])
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The radio environment shared by the scripted station and sockets.
#[derive(Debug, Default)]
pub struct World {
    /// Access point the station is currently associated with
    pub associated: Option<Bssid>,
    /// Access points that have a light behind them
    pub lights: HashSet<Bssid>,
    /// Pending datagrams per local port
    pub inbox: HashMap<u16, VecDeque<Vec<u8>>>,
    /// Everything broadcast, with destination port
    pub sent: Vec<(u16, String)>,
    pub open_sockets: usize,
    pub opened_total: usize,
    /// Opening this port fails
    pub fail_open_port: Option<u16>,
    /// Every broadcast fails
    pub fail_broadcast: bool,
    /// Raised by the station right after every `begin`
    pub raise_on_begin: Option<DisconnectSignal>,
}

pub type SharedWorld = Arc<Mutex<World>>;

pub fn world() -> SharedWorld {
    Arc::new(Mutex::new(World::default()))
}

pub fn deliver(world: &SharedWorld, port: u16, text: &str) {
    world
        .lock()
        .unwrap()
        .inbox
        .entry(port)
        .or_default()
        .push_back(text.as_bytes().to_vec());
}

pub fn sent(world: &SharedWorld) -> Vec<(u16, String)> {
    world.lock().unwrap().sent.clone()
}

/// Station with a scripted scan result and association behaviour.
pub struct ScriptedStation {
    world: SharedWorld,
    pub remembered: Option<AccessPoint>,
    pub scan_results: Vec<AccessPoint>,
    /// The first this-many `begin` calls never associate
    pub fail_first: u32,
    /// Access points that never associate
    pub unreachable: HashSet<Bssid>,
    pub begins: Vec<Bssid>,
    pub resets: u32,
    pub scans: u32,
    current: Option<Bssid>,
}

impl ScriptedStation {
    pub fn new(world: &SharedWorld) -> Self {
        Self {
            world: world.clone(),
            remembered: None,
            scan_results: Vec::new(),
            fail_first: 0,
            unreachable: HashSet::new(),
            begins: Vec::new(),
            resets: 0,
            scans: 0,
            current: None,
        }
    }
}

impl WifiStation for ScriptedStation {
    fn remembered(&self) -> Option<AccessPoint> {
        self.remembered.clone()
    }

    fn reset(&mut self) -> Result<(), GvmError> {
        self.resets += 1;
        self.current = None;
        self.world.lock().unwrap().associated = None;
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<AccessPoint>, GvmError> {
        self.scans += 1;
        Ok(self.scan_results.clone())
    }

    fn begin(&mut self, ap: &AccessPoint, _password: &str) -> Result<(), GvmError> {
        self.begins.push(ap.bssid);
        self.current = Some(ap.bssid);
        let mut world = self.world.lock().unwrap();
        let fails = self.begins.len() as u32 <= self.fail_first || self.unreachable.contains(&ap.bssid);
        world.associated = if fails { None } else { Some(ap.bssid) };
        if let Some(signal) = &world.raise_on_begin {
            signal.raise();
        }
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        let world = self.world.lock().unwrap();
        match (self.current, world.associated) {
            (Some(current), Some(associated)) if current == associated => LinkStatus::Associated,
            (Some(_), _) => LinkStatus::Connecting,
            (None, _) => LinkStatus::Idle,
        }
    }
}

/// Socket bound to a port of the scripted world. The light behind the
/// associated access point, if any, answers hellos with a status broadcast.
pub struct MockSocket {
    port: u16,
    world: SharedWorld,
}

impl BroadcastSocket for MockSocket {
    fn try_recv(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let mut world = self.world.lock().unwrap();
        let Some(datagram) = world.inbox.get_mut(&self.port).and_then(|q| q.pop_front()) else {
            return Ok(None);
        };
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        let from = SocketAddrV4::new(Ipv4Addr::new(192, 168, 4, 1), COMMAND_PORT);
        Ok(Some((len, from.into())))
    }

    fn broadcast(&self, payload: &[u8], port: u16) -> io::Result<usize> {
        let mut world = self.world.lock().unwrap();
        if world.fail_broadcast {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "broadcast not permitted"));
        }
        let text = String::from_utf8_lossy(payload).into_owned();
        let light_present = world.associated.is_some_and(|b| world.lights.contains(&b));
        if light_present && text == HELLO_FRAME {
            world
                .inbox
                .entry(STATUS_PORT)
                .or_default()
                .push_back(STATUS.as_bytes().to_vec());
        }
        world.sent.push((port, text));
        Ok(payload.len())
    }
}

impl Drop for MockSocket {
    fn drop(&mut self) {
        if let Ok(mut world) = self.world.lock() {
            world.open_sockets -= 1;
        }
    }
}

pub struct MockSockets {
    world: SharedWorld,
}

impl MockSockets {
    pub fn new(world: &SharedWorld) -> Self {
        Self { world: world.clone() }
    }
}

impl SocketFactory for MockSockets {
    type Socket = MockSocket;

    fn open(&mut self, port: u16) -> io::Result<MockSocket> {
        let mut world = self.world.lock().unwrap();
        if world.fail_open_port == Some(port) {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, "address in use"));
        }
        world.open_sockets += 1;
        world.opened_total += 1;
        Ok(MockSocket {
            port,
            world: self.world.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Phase(SessionPhase),
    Attempt(Bssid, u32),
    Status(DeviceState),
}

/// Observer that records every notification in order.
#[derive(Debug, Clone, Default)]
pub struct Recorder(pub Arc<Mutex<Vec<Event>>>);

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> Vec<(Bssid, u32)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Attempt(b, n) => Some((b, n)),
                _ => None,
            })
            .collect()
    }

    pub fn status_updates(&self) -> usize {
        self.events().iter().filter(|e| matches!(e, Event::Status(_))).count()
    }
}

impl SessionObserver for Recorder {
    fn on_phase_change(&mut self, phase: SessionPhase) {
        self.0.lock().unwrap().push(Event::Phase(phase));
    }

    fn on_connect_attempt(&mut self, bssid: &Bssid, attempt: u32) {
        self.0.lock().unwrap().push(Event::Attempt(*bssid, attempt));
    }

    fn on_status_updated(&mut self, state: &DeviceState) {
        self.0.lock().unwrap().push(Event::Status(*state));
    }
}

/// A session that has discovered the light behind `bssid(1)`, with the
/// broadcast log emptied.
pub async fn ready_session(world: &SharedWorld) -> (gvm_lib::Session<ScriptedStation, MockSockets>, Recorder) {
    init_logging();
    world.lock().unwrap().lights.insert(bssid(1));
    let mut station = ScriptedStation::new(world);
    station.remembered = Some(access_point(LIGHT_SSID, 1));

    let recorder = Recorder::default();
    let mut session = gvm_lib::Session::new(station, MockSockets::new(world), gvm_lib::SessionConfig::default())
        .expect("default config is valid")
        .with_observer(recorder.clone());
    session.discover().await.expect("light answers");
    world.lock().unwrap().sent.clear();
    (session, recorder)
}
