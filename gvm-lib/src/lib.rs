pub mod command;
pub mod constants;
pub mod crc;
pub mod error;
pub mod frame;
pub mod hex;
pub mod session;
pub mod state;
pub mod station;
pub mod transport;


// Re-export the main types for easy access
pub use command::{Command, Setting, encode_set_command};
pub use error::GvmError;
pub use frame::{Frame, MessageKind, frames, process_datagram};
pub use session::{
    DiscoveryReport, HandshakeFailure, HandshakeStats, Session, SessionConfig, SessionObserver, SessionPhase,
};
pub use state::DeviceState;
pub use station::{AccessPoint, Bssid, DisconnectSignal, HostStation, LinkStatus, WifiStation};
pub use transport::{BroadcastSocket, SocketFactory, UdpBroadcastSocket, UdpSocketFactory};
