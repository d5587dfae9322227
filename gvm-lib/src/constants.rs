// Protocol constants for GVM LED lights

use std::net::Ipv4Addr;

/// Frame magic, ASCII "LT"
pub const MAGIC: [u8; 2] = [0x4C, 0x54];

/// Size of the frame header: magic plus payload length byte (3 bytes)
pub const HEADER_SIZE: usize = 3;

/// Size of the trailing CRC-16/XMODEM checksum (2 bytes)
pub const CHECKSUM_SIZE: usize = 2;

/// Smallest declared payload length that still holds device id, device type,
/// message kind and the checksum
pub const MIN_DECLARED_LEN: usize = 5;

/// Byte offset of the device id inside a frame
pub const DEVICE_ID_OFFSET: usize = 3;

/// Byte offset of the device type inside a frame
pub const DEVICE_TYPE_OFFSET: usize = 4;

/// Byte offset of the message kind inside a frame
pub const KIND_OFFSET: usize = 5;

/// Byte offset where the kind-specific payload starts
pub const PAYLOAD_OFFSET: usize = 6;

/// Size of the status broadcast payload (6 bytes)
pub const STATUS_PAYLOAD_SIZE: usize = 6;

/// Hex digits in the smallest thing worth inspecting (a header)
pub const MIN_FRAME_HEX_LEN: usize = HEADER_SIZE * 2;

/// Practical ceiling for one received datagram of hex text
pub const MAX_DATAGRAM_LEN: usize = 2048;

/// Port the lights listen on for commands; replies to commands arrive here too
pub const COMMAND_PORT: u16 = 2525;

/// Port the lights broadcast their periodic status to
pub const STATUS_PORT: u16 = 1112;

/// All frames are broadcast
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Device id used in outbound set commands
pub const SET_DEVICE_ID: u8 = 0x00;

/// Device type used in outbound set commands
pub const SET_DEVICE_TYPE: u8 = 0x30;

/// Argument count byte of a set command (one value follows)
pub const SET_ARG_COUNT: u8 = 0x01;

/// Sent on first contact. Makes the light answer with a 0x53 message and a
/// full status broadcast, after which it keeps broadcasting status every 5 s.
pub const HELLO_FRAME: &str = "4C5409000053000001009474";

/// Network name the lights advertise
pub const DEFAULT_SSID: &str = "GVM_LED";

/// Pre-shared key of the light's access point
pub const DEFAULT_PASSWORD: &str = "gvm_admin";
