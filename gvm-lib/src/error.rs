use crate::session::{HandshakeFailure, SessionPhase};
use std::io;
use thiserror::Error;

/// The primary error type for the `gvm-lib` library.
///
/// Garbage on the wire is not an error: the frame decoder simply stops and
/// reports how many frames it accepted. Only resource failures, collaborator
/// failures and exhausted handshakes surface here.
#[derive(Error, Debug)]
pub enum GvmError {
    #[error("Failed to open UDP port {port}: {source}")]
    Socket {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Handshake(HandshakeFailure),

    #[error("Session is not ready (current phase: {phase})")]
    NotReady { phase: SessionPhase },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<HandshakeFailure> for GvmError {
    fn from(failure: HandshakeFailure) -> Self {
        GvmError::Handshake(failure)
    }
}
