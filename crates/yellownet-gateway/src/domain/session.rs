//! Relay session states and the events a tunnel feeds into them.
//!
//! The tunnel transport is event driven (open, message, error, close).  The
//! gateway models those callbacks as [`TunnelEvent`] values sent over a
//! channel, so they are handled one at a time by the same single-threaded
//! controller that runs the poll loop.

use std::fmt;

/// Lifecycle of the relay session.
///
/// ```text
/// Closed ──connect──▶ Connecting ──opened──▶ Open
///   ▲                     │                   │
///   └────── error / closed / reconnect ───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No tunnel.  Outbound packets are dropped.
    #[default]
    Closed,
    /// Tunnel requested, waiting for the transport to report it is open.
    Connecting,
    /// Tunnel established; packets flow both ways.
    Open,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Closed => "closed",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
        };
        f.write_str(name)
    }
}

/// What happened on a tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelEventKind {
    /// The connection is established.
    Opened,
    /// A text message arrived from the server.
    Message(String),
    /// The connection failed or broke.
    Error(String),
    /// The server closed the connection cleanly.
    Closed,
}

/// An event raised by one specific tunnel.
///
/// `generation` identifies the session that produced the event.  Every
/// connect starts a new generation, so events still in flight from a
/// replaced tunnel can be recognised and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelEvent {
    pub generation: u64,
    pub kind: TunnelEventKind,
}

impl TunnelEvent {
    pub fn new(generation: u64, kind: TunnelEventKind) -> Self {
        Self { generation, kind }
    }
}
