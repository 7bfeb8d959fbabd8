//! # yellownet-core
//!
//! Shared library for the YellowNet gateway containing the packet type and
//! the line-oriented text codec.
//!
//! This crate has zero dependencies on OS APIs, async runtimes, or network
//! sockets, so the codec can be reused by the gateway, by test harnesses and
//! by YellowNet server implementations alike.
//!
//! # Architecture overview
//!
//! A handheld device talks to the gateway over a serial console.  The gateway
//! relays most packets over a WebSocket tunnel to a YellowNet server and
//! handles a few control packets itself.  Both links carry the same packet
//! format:
//!
//! ```text
//! <id>.<method>;<resource>|<body>
//! ```
//!
//! - **`protocol::messages`** – [`Packet`], [`Method`] and the validity rule.
//! - **`protocol::codec`** – [`encode`] and [`decode`], including the
//!   backslash escape handling.

pub mod protocol;

pub use protocol::codec::{decode, encode, encode_escaped};
pub use protocol::messages::{Method, Packet, PacketError, PacketField};
