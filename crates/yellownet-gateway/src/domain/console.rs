//! Lines the gateway writes to the device's serial console.
//!
//! The device runs a text console.  The gateway never writes raw packets to
//! it; every packet is wrapped in the console's `msg` command, which hands
//! the text to the running application:
//!
//! ```text
//! echo off
//! msg 0.SYS;gateway_init|hello world
//! msg 1.MSG;chat|hi from the server
//! ```

use yellownet_core::protocol::{encode, Method, Packet};

/// Console command that stops the device echoing input back to us.
pub const ECHO_OFF: &str = "echo off";

/// Console command that delivers its argument to the running application.
pub const MSG_COMMAND: &str = "msg";

/// Resource of the packet announcing the gateway to the device.
pub const GATEWAY_INIT_RESOURCE: &str = "gateway_init";

/// Body of the gateway announcement.
pub const GATEWAY_INIT_BODY: &str = "hello world";

/// The `SYS` packet the device uses to recognise that a gateway is present.
pub fn gateway_init_packet() -> Packet {
    Packet::new("0", Method::Sys, GATEWAY_INIT_RESOURCE, GATEWAY_INIT_BODY)
}

/// Wraps a packet into a newline-terminated `msg` console line.
pub fn msg_line(packet: &Packet) -> String {
    format!("{MSG_COMMAND} {}\n", encode(packet))
}

/// The two lines sent once when a device is attached, in order.
pub fn handshake_lines() -> [String; 2] {
    [format!("{ECHO_OFF}\n"), msg_line(&gateway_init_packet())]
}
