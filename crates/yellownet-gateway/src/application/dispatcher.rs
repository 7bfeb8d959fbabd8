//! Packet routing: local control handler or tunnel.
//!
//! Routing is a pure decision.  [`route`] classifies a decoded packet and the
//! [`Gateway`](crate::application::gateway::Gateway) controller applies the
//! side effects (prompting, connecting, sending).

use yellownet_core::protocol::{Method, Packet};

/// Control resource asking the gateway to open a tunnel to the body address.
pub const SET_ADDRESS: &str = "set_address";

/// A `GTW` command addressed to the gateway itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Open a tunnel to the given address (after user approval).
    SetAddress(String),
    /// A resource the gateway does not implement.
    Unknown(String),
}

/// Where a decoded packet goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Handle locally.
    Control(ControlCommand),
    /// Forward verbatim over the tunnel, if one is open.
    Relay(Packet),
}

/// Classifies a packet.
///
/// Only the `GTW` method is handled locally; every other method, including
/// unknown ones and `SYS`, is relayed untouched.
///
/// ```rust
/// use yellownet_core::protocol::decode;
/// use yellownet_gateway::application::dispatcher::{route, ControlCommand, Route};
///
/// let packet = decode("1.GTW;set_address|10.0.0.5").unwrap();
/// assert_eq!(
///     route(packet),
///     Route::Control(ControlCommand::SetAddress("10.0.0.5".to_string()))
/// );
/// ```
pub fn route(packet: Packet) -> Route {
    if packet.method != Method::Gtw {
        return Route::Relay(packet);
    }

    let command = if packet.resource == SET_ADDRESS {
        ControlCommand::SetAddress(packet.body)
    } else {
        ControlCommand::Unknown(packet.resource)
    };
    Route::Control(command)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
