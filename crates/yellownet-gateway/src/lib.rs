//! yellownet-gateway library crate.
//!
//! Relays YellowNet packets between a handheld's serial console and a
//! YellowNet server reached over a WebSocket tunnel.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Handheld (text lines over serial)
//!         ↕
//! [yellownet-gateway]
//!   ├── domain/           Pure types: GatewayConfig, SessionState, TunnelEvent,
//!   │                     console commands
//!   ├── application/      Dispatcher, relay session, Gateway controller,
//!   │                     poll loop, collaborator ports
//!   └── infrastructure/
//!         ├── serial_link/  Device node → line-oriented SerialLink
//!         ├── ws_tunnel/    WebSocket tunnel task (tokio-tungstenite)
//!         ├── prompt/       Terminal approval prompt, alerts
//!         └── config_file/  Optional TOML configuration
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `yellownet-core`, and reaches the
//!   outside world only through the traits in `application::ports`.
//! - `infrastructure` implements those traits with `tokio` and
//!   `tokio-tungstenite`.

/// Domain layer: configuration and session types (no I/O).
pub mod domain;

/// Application layer: routing, relay state machine and poll loop.
pub mod application;

/// Infrastructure layer: serial device, WebSocket tunnel, prompt, config file.
pub mod infrastructure;
