//! YellowNet packet types.
//!
//! A packet is one line of text on the wire:
//!
//! ```text
//! <id>.<method>;<resource>|<body>
//! ```
//!
//! The same grammar is used on the serial link (device ↔ gateway) and on the
//! network tunnel (gateway ↔ YellowNet server).

use std::fmt;

use thiserror::Error;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Separates the `id` field from the `method` field.
pub const ID_DELIMITER: char = '.';

/// Separates the `method` field from the `resource` field.
pub const METHOD_DELIMITER: char = ';';

/// Separates the `resource` field from the `body` field.
pub const RESOURCE_DELIMITER: char = '|';

/// Makes the following character literal.
pub const ESCAPE: char = '\\';

// ── Methods ───────────────────────────────────────────────────────────────────

/// Packet category.
///
/// `GTW` packets are handled by the gateway itself; every other method is
/// relayed untouched.  The decoder accepts methods outside the known set and
/// keeps them in [`Method::Other`] so they carry through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// Reserved for gateway-originated system packets (e.g. `gateway_init`).
    Sys,
    /// Gateway-local control command.
    Gtw,
    /// Request.
    Req,
    /// Answer to a request.
    Asw,
    /// Free-form message.
    Msg,
    /// Any other method text, including the empty string.
    Other(String),
}

impl Method {
    /// Returns the wire representation of this method.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Sys => "SYS",
            Method::Gtw => "GTW",
            Method::Req => "REQ",
            Method::Asw => "ASW",
            Method::Msg => "MSG",
            Method::Other(s) => s,
        }
    }

    /// Returns `true` for the five methods the protocol defines.
    pub fn is_known(&self) -> bool {
        !matches!(self, Method::Other(_))
    }
}

impl From<&str> for Method {
    fn from(value: &str) -> Self {
        match value {
            "SYS" => Method::Sys,
            "GTW" => Method::Gtw,
            "REQ" => Method::Req,
            "ASW" => Method::Asw,
            "MSG" => Method::Msg,
            other => Method::Other(other.to_string()),
        }
    }
}

impl From<String> for Method {
    fn from(value: String) -> Self {
        match Method::from(value.as_str()) {
            Method::Other(_) => Method::Other(value),
            known => known,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Names the packet field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketField {
    Id,
    Method,
    Resource,
    Body,
}

impl fmt::Display for PacketField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketField::Id => "id",
            PacketField::Method => "method",
            PacketField::Resource => "resource",
            PacketField::Body => "body",
        };
        f.write_str(name)
    }
}

/// Reasons a structurally well-formed packet is rejected for relay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// One of the four fields is the empty string.
    #[error("packet field `{0}` is empty")]
    EmptyField(PacketField),
}

// ── Packet ────────────────────────────────────────────────────────────────────

/// One protocol message.
///
/// Packets are short-lived: they are produced by decoding one line (or built
/// by application code), then immediately encoded or dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Logical endpoint address.
    pub id: String,
    /// Packet category.
    pub method: Method,
    /// Command or topic name.
    pub resource: String,
    /// Payload.
    pub body: String,
}

impl Packet {
    /// Builds a packet from its four fields.
    pub fn new(
        id: impl Into<String>,
        method: impl Into<Method>,
        resource: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            resource: resource.into(),
            body: body.into(),
        }
    }

    /// Checks that every field is non-empty.
    ///
    /// Fields are checked in wire order and the first empty one is reported.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::EmptyField`] naming the offending field.
    pub fn validate(&self) -> Result<(), PacketError> {
        if self.id.is_empty() {
            return Err(PacketError::EmptyField(PacketField::Id));
        }
        if self.method.as_str().is_empty() {
            return Err(PacketError::EmptyField(PacketField::Method));
        }
        if self.resource.is_empty() {
            return Err(PacketError::EmptyField(PacketField::Resource));
        }
        if self.body.is_empty() {
            return Err(PacketError::EmptyField(PacketField::Body));
        }
        Ok(())
    }

    /// Returns `true` when [`validate`](Self::validate) succeeds.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Formats the packet in its canonical (unescaped) wire form.
impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{ID_DELIMITER}{}{METHOD_DELIMITER}{}{RESOURCE_DELIMITER}{}",
            self.id, self.method, self.resource, self.body
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
