//! Protocol module containing the packet type and the text codec.

pub mod codec;
pub mod messages;

pub use codec::{decode, encode, encode_escaped};
pub use messages::*;
