//! Protocol module containing the message model and both wire codecs.

pub mod codec;
pub mod json;
pub mod messages;

pub use codec::{decode_datagram, encode_datagram, ProtocolError};
pub use json::{decode_json, encode_json};
pub use messages::*;
