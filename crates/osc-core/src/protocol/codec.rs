//! OSC 1.0 binary codec for the UDP side of the bridge.
//!
//! The byte-level work is done by [`rosc`]; this module converts between the
//! shared message model and `rosc`'s packet types and narrows its error type
//! into [`ProtocolError`].
//!
//! Wire format (one packet per datagram):
//! ```text
//! message: [address, NUL-padded to 4][",tags", NUL-padded to 4][arg bytes...]
//! bundle:  ["#bundle\0"][time tag: 8][size: 4][element]...
//! ```

use rosc::{OscColor, OscMidiMessage, OscTime, OscType};
use thiserror::Error;
use tracing::trace;

use crate::protocol::messages::{
    is_valid_address, Color, MidiMessage, OscArgument, OscBundle, OscMessage, OscPacket, TimeTag,
    MAX_BUNDLE_DEPTH,
};

const BUNDLE_TAG: &[u8] = b"#bundle\0";

/// Errors that can occur while encoding or decoding either wire form.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The text was not valid JSON or did not have the expected JSON shape.
    #[error("malformed JSON: {0}")]
    Json(String),

    /// The document is neither a message nor a bundle.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// A message address does not start with `/`.
    #[error("invalid OSC address: {0:?}")]
    InvalidAddress(String),

    /// An argument type outside the recognised set.
    #[error("unsupported argument type: {0}")]
    UnsupportedArgumentType(String),

    /// A recognised argument type whose value has the wrong shape or range.
    #[error("invalid value for {arg_type} argument: {reason}")]
    InvalidArgumentValue {
        arg_type: &'static str,
        reason: String,
    },

    /// The binary OSC encoder/decoder rejected the datagram.
    #[error("OSC codec error: {0}")]
    Osc(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a packet as one OSC 1.0 datagram.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidAddress`] if any message in the packet has
/// an address not starting with `/`, [`ProtocolError::MalformedPacket`] if
/// bundles nest deeper than [`MAX_BUNDLE_DEPTH`], or [`ProtocolError::Osc`] if
/// the encoder fails.
///
/// # Examples
///
/// ```rust
/// use osc_core::protocol::codec::{decode_datagram, encode_datagram};
/// use osc_core::protocol::messages::{OscArgument, OscMessage, OscPacket};
///
/// let packet = OscPacket::from(OscMessage::new("/test1", vec![OscArgument::Integer(10)]));
/// let bytes = encode_datagram(&packet).unwrap();
/// assert_eq!(decode_datagram(&bytes).unwrap(), packet);
/// ```
pub fn encode_datagram(packet: &OscPacket) -> Result<Vec<u8>, ProtocolError> {
    check_depth(packet)?;
    let wire = to_rosc_packet(packet)?;
    rosc::encoder::encode(&wire).map_err(|e| ProtocolError::Osc(format!("{e:?}")))
}

/// Decodes one OSC 1.0 datagram.
///
/// # Errors
///
/// Returns [`ProtocolError::Osc`] for bytes that are not a well-formed OSC
/// packet, [`ProtocolError::MalformedPacket`] for bundles nested deeper than
/// [`MAX_BUNDLE_DEPTH`], [`ProtocolError::InvalidAddress`] for a bad address,
/// and [`ProtocolError::UnsupportedArgumentType`] for arguments the model does
/// not represent (OSC arrays).
pub fn decode_datagram(bytes: &[u8]) -> Result<OscPacket, ProtocolError> {
    if bytes.is_empty() {
        return Err(ProtocolError::Osc("empty datagram".into()));
    }
    scan_datagram(bytes)?;
    let (rest, wire) =
        rosc::decoder::decode_udp(bytes).map_err(|e| ProtocolError::Osc(format!("{e:?}")))?;
    if !rest.is_empty() {
        trace!("ignoring {} trailing byte(s) after OSC packet", rest.len());
    }
    from_rosc_packet(wire)
}

/// Rejects packets that nest bundles deeper than [`MAX_BUNDLE_DEPTH`].
pub(crate) fn check_depth(packet: &OscPacket) -> Result<(), ProtocolError> {
    let depth = packet.bundle_depth();
    if depth > MAX_BUNDLE_DEPTH {
        return Err(too_deep(depth));
    }
    Ok(())
}

pub(crate) fn too_deep(depth: usize) -> ProtocolError {
    ProtocolError::MalformedPacket(format!(
        "bundles nested {depth} deep; the limit is {MAX_BUNDLE_DEPTH}"
    ))
}

// ── Raw datagram scan ─────────────────────────────────────────────────────────

/// Walks the raw datagram without recursion before `rosc` sees it.
///
/// `rosc` recurses once per bundle level, and the packet it builds is dropped
/// recursively once per array level, so a small datagram can exhaust the
/// stack.  This rejects bundles deeper than [`MAX_BUNDLE_DEPTH`] and any
/// message whose type tags open an array.  Offsets and padding follow `rosc`:
/// strings are padded to four bytes relative to the start of the datagram.
/// Anything else that is malformed is left for `rosc` to report.
fn scan_datagram(bytes: &[u8]) -> Result<(), ProtocolError> {
    let mut pending = vec![(0, bytes.len(), 0)];
    while let Some((start, end, depth)) = pending.pop() {
        let packet = &bytes[start..end];
        if !packet.starts_with(BUNDLE_TAG) {
            if message_opens_array(bytes, start, end) {
                return Err(ProtocolError::UnsupportedArgumentType("array".into()));
            }
            continue;
        }

        let depth = depth + 1;
        if depth > MAX_BUNDLE_DEPTH {
            return Err(too_deep(depth));
        }

        // Tag string, then the 8-byte time tag, then size-prefixed elements.
        let mut cursor = padded_end(start + BUNDLE_TAG.len() - 1) + 8;
        while cursor + 4 <= end {
            let size_bytes = [
                bytes[cursor],
                bytes[cursor + 1],
                bytes[cursor + 2],
                bytes[cursor + 3],
            ];
            let size = u32::from_be_bytes(size_bytes) as usize;
            let element_start = cursor + 4;
            let Some(element_end) = element_start.checked_add(size).filter(|e| *e <= end) else {
                break;
            };
            pending.push((element_start, element_end, depth));
            cursor = element_end;
        }
    }
    Ok(())
}

/// Index just past the padding that follows the NUL at `nul`.
fn padded_end(nul: usize) -> usize {
    nul + 4 - nul % 4
}

fn message_opens_array(bytes: &[u8], start: usize, end: usize) -> bool {
    let Some(address_nul) = bytes[start..end].iter().position(|b| *b == 0) else {
        return false;
    };
    let tags_start = padded_end(start + address_nul);
    if tags_start >= end {
        return false;
    }
    bytes[tags_start..end]
        .iter()
        .take_while(|b| **b != 0)
        .skip(1)
        .any(|b| *b == b'[')
}

// ── Model → rosc ──────────────────────────────────────────────────────────────

fn to_rosc_packet(packet: &OscPacket) -> Result<rosc::OscPacket, ProtocolError> {
    match packet {
        OscPacket::Message(m) => {
            if !is_valid_address(&m.address) {
                return Err(ProtocolError::InvalidAddress(m.address.clone()));
            }
            Ok(rosc::OscPacket::Message(rosc::OscMessage {
                addr: m.address.clone(),
                args: m.args.iter().map(to_rosc_arg).collect(),
            }))
        }
        OscPacket::Bundle(b) => {
            let content = b
                .elements
                .iter()
                .map(to_rosc_packet)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rosc::OscPacket::Bundle(rosc::OscBundle {
                timetag: to_rosc_time(b.time_tag),
                content,
            }))
        }
    }
}

fn to_rosc_arg(arg: &OscArgument) -> OscType {
    match arg {
        OscArgument::Integer(v) => OscType::Int(*v),
        OscArgument::Float(v) => OscType::Float(*v),
        OscArgument::String(v) => OscType::String(v.clone()),
        OscArgument::Blob(v) => OscType::Blob(v.clone()),
        OscArgument::Long(v) => OscType::Long(*v),
        OscArgument::Double(v) => OscType::Double(*v),
        OscArgument::Char(v) => OscType::Char(*v),
        OscArgument::TimeTag(t) => OscType::Time(to_rosc_time(*t)),
        OscArgument::Color(c) => OscType::Color(OscColor {
            red: c.r,
            green: c.g,
            blue: c.b,
            alpha: c.a,
        }),
        OscArgument::Midi(m) => OscType::Midi(OscMidiMessage {
            port: m.port,
            status: m.status,
            data1: m.data1,
            data2: m.data2,
        }),
        OscArgument::True => OscType::Bool(true),
        OscArgument::False => OscType::Bool(false),
        OscArgument::Nil => OscType::Nil,
        OscArgument::Impulse => OscType::Inf,
    }
}

fn to_rosc_time(t: TimeTag) -> OscTime {
    OscTime {
        seconds: t.seconds,
        fractional: t.fractional,
    }
}

// ── rosc → Model ──────────────────────────────────────────────────────────────

fn from_rosc_packet(packet: rosc::OscPacket) -> Result<OscPacket, ProtocolError> {
    match packet {
        rosc::OscPacket::Message(m) => {
            if !is_valid_address(&m.addr) {
                return Err(ProtocolError::InvalidAddress(m.addr));
            }
            let args = m
                .args
                .into_iter()
                .map(from_rosc_arg)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(OscPacket::Message(OscMessage {
                address: m.addr,
                args,
            }))
        }
        rosc::OscPacket::Bundle(b) => {
            let elements = b
                .content
                .into_iter()
                .map(from_rosc_packet)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(OscPacket::Bundle(OscBundle {
                time_tag: TimeTag::new(b.timetag.seconds, b.timetag.fractional),
                elements,
            }))
        }
    }
}

fn from_rosc_arg(arg: OscType) -> Result<OscArgument, ProtocolError> {
    Ok(match arg {
        OscType::Int(v) => OscArgument::Integer(v),
        OscType::Float(v) => OscArgument::Float(v),
        OscType::String(v) => OscArgument::String(v),
        OscType::Blob(v) => OscArgument::Blob(v),
        OscType::Long(v) => OscArgument::Long(v),
        OscType::Double(v) => OscArgument::Double(v),
        OscType::Char(v) => OscArgument::Char(v),
        OscType::Time(t) => OscArgument::TimeTag(TimeTag::new(t.seconds, t.fractional)),
        OscType::Color(c) => OscArgument::Color(Color {
            r: c.red,
            g: c.green,
            b: c.blue,
            a: c.alpha,
        }),
        OscType::Midi(m) => OscArgument::Midi(MidiMessage {
            port: m.port,
            status: m.status,
            data1: m.data1,
            data2: m.data2,
        }),
        OscType::Bool(true) => OscArgument::True,
        OscType::Bool(false) => OscArgument::False,
        OscType::Nil => OscArgument::Nil,
        OscType::Inf => OscArgument::Impulse,
        OscType::Array(_) => return Err(ProtocolError::UnsupportedArgumentType("array".into())),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
