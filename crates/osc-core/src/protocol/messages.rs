//! OSC message model shared by the relay and the WebSocket client.
//!
//! These types are the in-memory shape of one OSC unit, independent of the
//! wire it travels on.  The [`json`](crate::protocol::json) module maps them
//! to the browser-facing JSON documents; the [`codec`](crate::protocol::codec)
//! module maps them to OSC 1.0 binary datagrams.
//!
//! ```text
//! OscPacket
//!   ├── Message(OscMessage)  address + ordered args
//!   └── Bundle(OscBundle)    time tag + ordered elements (messages or bundles)
//! ```
//!
//! A packet is never mutated once built.  The relay encodes each device packet
//! to JSON once and shares that frame (`Arc<str>`) across browser connections.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Address a device sends to request the setup handshake.
pub const SETUP_ADDRESS: &str = "/osc-setup";

/// Address the relay replies on to acknowledge the setup handshake.
pub const SETUP_REPLY_ADDRESS: &str = "/osc-setup-reply";

/// Deepest bundle nesting either codec accepts.  A message alone is depth 0
/// and a bundle of messages is depth 1.
///
/// Both decoders recurse once per level, so untrusted input deeper than this
/// is rejected before it is parsed.  The limit also keeps every accepted
/// packet inside `serde_json`'s recursion limit on the WebSocket side.
pub const MAX_BUNDLE_DEPTH: usize = 32;

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01).
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;

/// 2^32, the resolution of the fractional part of an OSC time tag.
const FRACTION_SCALE: f64 = 4_294_967_296.0;

// ── Time tags ─────────────────────────────────────────────────────────────────

/// An OSC time tag: a 64-bit NTP timestamp split into whole seconds since
/// 1900-01-01 and a 32-bit binary fraction of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeTag {
    pub seconds: u32,
    pub fractional: u32,
}

impl TimeTag {
    /// The special time tag meaning "process immediately".
    pub const IMMEDIATELY: TimeTag = TimeTag {
        seconds: 0,
        fractional: 1,
    };

    /// Creates a time tag from its raw NTP parts.
    pub const fn new(seconds: u32, fractional: u32) -> Self {
        Self {
            seconds,
            fractional,
        }
    }

    /// Returns `true` for the "immediately" time tag.
    pub fn is_immediate(&self) -> bool {
        *self == Self::IMMEDIATELY
    }

    /// Converts milliseconds since the Unix epoch into a time tag.
    ///
    /// Values before the NTP epoch or past its 2036 rollover saturate.
    pub fn from_unix_millis(millis: f64) -> Self {
        let ntp_secs = millis / 1000.0 + NTP_UNIX_OFFSET_SECS as f64;
        if ntp_secs <= 0.0 {
            return Self::new(0, 0);
        }
        if ntp_secs >= u32::MAX as f64 {
            return Self::new(u32::MAX, u32::MAX);
        }
        let seconds = ntp_secs.trunc();
        let fractional = ((ntp_secs - seconds) * FRACTION_SCALE) as u32;
        Self::new(seconds as u32, fractional)
    }

    /// Milliseconds since the Unix epoch (negative for pre-1970 tags).
    pub fn to_unix_millis(&self) -> f64 {
        let secs = self.seconds as f64 - NTP_UNIX_OFFSET_SECS as f64;
        (secs + self.fractional as f64 / FRACTION_SCALE) * 1000.0
    }

    /// The time tag for the current wall-clock time.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self::from_unix_millis(since_epoch.as_secs_f64() * 1000.0)
    }
}

// ── Argument payloads ─────────────────────────────────────────────────────────

/// An RGBA colour argument (OSC type tag `r`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// A four-byte MIDI message argument (OSC type tag `m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiMessage {
    pub port: u8,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

/// A typed OSC argument.
///
/// The variant fully determines how the value is interpreted and encoded on
/// either wire.  The set is closed: anything a wire decoder cannot map to one
/// of these variants is rejected with
/// [`ProtocolError::UnsupportedArgumentType`](crate::ProtocolError::UnsupportedArgumentType).
#[derive(Debug, Clone, PartialEq)]
pub enum OscArgument {
    /// 32-bit signed integer (`i`).
    Integer(i32),
    /// 32-bit IEEE float (`f`).
    Float(f32),
    /// UTF-8 string (`s`).
    String(String),
    /// Opaque byte blob (`b`).
    Blob(Vec<u8>),
    /// 64-bit signed integer (`h`).
    Long(i64),
    /// 64-bit IEEE float (`d`).
    Double(f64),
    /// Single character (`c`).
    Char(char),
    /// Time tag (`t`).
    TimeTag(TimeTag),
    /// RGBA colour (`r`).
    Color(Color),
    /// MIDI message (`m`).
    Midi(MidiMessage),
    /// Boolean true (`T`), carries no payload bytes.
    True,
    /// Boolean false (`F`), carries no payload bytes.
    False,
    /// Nil (`N`).
    Nil,
    /// Impulse / "infinitum" (`I`).
    Impulse,
}

impl OscArgument {
    /// The JSON `type` name for this argument.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Blob(_) => "blob",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::Char(_) => "char",
            Self::TimeTag(_) => "timetag",
            Self::Color(_) => "color",
            Self::Midi(_) => "midi",
            Self::True => "true",
            Self::False => "false",
            Self::Nil => "nil",
            Self::Impulse => "impulse",
        }
    }

    /// Numeric view of the argument, for feeding sensor values into the
    /// range mapper.  Booleans map to `1.0` / `0.0`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(f64::from(*v)),
            Self::Float(v) => Some(f64::from(*v)),
            Self::Long(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::True => Some(1.0),
            Self::False => Some(0.0),
            _ => None,
        }
    }

    /// String view of the argument.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for OscArgument {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<f32> for OscArgument {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for OscArgument {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<i64> for OscArgument {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<bool> for OscArgument {
    fn from(v: bool) -> Self {
        if v {
            Self::True
        } else {
            Self::False
        }
    }
}

impl From<&str> for OscArgument {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for OscArgument {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

// ── Messages, bundles, packets ────────────────────────────────────────────────

/// A single OSC message.
///
/// `address` must start with `/`; both wire codecs reject anything else.
/// `args` order is significant and is never changed by the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArgument>,
}

impl OscMessage {
    /// Builds a message from an address and argument list.
    pub fn new(address: impl Into<String>, args: Vec<OscArgument>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Builds a message with no arguments.
    pub fn empty(address: impl Into<String>) -> Self {
        Self::new(address, Vec::new())
    }
}

/// An OSC bundle: a time tag plus nested messages and bundles.
#[derive(Debug, Clone, PartialEq)]
pub struct OscBundle {
    pub time_tag: TimeTag,
    pub elements: Vec<OscPacket>,
}

impl OscBundle {
    pub fn new(time_tag: TimeTag, elements: Vec<OscPacket>) -> Self {
        Self { time_tag, elements }
    }
}

/// One OSC unit as carried by a single datagram or WebSocket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle(OscBundle),
}

impl OscPacket {
    /// The JSON `oscType` discriminant: `"message"` or `"bundle"`.
    pub fn osc_type(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Bundle(_) => "bundle",
        }
    }

    /// Returns the message if this is a top-level message.
    pub fn as_message(&self) -> Option<&OscMessage> {
        match self {
            Self::Message(m) => Some(m),
            Self::Bundle(_) => None,
        }
    }

    /// Address of a top-level message; `None` for bundles.
    ///
    /// Bundles are opaque here: an address buried inside a bundle is not
    /// reported.
    pub fn address(&self) -> Option<&str> {
        self.as_message().map(|m| m.address.as_str())
    }

    /// Deepest level of bundle nesting: 0 for a message, 1 for a bundle of
    /// messages, and so on.
    pub fn bundle_depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 0)];
        while let Some((packet, depth)) = pending.pop() {
            if let Self::Bundle(b) = packet {
                let depth = depth + 1;
                deepest = deepest.max(depth);
                pending.extend(b.elements.iter().map(|e| (e, depth)));
            }
        }
        deepest
    }
}

impl From<OscMessage> for OscPacket {
    fn from(m: OscMessage) -> Self {
        Self::Message(m)
    }
}

impl From<OscBundle> for OscPacket {
    fn from(b: OscBundle) -> Self {
        Self::Bundle(b)
    }
}

/// Returns `true` if `address` is an acceptable OSC address pattern.
pub fn is_valid_address(address: &str) -> bool {
    address.starts_with('/')
}

// ── Tests ─────────────────────────────────────────────────────────────────────
