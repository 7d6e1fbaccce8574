//! JSON wire form of the message model, used on the WebSocket side.
//!
//! Every WebSocket text frame carries one JSON document describing one
//! message or bundle:
//!
//! ```json
//! {"oscType":"message","address":"/bela/analogOutputs/0",
//!  "args":[{"type":"float","value":0.5},{"type":"float","value":30}]}
//!
//! {"oscType":"bundle","timeTag":{"raw":[3900000000,0],"native":1691011200000},
//!  "elements":[{"oscType":"message","address":"/a","args":[]}]}
//! ```
//!
//! # Leniency on input
//!
//! Browser programs usually send the bare `{address, args}` shape, so
//! `oscType` is optional when decoding: a document with an `address` is a
//! message, one with `elements` (or `packets`) is a bundle.  `args` defaults to
//! an empty list and a missing `timeTag` means "immediately".  The one-letter
//! OSC type tags (`"i"`, `"f"`, `"s"`, ...) are accepted as aliases of the long
//! type names.
//!
//! Output is always the full shape with `oscType` and long type names.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::protocol::codec::{check_depth, too_deep, ProtocolError};
use crate::protocol::messages::{
    is_valid_address, Color, MidiMessage, OscArgument, OscBundle, OscMessage, OscPacket, TimeTag,
    MAX_BUNDLE_DEPTH,
};

// ── Serde shapes ──────────────────────────────────────────────────────────────

/// Flat JSON object that can hold either a message or a bundle.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonPacket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    osc_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Vec<JsonArgument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_tag: Option<JsonTimeTag>,
    #[serde(default, alias = "packets", skip_serializing_if = "Option::is_none")]
    elements: Option<Vec<JsonPacket>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonArgument {
    #[serde(rename = "type")]
    arg_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    value: Value,
}

/// `raw` is the exact NTP pair; `native` is Unix milliseconds for JS `Date`.
#[derive(Debug, Serialize, Deserialize)]
struct JsonTimeTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    native: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonColor {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonMidi {
    port: u8,
    status: u8,
    data1: u8,
    data2: u8,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Serialises a packet to one JSON document.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidAddress`] if a message address does not
/// start with `/`, [`ProtocolError::MalformedPacket`] if bundles nest deeper
/// than [`MAX_BUNDLE_DEPTH`], or [`ProtocolError::Json`] if serialisation
/// fails.
///
/// # Examples
///
/// ```rust
/// use osc_core::protocol::json::encode_json;
/// use osc_core::protocol::messages::{OscArgument, OscMessage, OscPacket};
///
/// let packet = OscPacket::from(OscMessage::new("/test1", vec![OscArgument::Integer(10)]));
/// assert_eq!(
///     encode_json(&packet).unwrap(),
///     r#"{"oscType":"message","address":"/test1","args":[{"type":"integer","value":10}]}"#
/// );
/// ```
pub fn encode_json(packet: &OscPacket) -> Result<String, ProtocolError> {
    check_depth(packet)?;
    let doc = packet_to_json(packet)?;
    serde_json::to_string(&doc).map_err(|e| ProtocolError::Json(e.to_string()))
}

/// Parses one JSON document into a packet.
///
/// # Errors
///
/// - [`ProtocolError::Json`] for text that is not JSON of the expected shape.
/// - [`ProtocolError::MalformedPacket`] for a document that is neither a
///   message nor a bundle, or that nests bundles deeper than
///   [`MAX_BUNDLE_DEPTH`].
/// - [`ProtocolError::InvalidAddress`] for an address without a leading `/`.
/// - [`ProtocolError::UnsupportedArgumentType`] for an unknown argument type.
/// - [`ProtocolError::InvalidArgumentValue`] for a value of the wrong shape.
pub fn decode_json(text: &str) -> Result<OscPacket, ProtocolError> {
    let doc: JsonPacket =
        serde_json::from_str(text).map_err(|e| ProtocolError::Json(e.to_string()))?;
    packet_from_json(doc, 0)
}

// ── Model → JSON ──────────────────────────────────────────────────────────────

fn packet_to_json(packet: &OscPacket) -> Result<JsonPacket, ProtocolError> {
    match packet {
        OscPacket::Message(m) => {
            if !is_valid_address(&m.address) {
                return Err(ProtocolError::InvalidAddress(m.address.clone()));
            }
            Ok(JsonPacket {
                osc_type: Some("message".into()),
                address: Some(m.address.clone()),
                args: Some(m.args.iter().map(argument_to_json).collect()),
                ..Default::default()
            })
        }
        OscPacket::Bundle(b) => {
            let elements = b
                .elements
                .iter()
                .map(packet_to_json)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(JsonPacket {
                osc_type: Some("bundle".into()),
                time_tag: Some(time_tag_to_json(b.time_tag)),
                elements: Some(elements),
                ..Default::default()
            })
        }
    }
}

fn argument_to_json(arg: &OscArgument) -> JsonArgument {
    let value = match arg {
        OscArgument::Integer(v) => Value::from(*v),
        OscArgument::Float(v) => f32_to_json(*v),
        OscArgument::String(v) => Value::from(v.as_str()),
        OscArgument::Blob(v) => Value::from(v.clone()),
        OscArgument::Long(v) => Value::from(*v),
        OscArgument::Double(v) => Number::from_f64(*v).map_or(Value::Null, Value::Number),
        OscArgument::Char(c) => Value::from(c.to_string()),
        OscArgument::TimeTag(t) => json_value(time_tag_to_json(*t)),
        OscArgument::Color(c) => json_value(JsonColor {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }),
        OscArgument::Midi(m) => json_value(JsonMidi {
            port: m.port,
            status: m.status,
            data1: m.data1,
            data2: m.data2,
        }),
        OscArgument::True => Value::Bool(true),
        OscArgument::False => Value::Bool(false),
        OscArgument::Nil | OscArgument::Impulse => Value::Null,
    };
    JsonArgument {
        arg_type: arg.type_name().to_string(),
        value,
    }
}

/// Writes an `f32` through its shortest decimal form so `0.1f32` appears as
/// `0.1` rather than `0.10000000149011612`.  Non-finite values become `null`.
fn f32_to_json(v: f32) -> Value {
    v.to_string()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

fn time_tag_to_json(t: TimeTag) -> JsonTimeTag {
    JsonTimeTag {
        raw: Some([t.seconds, t.fractional]),
        native: Some(t.to_unix_millis()),
    }
}

fn json_value<T: Serialize>(v: T) -> Value {
    // These helper structs contain only integers and finite floats.
    serde_json::to_value(v).unwrap_or(Value::Null)
}

// ── JSON → Model ──────────────────────────────────────────────────────────────

/// `depth` is the number of bundles enclosing `doc`.
fn packet_from_json(doc: JsonPacket, depth: usize) -> Result<OscPacket, ProtocolError> {
    let is_message = match doc.osc_type.as_deref() {
        Some("message") => true,
        Some("bundle") => false,
        Some(other) => {
            return Err(ProtocolError::MalformedPacket(format!(
                "unknown oscType {other:?}"
            )))
        }
        None if doc.address.is_some() => true,
        None if doc.elements.is_some() => false,
        None => {
            return Err(ProtocolError::MalformedPacket(
                "document has neither an address nor elements".into(),
            ))
        }
    };

    if is_message {
        let address = doc
            .address
            .ok_or_else(|| ProtocolError::MalformedPacket("message without address".into()))?;
        if !is_valid_address(&address) {
            return Err(ProtocolError::InvalidAddress(address));
        }
        let args = doc
            .args
            .unwrap_or_default()
            .into_iter()
            .map(argument_from_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(OscPacket::Message(OscMessage { address, args }))
    } else {
        let depth = depth + 1;
        if depth > MAX_BUNDLE_DEPTH {
            return Err(too_deep(depth));
        }
        let time_tag = match doc.time_tag {
            Some(t) => time_tag_from_json(t)?,
            None => TimeTag::IMMEDIATELY,
        };
        let elements = doc
            .elements
            .unwrap_or_default()
            .into_iter()
            .map(|e| packet_from_json(e, depth))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(OscPacket::Bundle(OscBundle { time_tag, elements }))
    }
}

fn argument_from_json(arg: JsonArgument) -> Result<OscArgument, ProtocolError> {
    let JsonArgument { arg_type, value } = arg;
    Ok(match arg_type.as_str() {
        "integer" | "i" => OscArgument::Integer(integer_value(&value, "integer")?),
        "float" | "f" => OscArgument::Float(f32_value(&value)?),
        "string" | "s" => OscArgument::String(string_value(value, "string")?),
        "blob" | "b" => OscArgument::Blob(blob_value(&value)?),
        "long" | "h" => OscArgument::Long(integer_value(&value, "long")?),
        "double" | "d" => OscArgument::Double(float_value(&value, "double")?),
        "char" | "c" => OscArgument::Char(char_value(value)?),
        "timetag" | "t" => {
            OscArgument::TimeTag(time_tag_from_json(shaped_value(value, "timetag")?)?)
        }
        "color" | "r" => {
            let c: JsonColor = shaped_value(value, "color")?;
            OscArgument::Color(Color {
                r: c.r,
                g: c.g,
                b: c.b,
                a: c.a,
            })
        }
        "midi" | "m" => {
            let m: JsonMidi = shaped_value(value, "midi")?;
            OscArgument::Midi(MidiMessage {
                port: m.port,
                status: m.status,
                data1: m.data1,
                data2: m.data2,
            })
        }
        "true" | "T" => OscArgument::True,
        "false" | "F" => OscArgument::False,
        "nil" | "N" => OscArgument::Nil,
        "impulse" | "I" => OscArgument::Impulse,
        _ => return Err(ProtocolError::UnsupportedArgumentType(arg_type)),
    })
}

fn invalid(arg_type: &'static str, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidArgumentValue {
        arg_type,
        reason: reason.into(),
    }
}

/// Accepts JSON integers and integral floats (`10` and `10.0`).
fn integer_value<T: TryFrom<i64>>(value: &Value, arg_type: &'static str) -> Result<T, ProtocolError> {
    let wide = value
        .as_i64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e18)
                .map(|f| f as i64)
        })
        .ok_or_else(|| invalid(arg_type, format!("expected an integer, got {value}")))?;
    T::try_from(wide).map_err(|_| invalid(arg_type, format!("{wide} is out of range")))
}

fn float_value(value: &Value, arg_type: &'static str) -> Result<f64, ProtocolError> {
    value
        .as_f64()
        .ok_or_else(|| invalid(arg_type, format!("expected a number, got {value}")))
}

/// Rejects numbers that would round to infinity as `f32`.
fn f32_value(value: &Value) -> Result<f32, ProtocolError> {
    let wide = float_value(value, "float")?;
    let narrow = wide as f32;
    if !narrow.is_finite() {
        return Err(invalid("float", format!("{wide} is out of range")));
    }
    Ok(narrow)
}

fn string_value(value: Value, arg_type: &'static str) -> Result<String, ProtocolError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(invalid(arg_type, format!("expected a string, got {other}"))),
    }
}

fn char_value(value: Value) -> Result<char, ProtocolError> {
    let s = string_value(value, "char")?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(invalid("char", format!("expected exactly one character, got {s:?}"))),
    }
}

fn blob_value(value: &Value) -> Result<Vec<u8>, ProtocolError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid("blob", format!("expected an array of bytes, got {value}")))?;
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|b| u8::try_from(b).ok())
                .ok_or_else(|| invalid("blob", format!("{item} is not a byte")))
        })
        .collect()
}

fn shaped_value<T: serde::de::DeserializeOwned>(
    value: Value,
    arg_type: &'static str,
) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|e| invalid(arg_type, e.to_string()))
}

fn time_tag_from_json(t: JsonTimeTag) -> Result<TimeTag, ProtocolError> {
    match (t.raw, t.native) {
        (Some([seconds, fractional]), _) => Ok(TimeTag::new(seconds, fractional)),
        (None, Some(millis)) => Ok(TimeTag::from_unix_millis(millis)),
        (None, None) => Err(invalid("timetag", "expected `raw` or `native`")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_shape_without_osc_type_is_a_message() {
        // Arrange: exactly what a browser program sends
        let text = r#"{"address":"/bela/analogOutputs/0",
                       "args":[{"type":"float","value":0.5},{"type":"float","value":30}]}"#;

        // Act
        let packet = decode_json(text).unwrap();

        // Assert
        assert_eq!(
            packet,
            OscMessage::new(
                "/bela/analogOutputs/0",
                vec![OscArgument::Float(0.5), OscArgument::Float(30.0)]
            )
            .into()
        );
    }

    #[test]
    fn test_message_without_args_has_empty_arg_list() {
        let packet = decode_json(r#"{"address":"/osc-setup-reply"}"#).unwrap();
        assert_eq!(packet, OscMessage::empty("/osc-setup-reply").into());
    }

    #[test]
    fn test_encoded_message_carries_osc_type_and_long_type_names() {
        let packet: OscPacket =
            OscMessage::new("/x", vec![OscArgument::Float(0.1), OscArgument::True]).into();

        let text = encode_json(&packet).unwrap();

        assert_eq!(
            text,
            r#"{"oscType":"message","address":"/x","args":[{"type":"float","value":0.1},{"type":"true","value":true}]}"#
        );
    }

    #[test]
    fn test_short_type_tags_are_accepted() {
        let text = r#"{"address":"/t","args":[
            {"type":"i","value":1},{"type":"f","value":2.5},{"type":"s","value":"x"},
            {"type":"T"},{"type":"N"}]}"#;

        let packet = decode_json(text).unwrap();

        assert_eq!(
            packet.as_message().unwrap().args,
            vec![
                OscArgument::Integer(1),
                OscArgument::Float(2.5),
                OscArgument::String("x".into()),
                OscArgument::True,
                OscArgument::Nil,
            ]
        );
    }

    #[test]
    fn test_unknown_argument_type_is_rejected() {
        let result = decode_json(r#"{"address":"/x","args":[{"type":"quaternion","value":1}]}"#);
        assert_eq!(
            result,
            Err(ProtocolError::UnsupportedArgumentType("quaternion".into()))
        );
    }

    #[test]
    fn test_integral_float_is_accepted_as_integer() {
        let packet = decode_json(r#"{"address":"/x","args":[{"type":"integer","value":10.0}]}"#)
            .unwrap();
        assert_eq!(packet.as_message().unwrap().args, vec![OscArgument::Integer(10)]);
    }

    #[test]
    fn test_fractional_value_for_integer_is_invalid() {
        let result = decode_json(r#"{"address":"/x","args":[{"type":"integer","value":1.5}]}"#);
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidArgumentValue {
                arg_type: "integer",
                ..
            })
        ));
    }

    #[test]
    fn test_integer_out_of_i32_range_is_invalid() {
        let result =
            decode_json(r#"{"address":"/x","args":[{"type":"integer","value":4294967296}]}"#);
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidArgumentValue { .. })
        ));
    }

    #[test]
    fn test_blob_rejects_non_byte_values() {
        let result = decode_json(r#"{"address":"/x","args":[{"type":"blob","value":[1,256]}]}"#);
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidArgumentValue {
                arg_type: "blob",
                ..
            })
        ));
    }

    #[test]
    fn test_char_requires_single_character() {
        assert!(decode_json(r#"{"address":"/x","args":[{"type":"char","value":"ab"}]}"#).is_err());
        let ok = decode_json(r#"{"address":"/x","args":[{"type":"c","value":"z"}]}"#).unwrap();
        assert_eq!(ok.as_message().unwrap().args, vec![OscArgument::Char('z')]);
    }

    #[test]
    fn test_address_without_slash_is_rejected() {
        assert_eq!(
            decode_json(r#"{"address":"bela"}"#),
            Err(ProtocolError::InvalidAddress("bela".into()))
        );
    }

    #[test]
    fn test_float_beyond_f32_range_is_invalid() {
        let result = decode_json(r#"{"address":"/x","args":[{"type":"float","value":1e40}]}"#);
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidArgumentValue {
                arg_type: "float",
                ..
            })
        ));
    }

    #[test]
    fn test_f32_max_is_still_a_float() {
        let packet =
            decode_json(r#"{"address":"/x","args":[{"type":"float","value":3.4028235e38}]}"#)
                .unwrap();
        assert_eq!(packet.as_message().unwrap().args, vec![OscArgument::Float(f32::MAX)]);
    }

    #[test]
    fn test_large_double_is_not_narrowed() {
        let packet = decode_json(r#"{"address":"/x","args":[{"type":"double","value":1e40}]}"#)
            .unwrap();
        assert_eq!(packet.as_message().unwrap().args, vec![OscArgument::Double(1e40)]);
    }

    fn nested_bundle(levels: usize) -> OscPacket {
        let message = OscMessage::new("/a", vec![OscArgument::Float(0.5)]);
        (0..levels).fold(message.into(), |inner, _| {
            OscBundle::new(TimeTag::new(3_900_000_000, 7), vec![inner]).into()
        })
    }

    fn nested_bundle_text(levels: usize) -> String {
        format!(
            "{}{}{}",
            r#"{"elements":["#.repeat(levels),
            r#"{"address":"/a"}"#,
            "]}".repeat(levels)
        )
    }

    #[test]
    fn test_bundles_at_depth_limit_survive_encode_decode() {
        // Arrange
        let packet = nested_bundle(MAX_BUNDLE_DEPTH);

        // Act
        let text = encode_json(&packet).unwrap();

        // Assert
        assert_eq!(decode_json(&text).unwrap(), packet);
    }

    #[test]
    fn test_encode_rejects_bundles_past_depth_limit() {
        assert!(matches!(
            encode_json(&nested_bundle(MAX_BUNDLE_DEPTH + 1)),
            Err(ProtocolError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bundles_past_depth_limit() {
        assert!(decode_json(&nested_bundle_text(MAX_BUNDLE_DEPTH)).is_ok());
        assert!(matches!(
            decode_json(&nested_bundle_text(MAX_BUNDLE_DEPTH + 1)),
            Err(ProtocolError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_not_json_is_a_json_error() {
        assert!(matches!(decode_json("not json"), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_empty_object_is_malformed() {
        assert!(matches!(
            decode_json("{}"),
            Err(ProtocolError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_unknown_osc_type_is_malformed() {
        assert!(matches!(
            decode_json(r#"{"oscType":"stream","address":"/x"}"#),
            Err(ProtocolError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_bundle_accepts_packets_alias_and_native_time() {
        let text = r#"{"timeTag":{"native":0},"packets":[{"address":"/a"}]}"#;

        let packet = decode_json(text).unwrap();

        match packet {
            OscPacket::Bundle(b) => {
                assert_eq!(b.time_tag, TimeTag::new(2_208_988_800, 0));
                assert_eq!(b.elements, vec![OscMessage::empty("/a").into()]);
            }
            other => panic!("expected bundle, got {other:?}"),
        }
    }

    #[test]
    fn test_bundle_without_time_tag_is_immediate() {
        let packet = decode_json(r#"{"oscType":"bundle","elements":[]}"#).unwrap();
        assert_eq!(
            packet,
            OscBundle::new(TimeTag::IMMEDIATELY, Vec::new()).into()
        );
    }

    #[test]
    fn test_raw_time_tag_wins_over_native() {
        let text = r#"{"oscType":"bundle","timeTag":{"raw":[7,8],"native":0},"elements":[]}"#;
        let packet = decode_json(text).unwrap();
        assert_eq!(packet, OscBundle::new(TimeTag::new(7, 8), Vec::new()).into());
    }

    #[test]
    fn test_encode_rejects_invalid_address() {
        assert_eq!(
            encode_json(&OscMessage::empty("x").into()),
            Err(ProtocolError::InvalidAddress("x".into()))
        );
    }

    #[test]
    fn test_structured_arguments_survive_encode_decode() {
        let packet: OscPacket = OscMessage::new(
            "/structured",
            vec![
                OscArgument::Color(Color {
                    r: 255,
                    g: 0,
                    b: 128,
                    a: 64,
                }),
                OscArgument::Midi(MidiMessage {
                    port: 1,
                    status: 0x80,
                    data1: 64,
                    data2: 0,
                }),
                OscArgument::TimeTag(TimeTag::new(1, 2)),
                OscArgument::Blob(vec![9, 8, 7]),
                OscArgument::Impulse,
            ],
        )
        .into();

        let text = encode_json(&packet).unwrap();

        assert_eq!(decode_json(&text).unwrap(), packet);
    }
}
