//! Integration tests for the osc-core wire codecs.
//!
//! These tests push the same packets through both wire forms via the public
//! API and check that every field (address, argument order and types, bundle
//! time tags and nesting) comes back unchanged.  They also cross the two
//! forms, which is exactly what the relay does: UDP in, JSON out, and back.

use osc_core::{
    decode_datagram, decode_json, encode_datagram, encode_json,
    protocol::messages::{Color, MidiMessage},
    OscArgument, OscBundle, OscMessage, OscPacket, TimeTag,
};

fn json_roundtrip(packet: &OscPacket) -> OscPacket {
    let text = encode_json(packet).expect("JSON encode must succeed");
    decode_json(&text).expect("JSON decode must succeed")
}

fn udp_roundtrip(packet: &OscPacket) -> OscPacket {
    let bytes = encode_datagram(packet).expect("datagram encode must succeed");
    decode_datagram(&bytes).expect("datagram decode must succeed")
}

fn sensor_message() -> OscPacket {
    OscMessage::new(
        "/bela/analogOutputs/0",
        vec![OscArgument::Float(0.421875), OscArgument::Float(17.5)],
    )
    .into()
}

fn mixed_message() -> OscPacket {
    OscMessage::new(
        "/osc-test",
        vec![
            OscArgument::Integer(10),
            OscArgument::Float(2.5),
            OscArgument::String("hello".into()),
            OscArgument::Blob(vec![1, 2, 3, 4, 5]),
            OscArgument::Long(-9_007_199_254_740_991),
            OscArgument::Double(0.1),
            OscArgument::Char('é'),
            OscArgument::TimeTag(TimeTag::new(3_900_000_000, 123_456)),
            OscArgument::Color(Color {
                r: 10,
                g: 20,
                b: 30,
                a: 255,
            }),
            OscArgument::Midi(MidiMessage {
                port: 0,
                status: 0xB0,
                data1: 7,
                data2: 100,
            }),
            OscArgument::True,
            OscArgument::False,
            OscArgument::Nil,
            OscArgument::Impulse,
        ],
    )
    .into()
}

fn nested_bundle() -> OscPacket {
    OscBundle::new(
        TimeTag::new(3_913_056_000, 2_147_483_648),
        vec![
            sensor_message(),
            OscBundle::new(
                TimeTag::IMMEDIATELY,
                vec![
                    OscMessage::empty("/inner/a").into(),
                    OscBundle::new(TimeTag::new(1, 1), vec![mixed_message()]).into(),
                ],
            )
            .into(),
            OscMessage::new("/last", vec![OscArgument::Integer(-1)]).into(),
        ],
    )
    .into()
}

#[test]
fn test_json_roundtrip_sensor_message() {
    let original = sensor_message();
    assert_eq!(original, json_roundtrip(&original));
}

#[test]
fn test_json_roundtrip_every_argument_type() {
    let original = mixed_message();
    assert_eq!(original, json_roundtrip(&original));
}

#[test]
fn test_json_roundtrip_nested_bundle() {
    let original = nested_bundle();
    assert_eq!(original, json_roundtrip(&original));
}

#[test]
fn test_udp_roundtrip_every_argument_type() {
    let original = mixed_message();
    assert_eq!(original, udp_roundtrip(&original));
}

#[test]
fn test_udp_roundtrip_nested_bundle() {
    let original = nested_bundle();
    assert_eq!(original, udp_roundtrip(&original));
}

#[test]
fn test_udp_to_json_to_udp_preserves_packet() {
    // Arrange: a datagram as the device would send it
    let original = nested_bundle();
    let datagram = encode_datagram(&original).unwrap();

    // Act: relay direction device → browser, then browser → device
    let text = encode_json(&decode_datagram(&datagram).unwrap()).unwrap();
    let back = encode_datagram(&decode_json(&text).unwrap()).unwrap();

    // Assert: the device gets byte-identical OSC back
    assert_eq!(back, datagram);
}

#[test]
fn test_argument_order_is_preserved() {
    let args: Vec<OscArgument> = (0..32).map(OscArgument::Integer).collect();
    let original: OscPacket = OscMessage::new("/order", args.clone()).into();

    let via_json = json_roundtrip(&original);
    let via_udp = udp_roundtrip(&original);

    assert_eq!(via_json.as_message().unwrap().args, args);
    assert_eq!(via_udp.as_message().unwrap().args, args);
}

#[test]
fn test_float_edge_values_roundtrip_through_json() {
    for v in [0.1f32, -0.0, 1.0e-38, f32::MAX, f32::MIN_POSITIVE, 16_777_217.0] {
        let original: OscPacket = OscMessage::new("/f", vec![OscArgument::Float(v)]).into();
        assert_eq!(original, json_roundtrip(&original), "value {v}");
    }
}
