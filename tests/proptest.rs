//! Property tests for the codec: anything the client puts on the wire must
//! come back unchanged, and nothing an agent sends may panic the decoder.

use bytes::Bytes;
use proptest::prelude::*;
use syno_snmp::ber::{Decoder, EncodeBuf};
use syno_snmp::message::{CommunityMessage, Message};
use syno_snmp::oid::Oid;
use syno_snmp::pdu::{Pdu, PduType};
use syno_snmp::value::Value;
use syno_snmp::varbind::VarBind;
use syno_snmp::version::Version;

/// OIDs that survive BER: first arc 0..=2, second arc below 40 unless the
/// first is 2, and at least two arcs.
fn arb_oid() -> impl Strategy<Value = Oid> {
    (0u32..=2, any::<u32>(), prop::collection::vec(any::<u32>(), 0..=16)).prop_map(
        |(first, second, rest)| {
            let second = if first < 2 {
                second % 40
            } else {
                second % (u32::MAX - 80)
            };
            Oid::new([first, second].into_iter().chain(rest))
        },
    )
}

fn arb_value() -> impl Strategy<Value = Value> {
    let bytes = || prop::collection::vec(any::<u8>(), 0..=128).prop_map(Bytes::from);
    prop_oneof![
        any::<i32>().prop_map(Value::Integer),
        bytes().prop_map(Value::OctetString),
        Just(Value::Null),
        arb_oid().prop_map(Value::ObjectIdentifier),
        any::<[u8; 4]>().prop_map(Value::IpAddress),
        any::<u32>().prop_map(Value::Counter32),
        any::<u32>().prop_map(Value::Gauge32),
        any::<u32>().prop_map(Value::TimeTicks),
        bytes().prop_map(Value::Opaque),
        any::<u64>().prop_map(Value::Counter64),
        Just(Value::NoSuchObject),
        Just(Value::NoSuchInstance),
        Just(Value::EndOfMibView),
    ]
}

fn arb_response() -> impl Strategy<Value = Pdu> {
    (
        1..=i32::MAX,
        0i32..=5,
        prop::collection::vec((arb_oid(), arb_value()), 0..=12),
    )
        .prop_map(|(request_id, error_status, rows)| Pdu {
            pdu_type: PduType::Response,
            request_id,
            error_status,
            error_index: if error_status == 0 { 0 } else { 1 },
            varbinds: rows.into_iter().map(|(o, v)| VarBind::new(o, v)).collect(),
        })
}

proptest! {
    #[test]
    fn oid_text_round_trip(oid in arb_oid()) {
        prop_assert_eq!(Oid::parse(&oid.to_string()).unwrap(), oid.clone());
        // a leading dot is accepted too
        prop_assert_eq!(Oid::parse(&format!(".{oid}")).unwrap(), oid);
    }

    #[test]
    fn oid_ber_round_trip(oid in arb_oid()) {
        prop_assert_eq!(Oid::from_ber(&oid.to_ber()).unwrap(), oid);
    }

    #[test]
    fn oid_order_is_arc_order(a in arb_oid(), b in arb_oid()) {
        prop_assert_eq!(a.cmp(&b), a.arcs().cmp(b.arcs()));
        if a.starts_with(&b) {
            prop_assert!(a >= b);
        }
    }

    #[test]
    fn varbind_round_trip(oid in arb_oid(), value in arb_value()) {
        let vb = VarBind::new(oid, value);
        let mut buf = EncodeBuf::new();
        vb.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        prop_assert_eq!(VarBind::decode(&mut decoder).unwrap(), vb);
    }

    #[test]
    fn community_message_round_trip(
        version in prop_oneof![Just(Version::V1), Just(Version::V2c)],
        community in prop::collection::vec(any::<u8>(), 0..=32),
        pdu in arb_response(),
    ) {
        let encoded = CommunityMessage::new(version, Bytes::from(community.clone()), pdu.clone()).encode();
        match Message::decode(encoded).unwrap() {
            Message::Community(msg) => {
                prop_assert_eq!(msg.version, version);
                prop_assert_eq!(&msg.community[..], &community[..]);
                prop_assert_eq!(msg.pdu, pdu);
            }
            Message::V3(_) => prop_assert!(false, "decoded as v3"),
        }
    }

    #[test]
    fn decoding_arbitrary_bytes_never_panics(data in prop::collection::vec(any::<u8>(), 0..=512)) {
        let bytes = Bytes::from(data);
        let _ = Message::decode(bytes.clone());
        let _ = Pdu::decode(&mut Decoder::new(bytes.clone()));
        let _ = Value::decode(&mut Decoder::new(bytes));
    }

    #[test]
    fn truncated_messages_are_errors(pdu in arb_response(), cut in any::<prop::sample::Index>()) {
        let encoded = CommunityMessage::new(Version::V2c, Bytes::from_static(b"public"), pdu).encode();
        let len = cut.index(encoded.len());
        prop_assert!(Message::decode(encoded.slice(..len)).is_err());
    }

    #[test]
    fn numeric_text_reads_as_f64(n in -1.0e9f64..1.0e9) {
        let text = format!("{n}");
        let value = Value::OctetString(Bytes::from(text));
        prop_assert_eq!(value.as_f64(), Some(n));
    }
}
