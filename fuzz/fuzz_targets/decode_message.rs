#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use syno_snmp::ber::Decoder;
use syno_snmp::message::{Message, ScopedPdu};
use syno_snmp::pdu::Pdu;
use syno_snmp::v3::UsmSecurityParams;

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    if let Ok(Message::V3(msg)) = Message::decode(bytes.clone()) {
        let _ = UsmSecurityParams::decode(msg.security_params);
    }
    let _ = ScopedPdu::decode_decrypted(bytes.clone());
    let _ = Pdu::decode(&mut Decoder::new(bytes));
});
