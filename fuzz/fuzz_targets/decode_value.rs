#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use syno_snmp::ber::Decoder;
use syno_snmp::value::Value;
use syno_snmp::varbind::{VarBind, decode_varbind_list};

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    let _ = Value::decode(&mut Decoder::new(bytes.clone()));
    let _ = VarBind::decode(&mut Decoder::new(bytes.clone()));
    let _ = decode_varbind_list(&mut Decoder::new(bytes));
});
