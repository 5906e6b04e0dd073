//! MIB data and credentials shared by the integration tests.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::time::Duration;
use syno_snmp::{Oid, Value, oid};

pub const AUTH_PASSWORD: &str = "authpass123";
pub const PRIV_PASSWORD: &str = "privpass123";
pub const COMMUNITY: &[u8] = b"public";

/// Short budgets keep the timeout tests fast.
pub const FAST_TIMEOUT: Duration = Duration::from_millis(300);

pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}

pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}

/// SYNOLOGY-SYSTEM-MIB::synoSystem
pub fn syno_system() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 6574, 1)
}

/// SYNOLOGY-DISK-MIB::diskTemperature
pub fn disk_temperature() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 6574, 2, 1, 1, 6)
}

pub fn if_hc_in_octets() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6)
}

pub fn if_hc_out_octets() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 10)
}

/// IF-MIB::ifInOctets, the 32-bit column v1 agents serve
pub fn if_in_octets() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10)
}

pub fn if_out_octets() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 16)
}

pub fn nonexistent_oid() -> Oid {
    oid!(1, 3, 6, 1, 99, 99, 99, 0)
}

fn text(s: &'static str) -> Value {
    Value::OctetString(Bytes::from_static(s.as_bytes()))
}

fn insert_scalars(table: &mut BTreeMap<Oid, Value>, base: &[u32], rows: &[(&[u32], Value)]) {
    for (arcs, value) in rows {
        let oid = Oid::new(base.iter().chain(arcs.iter()).copied());
        table.insert(oid, value.clone());
    }
}

/// A four-bay DiskStation with two network interfaces.
pub fn diskstation_table() -> BTreeMap<Oid, Value> {
    let mut table = BTreeMap::new();

    table.insert(sys_descr(), text("Linux DS918 4.4.59+ #25426 SMP x86_64"));
    table.insert(sys_name(), text("diskstation"));

    insert_scalars(
        &mut table,
        &[1, 3, 6, 1, 4, 1, 6574, 1],
        &[
            (&[1, 0], Value::Integer(1)),
            (&[2, 0], Value::Integer(41)),
            (&[3, 0], Value::Integer(1)),
            (&[4, 1, 0], Value::Integer(1)),
            (&[4, 2, 0], Value::Integer(1)),
            (&[5, 1, 0], text("DS918+")),
            (&[5, 4, 0], Value::Integer(2)),
        ],
    );

    for (index, temp) in [(0, 34), (1, 36), (2, 35), (3, 38)] {
        table.insert(disk_temperature().child(index), Value::Integer(temp));
        // diskStatus follows diskTemperature in the table
        table.insert(
            oid!(1, 3, 6, 1, 4, 1, 6574, 2, 1, 1, 5, index),
            Value::Integer(1),
        );
    }

    insert_scalars(
        &mut table,
        &[1, 3, 6, 1, 4, 1, 2021, 4],
        &[
            (&[3, 0], Value::Integer(2_097_148)),
            (&[4, 0], Value::Integer(2_030_000)),
            (&[5, 0], Value::Integer(8_063_920)),
            (&[6, 0], Value::Integer(512_344)),
            (&[11, 0], Value::Integer(2_542_344)),
            (&[13, 0], Value::Integer(120_512)),
            (&[14, 0], Value::Integer(96_000)),
            (&[15, 0], Value::Integer(6_400_112)),
        ],
    );

    insert_scalars(
        &mut table,
        &[1, 3, 6, 1, 4, 1, 2021, 10, 1, 3],
        &[(&[1], text("0.42")), (&[2], text("0.30")), (&[3], text("0.25"))],
    );

    insert_scalars(
        &mut table,
        &[1, 3, 6, 1, 4, 1, 2021, 11],
        &[
            (&[50, 0], Value::Counter32(1_200)),
            (&[51, 0], Value::Counter32(3)),
            (&[52, 0], Value::Counter32(640)),
            (&[53, 0], Value::Counter32(98_000)),
            (&[54, 0], Value::Counter32(75)),
            (&[55, 0], Value::Counter32(410)),
            (&[56, 0], Value::Counter32(22)),
        ],
    );

    for (index, rx, tx) in [(1, 1_000_000u32, 250_000u32), (2, 5_000, 7_500)] {
        table.insert(if_in_octets().child(index), Value::Counter32(rx));
        table.insert(if_out_octets().child(index), Value::Counter32(tx));
        table.insert(if_hc_in_octets().child(index), Value::Counter64(rx.into()));
        table.insert(if_hc_out_octets().child(index), Value::Counter64(tx.into()));
    }

    table
}
