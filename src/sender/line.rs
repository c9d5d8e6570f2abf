//! spectatord line protocol.
//!
//! Format: `C:<name>[,<key>=<value>]*:<value>\n`
//!
//! Only counters (`C`) are produced by this agent. Tags are written in key
//! order.

use crate::common::Measurement;

use std::io::Write;

/// Encode a single measurement as a counter update.
pub fn encode(measurement: &Measurement) -> Vec<u8> {
    let mut record = Vec::with_capacity(32);

    record.extend_from_slice(b"C:");
    record.extend_from_slice(measurement.name().as_bytes());

    for (key, value) in measurement.tags() {
        record.push(b',');
        record.extend_from_slice(key.as_bytes());
        record.push(b'=');
        record.extend_from_slice(value.as_bytes());
    }

    // writing into a Vec can't fail
    let _ = write!(record, ":{}", measurement.value());
    record.push(b'\n');

    record
}

pub fn encode_all(measurements: &[Measurement]) -> Vec<Vec<u8>> {
    measurements.iter().map(encode).collect()
}
