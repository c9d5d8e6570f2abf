//! Turns the `name: value` lines of an `ethtool -S` dump into measurements.
//!
//! Driver counter names are flat snake_case strings. Per-queue counters
//! (`queue_3_rx_bytes`) and direction-prefixed counters (`tx_dropped`) carry
//! structure in the name itself, which is lifted out into tags so that the
//! metric name is shared across queues and directions:
//!
//! | counter                       | metric                      | tags                   |
//! |-------------------------------|-----------------------------|------------------------|
//! | `queue_0_tx_unmask_interrupt` | `eth.queue.unmaskInterrupt` | `dir=tx`, `queue=0`    |
//! | `rx_bytes`                    | `eth.bytes`                 | `dir=rx`               |
//! | `some_other_stat`             | `eth.someOtherStat`         |                        |

use crate::common::{Measurement, NAMESPACE};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use std::collections::BTreeMap;

lazy_static! {
    static ref QUEUE_COUNTER: Regex = Regex::new(r"^queue_(\d+)_(tx|rx)_(.*)$").unwrap();
    static ref DIRECTION_COUNTER: Regex = Regex::new(r"^(tx|rx)_(.*)$").unwrap();
}

/// Normalize every line of a counter dump, skipping lines that are not
/// counters (for example the `NIC statistics:` header).
pub fn normalize_dump(dump: &str) -> Vec<Measurement> {
    dump.lines()
        .filter_map(|line| {
            let measurement = normalize_line(line);
            if measurement.is_none() {
                trace!("skipping line: {line:?}");
            }
            measurement
        })
        .collect()
}

/// Parse a single `name: value` line. Returns `None` if the line does not
/// contain exactly one colon, if either side is blank, or if the value is
/// not a base-10 signed 64-bit integer.
pub fn normalize_line(line: &str) -> Option<Measurement> {
    let mut parts = line.split(':');

    let (name, value) = match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(value), None) => (name.trim(), value.trim()),
        _ => return None,
    };

    if name.is_empty() || value.is_empty() {
        return None;
    }

    let value: i64 = value.parse().ok()?;

    let (name, tags) = classify(name);

    Some(Measurement::new(name, tags, value))
}

fn classify(counter: &str) -> (String, BTreeMap<String, String>) {
    let mut tags = BTreeMap::new();

    if counter.starts_with("queue_") {
        if let Some(captures) = QUEUE_COUNTER.captures(counter) {
            tags.insert("queue".to_string(), captures[1].to_string());
            tags.insert("dir".to_string(), captures[2].to_string());

            return (
                format!("{NAMESPACE}.queue.{}", camel_case(&captures[3])),
                tags,
            );
        }
    }

    if counter.starts_with("tx_") || counter.starts_with("rx_") {
        if let Some(captures) = DIRECTION_COUNTER.captures(counter) {
            tags.insert("dir".to_string(), captures[1].to_string());

            return (format!("{NAMESPACE}.{}", camel_case(&captures[2])), tags);
        }
    }

    (format!("{NAMESPACE}.{}", camel_case(counter)), tags)
}

/// `unmask_interrupt` becomes `unmaskInterrupt`. The first segment is kept
/// as-is and empty segments disappear, so `a__b_` becomes `aB`.
fn camel_case(name: &str) -> String {
    let mut segments = name.split('_');

    let mut result = segments.next().unwrap_or_default().to_string();

    for segment in segments {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(chars.as_str());
        }
    }

    result
}
