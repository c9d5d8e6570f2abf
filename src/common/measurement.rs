use std::collections::BTreeMap;

/// Namespace root shared by every metric this agent produces.
pub const NAMESPACE: &str = "eth";

/// A normalized counter reading, ready to be encoded for the daemon.
///
/// Tags are kept sorted by key so that the encoded form of a measurement is
/// the same on every run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Measurement {
    name: String,
    tags: BTreeMap<String, String>,
    value: i64,
}

impl Measurement {
    pub(crate) fn new(name: String, tags: BTreeMap<String, String>, value: i64) -> Self {
        debug_assert!(name.starts_with(NAMESPACE));

        Self { name, tags, value }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}
