mod interfaces;
mod measurement;

pub use interfaces::{network_interfaces, SYSFS_NET};
pub use measurement::{Measurement, NAMESPACE};
