use super::*;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct General {
    // host:port of the spectatord UDP listener
    #[serde(default = "address")]
    address: String,

    // how often all interfaces are sampled
    #[serde(default = "frequency", deserialize_with = "duration")]
    frequency: Duration,

    // interfaces to sample, discovered from sysfs when absent
    #[serde(default)]
    interfaces: Option<Vec<String>>,

    #[serde(default = "ethtool")]
    ethtool: String,

    // deadline for a single ethtool run
    #[serde(default = "timeout", deserialize_with = "duration")]
    timeout: Duration,
}

impl Default for General {
    fn default() -> Self {
        Self {
            address: address(),
            frequency: frequency(),
            interfaces: None,
            ethtool: ethtool(),
            timeout: timeout(),
        }
    }
}

impl General {
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::EmptyAddress);
        }

        if self.frequency < Duration::from_secs(1) {
            return Err(ConfigError::TooShort {
                name: "frequency",
                min: Duration::from_secs(1),
            });
        }

        if self.timeout < Duration::from_millis(1) {
            return Err(ConfigError::TooShort {
                name: "timeout",
                min: Duration::from_millis(1),
            });
        }

        if let Some(interfaces) = &self.interfaces {
            if interfaces.is_empty() || interfaces.iter().any(|i| i.trim().is_empty()) {
                return Err(ConfigError::NoInterfaces);
            }
        }

        Ok(())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    pub fn interfaces(&self) -> Option<&[String]> {
        self.interfaces.as_deref()
    }

    pub fn ethtool(&self) -> &str {
        &self.ethtool
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(super) fn set_address(&mut self, address: String) {
        self.address = address;
    }

    pub(super) fn set_frequency(&mut self, frequency: Duration) {
        self.frequency = frequency;
    }

    pub(super) fn set_interfaces(&mut self, interfaces: Vec<String>) {
        self.interfaces = Some(interfaces);
    }

    pub(super) fn set_ethtool(&mut self, ethtool: String) {
        self.ethtool = ethtool;
    }

    pub(super) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}
