use clap::ArgMatches;
use serde::{Deserialize, Deserializer};

use std::path::{Path, PathBuf};
use std::time::Duration;

mod general;
mod log;

pub use general::General;
pub use log::{Level, Log};

fn address() -> String {
    "127.0.0.1:1234".into()
}

fn frequency() -> Duration {
    Duration::from_secs(30)
}

fn ethtool() -> String {
    "ethtool".into()
}

fn timeout() -> Duration {
    Duration::from_secs(2)
}

/// Durations are written the humantime way, eg: `30s` or `1m 30s`
fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let value = String::deserialize(deserializer)?;

    value
        .parse::<humantime::Duration>()
        .map(Into::into)
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to open config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{name} is too short. Minimum is: {min:?}")]
    TooShort { name: &'static str, min: Duration },
    #[error("address must not be empty")]
    EmptyAddress,
    #[error("interface list must not be empty")]
    NoInterfaces,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    general: General,
    #[serde(default)]
    log: Log,
}

impl TryFrom<ArgMatches> for Config {
    type Error = ConfigError;

    fn try_from(args: ArgMatches) -> Result<Self, ConfigError> {
        let mut config = match args.get_one::<PathBuf>("CONFIG") {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(interfaces) = args.get_one::<String>("IFACES") {
            config.general.set_interfaces(
                interfaces
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect(),
            );
        }

        if let Some(address) = args.get_one::<String>("ADDRESS") {
            config.general.set_address(address.clone());
        }

        if let Some(frequency) = args.get_one::<humantime::Duration>("FREQUENCY") {
            config.general.set_frequency((*frequency).into());
        }

        if let Some(ethtool) = args.get_one::<String>("ETHTOOL") {
            config.general.set_ethtool(ethtool.clone());
        }

        if let Some(timeout) = args.get_one::<humantime::Duration>("TIMEOUT") {
            config.general.set_timeout((*timeout).into());
        }

        config.log.raise(args.get_count("VERBOSE"));

        config.check()?;

        Ok(config)
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;

        config.check()?;

        Ok(config)
    }
}

impl Config {
    pub fn load(path: &dyn AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.as_ref().to_path_buf(),
                source,
            })?;

        content.parse()
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        self.general.check()
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn general(&self) -> &General {
        &self.general
    }
}
