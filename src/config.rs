use std::{env, path::PathBuf};

use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::{
    externals::udev::{UdevClient, DEFAULT_SYSFS_ROOT, DEFAULT_UDEV_DATA},
    internals::drivers::DriverConfig,
};

pub const FAKE_LIGHT_SENSOR: &str = "FAKE_LIGHT_SENSOR";
pub const FAKE_COMPASS: &str = "FAKE_COMPASS";
pub const SYSFS_ROOT: &str = "SENSOR_PROXY_SYSFS_ROOT";
pub const UDEV_DATA: &str = "SENSOR_PROXY_UDEV_DATA";
pub const VERBOSE: &str = "SENSOR_PROXY_VERBOSE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read environment variable '{0}'.")]
    EnvVar(String, #[source] env::VarError),
}

/// Daemon settings, taken from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub drivers: DriverConfig,
    pub sysfs_root: PathBuf,
    pub udev_data: PathBuf,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            drivers: DriverConfig::default(),
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            udev_data: PathBuf::from(DEFAULT_UDEV_DATA),
            verbose: false,
        }
    }
}

/// Flags count as set when present with any value other than `0`, `false`
/// or nothing at all.
fn is_set(value: Option<String>) -> bool {
    match value.as_deref().map(str::trim) {
        None | Some("") | Some("0") => false,
        Some(value) => !value.eq_ignore_ascii_case("false"),
    }
}

fn read_env_var(key: &str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::EnvVar(key.to_string(), e)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(read_env_var)
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<Option<String>, ConfigError>,
    {
        let defaults = Self::default();
        Ok(Self {
            drivers: DriverConfig {
                fake_light: is_set(lookup(FAKE_LIGHT_SENSOR)?),
                fake_compass: is_set(lookup(FAKE_COMPASS)?),
            },
            sysfs_root: lookup(SYSFS_ROOT)?
                .map(PathBuf::from)
                .unwrap_or(defaults.sysfs_root),
            udev_data: lookup(UDEV_DATA)?
                .map(PathBuf::from)
                .unwrap_or(defaults.udev_data),
            verbose: is_set(lookup(VERBOSE)?),
        })
    }

    pub fn max_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::TRACE
        } else {
            LevelFilter::INFO
        }
    }

    pub fn udev_client(&self) -> UdevClient {
        UdevClient::new(&self.sysfs_root, &self.udev_data)
    }
}
