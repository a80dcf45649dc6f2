//! Minimal udev device database access.
//!
//! Devices are enumerated from sysfs and their properties are merged from the
//! kernel `uevent` file and the udev database records under `/run/udev/data`.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, trace};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys";
pub const DEFAULT_UDEV_DATA: &str = "/run/udev/data";
pub const DEFAULT_DEV_ROOT: &str = "/dev";

/// Entry point for enumerating devices. Cheap to clone, every device keeps a
/// copy so that drivers can look up related devices such as IIO triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdevClient {
    sysfs_root: PathBuf,
    udev_data: PathBuf,
    dev_root: PathBuf,
}

impl Default for UdevClient {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT, DEFAULT_UDEV_DATA)
    }
}

impl UdevClient {
    pub fn new(sysfs_root: impl Into<PathBuf>, udev_data: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            udev_data: udev_data.into(),
            dev_root: PathBuf::from(DEFAULT_DEV_ROOT),
        }
    }

    /// Resolve device nodes relative to `dev_root` instead of `/dev`.
    pub fn with_dev_root(mut self, dev_root: impl Into<PathBuf>) -> Self {
        self.dev_root = dev_root.into();
        self
    }

    pub fn sysfs_root(&self) -> &Path {
        &self.sysfs_root
    }

    /// All devices of `subsystem`, sorted by name. Unreadable entries are
    /// skipped.
    pub fn query_by_subsystem(&self, subsystem: &str) -> Vec<UdevDevice> {
        let candidates = [
            self.sysfs_root.join("bus").join(subsystem).join("devices"),
            self.sysfs_root.join("class").join(subsystem),
        ];
        let Some(dir) = candidates.iter().find(|dir| dir.is_dir()) else {
            debug!("No '{}' devices under {}", subsystem, self.sysfs_root.display());
            return vec![];
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Failed to list {}: {}", dir.display(), e);
                return vec![];
            }
        };

        let mut devices: Vec<UdevDevice> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| {
                let path = entry.path();
                fs::canonicalize(&path).unwrap_or(path)
            })
            .filter(|path| path.is_dir())
            .map(|path| self.device_from_sysfs_path(subsystem, path))
            .collect();
        devices.sort_by(|a, b| a.name().cmp(b.name()));
        devices
    }

    /// Build a device for a sysfs directory, loading its properties.
    pub fn device_from_sysfs_path(
        &self,
        subsystem: &str,
        sysfs_path: impl Into<PathBuf>,
    ) -> UdevDevice {
        let mut device = UdevDevice::new(self.clone(), subsystem, sysfs_path);

        if let Ok(uevent) = fs::read_to_string(device.sysfs_path.join("uevent")) {
            device.properties.extend(parse_key_values(&uevent, ""));
        }

        if let Some(devname) = device.properties.get("DEVNAME") {
            device.device_file = Some(self.dev_root.join(devname));
        }

        let db_name = match (device.property("MAJOR"), device.property("MINOR")) {
            (Some(major), Some(minor)) => format!("c{}:{}", major, minor),
            _ => format!("+{}:{}", subsystem, device.sysname),
        };
        match fs::read_to_string(self.udev_data.join(&db_name)) {
            Ok(record) => device.properties.extend(parse_key_values(&record, "E:")),
            Err(_) => trace!("No udev record '{}' for {}", db_name, device.sysname),
        }

        device
    }
}

fn parse_key_values<'a>(
    contents: &'a str,
    prefix: &'a str,
) -> impl Iterator<Item = (String, String)> + 'a {
    contents
        .lines()
        .filter_map(move |line| line.strip_prefix(prefix))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
}

/// A device known to udev.
#[derive(Debug, Clone)]
pub struct UdevDevice {
    client: UdevClient,
    subsystem: String,
    sysname: String,
    sysfs_path: PathBuf,
    device_file: Option<PathBuf>,
    properties: BTreeMap<String, String>,
}

impl UdevDevice {
    /// A bare device with no properties. Use the `with_*` methods to fill it
    /// in, or `UdevClient::device_from_sysfs_path` to load it from disk.
    pub fn new(client: UdevClient, subsystem: &str, sysfs_path: impl Into<PathBuf>) -> Self {
        let sysfs_path = sysfs_path.into();
        let sysname = sysfs_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            client,
            subsystem: subsystem.to_string(),
            sysname,
            sysfs_path,
            device_file: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_device_file(mut self, device_file: impl Into<PathBuf>) -> Self {
        self.device_file = Some(device_file.into());
        self
    }

    pub fn client(&self) -> &UdevClient {
        &self.client
    }

    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    /// Kernel name, e.g. `iio:device0`.
    pub fn name(&self) -> &str {
        &self.sysname
    }

    /// Trailing decimal digits of the kernel name, e.g. `0` for
    /// `iio:device0`.
    pub fn number(&self) -> Option<&str> {
        let digits = self
            .sysname
            .bytes()
            .rev()
            .take_while(|b| b.is_ascii_digit())
            .count();
        match digits {
            0 => None,
            n => Some(&self.sysname[self.sysname.len() - n..]),
        }
    }

    pub fn sysfs_path(&self) -> &Path {
        &self.sysfs_path
    }

    pub fn device_file(&self) -> Option<&Path> {
        self.device_file.as_deref()
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Path of a sysfs attribute of this device.
    pub fn attr_path(&self, attr: &str) -> PathBuf {
        self.sysfs_path.join(attr)
    }

    /// Contents of a sysfs attribute with trailing whitespace removed, or
    /// `None` if it does not exist or cannot be read.
    pub fn sysfs_attr(&self, attr: &str) -> Option<String> {
        fs::read_to_string(self.attr_path(attr))
            .ok()
            .map(|value| value.trim_end().to_string())
    }

    /// Human readable name for log messages.
    pub fn display_name(&self) -> String {
        self.property("NAME")
            .map(|name| name.trim_matches('"').to_string())
            .or_else(|| self.sysfs_attr("name"))
            .unwrap_or_else(|| self.sysname.clone())
    }
}
