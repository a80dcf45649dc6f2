use std::{
    fmt::Display,
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use thiserror::Error;
use tracing::{debug, warn};

use super::udev::UdevDevice;

#[derive(Error, Debug)]
pub enum SysfsError {
    /// The attribute does not exist or could not be read.
    #[error("Failed to read '{0}'.")]
    FailedToRead(PathBuf, #[source] io::Error),

    #[error("Failed to write '{0}'.")]
    FailedToWrite(PathBuf, #[source] io::Error),

    /// The attribute was read but did not hold the expected type.
    #[error("Failed to parse '{1}' from '{0}'.")]
    FailedToParse(PathBuf, String),
}

/// Read an attribute, trimming the trailing newline sysfs adds.
pub fn read_attr(path: &Path) -> Result<String, SysfsError> {
    fs::read_to_string(path)
        .map(|value| value.trim().to_string())
        .map_err(|e| SysfsError::FailedToRead(path.to_path_buf(), e))
}

pub fn read_attr_as<T: FromStr>(path: &Path) -> Result<T, SysfsError> {
    let value = read_attr(path)?;
    value
        .parse()
        .map_err(|_| SysfsError::FailedToParse(path.to_path_buf(), value))
}

pub fn write_attr(path: &Path, value: impl Display) -> Result<(), SysfsError> {
    fs::write(path, value.to_string()).map_err(|e| SysfsError::FailedToWrite(path.to_path_buf(), e))
}

/// Sampling frequency written to devices that report zero.
pub const FALLBACK_SAMPLING_FREQUENCY: u32 = 10;

/// Some drivers come up with a sampling frequency of 0 Hz, which makes them
/// never produce data. Bump every `*sampling_frequency` attribute that reads
/// as zero to a sane rate.
pub fn fixup_sampling_frequency(device: &UdevDevice) {
    let entries = match fs::read_dir(device.sysfs_path()) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Failed to list {}: {}", device.sysfs_path().display(), e);
            return;
        }
    };

    for entry in entries.filter_map(|entry| entry.ok()) {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !name.ends_with("sampling_frequency") {
            continue;
        }

        let path = entry.path();
        match read_attr_as::<f64>(&path) {
            Ok(frequency) if frequency == 0f64 => {
                match write_attr(&path, FALLBACK_SAMPLING_FREQUENCY) {
                    Ok(()) => debug!(
                        "Fixed sampling frequency of {} to {} Hz",
                        path.display(),
                        FALLBACK_SAMPLING_FREQUENCY
                    ),
                    Err(e) => warn!("{}: {:?}", e, e),
                }
            }
            Ok(_) => {}
            Err(e) => debug!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::externals::udev::UdevClient;

    #[test]
    fn test_read_attr_as() {
        let dir = tempfile::tempdir().expect("Failed to create tempdir.");
        let path = dir.path().join("in_magn_x_raw");
        fs::write(&path, "-4780\n").unwrap();
        assert_eq!(read_attr_as::<i32>(&path).expect("Failed to read."), -4780);

        fs::write(&path, "nope\n").unwrap();
        assert!(matches!(
            read_attr_as::<i32>(&path),
            Err(SysfsError::FailedToParse(_, value)) if value == "nope"
        ));

        assert!(matches!(
            read_attr_as::<i32>(&dir.path().join("missing")),
            Err(SysfsError::FailedToRead(..))
        ));
    }

    #[test]
    fn test_fixup_sampling_frequency() {
        let dir = tempfile::tempdir().expect("Failed to create tempdir.");
        fs::write(dir.path().join("sampling_frequency"), "0\n").unwrap();
        fs::write(dir.path().join("in_magn_sampling_frequency"), "0.000000\n").unwrap();
        fs::write(dir.path().join("in_accel_sampling_frequency"), "50\n").unwrap();
        fs::write(dir.path().join("sampling_frequency_available"), "0 10 50\n").unwrap();

        let device = UdevDevice::new(UdevClient::default(), "iio", dir.path());
        fixup_sampling_frequency(&device);

        let read = |name: &str| read_attr(&dir.path().join(name)).unwrap();
        assert_eq!(read("sampling_frequency"), "10");
        assert_eq!(read("in_magn_sampling_frequency"), "10");
        assert_eq!(read("in_accel_sampling_frequency"), "50");
        assert_eq!(read("sampling_frequency_available"), "0 10 50");
    }
}
