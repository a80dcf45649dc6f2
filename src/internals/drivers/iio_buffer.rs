//! Shared plumbing for drivers reading IIO devices through their character
//! device buffer.

use std::{
    fs::{self, OpenOptions},
    io::{self, Read},
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};

use common::iio::{last_row, ChannelLayout, ChannelSpec, ScanError};
use tracing::{debug, trace, warn};

use crate::{
    externals::{
        sysfs::{read_attr, read_attr_as, write_attr, SysfsError},
        udev::UdevDevice,
    },
    internals::core::ports::DriverError,
};

/// Number of scans the kernel buffer holds.
pub const BUFFER_LENGTH: u32 = 128;

/// An enabled IIO buffer together with the layout of its scans. The buffer
/// is disabled again when this is dropped.
#[derive(Debug)]
pub struct BufferDrvData {
    dev_dir: PathBuf,
    dev_path: PathBuf,
    trigger_name: String,
    layout: ChannelLayout,
}

impl BufferDrvData {
    /// Look up the trigger named `<trigger_prefix>-dev<N>`, enable every scan
    /// element and start the buffer.
    pub fn new(device: &UdevDevice, trigger_prefix: &str) -> Result<Self, DriverError> {
        let trigger_name = find_trigger(device, trigger_prefix)?;
        let dev_path = device
            .device_file()
            .ok_or(DriverError::NoDeviceFile)?
            .to_path_buf();
        let dev_dir = device.sysfs_path().to_path_buf();

        // A bad descriptor must fail open before any attribute is written.
        let scan_elements = scan_element_names(&dev_dir.join("scan_elements"))?;
        let layout = build_channel_layout(&dev_dir, &scan_elements)?;
        enable_scan_elements(&dev_dir, &scan_elements)?;

        let data = Self {
            dev_dir,
            dev_path,
            trigger_name,
            layout,
        };
        data.enable_buffer()?;
        Ok(data)
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn trigger_name(&self) -> &str {
        &self.trigger_name
    }

    fn enable_buffer(&self) -> Result<(), SysfsError> {
        write_attr(
            &self.dev_dir.join("trigger/current_trigger"),
            &self.trigger_name,
        )?;
        write_attr(&self.dev_dir.join("buffer/length"), BUFFER_LENGTH)?;
        write_attr(&self.dev_dir.join("buffer/enable"), 1)
    }

    /// Read whatever scans are queued and hand the most recent complete one
    /// to `process`. Returns `None` when there was nothing to process.
    pub fn read_last_scan<R>(
        &self,
        process: impl FnOnce(&ChannelLayout, &[u8]) -> R,
    ) -> Option<R> {
        let mut buffer = vec![0u8; self.layout.read_buffer_len()];
        let read_size = match self.read(&mut buffer) {
            Ok(read_size) => read_size,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                trace!("No new data available on {}", self.dev_path.display());
                return None;
            }
            Err(e) => {
                warn!("Couldn't read from device {}: {}", self.dev_path.display(), e);
                return None;
            }
        };

        match last_row(&buffer, read_size, self.layout.scan_size()) {
            Ok(row) => Some(process(&self.layout, row)),
            Err(ScanError::NotEnoughData { .. }) => None,
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    fn read(&self, buffer: &mut [u8]) -> io::Result<usize> {
        let mut file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.dev_path)?;
        file.read(buffer)
    }
}

impl Drop for BufferDrvData {
    fn drop(&mut self) {
        match write_attr(&self.dev_dir.join("buffer/enable"), 0) {
            Ok(()) => debug!("Disabled buffer of {}", self.dev_dir.display()),
            Err(e) => debug!("{}", e),
        }
    }
}

fn find_trigger(device: &UdevDevice, prefix: &str) -> Result<String, DriverError> {
    let not_found = || {
        warn!(
            "Could not find trigger name associated with {}",
            device.sysfs_path().display()
        );
        DriverError::TriggerNotFound(device.sysfs_path().display().to_string())
    };

    let number = device.number().ok_or_else(not_found)?;
    let trigger_name = format!("{}-dev{}", prefix, number);

    match device
        .client()
        .query_by_subsystem("iio")
        .iter()
        .find(|dev| dev.sysfs_attr("name").as_deref() == Some(trigger_name.as_str()))
    {
        Some(trigger) => {
            debug!("Found associated trigger at {}", trigger.sysfs_path().display());
            Ok(trigger_name)
        }
        None => Err(not_found()),
    }
}

fn scan_element_names(scan_dir: &Path) -> Result<Vec<String>, SysfsError> {
    let entries = fs::read_dir(scan_dir)
        .map_err(|e| SysfsError::FailedToRead(scan_dir.to_path_buf(), e))?;
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| {
            name.strip_prefix("in_")
                .and_then(|rest| rest.strip_suffix("_en"))
                .map(|channel| format!("in_{}", channel))
        })
        .collect();
    names.sort();
    Ok(names)
}

fn enable_scan_elements(dev_dir: &Path, names: &[String]) -> Result<(), SysfsError> {
    let scan_dir = dev_dir.join("scan_elements");
    for name in names {
        write_attr(&scan_dir.join(format!("{}_en", name)), 1)?;
    }
    Ok(())
}

/// Channel name with its last `_` component removed, e.g. `in_accel` for
/// `in_accel_x`.
fn generic_name(name: &str) -> &str {
    name.rsplit_once('_').map_or(name, |(prefix, _)| prefix)
}

fn read_scale(dev_dir: &Path, name: &str) -> Result<f64, SysfsError> {
    for candidate in [name, generic_name(name)] {
        let path = dev_dir.join(format!("{}_scale", candidate));
        if path.exists() {
            return read_attr_as(&path);
        }
    }
    Ok(1f64)
}

fn build_channel_layout(dev_dir: &Path, names: &[String]) -> Result<ChannelLayout, DriverError> {
    let scan_dir = dev_dir.join("scan_elements");
    let mut specs = vec![];
    for name in names {
        let index = read_attr_as(&scan_dir.join(format!("{}_index", name)))?;
        let channel_type = read_attr(&scan_dir.join(format!("{}_type", name)))?
            .parse()
            .map_err(|e| DriverError::ChannelType(name.clone(), e))?;
        let scale = read_scale(dev_dir, name)?;
        trace!("Channel {} index {} type {} scale {}", name, index, channel_type, scale);

        specs.push(ChannelSpec {
            name: name.clone(),
            index,
            channel_type,
            scale,
        });
    }
    Ok(ChannelLayout::new(specs)?)
}
