use thiserror::Error;

use super::channel::ChannelLayout;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    /// Less than a full row was read. Common with non-blocking reads and
    /// not worth reporting.
    #[error("Not enough data to decode a scan (read_size: {read_size} scan_size: {scan_size}).")]
    NotEnoughData { read_size: usize, scan_size: usize },

    #[error("Layout has a scan size of zero.")]
    EmptyScan,

    #[error("Channel '{0}' is not part of the scan.")]
    MissingChannel(String),

    #[error("Scan row of {actual} bytes is too short, expected {expected}.")]
    ShortRow { expected: usize, actual: usize },
}

/// Raw value of a channel in a scan row together with its scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelValue {
    pub raw: i64,
    pub scale: f64,
}

impl ChannelValue {
    /// Value in physical units.
    pub fn physical(&self) -> f64 {
        self.raw as f64 * self.scale
    }
}

/// Select the most recent complete row out of the first `read_size` bytes
/// of `buffer`. Older rows are skipped so that only the freshest sample is
/// reported.
pub fn last_row(buffer: &[u8], read_size: usize, scan_size: usize) -> Result<&[u8], ScanError> {
    if scan_size == 0 {
        return Err(ScanError::EmptyScan);
    }

    let read_size = read_size.min(buffer.len());
    let rows = read_size / scan_size;
    if rows < 1 {
        return Err(ScanError::NotEnoughData {
            read_size,
            scan_size,
        });
    }

    let start = (rows - 1) * scan_size;
    Ok(&buffer[start..start + scan_size])
}

impl ChannelLayout {
    /// Decode `channel` from a single scan row.
    pub fn process_scan(&self, row: &[u8], channel: &str) -> Result<ChannelValue, ScanError> {
        let scan_channel = self
            .channel(channel)
            .ok_or_else(|| ScanError::MissingChannel(channel.to_string()))?;

        let end = scan_channel.byte_offset + scan_channel.channel_type.storage_bytes();
        if row.len() < end {
            return Err(ScanError::ShortRow {
                expected: end,
                actual: row.len(),
            });
        }

        Ok(ChannelValue {
            raw: scan_channel
                .channel_type
                .decode(&row[scan_channel.byte_offset..end]),
            scale: scan_channel.scale,
        })
    }
}
