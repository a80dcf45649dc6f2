use core::{fmt::Display, str::FromStr};

use thiserror::Error;

/// Byte order of a scan element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Storage description of a single IIO scan element, parsed from the
/// `scan_elements/<channel>_type` attribute.
///
/// The kernel format is `<le|be>:<s|u><bits>/<storage>[X<repeat>]>><shift>`,
/// e.g. `le:s12/16>>4` is a signed 12 bit value stored little endian in a
/// 16 bit word, shifted left by 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelType {
    pub endianness: Endianness,
    pub is_signed: bool,
    pub bits_used: u8,
    pub storage_bits: u8,
    pub repeat: u8,
    pub shift: u8,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelTypeError {
    #[error("Missing '{0}' separator in channel type.")]
    MissingSeparator(&'static str),

    #[error("Unknown endianness '{0}'.")]
    UnknownEndianness(String),

    #[error("Unknown sign marker '{0}'.")]
    UnknownSign(char),

    #[error("Invalid number '{0}' in channel type.")]
    InvalidNumber(String),

    #[error("Unsupported storage size of {0} bits.")]
    UnsupportedStorage(u8),

    #[error("{bits_used} bits shifted by {shift} do not fit in {storage_bits} bits of storage.")]
    BitsOutOfRange {
        bits_used: u8,
        storage_bits: u8,
        shift: u8,
    },
}

fn parse_number(raw: &str) -> Result<u8, ChannelTypeError> {
    raw.trim()
        .parse::<u8>()
        .map_err(|_| ChannelTypeError::InvalidNumber(raw.to_string()))
}

impl FromStr for ChannelType {
    type Err = ChannelTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (endian, rest) = s
            .trim()
            .split_once(':')
            .ok_or(ChannelTypeError::MissingSeparator(":"))?;
        let endianness = match endian {
            "le" => Endianness::Little,
            "be" => Endianness::Big,
            other => return Err(ChannelTypeError::UnknownEndianness(other.to_string())),
        };

        let mut chars = rest.chars();
        let is_signed = match chars.next() {
            Some('s') => true,
            Some('u') => false,
            Some(other) => return Err(ChannelTypeError::UnknownSign(other)),
            None => return Err(ChannelTypeError::MissingSeparator("s|u")),
        };

        let (sizes, shift) = chars
            .as_str()
            .split_once(">>")
            .ok_or(ChannelTypeError::MissingSeparator(">>"))?;
        let (bits_used, storage) = sizes
            .split_once('/')
            .ok_or(ChannelTypeError::MissingSeparator("/"))?;
        let (storage_bits, repeat) = match storage.split_once('X') {
            Some((storage, repeat)) => (parse_number(storage)?, parse_number(repeat)?),
            None => (parse_number(storage)?, 1),
        };
        let bits_used = parse_number(bits_used)?;
        let shift = parse_number(shift)?;

        if !matches!(storage_bits, 8 | 16 | 32 | 64) {
            return Err(ChannelTypeError::UnsupportedStorage(storage_bits));
        }
        if bits_used == 0 || (bits_used as u16 + shift as u16) > storage_bits as u16 {
            return Err(ChannelTypeError::BitsOutOfRange {
                bits_used,
                storage_bits,
                shift,
            });
        }

        Ok(Self {
            endianness,
            is_signed,
            bits_used,
            storage_bits,
            repeat: repeat.max(1),
            shift,
        })
    }
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let endian = match self.endianness {
            Endianness::Little => "le",
            Endianness::Big => "be",
        };
        let sign = if self.is_signed { 's' } else { 'u' };
        write!(f, "{}:{}{}/{}", endian, sign, self.bits_used, self.storage_bits)?;
        if self.repeat > 1 {
            write!(f, "X{}", self.repeat)?;
        }
        write!(f, ">>{}", self.shift)
    }
}

impl ChannelType {
    /// Size in bytes of one storage word.
    pub fn storage_bytes(&self) -> usize {
        (self.storage_bits / 8) as usize
    }

    /// Size in bytes the element occupies in a scan row.
    pub fn scan_bytes(&self) -> usize {
        self.storage_bytes() * self.repeat as usize
    }

    /// Extract the value of the first storage word of `raw`.
    /// `raw` must hold at least `storage_bytes()` bytes.
    pub fn decode(&self, raw: &[u8]) -> i64 {
        let raw = &raw[..self.storage_bytes()];
        let word = match self.endianness {
            Endianness::Little => raw
                .iter()
                .rev()
                .fold(0u64, |acc, byte| (acc << 8) | *byte as u64),
            Endianness::Big => raw.iter().fold(0u64, |acc, byte| (acc << 8) | *byte as u64),
        };

        let mask = match self.bits_used {
            64 => u64::MAX,
            bits => (1u64 << bits) - 1,
        };
        let value = (word >> self.shift) & mask;

        if self.is_signed {
            let unused = 64 - self.bits_used as u32;
            ((value << unused) as i64) >> unused
        } else {
            value as i64
        }
    }
}

/// Descriptor of one enabled channel, as read from sysfs.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    pub name: String,
    pub index: u32,
    pub channel_type: ChannelType,
    pub scale: f64,
}

/// A channel placed inside a scan row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanChannel {
    pub name: String,
    pub index: u32,
    pub byte_offset: usize,
    pub channel_type: ChannelType,
    pub scale: f64,
}

impl ScanChannel {
    pub fn bit_width(&self) -> u8 {
        self.channel_type.bits_used
    }

    pub fn is_signed(&self) -> bool {
        self.channel_type.is_signed
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelLayoutError {
    #[error("No enabled channels.")]
    NoChannels,

    #[error("Channels '{0}' and '{1}' share scan index {2}.")]
    DuplicateIndex(String, String, u32),
}

/// Byte layout of one row of a buffered IIO device. Computed once when the
/// device is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelLayout {
    scan_size: usize,
    channels: Vec<ScanChannel>,
}

impl ChannelLayout {
    /// Order channels by scan index and place each one at the next offset
    /// aligned to its storage size.
    pub fn new(mut specs: Vec<ChannelSpec>) -> Result<Self, ChannelLayoutError> {
        if specs.is_empty() {
            return Err(ChannelLayoutError::NoChannels);
        }
        specs.sort_by_key(|spec| spec.index);

        if let Some(pair) = specs.windows(2).find(|pair| pair[0].index == pair[1].index) {
            return Err(ChannelLayoutError::DuplicateIndex(
                pair[0].name.clone(),
                pair[1].name.clone(),
                pair[0].index,
            ));
        }

        let mut scan_size = 0usize;
        let channels = specs
            .into_iter()
            .map(|spec| {
                let align = spec.channel_type.storage_bytes();
                let byte_offset = match scan_size % align {
                    0 => scan_size,
                    rem => scan_size - rem + align,
                };
                scan_size = byte_offset + spec.channel_type.scan_bytes();
                ScanChannel {
                    name: spec.name,
                    index: spec.index,
                    byte_offset,
                    channel_type: spec.channel_type,
                    scale: spec.scale,
                }
            })
            .collect();

        Ok(Self {
            scan_size,
            channels,
        })
    }

    /// Bytes per scan row.
    pub fn scan_size(&self) -> usize {
        self.scan_size
    }

    pub fn channels(&self) -> &[ScanChannel] {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&ScanChannel> {
        self.channels.iter().find(|channel| channel.name == name)
    }

    /// Size of the buffer used for a single read: enough for
    /// `super::MAX_SCAN_ROWS` rows.
    pub fn read_buffer_len(&self) -> usize {
        self.scan_size * super::MAX_SCAN_ROWS
    }
}
