//! Kernel input event ABI: switch bitmasks and `struct input_event` records.

use core::{mem::size_of, str::FromStr};

use thiserror::Error;

/// `EV_SW` event type.
pub const EV_SW: u16 = 0x05;

/// `SW_FRONT_PROXIMITY` switch code.
pub const SW_FRONT_PROXIMITY: u16 = 0x0b;

pub const SW_MAX: u16 = 0x10;
pub const SW_CNT: u16 = SW_MAX + 1;

/// The kernel lays bitmaps out as arrays of `unsigned long`.
pub const BITS_PER_LONG: usize = usize::BITS as usize;

/// Number of `unsigned long` words needed to hold `bits` bits.
pub const fn nbits(bits: usize) -> usize {
    (bits - 1) / BITS_PER_LONG + 1
}

const LONG_SIZE: usize = size_of::<usize>();

/// Size of `struct input_event`: a `struct timeval` followed by
/// `__u16 type`, `__u16 code` and `__s32 value`.
pub const INPUT_EVENT_SIZE: usize = 2 * LONG_SIZE + 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitmaskError {
    #[error("Invalid bitmask word '{0}'.")]
    InvalidWord(String),

    #[error("No switches are set.")]
    NoSwitches,

    #[error("{0} switches set, more than the kernel defines.")]
    TooManySwitches(u32),
}

/// A kernel bitmap, least significant word first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SwitchBitmask {
    words: Vec<usize>,
}

impl SwitchBitmask {
    pub fn from_words(words: Vec<usize>) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[usize] {
        &self.words
    }

    pub fn test_bit(&self, bit: u16) -> bool {
        let bit = bit as usize;
        self.words
            .get(bit / BITS_PER_LONG)
            .map_or(false, |word| (word >> (bit % BITS_PER_LONG)) & 1 == 1)
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|word| word.count_ones()).sum()
    }

    /// Parse a `capabilities/sw` attribute and check that it plausibly
    /// describes a switch device.
    pub fn from_capabilities(contents: &str) -> Result<Self, BitmaskError> {
        let bitmask: Self = contents.parse()?;
        let num_bits = bitmask.count_ones();
        if num_bits == 0 {
            return Err(BitmaskError::NoSwitches);
        }
        if num_bits >= SW_CNT as u32 {
            return Err(BitmaskError::TooManySwitches(num_bits));
        }
        Ok(bitmask)
    }
}

impl FromStr for SwitchBitmask {
    type Err = BitmaskError;

    /// Sysfs prints bitmaps as space separated hex words, most significant
    /// word first. The last word holds bits `0..BITS_PER_LONG`, so `"80 0"`
    /// sets bit `BITS_PER_LONG + 7` while `"80"` sets bit 7.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words = s
            .split_whitespace()
            .rev()
            .map(|word| {
                usize::from_str_radix(word, 16)
                    .map_err(|_| BitmaskError::InvalidWord(word.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { words })
    }
}

/// Decoded `struct input_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub time_sec: i64,
    pub time_usec: i64,
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

fn read_long(raw: &[u8], at: usize) -> i64 {
    let mut bytes = [0u8; LONG_SIZE];
    bytes.copy_from_slice(&raw[at..at + LONG_SIZE]);
    isize::from_ne_bytes(bytes) as i64
}

impl InputEvent {
    pub fn from_bytes(raw: &[u8; INPUT_EVENT_SIZE]) -> Self {
        let at = 2 * LONG_SIZE;
        Self {
            time_sec: read_long(raw, 0),
            time_usec: read_long(raw, LONG_SIZE),
            event_type: u16::from_ne_bytes([raw[at], raw[at + 1]]),
            code: u16::from_ne_bytes([raw[at + 2], raw[at + 3]]),
            value: i32::from_ne_bytes([raw[at + 4], raw[at + 5], raw[at + 6], raw[at + 7]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; INPUT_EVENT_SIZE] {
        let mut raw = [0u8; INPUT_EVENT_SIZE];
        let at = 2 * LONG_SIZE;
        raw[..LONG_SIZE].copy_from_slice(&(self.time_sec as isize).to_ne_bytes());
        raw[LONG_SIZE..at].copy_from_slice(&(self.time_usec as isize).to_ne_bytes());
        raw[at..at + 2].copy_from_slice(&self.event_type.to_ne_bytes());
        raw[at + 2..at + 4].copy_from_slice(&self.code.to_ne_bytes());
        raw[at + 4..].copy_from_slice(&self.value.to_ne_bytes());
        raw
    }

    /// Whether this is a change of the front proximity switch.
    pub fn is_front_proximity(&self) -> bool {
        self.event_type == EV_SW && self.code == SW_FRONT_PROXIMITY
    }
}

/// Reassembles input events from reads that may stop part way through a
/// record. Partial bytes are kept until the rest of the record arrives.
#[derive(Debug, Clone)]
pub struct EventAccumulator {
    record: [u8; INPUT_EVENT_SIZE],
    offset: usize,
}

impl Default for EventAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl EventAccumulator {
    pub fn new() -> Self {
        Self {
            record: [0u8; INPUT_EVENT_SIZE],
            offset: 0,
        }
    }

    /// Bytes of the current record received so far.
    pub fn pending(&self) -> usize {
        self.offset
    }

    /// The part of the current record that still has to be read.
    pub fn remaining_mut(&mut self) -> &mut [u8] {
        &mut self.record[self.offset..]
    }

    /// Account for `len` bytes written into `remaining_mut()`. Returns the
    /// event once the record is complete.
    pub fn advance(&mut self, len: usize) -> Option<InputEvent> {
        self.offset = (self.offset + len).min(INPUT_EVENT_SIZE);
        if self.offset < INPUT_EVENT_SIZE {
            return None;
        }
        self.offset = 0;
        Some(InputEvent::from_bytes(&self.record))
    }

    /// Feed an arbitrary chunk of bytes, returning every event it completes.
    pub fn feed(&mut self, mut bytes: &[u8]) -> Vec<InputEvent> {
        let mut events = vec![];
        while !bytes.is_empty() {
            let remaining = self.remaining_mut();
            let len = remaining.len().min(bytes.len());
            remaining[..len].copy_from_slice(&bytes[..len]);
            bytes = &bytes[len..];
            if let Some(event) = self.advance(len) {
                events.push(event);
            }
        }
        events
    }
}
