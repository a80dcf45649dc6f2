//! Decoding of buffered IIO scans: channel type strings, scan row layout and
//! per-channel value extraction.

mod channel;
mod scan;

pub use channel::*;
pub use scan::*;

/// Number of rows a single buffered read is sized for.
pub const MAX_SCAN_ROWS: usize = 127;
