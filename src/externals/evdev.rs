use std::{
    fs::{File, OpenOptions},
    io::{self, Read},
    os::{
        fd::{AsRawFd, RawFd},
        unix::fs::OpenOptionsExt,
    },
    path::Path,
};

use common::evdev::{nbits, SwitchBitmask, SW_CNT};

nix::ioctl_read_buf!(eviocgsw, b'E', 0x1b, libc::c_ulong);

/// A readable event stream that can also report the current state of its
/// switches.
pub trait SwitchSource: Read + AsRawFd + Sized {
    /// Current state of every switch, as returned by `EVIOCGSW`.
    fn switch_state(&self) -> io::Result<SwitchBitmask>;

    /// A second handle on the same stream.
    fn try_clone(&self) -> io::Result<Self>;
}

/// An evdev character device opened read-only and non-blocking.
#[derive(Debug)]
pub struct EvdevFile {
    file: File,
}

impl EvdevFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(path)?;
        Ok(Self { file })
    }
}

impl Read for EvdevFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl AsRawFd for EvdevFile {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl SwitchSource for EvdevFile {
    fn switch_state(&self) -> io::Result<SwitchBitmask> {
        let mut words = [0 as libc::c_ulong; nbits(SW_CNT as usize)];
        // SAFETY: the buffer length is passed along with the pointer and the
        // kernel writes at most that many bytes.
        unsafe { eviocgsw(self.file.as_raw_fd(), &mut words) }.map_err(io::Error::from)?;
        Ok(SwitchBitmask::from_words(
            words.iter().map(|word| *word as usize).collect(),
        ))
    }

    fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
        })
    }
}
