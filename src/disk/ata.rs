#![allow(unsafe_code)]

use crate::disk::{AtaDevice, SECTOR_SIZE};
use nix::{ioctl_read_bad, ioctl_readwrite_bad};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::instrument;

const HDIO_GET_IDENTITY: nix::libc::c_ulong = 0x030d;
const HDIO_DRIVE_CMD: nix::libc::c_ulong = 0x031f;

const ATA_CHECK_POWER_MODE: u8 = 0xe5;
const ATA_SMART: u8 = 0xb0;
const SMART_READ_VALUES: u8 = 0xd0;

/// `HDIO_DRIVE_CMD` takes four register bytes followed by the data sector.
const DRIVE_CMD_SIZE: usize = 4 + SECTOR_SIZE;

ioctl_read_bad!(hdio_get_identity, HDIO_GET_IDENTITY, [u8; SECTOR_SIZE]);
ioctl_readwrite_bad!(hdio_drive_cmd, HDIO_DRIVE_CMD, [u8; DRIVE_CMD_SIZE]);

/// An ATA device accessed through the Linux `HDIO_*` ioctls.
#[derive(Debug)]
pub struct AtaDeviceImpl {
    file: File,
}

impl AtaDeviceImpl {
    #[instrument(level = "trace")]
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(nix::libc::O_NONBLOCK)
            .open(path)?;
        Ok(Self { file })
    }

    /// Issue a drive command with the given register bytes.
    fn drive_cmd(&self, registers: [u8; 4]) -> io::Result<[u8; DRIVE_CMD_SIZE]> {
        let mut args = [0_u8; DRIVE_CMD_SIZE];
        args[..4].copy_from_slice(&registers);
        // Safety: `args` is sized for the register block plus one sector.
        unsafe { hdio_drive_cmd(self.file.as_raw_fd(), &mut args) }?;
        Ok(args)
    }
}

impl AtaDevice for AtaDeviceImpl {
    #[instrument(skip(self), level = "trace")]
    fn identify(&self) -> io::Result<[u8; SECTOR_SIZE]> {
        let mut identity = [0_u8; SECTOR_SIZE];
        // Safety: the kernel writes exactly one identity sector.
        unsafe { hdio_get_identity(self.file.as_raw_fd(), &mut identity) }?;
        Ok(identity)
    }

    #[instrument(skip(self), level = "trace")]
    fn check_power_mode(&self) -> io::Result<u8> {
        let args = self.drive_cmd([ATA_CHECK_POWER_MODE, 0, 0, 0])?;
        tracing::trace!(sector_count = args[2]);
        Ok(args[2])
    }

    #[instrument(skip(self), level = "trace")]
    fn read_smart_values(&self) -> io::Result<[u8; SECTOR_SIZE]> {
        let args = self.drive_cmd([ATA_SMART, 0, SMART_READ_VALUES, 1])?;
        let mut page = [0_u8; SECTOR_SIZE];
        page.copy_from_slice(&args[4..]);
        Ok(page)
    }
}
