use crate::error::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use tracing::instrument;

#[cfg(target_os = "linux")]
mod ata;

#[cfg(target_os = "linux")]
pub use ata::AtaDeviceImpl;

/// The size of an ATA identity or S.M.A.R.T. data sector.
pub const SECTOR_SIZE: usize = 512;

const SERIAL_RANGE: std::ops::Range<usize> = 20..40;
const MODEL_RANGE: std::ops::Range<usize> = 54..94;
const COMMAND_SET_OFFSET: usize = 164;
const ATTRIBUTE_TABLE_OFFSET: usize = 2;
const ATTRIBUTE_SIZE: usize = 12;
const ATTRIBUTE_COUNT: usize = 30;

const ATTR_REALLOCATED_SECTORS: u8 = 5;
const ATTR_AIRFLOW_TEMPERATURE: u8 = 190;
const ATTR_TEMPERATURE: u8 = 194;
const ATTR_PENDING_SECTORS: u8 = 197;

const ZERO_CELSIUS: f64 = 273.15;

/// Low level ATA commands issued to a block device.
#[cfg_attr(test, mockall::automock)]
pub trait AtaDevice {
    /// Fetch the identity sector.
    fn identify(&self) -> io::Result<[u8; SECTOR_SIZE]>;
    /// Issue CHECK POWER MODE and return the resulting sector count.
    ///
    /// Zero means the drive is in standby.
    fn check_power_mode(&self) -> io::Result<u8>;
    /// Issue SMART READ VALUES and return the attribute page.
    fn read_smart_values(&self) -> io::Result<[u8; SECTOR_SIZE]>;
}

/// A S.M.A.R.T. attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Attribute {
    pub id: u8,
    pub current: u8,
    pub worst: u8,
    pub raw: u64,
}

/// Health information of an ATA block device.
///
/// The S.M.A.R.T. attribute page is read once when the device is opened, and
/// only if the drive supports S.M.A.R.T. and is not in standby.
#[derive(Debug)]
pub struct BlockDevice<D> {
    path: PathBuf,
    device: D,
    identity: [u8; SECTOR_SIZE],
    smart: Option<[u8; SECTOR_SIZE]>,
}

#[cfg(target_os = "linux")]
impl BlockDevice<AtaDeviceImpl> {
    /// Open a block device such as `/dev/sda`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Device` if the device cannot be opened or identified,
    /// or if reading its S.M.A.R.T. data fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let device = AtaDeviceImpl::open(path).map_err(|source| Error::Device {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_device(path, device)
    }
}

impl<D: AtaDevice> BlockDevice<D> {
    /// Wrap an already opened device.
    ///
    /// # Errors
    ///
    /// Returns `Error::Device` if the device cannot be identified or if
    /// reading its S.M.A.R.T. data fails.
    #[instrument(skip(device), level = "trace")]
    pub fn with_device(path: &Path, device: D) -> Result<Self> {
        let device_error = |source: io::Error| Error::Device {
            path: path.to_path_buf(),
            source,
        };
        let identity = device.identify().map_err(device_error)?;
        let mut block_device = Self {
            path: path.to_path_buf(),
            device,
            identity,
            smart: None,
        };
        if block_device.is_smart_supported() && block_device.is_awake() {
            let page = block_device
                .device
                .read_smart_values()
                .map_err(device_error)?;
            block_device.smart = Some(page);
        } else {
            tracing::debug!(path = %path.display(), "skipping S.M.A.R.T. data");
        }
        Ok(block_device)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The device model, cleaned of non-printable characters.
    #[must_use]
    pub fn model(&self) -> String {
        clean_string(&self.identity[MODEL_RANGE])
    }

    /// The device serial number, cleaned of non-printable characters.
    #[must_use]
    pub fn serial(&self) -> String {
        clean_string(&self.identity[SERIAL_RANGE])
    }

    #[must_use]
    pub fn is_smart_supported(&self) -> bool {
        self.identity[COMMAND_SET_OFFSET] & 0x01 != 0
    }

    /// Query the drive for its power state.
    ///
    /// A drive which cannot be queried is reported as asleep.
    #[must_use]
    pub fn is_awake(&self) -> bool {
        match self.device.check_power_mode() {
            Ok(mode) => mode != 0,
            Err(err) => {
                tracing::debug!(path = %self.path.display(), %err, "power mode unavailable");
                false
            }
        }
    }

    /// The S.M.A.R.T. attributes read when the device was opened.
    #[must_use]
    pub fn attributes(&self) -> Vec<Attribute> {
        self.smart
            .as_ref()
            .map(|page| parse_attributes(page))
            .unwrap_or_default()
    }

    /// The number of reallocated and pending sectors.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotSupported` if the device does not support
    /// S.M.A.R.T. and `Error::NotAvailable` if neither counter is reported.
    pub fn bad_sector_count(&self) -> Result<u64> {
        let attributes = self.smart_attributes()?;
        let bad = attributes
            .iter()
            .filter(|attr| matches!(attr.id, ATTR_REALLOCATED_SECTORS | ATTR_PENDING_SECTORS))
            .map(|attr| attr.raw)
            .reduce(u64::saturating_add);
        bad.ok_or_else(|| Error::NotAvailable(String::from("Device does not report bad sectors")))
    }

    /// The drive temperature in kelvin.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotSupported` if the device does not support
    /// S.M.A.R.T. and `Error::NotAvailable` if no temperature is reported.
    pub fn temperature_kelvin(&self) -> Result<f64> {
        let attributes = self.smart_attributes()?;
        let find = |id| attributes.iter().find(|attr| attr.id == id);
        find(ATTR_TEMPERATURE)
            .or_else(|| find(ATTR_AIRFLOW_TEMPERATURE))
            .map(|attr| {
                let raw = attr.raw.to_le_bytes();
                f64::from(u16::from_le_bytes([raw[0], raw[1]])) + ZERO_CELSIUS
            })
            .ok_or_else(|| {
                Error::NotAvailable(String::from("Device does not have a temperature"))
            })
    }

    fn smart_attributes(&self) -> Result<Vec<Attribute>> {
        if !self.is_smart_supported() {
            return Err(Error::NotSupported(String::from(
                "Device does not support SMART",
            )));
        }
        let page = self.smart.as_ref().ok_or_else(|| {
            Error::NotAvailable(String::from("SMART data was not read from the device"))
        })?;
        Ok(parse_attributes(page))
    }
}

fn parse_attributes(page: &[u8; SECTOR_SIZE]) -> Vec<Attribute> {
    page[ATTRIBUTE_TABLE_OFFSET..ATTRIBUTE_TABLE_OFFSET + ATTRIBUTE_COUNT * ATTRIBUTE_SIZE]
        .chunks_exact(ATTRIBUTE_SIZE)
        .filter(|entry| entry[0] != 0)
        .map(|entry| Attribute {
            id: entry[0],
            current: entry[3],
            worst: entry[4],
            raw: entry[5..11]
                .iter()
                .rev()
                .fold(0, |raw, &byte| (raw << 8) | u64::from(byte)),
        })
        .collect()
}

/// Decode a fixed width identity field.
///
/// The field ends at the first NUL, non-printable bytes become spaces, runs of
/// spaces are collapsed and the result is trimmed.
fn clean_string(field: &[u8]) -> String {
    field
        .iter()
        .take_while(|&&byte| byte != 0)
        .map(|&byte| {
            if byte < b' ' || byte >= 0x7f {
                ' '
            } else {
                char::from(byte)
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
