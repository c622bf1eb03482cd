use crate::config::defaults;
use crate::error::{Error, Result};
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::instrument;

const ZERO_CELSIUS: f64 = 273.15;

/// The kind of measurement a sensor reports.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum SensorKind {
    /// Volts.
    Voltage,
    /// Revolutions per minute.
    Fan,
    /// Kelvin.
    Temperature,
    /// Watts.
    Power,
}

impl SensorKind {
    /// The hwmon attribute prefix of this kind.
    const fn prefix(self) -> &'static str {
        match self {
            Self::Voltage => "in",
            Self::Fan => "fan",
            Self::Temperature => "temp",
            Self::Power => "power",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "in" => Some(Self::Voltage),
            "fan" => Some(Self::Fan),
            "temp" => Some(Self::Temperature),
            "power" => Some(Self::Power),
            _ => None,
        }
    }

    /// Convert a raw hwmon reading into the unit of this kind.
    fn scale(self, raw: f64) -> f64 {
        match self {
            Self::Voltage => raw / 1_000.0,
            Self::Fan => raw,
            Self::Temperature => raw / 1_000.0 + ZERO_CELSIUS,
            Self::Power => raw / 1_000_000.0,
        }
    }
}

impl Display for SensorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Voltage => write!(f, "voltage"),
            Self::Fan => write!(f, "fan"),
            Self::Temperature => write!(f, "temperature"),
            Self::Power => write!(f, "power"),
        }
    }
}

/// The bus a sensor chip is attached to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Bus {
    I2c,
    Isa,
    Pci,
    Spi,
    Virtual,
    Acpi,
    Hid,
}

impl Bus {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "i2c" => Some(Self::I2c),
            "isa" => Some(Self::Isa),
            "pci" => Some(Self::Pci),
            "spi" => Some(Self::Spi),
            "virtual" => Some(Self::Virtual),
            "acpi" => Some(Self::Acpi),
            "hid" => Some(Self::Hid),
            _ => None,
        }
    }

    /// Whether chip names on this bus carry a bus number before the address.
    const fn has_number(self) -> bool {
        matches!(self, Self::I2c | Self::Spi | Self::Hid)
    }
}

impl Display for Bus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::I2c => write!(f, "i2c"),
            Self::Isa => write!(f, "isa"),
            Self::Pci => write!(f, "pci"),
            Self::Spi => write!(f, "spi"),
            Self::Virtual => write!(f, "virtual"),
            Self::Acpi => write!(f, "acpi"),
            Self::Hid => write!(f, "hid"),
        }
    }
}

/// A detected sensor chip.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Chip {
    prefix: String,
    bus: Bus,
    bus_number: u32,
    address: u32,
    path: PathBuf,
}

impl Chip {
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub const fn bus(&self) -> Bus {
        self.bus
    }

    /// The directory holding the sensor attributes of this chip.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The chip name, such as `coretemp-isa-0000` or `lm75-i2c-0-48`.
    #[must_use]
    pub fn name(&self) -> String {
        let Self {
            prefix,
            bus,
            bus_number,
            address,
            ..
        } = self;
        match bus {
            Bus::Isa | Bus::Pci => format!("{prefix}-{bus}-{address:04x}"),
            Bus::I2c => format!("{prefix}-{bus}-{bus_number}-{address:02x}"),
            Bus::Spi | Bus::Hid => format!("{prefix}-{bus}-{bus_number}-{address:x}"),
            Bus::Virtual | Bus::Acpi => format!("{prefix}-{bus}-{address:x}"),
        }
    }
}

/// A chip name pattern, where any part may be the `*` wildcard.
#[derive(Debug, Clone, Eq, PartialEq)]
struct ChipFilter {
    prefix: Option<String>,
    bus: Option<Bus>,
    bus_number: Option<u32>,
    address: Option<u32>,
}

impl ChipFilter {
    fn parse(pattern: &str) -> Result<Self> {
        let invalid = || Error::InvalidChipName(pattern.to_string());
        let mut parts = pattern.split('-');
        let prefix = match parts.next() {
            Some("") | None => return Err(invalid()),
            Some("*") => None,
            Some(prefix) => Some(prefix.to_string()),
        };
        let bus = match parts.next() {
            None | Some("*") => None,
            Some(bus) => Some(Bus::parse(bus).ok_or_else(invalid)?),
        };
        let wildcard = |part: Option<&str>, radix: u32| match part {
            None | Some("*") => Ok(None),
            Some(part) => u32::from_str_radix(part, radix)
                .map(Some)
                .map_err(|_| invalid()),
        };
        let bus_number = if bus.is_some_and(Bus::has_number) {
            wildcard(parts.next(), 10)?
        } else {
            None
        };
        let address = wildcard(parts.next(), 16)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self {
            prefix,
            bus,
            bus_number,
            address,
        })
    }

    fn matches(&self, chip: &Chip) -> bool {
        self.prefix.as_ref().is_none_or(|prefix| *prefix == chip.prefix)
            && self.bus.is_none_or(|bus| bus == chip.bus)
            && self.bus_number.is_none_or(|nr| nr == chip.bus_number)
            && self.address.is_none_or(|addr| addr == chip.address)
    }
}

/// The sensor chips present when the session was created.
#[derive(Debug)]
pub struct SensorSession {
    chips: Vec<Chip>,
}

impl SensorSession {
    /// Detect the chips of the running system.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the hwmon class directory cannot be read.
    pub fn detect() -> Result<Self> {
        Self::detect_in(defaults::DEFAULT_HWMON_ROOT)
    }

    /// Detect the chips below an hwmon class directory.
    ///
    /// Chips whose bus cannot be determined are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if `root` cannot be read.
    #[instrument(skip_all, level = "trace")]
    pub fn detect_in(root: impl AsRef<Path>) -> Result<Self> {
        let mut entries = fs::read_dir(root.as_ref())?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();
        let chips = entries
            .iter()
            .filter_map(|hwmon| match read_chip(hwmon) {
                Ok(chip) => chip,
                Err(err) => {
                    tracing::warn!(path = %hwmon.display(), %err, "skipping hwmon device");
                    None
                }
            })
            .collect::<Vec<_>>();
        tracing::debug!(chips = chips.len());
        Ok(Self { chips })
    }

    #[must_use]
    pub fn chips(&self) -> &[Chip] {
        &self.chips
    }

    /// List the sensors of all chips matching `filter`, or of all chips.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidChipName` if `filter` cannot be parsed and
    /// `Error::Io` if a chip directory cannot be read.
    pub fn sensors(&self, filter: Option<&str>) -> Result<Vec<Sensor<'_>>> {
        let filter = filter.map(ChipFilter::parse).transpose()?;
        let mut sensors = Vec::new();
        for chip in &self.chips {
            if filter.as_ref().is_some_and(|filter| !filter.matches(chip)) {
                continue;
            }
            let mut features = fs::read_dir(&chip.path)?
                .filter_map(|entry| {
                    let entry = entry.ok()?;
                    parse_feature_name(&entry.file_name().to_string_lossy())
                })
                .collect::<Vec<_>>();
            features.sort_unstable();
            features.dedup();
            sensors.extend(
                features
                    .into_iter()
                    .map(|(kind, number)| Sensor { chip, kind, number }),
            );
        }
        Ok(sensors)
    }
}

/// A single sensor reading of a chip.
///
/// Readings are taken from sysfs each time an accessor is called.
#[derive(Debug, Clone, Copy)]
pub struct Sensor<'a> {
    chip: &'a Chip,
    kind: SensorKind,
    number: u32,
}

impl<'a> Sensor<'a> {
    #[must_use]
    pub const fn chip(&self) -> &'a Chip {
        self.chip
    }

    #[must_use]
    pub fn chip_name(&self) -> String {
        self.chip.name()
    }

    #[must_use]
    pub const fn kind(&self) -> SensorKind {
        self.kind
    }

    #[must_use]
    pub const fn bus(&self) -> Bus {
        self.chip.bus
    }

    /// The feature name, such as `temp1`.
    #[must_use]
    pub fn feature(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.number)
    }

    /// The driver supplied label, or the feature name.
    #[must_use]
    pub fn label(&self) -> String {
        fs::read_to_string(self.attribute_path("label"))
            .map(|label| label.trim().to_string())
            .ok()
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| self.feature())
    }

    /// The current reading.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotAvailable` if the reading cannot be read.
    pub fn value(&self) -> Result<f64> {
        self.read("input")
    }

    /// The critical limit.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotSupported` for fans and `Error::NotAvailable` if the
    /// limit cannot be read.
    pub fn critical(&self) -> Result<f64> {
        match self.kind {
            SensorKind::Voltage | SensorKind::Temperature | SensorKind::Power => self.read("crit"),
            SensorKind::Fan => Err(not_supported()),
        }
    }

    /// The maximum limit.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotAvailable` if the limit cannot be read.
    pub fn maximum(&self) -> Result<f64> {
        self.read("max")
    }

    /// The minimum limit.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotSupported` for power sensors and
    /// `Error::NotAvailable` if the limit cannot be read.
    pub fn minimum(&self) -> Result<f64> {
        match self.kind {
            SensorKind::Voltage | SensorKind::Fan | SensorKind::Temperature => self.read("min"),
            SensorKind::Power => Err(not_supported()),
        }
    }

    /// The high limit of a temperature sensor.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotSupported` for anything but temperature sensors and
    /// `Error::NotAvailable` if the limit cannot be read.
    pub fn high(&self) -> Result<f64> {
        match self.kind {
            SensorKind::Temperature => self.read("max"),
            SensorKind::Voltage | SensorKind::Fan | SensorKind::Power => Err(not_supported()),
        }
    }

    fn attribute_path(&self, suffix: &str) -> PathBuf {
        self.chip.path.join(format!("{}_{suffix}", self.feature()))
    }

    fn read(&self, suffix: &str) -> Result<f64> {
        let path = self.attribute_path(suffix);
        let raw = fs::read_to_string(&path)
            .map_err(|err| Error::NotAvailable(format!("{}: {err}", path.display())))?;
        let raw = raw.trim().parse::<f64>().map_err(|err| {
            Error::NotAvailable(format!("{}: {err}", path.display()))
        })?;
        Ok(self.kind.scale(raw))
    }
}

fn not_supported() -> Error {
    Error::NotSupported(String::from("Value not supported for this sensor type"))
}

/// Parse the feature of an attribute file name such as `temp1_input` or
/// `power1_average`.
///
/// Labels alone do not make a feature.
fn parse_feature_name(name: &str) -> Option<(SensorKind, u32)> {
    let (feature, suffix) = name.split_once('_')?;
    if suffix.is_empty() || suffix == "label" {
        return None;
    }
    let split = feature.find(|c: char| c.is_ascii_digit())?;
    let (prefix, number) = feature.split_at(split);
    Some((SensorKind::from_prefix(prefix)?, number.parse().ok()?))
}

/// Read the chip behind an hwmon class entry.
///
/// Returns `None` if the entry is not a chip or its bus is unknown.
fn read_chip(hwmon: &Path) -> Result<Option<Chip>> {
    let path = if hwmon.join("name").is_file() {
        hwmon.to_path_buf()
    } else if hwmon.join("device/name").is_file() {
        hwmon.join("device")
    } else {
        return Ok(None);
    };
    let prefix = fs::read_to_string(path.join("name"))?.trim().to_string();
    let Ok(device) = fs::read_link(hwmon.join("device")) else {
        return Ok(Some(Chip {
            prefix,
            bus: Bus::Virtual,
            bus_number: 0,
            address: 0,
            path,
        }));
    };
    let device_name = file_name(&device);
    let subsystem = fs::read_link(hwmon.join("device/subsystem"))?;
    let Some((bus, bus_number, address)) = parse_device(&file_name(&subsystem), &device_name)
    else {
        tracing::warn!(
            path = %hwmon.display(),
            subsystem = %file_name(&subsystem),
            device = %device_name,
            "unsupported bus"
        );
        return Ok(None);
    };
    Ok(Some(Chip {
        prefix,
        bus,
        bus_number,
        address,
        path,
    }))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Derive the bus, bus number and address of a device from its sysfs name.
fn parse_device(subsystem: &str, device: &str) -> Option<(Bus, u32, u32)> {
    match subsystem {
        // `0-002d`
        "i2c" => {
            let (bus_number, address) = device.split_once('-')?;
            Some((
                Bus::I2c,
                bus_number.parse().ok()?,
                u32::from_str_radix(address, 16).ok()?,
            ))
        }
        // `spi0.1`
        "spi" => {
            let (bus_number, address) = device.strip_prefix("spi")?.split_once('.')?;
            Some((Bus::Spi, bus_number.parse().ok()?, address.parse().ok()?))
        }
        // `0000:01:00.0`
        "pci" => {
            let mut fields = device.split([':', '.']);
            let mut next_hex = || u32::from_str_radix(fields.next()?, 16).ok();
            let (domain, bus, slot, function) = (next_hex()?, next_hex()?, next_hex()?, next_hex()?);
            Some((
                Bus::Pci,
                0,
                (domain << 16) + (bus << 8) + (slot << 3) + function,
            ))
        }
        // `it87.656`, `coretemp.0`
        "platform" | "of_platform" => {
            let address = device
                .rsplit_once('.')
                .and_then(|(_, address)| address.parse().ok())
                .unwrap_or(0);
            Some((Bus::Isa, 0, address))
        }
        // `PNP0C0B:01`, the address is always 0
        "acpi" => Some((Bus::Acpi, 0, 0)),
        // `0003:046D:C52B.0001`
        "hid" => {
            let (bus_number, rest) = device.split_once(':')?;
            let (_, id) = rest.rsplit_once('.')?;
            Some((
                Bus::Hid,
                u32::from_str_radix(bus_number, 16).ok()?,
                u32::from_str_radix(id, 16).ok()?,
            ))
        }
        _ => None,
    }
}
