use crate::config::defaults;
use crate::error::Result;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A mounted filesystem backed by a local block device.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MountPoint {
    pub source: String,
    pub target: String,
    pub fs_type: String,
    pub options: String,
}

impl MountPoint {
    /// Whether the filesystem is virtual or mounted over the network.
    fn is_virtual(&self) -> bool {
        !self.source.starts_with('/') || self.has_option("_netdev")
    }

    /// Whether `name` appears in the option list, with or without a value.
    #[must_use]
    pub fn has_option(&self, name: &str) -> bool {
        self.options
            .split(',')
            .any(|option| option.split_once('=').map_or(option, |(key, _)| key) == name)
    }
}

/// List the physical mount points of the running system.
///
/// # Errors
///
/// Returns `Error::Io` if the mount table cannot be read.
pub fn mountpoints() -> Result<Vec<MountPoint>> {
    mountpoints_from(defaults::DEFAULT_MOUNT_TABLE)
}

/// List the physical mount points of an `fstab(5)` formatted file.
///
/// # Errors
///
/// Returns `Error::Io` if `path` cannot be read.
pub fn mountpoints_from(path: impl AsRef<Path>) -> Result<Vec<MountPoint>> {
    parse_mounts(BufReader::new(File::open(path)?))
}

/// Parse an `fstab(5)` formatted mount table, keeping physical mount points.
///
/// Blank lines, comments and lines with fewer than four fields are ignored.
///
/// # Errors
///
/// Returns `Error::Io` if reading fails.
pub fn parse_mounts(reader: impl BufRead) -> Result<Vec<MountPoint>> {
    let mut mounts = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace().map(unescape);
        let (Some(source), Some(target), Some(fs_type), Some(options)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            tracing::debug!(line, "skipping malformed mount entry");
            continue;
        };
        let mount = MountPoint {
            source,
            target,
            fs_type,
            options,
        };
        if !mount.is_virtual() {
            mounts.push(mount);
        }
    }
    Ok(mounts)
}

/// Decode the `\ooo` octal escapes the kernel writes for blanks and
/// backslashes.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escape = bytes.get(i + 1..i + 4).filter(|digits| {
            bytes[i] == b'\\' && digits.iter().all(|d| (b'0'..=b'7').contains(d))
        });
        match escape {
            Some(digits) => {
                let value = digits
                    .iter()
                    .fold(0_u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                out.push(u8::try_from(value).unwrap_or(b'?'));
                i += 4;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
