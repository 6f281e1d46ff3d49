//! Serde model for the firmware catalog descriptor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::catalog::{CatalogError, FIRMWARE_LIST_FILE};
use crate::schema;

/// Artifact roles a firmware entry may ship, in flash order.
///
/// The derived `Ord` follows declaration order, which is also the order the
/// images are written to the chip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    Bootloader,
    Partitions,
    BootApp0,
    Firmware,
}

impl ArtifactRole {
    /// Every role, in flash order.
    pub const ALL: [ArtifactRole; 4] = [
        ArtifactRole::Bootloader,
        ArtifactRole::Partitions,
        ArtifactRole::BootApp0,
        ArtifactRole::Firmware,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactRole::Bootloader => "bootloader",
            ArtifactRole::Partitions => "partitions",
            ArtifactRole::BootApp0 => "boot_app0",
            ArtifactRole::Firmware => "firmware",
        }
    }

    /// Flash offset for this role on the ESP32-S2.
    ///
    /// This table is process-wide constant state; descriptor-supplied
    /// addresses are ignored in favor of it.
    pub fn flash_address(self) -> &'static str {
        match self {
            ArtifactRole::Bootloader => "0x1000",
            ArtifactRole::Partitions => "0x8000",
            ArtifactRole::BootApp0 => "0xE000",
            ArtifactRole::Firmware => "0x10000",
        }
    }

    /// Conventional file name for this role in build output and storage.
    pub fn file_name(self) -> String {
        format!("{}.bin", self.as_str())
    }
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One artifact file referenced by a firmware entry.
///
/// `path` is relative to the firmware storage root. The descriptor may carry
/// an `address` for display purposes; resolution always uses
/// [`ArtifactRole::flash_address`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FileRef {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A published firmware build.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FirmwareEntry {
    pub id: String,
    pub version: String,
    pub board: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub recommended: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baudrate: Option<u32>,
    pub files: BTreeMap<ArtifactRole, FileRef>,
}

/// Informational category label.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The catalog descriptor: every known firmware build plus display metadata.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FirmwareCatalog {
    #[serde(default)]
    pub firmwares: Vec<FirmwareEntry>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default, rename = "lastUpdated")]
    pub last_updated: String,
    #[serde(default, rename = "totalFirmwares")]
    pub total_firmwares: u64,
}

/// Path of the descriptor file under a firmware storage root.
pub fn descriptor_path(firmware_root: &Path) -> PathBuf {
    firmware_root.join(FIRMWARE_LIST_FILE)
}

/// Read and decode the catalog descriptor under `firmware_root`.
///
/// The raw document is checked against the bundled JSON Schema before serde
/// decoding so a wrong-shaped descriptor reports every violation at once.
pub fn load_catalog(firmware_root: &Path) -> Result<FirmwareCatalog, CatalogError> {
    let path = descriptor_path(firmware_root);

    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(CatalogError::Unavailable { path });
        }
        Err(err) => {
            return Err(CatalogError::Malformed {
                path,
                details: format!("descriptor is unreadable: {err}"),
            });
        }
    };

    let raw: Value = serde_json::from_str(&data).map_err(|err| CatalogError::Malformed {
        path: path.clone(),
        details: format!("invalid JSON: {err}"),
    })?;

    schema::validate_descriptor(&raw, &path)?;

    serde_json::from_value(raw).map_err(|err| CatalogError::Malformed {
        path,
        details: err.to_string(),
    })
}
