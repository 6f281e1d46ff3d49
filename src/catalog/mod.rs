//! Firmware catalog wiring.
//!
//! This module wraps the on-disk firmware catalog (`firmware-list.json`
//! under the firmware storage root) so callers can load a validated snapshot
//! and resolve a firmware id into artifact files with flash addresses. The
//! catalog is re-read from disk on every load and never mutated here; the
//! writer path lives in [`crate::publish`].

pub mod error;
pub mod index;
pub mod model;

pub use error::CatalogError;
pub use index::FirmwareIndex;
pub use model::{
    ArtifactRole, Category, FileRef, FirmwareCatalog, FirmwareEntry, descriptor_path, load_catalog,
};

/// File name of the catalog descriptor under the firmware storage root.
pub const FIRMWARE_LIST_FILE: &str = "firmware-list.json";
