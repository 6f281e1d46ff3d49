//! esptool invocation planning and board detection.
//!
//! Plans mirror the esptool command lines the project has always used for
//! the ESP32-S2: detection probes the chip without resetting it, erase and
//! write honor explicit reset options, and write emits `(address, file)`
//! pairs in fixed role order.

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::catalog::ArtifactRole;
use crate::exec::{CommandSpec, run_status};
use crate::find_tool;

/// Target chip passed to esptool.
pub const CHIP_TYPE: &str = "esp32s2";

/// Default baudrate for erase and write operations.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Lower baudrate the ESP32-S2 ROM bootloader is detected at reliably.
pub const BOOTLOADER_BAUD: u32 = 57_600;

/// Operator guidance shown when the board is not detected in bootloader mode.
pub const BOOTLOADER_INSTRUCTIONS: &str = "\
ESP32-S2 bootloader mode:

Method 1 (GPIO0, most common):
  1. Hold GPIO0 to GND
  2. Press and hold RESET while keeping GPIO0 held
  3. Release RESET first, then release GPIO0
  4. Keep GPIO0 held for at least 2 seconds after RESET

Method 2 (GPIO45, some boards):
  same sequence with GPIO45 instead of GPIO0

Method 3 (BOOT button, if available):
  1. Hold BOOT
  2. Press and hold RESET while keeping BOOT held
  3. Release RESET first, then release BOOT

Checklist:
  - use a data USB cable, not a charge-only cable
  - CP210x drivers installed, board powered
  - close any serial monitors (IDE, PlatformIO) before flashing
  - try another USB port if the connection keeps failing";

/// Reset behavior around an esptool operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetOptions {
    /// Reset the chip before talking to it (`default-reset`).
    pub before: bool,
    /// Hard-reset the chip when done (`hard-reset`).
    pub after: bool,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self {
            before: false,
            after: true,
        }
    }
}

impl ResetOptions {
    fn before_arg(self) -> &'static str {
        if self.before { "default-reset" } else { "no-reset" }
    }

    fn after_arg(self) -> &'static str {
        if self.after { "hard-reset" } else { "no-reset" }
    }
}

/// Locate esptool on PATH.
pub fn resolve_esptool() -> Result<PathBuf> {
    find_tool(&["esptool", "esptool.py"])
        .ok_or_else(|| anyhow!("esptool not found on PATH; install it with 'pip install esptool'"))
}

/// Plan a chip-id probe that leaves the board state untouched.
pub fn detect_plan(esptool: &Path, port: &str) -> CommandSpec {
    CommandSpec::new(esptool)
        .arg("--port")
        .arg(port)
        .arg("--baud")
        .arg(BOOTLOADER_BAUD.to_string())
        .args(["--before", "no-reset", "--after", "no-reset", "chip_id"])
}

/// Plan a full flash erase.
pub fn erase_plan(esptool: &Path, port: &str, baud: u32, reset: ResetOptions) -> CommandSpec {
    CommandSpec::new(esptool)
        .arg("--chip")
        .arg(CHIP_TYPE)
        .arg("--port")
        .arg(port)
        .arg("--baud")
        .arg(baud.to_string())
        .arg("--before")
        .arg(reset.before_arg())
        .arg("--after")
        .arg(reset.after_arg())
        .arg("erase-flash")
}

/// Plan a firmware write.
///
/// `(address, file)` pairs follow the fixed role order; only roles present
/// in `files` are written.
pub fn write_plan(
    esptool: &Path,
    port: &str,
    baud: u32,
    reset: ResetOptions,
    files: &BTreeMap<ArtifactRole, PathBuf>,
) -> CommandSpec {
    let mut spec = CommandSpec::new(esptool)
        .arg("--chip")
        .arg(CHIP_TYPE)
        .arg("--port")
        .arg(port)
        .arg("--baud")
        .arg(baud.to_string())
        .arg("--before")
        .arg(reset.before_arg())
        .arg("--after")
        .arg(reset.after_arg())
        .arg("write-flash");

    for (role, path) in files {
        spec = spec.arg(role.flash_address()).arg(path);
    }
    spec
}

/// Probe whether a board in bootloader mode answers on `port`.
pub fn detect_board(esptool: &Path, port: &str) -> Result<bool> {
    run_status(&detect_plan(esptool, port))
}
