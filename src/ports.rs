//! Serial port discovery.

use anyhow::{Context, Result};
use serialport::SerialPortType;

/// One discovered serial port.
#[derive(Clone, Debug)]
pub struct PortListing {
    pub name: String,
    pub description: Option<String>,
}

impl PortListing {
    /// `name — description` when a description is known, else just the name.
    pub fn label(&self) -> String {
        match &self.description {
            Some(desc) => format!("{} ({desc})", self.name),
            None => self.name.clone(),
        }
    }
}

/// Enumerate serial ports, sorted by name for stable menus.
pub fn list_ports() -> Result<Vec<PortListing>> {
    let mut ports: Vec<PortListing> = serialport::available_ports()
        .context("enumerating serial ports")?
        .into_iter()
        .map(|info| PortListing {
            description: describe(&info.port_type),
            name: info.port_name,
        })
        .collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ports)
}

fn describe(port_type: &SerialPortType) -> Option<String> {
    match port_type {
        SerialPortType::UsbPort(usb) => usb
            .product
            .clone()
            .or_else(|| usb.manufacturer.clone())
            .or_else(|| Some(format!("USB {:04x}:{:04x}", usb.vid, usb.pid))),
        SerialPortType::BluetoothPort => Some("Bluetooth".to_string()),
        SerialPortType::PciPort | SerialPortType::Unknown => None,
    }
}
