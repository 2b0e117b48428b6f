//! Thin filter over the OS serial-port enumerator: lists devices whose
//! USB product string identifies them as hakomari devices.

use crate::endpoint::DeviceDescriptor;
use crate::error::Result;
use crate::shortname::ShortName;
use serialport::SerialPortType;
use tracing::debug;

/// USB product-string prefix that marks a port as a hakomari device.
pub const PRODUCT_PREFIX: &str = "Hakomari";

/// Enumerates serial ports and returns one [`DeviceDescriptor`] per
/// recognized hakomari device, in enumeration order.
pub fn enumerate() -> Result<Vec<DeviceDescriptor>> {
    let ports = serialport::available_ports()?;

    let mut devices = Vec::new();
    for port in ports {
        let SerialPortType::UsbPort(info) = &port.port_type else {
            continue;
        };
        let Some(product) = &info.product else {
            continue;
        };
        if !product.starts_with(PRODUCT_PREFIX) {
            continue;
        }

        debug!(port = %port.port_name, product, "found hakomari device");
        devices.push(DeviceDescriptor {
            user_name: ShortName::new(product.clone())?,
            system_name: ShortName::new(port.port_name.clone())?,
        });
    }

    Ok(devices)
}
