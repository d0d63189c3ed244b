use std::fmt;
use std::str::FromStr;

use crate::protocol::AdbError;

/// Selects the device a host command or transport bind addresses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    /// Whichever single device the server picks
    #[default]
    Any,
    /// A transport id previously assigned by the server
    TransportId(u64),
    /// A device serial number
    Serial(String),
    /// The single USB-attached device
    Usb,
    /// The single TCP-attached device (emulator or `adb connect` endpoint)
    Tcp,
}

impl DeviceSelector {
    /// Prefix a host command with this selector.
    pub fn format_service(&self, command: &str) -> String {
        match self {
            DeviceSelector::Any => format!("host:{command}"),
            DeviceSelector::TransportId(id) => format!("host-transport-id:{id}:{command}"),
            DeviceSelector::Serial(serial) => format!("host-serial:{serial}:{command}"),
            DeviceSelector::Usb => format!("host-usb:{command}"),
            DeviceSelector::Tcp => format!("host-local:{command}"),
        }
    }

    /// The request that binds the current connection to this device.
    ///
    /// All `host:tport:*` forms make the server emit an 8-byte transport id
    /// before the ack; `host:transport-id:<n>` does not, the id being known.
    pub fn switch_service(&self) -> String {
        match self {
            DeviceSelector::Any => "host:tport:any".to_string(),
            DeviceSelector::TransportId(id) => format!("host:transport-id:{id}"),
            DeviceSelector::Serial(serial) => format!("host:tport:serial:{serial}"),
            DeviceSelector::Usb => "host:tport:usb".to_string(),
            DeviceSelector::Tcp => "host:tport:local".to_string(),
        }
    }

    /// The transport id, when this selector already names one.
    pub fn transport_id(&self) -> Option<u64> {
        match self {
            DeviceSelector::TransportId(id) => Some(*id),
            _ => None,
        }
    }

    /// The `{type}` segment of a `wait-for-{type}-{state}` service.
    pub fn wait_for_type(&self) -> &'static str {
        match self {
            DeviceSelector::Usb => "usb",
            DeviceSelector::Tcp => "local",
            _ => "any",
        }
    }
}

/// Pure formatter mapping a selector to the prefix for a host command.
pub fn format_device_service(selector: &DeviceSelector, command: &str) -> String {
    selector.format_service(command)
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Any => write!(f, "any"),
            DeviceSelector::TransportId(id) => write!(f, "transport-id:{id}"),
            DeviceSelector::Serial(serial) => write!(f, "serial:{serial}"),
            DeviceSelector::Usb => write!(f, "usb"),
            DeviceSelector::Tcp => write!(f, "tcp"),
        }
    }
}

impl FromStr for DeviceSelector {
    type Err = AdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "any" => Ok(DeviceSelector::Any),
            "usb" => Ok(DeviceSelector::Usb),
            "tcp" | "local" => Ok(DeviceSelector::Tcp),
            _ => {
                if let Some(id) = s.strip_prefix("transport-id:") {
                    let id = id
                        .parse::<u64>()
                        .map_err(|_| AdbError::InvalidSelector(s.to_string()))?;
                    return Ok(DeviceSelector::TransportId(id));
                }
                if let Some(serial) = s.strip_prefix("serial:") {
                    if serial.is_empty() {
                        return Err(AdbError::InvalidSelector(s.to_string()));
                    }
                    return Ok(DeviceSelector::Serial(serial.to_string()));
                }
                Err(AdbError::InvalidSelector(s.to_string()))
            }
        }
    }
}
