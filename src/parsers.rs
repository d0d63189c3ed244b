//! Pure parsers for ADB server responses (no I/O).
//! Used by the client commands and directly testable on host.

use serde::{Deserialize, Serialize};

use crate::protocol::AdbError;

/// One online entry from a `host:devices-l` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub serial: String,
    pub product: Option<String>,
    pub model: Option<String>,
    pub device: Option<String>,
    pub transport_id: u64,
}

/// Parse a `host:devices-l` payload.
///
/// Lines have the form `SERIAL STATUS[ KEY:VALUE]…`, separated by any
/// whitespace (the server emits tabs or spaces depending on version). Entries
/// whose status is not `device` are skipped, which keeps offline and
/// unauthorized devices out of the listing. Unknown keys are ignored.
pub fn parse_device_list(payload: &str) -> Result<Vec<DeviceInfo>, AdbError> {
    let mut devices = Vec::new();

    for line in payload.lines() {
        let mut fields = line.split_whitespace();
        let Some(serial) = fields.next() else {
            continue;
        };
        if fields.next() != Some("device") {
            continue;
        }

        let mut product = None;
        let mut model = None;
        let mut device = None;
        let mut transport_id = None;

        for pair in fields {
            let Some((key, value)) = pair.split_once(':') else {
                continue;
            };
            match key {
                "product" => product = Some(value.to_string()),
                "model" => model = Some(value.to_string()),
                "device" => device = Some(value.to_string()),
                "transport_id" => {
                    let id = value.parse::<u64>().map_err(|e| {
                        AdbError::Decode(format!("transport_id {:?}: {}", value, e))
                    })?;
                    transport_id = Some(id);
                }
                _ => {}
            }
        }

        // A transport id of zero is never assigned; treat it as absent.
        let transport_id = match transport_id {
            Some(id) if id != 0 => id,
            _ => return Err(AdbError::MissingTransportId(serial.to_string())),
        };

        devices.push(DeviceInfo {
            serial: serial.to_string(),
            product,
            model,
            device,
            transport_id,
        });
    }

    Ok(devices)
}

/// Parse a `host:version` payload.
///
/// The string frame's content is itself a hex number (historical double
/// encoding, preserved by every adb server).
pub fn parse_version(payload: &str) -> Result<u32, AdbError> {
    let text = payload.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AdbError::Decode(format!(
            "invalid version payload: {:?}",
            payload
        )));
    }

    u32::from_str_radix(text, 16).map_err(|e| AdbError::Decode(e.to_string()))
}

/// Split a comma-separated feature list.
pub fn parse_features(payload: &str) -> Vec<String> {
    payload
        .split(',')
        .filter(|f| !f.is_empty())
        .map(|f| f.to_string())
        .collect()
}
