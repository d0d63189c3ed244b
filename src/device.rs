use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::protocol::AdbError;
use crate::selector::DeviceSelector;
use crate::socket::ServiceSocket;

/// Identity and capabilities of a bound device.
///
/// Product, model and device name come from the `devices-l` listing and may
/// be absent; the feature list is the authoritative capability set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub product: Option<String>,
    pub model: Option<String>,
    pub device: Option<String>,
    pub features: Vec<String>,
}

impl Banner {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// A device transport ready for a packet-layer consumer.
///
/// Assembled by [`Client::create_transport`]; outlives any socket it opens.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    serial: String,
    banner: Banner,
    transport_id: u64,
}

impl Transport {
    pub(crate) fn new(client: Client, serial: String, banner: Banner, transport_id: u64) -> Self {
        Self {
            client,
            serial,
            banner,
            transport_id,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The device serial, or empty if the device vanished from the listing
    /// between the feature query and the device query.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn banner(&self) -> &Banner {
        &self.banner
    }

    pub fn transport_id(&self) -> u64 {
        self.transport_id
    }

    /// Open a service channel on this transport.
    pub async fn open(&self, service: &str) -> Result<ServiceSocket, AdbError> {
        self.client
            .connect_device(&DeviceSelector::TransportId(self.transport_id), service)
            .await
    }
}
