use std::fmt;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use crate::cancel::{race_with_signals, AbortSignal};
use crate::device::{Banner, Transport};
use crate::parsers::{parse_device_list, parse_features, parse_version, DeviceInfo};
use crate::protocol::{self, AdbError};
use crate::selector::DeviceSelector;
use crate::socket::ServiceSocket;
use crate::stream::BufferedReader;
use crate::transport::{ConnectOptions, Connector, ReverseTunnelHandler, ServerConnection};

/// Device features resolved through a transport bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFeatures {
    pub transport_id: u64,
    pub features: Vec<String>,
}

/// Lifecycle condition for [`Client::wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// The selected device is attached and online
    Device,
    /// The selected device is gone
    Disconnect,
}

impl WaitState {
    fn as_str(self) -> &'static str {
        match self {
            WaitState::Device => "device",
            WaitState::Disconnect => "disconnect",
        }
    }
}

/// Client for a locally-running ADB server.
///
/// Holds no I/O state of its own; every request dials a fresh connection
/// through the shared connector. Cloning shares the connector.
#[derive(Clone)]
pub struct Client {
    connector: Arc<dyn Connector>,
}

impl Client {
    /// Server protocol version this client implements.
    pub const VERSION: u32 = protocol::VERSION;

    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
        }
    }

    /// Issue one request and hand the connection back once the server acks.
    ///
    /// Writes a single string frame, then reads the acknowledgement under the
    /// optional abort signal. On `OKAY` the returned connection picks up
    /// right after the ack, any buffered bytes first. On `FAIL`, abort, or
    /// any I/O error the connection is closed before the error surfaces.
    ///
    /// An already-aborted signal fails before anything is dialed.
    pub async fn connect(
        &self,
        request: &str,
        options: &ConnectOptions,
    ) -> Result<ServerConnection, AdbError> {
        if let Some(signal) = &options.signal {
            if signal.is_aborted() {
                return Err(AdbError::Aborted(signal.reason()));
            }
        }

        let conn = self.connector.connect(options).await?;
        let (reader, mut writer) = conn.into_split();

        trace!("request {:?}", request);
        if let Err(err) = protocol::write_frame(&mut writer, request).await {
            drop(reader);
            let _ = writer.shutdown().await;
            return Err(err);
        }

        let mut buffered = BufferedReader::new(reader);
        let signals: Vec<&AbortSignal> = options.signal.iter().collect();
        let ack = race_with_signals(protocol::read_ack(&mut buffered), &signals).await;

        match ack {
            Ok(()) => Ok(ServerConnection::from_parts(
                Box::new(buffered.release()),
                writer,
            )),
            Err(err) => {
                trace!("request {:?} failed: {}", request, err);
                drop(buffered);
                let _ = writer.shutdown().await;
                Err(err)
            }
        }
    }

    /// `host:version`: the protocol version the server speaks.
    ///
    /// Usable against a mismatched server; see [`Client::validate_version`].
    pub async fn get_version(&self) -> Result<u32, AdbError> {
        let conn = self.connect("host:version", &ConnectOptions::default()).await?;
        let payload = read_frame_and_close(conn).await?;
        parse_version(&payload)
    }

    /// Fail unless the server speaks exactly [`Client::VERSION`].
    pub async fn validate_version(&self) -> Result<(), AdbError> {
        let server = self.get_version().await?;
        if server != Self::VERSION {
            return Err(AdbError::VersionMismatch {
                server,
                client: Self::VERSION,
            });
        }
        Ok(())
    }

    /// `host:kill`: ask the server to exit.
    pub async fn kill_server(&self) -> Result<(), AdbError> {
        let conn = self.connect("host:kill", &ConnectOptions::default()).await?;
        let _ = conn.close().await;
        debug!("adb server killed");
        Ok(())
    }

    /// `host:host-features`: features the server itself supports.
    pub async fn get_server_features(&self) -> Result<Vec<String>, AdbError> {
        let conn = self
            .connect("host:host-features", &ConnectOptions::default())
            .await?;
        let payload = read_frame_and_close(conn).await?;
        Ok(parse_features(&payload))
    }

    /// `host:devices-l`: every online device, with its transport id.
    pub async fn get_devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        let conn = self
            .connect("host:devices-l", &ConnectOptions::default())
            .await?;
        let payload = read_frame_and_close(conn).await?;
        let devices = parse_device_list(&payload)?;
        debug!("{} device(s) online", devices.len());
        Ok(devices)
    }

    /// Features of one device, resolved through a transport bind.
    pub async fn get_device_features(
        &self,
        selector: &DeviceSelector,
    ) -> Result<DeviceFeatures, AdbError> {
        let mut socket = self.connect_device(selector, "host:features").await?;
        let transport_id = socket.transport_id();

        let mut reader = BufferedReader::new(&mut socket);
        let result = protocol::read_string_frame(&mut reader).await;
        drop(reader);
        let _ = socket.close().await;

        let payload = result?;
        Ok(DeviceFeatures {
            transport_id,
            features: parse_features(&payload),
        })
    }

    /// Bind a fresh connection to the selected device and open `service` on it.
    ///
    /// Validates the server version first, then performs the two-step
    /// handshake: a transport switch (`host:tport:*` or
    /// `host:transport-id:<n>`), the service request, and, when the selector
    /// did not already name a transport id, the 8-byte id the server emits
    /// ahead of the second ack.
    pub async fn connect_device(
        &self,
        selector: &DeviceSelector,
        service: &str,
    ) -> Result<ServiceSocket, AdbError> {
        self.validate_version().await?;

        let switch = selector.switch_service();
        let known_id = selector.transport_id();

        let conn = self.connect(&switch, &ConnectOptions::default()).await?;
        let (reader, mut writer) = conn.into_split();

        if let Err(err) = protocol::write_frame(&mut writer, service).await {
            drop(reader);
            let _ = writer.shutdown().await;
            return Err(err);
        }

        let mut buffered = BufferedReader::new(reader);
        let handshake = async {
            let transport_id = match known_id {
                Some(id) => id,
                None => protocol::read_transport_id(&mut buffered).await?,
            };
            protocol::read_ack(&mut buffered).await?;
            Ok::<u64, AdbError>(transport_id)
        }
        .await;

        match handshake {
            Ok(transport_id) => {
                debug!("service {:?} bound to transport {}", service, transport_id);
                Ok(ServiceSocket::new(
                    transport_id,
                    service,
                    Box::new(buffered.release()),
                    writer,
                ))
            }
            Err(err) => {
                drop(buffered);
                let _ = writer.shutdown().await;
                Err(err)
            }
        }
    }

    /// Block until the selected device reaches `state`.
    ///
    /// The server sends its ack only once the condition holds, so the call
    /// may be long-running; pass an abort signal in `options` to bail out.
    pub async fn wait_for(
        &self,
        selector: &DeviceSelector,
        state: WaitState,
        options: &ConnectOptions,
    ) -> Result<(), AdbError> {
        let command = format!(
            "wait-for-{}-{}",
            selector.wait_for_type(),
            state.as_str()
        );
        let service = selector.format_service(&command);

        debug!("waiting for {} ({})", selector, state.as_str());
        let conn = self.connect(&service, options).await?;
        let _ = conn.close().await;
        Ok(())
    }

    /// Resolve the selector into a [`Transport`] ready for a packet layer.
    ///
    /// Queries the device's features (which resolves the transport id), then
    /// the device listing to fill in serial and banner identity.
    pub async fn create_transport(&self, selector: &DeviceSelector) -> Result<Transport, AdbError> {
        let features = self.get_device_features(selector).await?;
        let devices = self.get_devices().await?;

        let entry = devices
            .into_iter()
            .find(|d| d.transport_id == features.transport_id);

        // The device can drop off between the two queries; the feature set
        // is still authoritative.
        let (serial, banner) = match entry {
            Some(info) => (
                info.serial,
                Banner {
                    product: info.product,
                    model: info.model,
                    device: info.device,
                    features: features.features,
                },
            ),
            None => (
                String::new(),
                Banner {
                    product: None,
                    model: None,
                    device: None,
                    features: features.features,
                },
            ),
        };

        Ok(Transport::new(
            self.clone(),
            serial,
            banner,
            features.transport_id,
        ))
    }

    /// Register a reverse-tunnel handler with the connector.
    pub async fn add_reverse_tunnel(
        &self,
        handler: ReverseTunnelHandler,
        address: Option<String>,
    ) -> Result<String, AdbError> {
        self.connector.add_reverse_tunnel(handler, address).await
    }

    /// Drop one reverse-tunnel registration.
    pub async fn remove_reverse_tunnel(&self, address: &str) -> Result<(), AdbError> {
        self.connector.remove_reverse_tunnel(address).await
    }

    /// Drop every reverse-tunnel registration.
    pub async fn clear_reverse_tunnels(&self) -> Result<(), AdbError> {
        self.connector.clear_reverse_tunnels().await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

/// Read one string frame off a post-ack connection, then close it.
/// Close errors are swallowed; the streams are drained at that point.
async fn read_frame_and_close(conn: ServerConnection) -> Result<String, AdbError> {
    let (reader, mut writer) = conn.into_split();
    let mut reader = BufferedReader::new(reader);
    let result = protocol::read_string_frame(&mut reader).await;
    let _ = writer.shutdown().await;
    result
}
