// End-to-end tests against a scripted in-memory server.
//
// Each expected connection is a script of (request, reply-bytes) steps; the
// mock reads one string frame per step, checks it, writes the canned reply,
// then requires the client to close the connection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use adb_host_rs::{
    AbortSignal, AdbError, Client, ConnectOptions, Connector, DeviceSelector, ServerConnection,
    WaitState,
};

type Script = Vec<(String, Vec<u8>)>;

#[derive(Clone, Default)]
struct MockConnector {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    scripts: Mutex<VecDeque<Script>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    dials: AtomicUsize,
}

impl MockConnector {
    fn new(scripts: Vec<Vec<(&str, Vec<u8>)>>) -> Self {
        let scripts = scripts
            .into_iter()
            .map(|script| {
                script
                    .into_iter()
                    .map(|(request, reply)| (request.to_string(), reply))
                    .collect()
            })
            .collect();
        Self {
            inner: Arc::new(MockInner {
                scripts: Mutex::new(scripts),
                handles: Mutex::new(Vec::new()),
                dials: AtomicUsize::new(0),
            }),
        }
    }

    fn dials(&self) -> usize {
        self.inner.dials.load(Ordering::SeqCst)
    }

    /// Join every spawned server task, surfacing its assertions. Hangs (and
    /// times the test out) if the client leaked a connection.
    async fn finish(&self) {
        let handles: Vec<_> = self.inner.handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(
            self.inner.scripts.lock().unwrap().is_empty(),
            "expected more connections than the client made"
        );
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _options: &ConnectOptions) -> Result<ServerConnection, AdbError> {
        self.inner.dials.fetch_add(1, Ordering::SeqCst);
        let script = self
            .inner
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("client dialed more connections than scripted");

        let (near, far) = tokio::io::duplex(4096);
        let handle = tokio::spawn(serve(far, script));
        self.inner.handles.lock().unwrap().push(handle);

        Ok(ServerConnection::new(near))
    }
}

async fn serve(mut stream: DuplexStream, script: Script) {
    for (expect, reply) in script {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let len = usize::from_str_radix(std::str::from_utf8(&len_buf).unwrap(), 16).unwrap();

        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await.unwrap();
        assert_eq!(String::from_utf8(payload).unwrap(), expect);

        stream.write_all(&reply).await.unwrap();
    }

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty(), "unexpected trailing bytes: {:?}", rest);
}

fn frame(payload: &str) -> Vec<u8> {
    let mut bytes = format!("{:04x}", payload.len()).into_bytes();
    bytes.extend_from_slice(payload.as_bytes());
    bytes
}

fn okay() -> Vec<u8> {
    b"OKAY".to_vec()
}

fn okay_frame(payload: &str) -> Vec<u8> {
    let mut bytes = okay();
    bytes.extend_from_slice(&frame(payload));
    bytes
}

fn fail_frame(reason: &str) -> Vec<u8> {
    let mut bytes = b"FAIL".to_vec();
    bytes.extend_from_slice(&frame(reason));
    bytes
}

fn transport_id_bytes(id: u64) -> Vec<u8> {
    id.to_le_bytes().to_vec()
}

fn version_probe() -> Vec<(&'static str, Vec<u8>)> {
    vec![("host:version", okay_frame("0029"))]
}

#[tokio::test]
async fn test_get_version() {
    let connector = MockConnector::new(vec![version_probe()]);
    let client = Client::new(connector.clone());

    assert_eq!(client.get_version().await.unwrap(), 41);
    connector.finish().await;
}

#[tokio::test]
async fn test_validate_version_ok() {
    let connector = MockConnector::new(vec![version_probe()]);
    let client = Client::new(connector.clone());

    client.validate_version().await.unwrap();
    connector.finish().await;
}

#[tokio::test]
async fn test_validate_version_mismatch() {
    let connector = MockConnector::new(vec![vec![("host:version", okay_frame("0028"))]]);
    let client = Client::new(connector.clone());

    match client.validate_version().await {
        Err(AdbError::VersionMismatch { server, client }) => {
            assert_eq!(server, 40);
            assert_eq!(client, 41);
        }
        other => panic!("expected VersionMismatch, got {:?}", other),
    }
    connector.finish().await;
}

#[tokio::test]
async fn test_kill_server() {
    let connector = MockConnector::new(vec![vec![("host:kill", okay())]]);
    let client = Client::new(connector.clone());

    client.kill_server().await.unwrap();
    connector.finish().await;
}

#[tokio::test]
async fn test_get_server_features() {
    let connector =
        MockConnector::new(vec![vec![("host:host-features", okay_frame("shell_v2,cmd"))]]);
    let client = Client::new(connector.clone());

    let features = client.get_server_features().await.unwrap();
    assert_eq!(features, vec!["shell_v2", "cmd"]);
    connector.finish().await;
}

#[tokio::test]
async fn test_get_devices() {
    let listing =
        "emulator-5554\tdevice product:sdk_phone model:Phone device:generic transport_id:2\noffline-1\toffline\n";
    let connector = MockConnector::new(vec![vec![("host:devices-l", okay_frame(listing))]]);
    let client = Client::new(connector.clone());

    let devices = client.get_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].serial, "emulator-5554");
    assert_eq!(devices[0].product.as_deref(), Some("sdk_phone"));
    assert_eq!(devices[0].model.as_deref(), Some("Phone"));
    assert_eq!(devices[0].device.as_deref(), Some("generic"));
    assert_eq!(devices[0].transport_id, 2);
    connector.finish().await;
}

#[tokio::test]
async fn test_get_device_features_auto_bind() {
    // The bind ack and the transport id arrive in one chunk; the id must
    // survive the engine's buffered read and reach the handshake.
    let mut bind_reply = okay();
    bind_reply.extend_from_slice(&transport_id_bytes(7));

    let connector = MockConnector::new(vec![
        version_probe(),
        vec![
            ("host:tport:usb", bind_reply),
            ("host:features", okay_frame("cmd,shell_v2,abb")),
        ],
    ]);
    let client = Client::new(connector.clone());

    let features = client
        .get_device_features(&DeviceSelector::Usb)
        .await
        .unwrap();
    assert_eq!(features.transport_id, 7);
    assert_eq!(features.features, vec!["cmd", "shell_v2", "abb"]);
    connector.finish().await;
}

#[tokio::test]
async fn test_connect_device_known_transport_id_skips_id_read() {
    let connector = MockConnector::new(vec![
        version_probe(),
        vec![("host:transport-id:5", okay()), ("shell:", okay())],
    ]);
    let client = Client::new(connector.clone());

    let mut socket = client
        .connect_device(&DeviceSelector::TransportId(5), "shell:")
        .await
        .unwrap();
    assert_eq!(socket.transport_id(), 5);
    assert_eq!(socket.service(), "shell:");

    socket.close().await.unwrap();
    connector.finish().await;
}

#[tokio::test]
async fn test_connect_device_socket_reads_service_output() {
    // Service output following the second ack flows out of the residue
    // buffer into the socket.
    let mut service_reply = okay();
    service_reply.extend_from_slice(b"hello from device");

    let mut bind_reply = okay();
    bind_reply.extend_from_slice(&transport_id_bytes(3));

    let connector = MockConnector::new(vec![
        version_probe(),
        vec![
            ("host:tport:any", bind_reply),
            ("shell:echo hello", service_reply),
        ],
    ]);
    let client = Client::new(connector.clone());

    let mut socket = client
        .connect_device(&DeviceSelector::Any, "shell:echo hello")
        .await
        .unwrap();
    assert_eq!(socket.transport_id(), 3);

    let mut output = [0u8; 17];
    socket.read_exact(&mut output).await.unwrap();
    assert_eq!(&output, b"hello from device");

    socket.close().await.unwrap();
    connector.finish().await;
}

#[tokio::test]
async fn test_connect_device_fail_propagates_and_closes() {
    let connector = MockConnector::new(vec![
        version_probe(),
        vec![("host:tport:serial:X", fail_frame("device offline"))],
    ]);
    let client = Client::new(connector.clone());

    match client
        .connect_device(&DeviceSelector::Serial("X".to_string()), "shell:")
        .await
    {
        Err(AdbError::ServerFailure(reason)) => assert_eq!(reason, "device offline"),
        other => panic!("expected ServerFailure, got {:?}", other),
    }

    // finish() hangs unless the client closed the failed connection.
    connector.finish().await;
}

#[tokio::test]
async fn test_connect_unexpected_ack() {
    let connector = MockConnector::new(vec![vec![("host:version", b"WHAT".to_vec())]]);
    let client = Client::new(connector.clone());

    match client.get_version().await {
        Err(AdbError::UnexpectedResponse(bytes)) => assert_eq!(&bytes, b"WHAT"),
        other => panic!("expected UnexpectedResponse, got {:?}", other),
    }
    connector.finish().await;
}

#[tokio::test]
async fn test_wait_for_device() {
    let connector =
        MockConnector::new(vec![vec![("host-usb:wait-for-usb-device", okay())]]);
    let client = Client::new(connector.clone());

    client
        .wait_for(
            &DeviceSelector::Usb,
            WaitState::Device,
            &ConnectOptions::default(),
        )
        .await
        .unwrap();
    connector.finish().await;
}

#[tokio::test]
async fn test_wait_for_aborted_mid_wait() {
    // The server reads the request but never acks; the signal fires while
    // the wait is pending.
    let connector = MockConnector::new(vec![vec![("host:wait-for-any-disconnect", Vec::new())]]);
    let client = Client::new(connector.clone());

    let signal = AbortSignal::new();
    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.abort("caller gave up");
    });

    let options = ConnectOptions {
        signal: Some(signal),
        ..Default::default()
    };
    match client
        .wait_for(&DeviceSelector::Any, WaitState::Disconnect, &options)
        .await
    {
        Err(AdbError::Aborted(reason)) => assert_eq!(reason, "caller gave up"),
        other => panic!("expected Aborted, got {:?}", other),
    }

    // finish() hangs unless the aborted connection was closed.
    connector.finish().await;
}

#[tokio::test]
async fn test_already_aborted_signal_writes_nothing() {
    let connector = MockConnector::new(vec![]);
    let client = Client::new(connector.clone());

    let signal = AbortSignal::new();
    signal.abort("never started");

    let options = ConnectOptions {
        signal: Some(signal),
        ..Default::default()
    };
    match client.connect("host:version", &options).await {
        Err(AdbError::Aborted(reason)) => assert_eq!(reason, "never started"),
        other => panic!("expected Aborted, got {:?}", other),
    }

    assert_eq!(connector.dials(), 0);
}

#[tokio::test]
async fn test_create_transport() {
    let mut bind_reply = okay();
    bind_reply.extend_from_slice(&transport_id_bytes(2));

    let listing = "emulator-5554\tdevice product:sdk_phone model:Phone device:generic transport_id:2\n";
    let connector = MockConnector::new(vec![
        version_probe(),
        vec![
            ("host:tport:usb", bind_reply),
            ("host:features", okay_frame("cmd,abb")),
        ],
        vec![("host:devices-l", okay_frame(listing))],
    ]);
    let client = Client::new(connector.clone());

    let transport = client.create_transport(&DeviceSelector::Usb).await.unwrap();
    assert_eq!(transport.serial(), "emulator-5554");
    assert_eq!(transport.transport_id(), 2);
    assert_eq!(transport.banner().product.as_deref(), Some("sdk_phone"));
    assert!(transport.banner().has_feature("abb"));
    connector.finish().await;
}

#[tokio::test]
async fn test_create_transport_device_vanished() {
    // The device disappears between the feature query and the listing; the
    // feature set remains authoritative, identity falls back to empty.
    let mut bind_reply = okay();
    bind_reply.extend_from_slice(&transport_id_bytes(6));

    let connector = MockConnector::new(vec![
        version_probe(),
        vec![
            ("host:tport:usb", bind_reply),
            ("host:features", okay_frame("cmd")),
        ],
        vec![("host:devices-l", okay_frame(""))],
    ]);
    let client = Client::new(connector.clone());

    let transport = client.create_transport(&DeviceSelector::Usb).await.unwrap();
    assert_eq!(transport.serial(), "");
    assert_eq!(transport.transport_id(), 6);
    assert_eq!(transport.banner().product, None);
    assert!(transport.banner().has_feature("cmd"));
    connector.finish().await;
}

#[tokio::test]
async fn test_transport_opens_sockets_by_id() {
    let mut bind_reply = okay();
    bind_reply.extend_from_slice(&transport_id_bytes(4));

    let connector = MockConnector::new(vec![
        version_probe(),
        vec![
            ("host:tport:usb", bind_reply),
            ("host:features", okay_frame("cmd")),
        ],
        vec![("host:devices-l", okay_frame("abc device transport_id:4\n"))],
        version_probe(),
        vec![("host:transport-id:4", okay()), ("sync:", okay())],
    ]);
    let client = Client::new(connector.clone());

    let transport = client.create_transport(&DeviceSelector::Usb).await.unwrap();
    let mut socket = transport.open("sync:").await.unwrap();
    assert_eq!(socket.transport_id(), 4);

    socket.close().await.unwrap();
    connector.finish().await;
}

#[tokio::test]
async fn test_reverse_tunnels_unsupported_on_stream_connector() {
    let connector = MockConnector::new(vec![]);
    let client = Client::new(connector);

    match client.clear_reverse_tunnels().await {
        Err(AdbError::Unsupported(_)) => {}
        other => panic!("expected Unsupported, got {:?}", other),
    }
}
