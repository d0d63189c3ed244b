//! Async client for the Android Debug Bridge *server* protocol.
//!
//! This library speaks the text-framed request/response protocol an `adb`
//! command-line client uses against the locally-running ADB server, over TCP
//! or a Unix socket. It enumerates devices, queries server and device
//! capabilities, waits for device lifecycle transitions, and opens service
//! channels bound to a device. A bound channel is a plain byte stream; the
//! service-side protocol (shell, sync, ...) is the caller's to speak.
//!
//! # Example
//!
//! ```no_run
//! use adb_host_rs::{Client, DeviceSelector, TcpConnector};
//!
//! # async fn run() -> Result<(), adb_host_rs::AdbError> {
//! let client = Client::new(TcpConnector::default());
//!
//! client.validate_version().await?;
//! for device in client.get_devices().await? {
//!     println!("{} (transport {})", device.serial, device.transport_id);
//! }
//!
//! let _shell = client
//!     .connect_device(&DeviceSelector::Usb, "shell:echo hello")
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod cancel;
pub mod client;
pub mod device;
pub mod parsers;
pub mod protocol;
pub mod selector;
pub mod socket;
pub mod stream;
pub mod transport;

// Re-export main types
pub use cancel::AbortSignal;
pub use client::{Client, DeviceFeatures, WaitState};
pub use device::{Banner, Transport};
pub use parsers::DeviceInfo;
pub use protocol::{AdbError, VERSION};
pub use selector::{format_device_service, DeviceSelector};
pub use socket::ServiceSocket;
pub use stream::BufferedReader;
#[cfg(unix)]
pub use transport::UnixConnector;
pub use transport::{
    ConnectOptions, Connector, ReverseTunnelHandler, ServerConnection, TcpConnector,
};
