//! WINCS02 Host Driver
//!
//! A non-blocking host driver for the WINCS02 wireless network coprocessor.
//! The driver batches device commands into requests, correlates the device's
//! status and response messages back to the feature that sent them, and
//! routes unsolicited device events to per-feature state machines.
//!
//! # Features
//!
//! - **Station and soft AP**: connect, disconnect, roaming, peer tracking
//! - **Scan**: active/passive scans into a fixed-capacity result cache
//! - **OTA**: download, verify, activate and invalidate firmware images
//! - **TLS**: context and cipher-suite pools, host-side signing relay
//! - **Network**: interface addressing, DHCP server, provisioning service
//! - **Power save**: Wi-Fi and device sleep modes
//!
//! Asynchronous outcomes are reported through observer traits, implemented
//! for closures and for the channel-backed [`EventSink`].
//!
//! # Example
//!
//! ```rust,ignore
//! use wincs_driver::{event_channel, Channel, ChannelTransport, Driver, DriverConfig, ScanMode};
//!
//! let (host, device) = ChannelTransport::new_pair();
//! let mut driver = Driver::new(DriverConfig::load("wincs.yaml")?, host)?;
//! driver.open()?;
//!
//! let (sink, events) = event_channel();
//! driver.scan_first(Channel::Any, ScanMode::Active, &[], Some(Box::new(sink)))?;
//! while driver.scan_in_progress() {
//!     driver.poll()?;
//! }
//! for event in events.try_iter() {
//!     println!("{event:?}");
//! }
//! ```

mod assoc;
mod cipher;
mod config;
mod context;
mod control;
mod devinfo;
mod dhcps;
mod driver;
mod engine;
mod error;
mod event;
mod extcrypto;
mod netif;
mod observer;
mod ota;
mod ota_url;
mod pool;
mod pps;
mod prov;
mod request;
mod scan;
mod softap;
mod sta;
mod tls;
mod transport;

pub use assoc::{AssocHandle, AssocRecord, ConnectionEvent, ConnectionState};
pub use cipher::{CipherSuiteHandle, CipherSuiteList};
pub use config::DriverConfig;
pub use context::{AuthContext, AuthType, BssContext, Channel, ChannelMask, MfpPolicy, Ssid};
pub use devinfo::{DeviceInfo, FirmwareVersion, ImageInfo};
pub use dhcps::DhcpsEvent;
pub use driver::Driver;
pub use engine::{CommandEngine, EngineLimits};
pub use error::{
    ConfigError, DriverError, RequestBuildError, Result, SubmitError, SubmitFailure,
    TransportError,
};
pub use event::{EngineEvent, RequestEvent, RequestEventKind, SourceCommand, UnsolicitedEvent};
pub use extcrypto::{EcCurve, SignRequest};
pub use netif::NetifEvent;
pub use observer::{
    event_channel, CipherSuiteObserver, ConnectionObserver, DeviceInfoObserver, DhcpsObserver,
    DriverEvent, EventSink, NetifInfoObserver, NetifObserver, OtaObserver, PowerSaveObserver,
    ProvisioningObserver, RequestObserver, RssiObserver, ScanObserver, SignObserver,
};
pub use ota::{OtaOperation, OtaOptions, OtaStatus};
pub use ota_url::{OtaUrl, UrlHost, UrlScheme};
pub use pps::{PowerSaveEvent, PowerSaveMode, PowerSaveOptions, PowerSaveState};
pub use prov::{IpVersion, ProvisioningEvent, ProvisioningProtocol};
pub use request::{CommandRequest, DeviceCommand, Dispatcher, RequestHandle};
pub use scan::{BssInfo, MatchMode, ScanMode, ScanParameters};
pub use softap::ApConfig;
pub use sta::{RoamingMode, StaConfig};
pub use tls::TlsHandle;
pub use transport::{ChannelTransport, Transport};

/// Re-exported wire protocol crate.
pub use wincs_protocol as protocol;
