//! Per-instance driver state.
//!
//! Every feature module owns one field of the [`ControlBlock`] and one or
//! more observer slots in [`Observers`]. Both are rebuilt when the driver is
//! opened, so nothing survives a close.

use crate::cipher::CipherSuiteContext;
use crate::config::DriverConfig;
use crate::devinfo::DevInfoState;
use crate::netif::NetifState;
use crate::observer::{
    ConnectionObserver, DeviceInfoObserver, DhcpsObserver, NetifInfoObserver, NetifObserver,
    OtaObserver, PowerSaveObserver, ProvisioningObserver, RequestObserver, RssiObserver,
    ScanObserver,
};
use crate::ota::OtaState;
use crate::pool::Pool;
use crate::pps::PpsState;
use crate::prov::ProvState;
use crate::scan::ScanState;
use crate::softap::ApState;
use crate::sta::StaState;
use crate::tls::TlsContext;

pub(crate) struct ControlBlock {
    pub(crate) sta: StaState,
    pub(crate) ap: ApState,
    pub(crate) scan: ScanState,
    pub(crate) ota: OtaState,
    pub(crate) tls: Pool<TlsContext>,
    pub(crate) cipher: Pool<CipherSuiteContext>,
    pub(crate) netif: NetifState,
    pub(crate) prov: ProvState,
    pub(crate) pps: PpsState,
    pub(crate) devinfo: DevInfoState,
}

impl ControlBlock {
    pub(crate) fn new(config: &DriverConfig) -> Self {
        ControlBlock {
            sta: StaState::default(),
            ap: ApState::new(config.num_ap_assocs),
            scan: ScanState::new(config.scan_cache_size, config.regulatory_channel_mask),
            ota: OtaState::default(),
            tls: Pool::with_capacity(config.num_tls_contexts),
            cipher: Pool::with_capacity(config.num_cipher_suites),
            netif: NetifState::default(),
            prov: ProvState::default(),
            pps: PpsState::default(),
            devinfo: DevInfoState::default(),
        }
    }
}

/// Registered observers. Operation-scoped observers (scan, OTA, MAC query)
/// are installed by the operation that uses them.
#[derive(Default)]
pub(crate) struct Observers {
    pub(crate) connection: Option<Box<dyn ConnectionObserver>>,
    pub(crate) rssi: Option<Box<dyn RssiObserver>>,
    pub(crate) scan: Option<Box<dyn ScanObserver>>,
    pub(crate) ota: Option<Box<dyn OtaObserver>>,
    pub(crate) dhcps: Option<Box<dyn DhcpsObserver>>,
    pub(crate) netif: Option<Box<dyn NetifObserver>>,
    pub(crate) netif_info: Option<Box<dyn NetifInfoObserver>>,
    pub(crate) provisioning: Option<Box<dyn ProvisioningObserver>>,
    pub(crate) power_save: Option<Box<dyn PowerSaveObserver>>,
    pub(crate) devinfo: Option<Box<dyn DeviceInfoObserver>>,
    pub(crate) application: Option<Box<dyn RequestObserver>>,
}
