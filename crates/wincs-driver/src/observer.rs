//! Observer traits.
//!
//! Each feature reports asynchronous outcomes through its own observer trait.
//! Every trait is implemented for matching closures, and [`EventSink`]
//! implements all of them by forwarding into a crossbeam channel so another
//! thread can consume driver notifications as a stream.
//!
//! Observers are called from inside [`Driver::poll`](crate::Driver::poll) and
//! must not block.

use crossbeam_channel::{Receiver, Sender};
use wincs_protocol::{DeviceStatus, MacAddr};

use crate::assoc::{AssocHandle, ConnectionEvent};
use crate::cipher::CipherSuiteHandle;
use crate::devinfo::DeviceInfo;
use crate::dhcps::DhcpsEvent;
use crate::event::RequestEvent;
use crate::extcrypto::SignRequest;
use crate::netif::NetifEvent;
use crate::ota::{OtaOperation, OtaStatus};
use crate::pps::PowerSaveEvent;
use crate::prov::ProvisioningEvent;
use crate::scan::BssInfo;
use crate::tls::TlsHandle;

/// Station and access-point connection changes.
pub trait ConnectionObserver: Send {
    fn on_connection_event(&mut self, assoc: AssocHandle, event: ConnectionEvent);
}

impl<F> ConnectionObserver for F
where
    F: FnMut(AssocHandle, ConnectionEvent) + Send,
{
    fn on_connection_event(&mut self, assoc: AssocHandle, event: ConnectionEvent) {
        self(assoc, event)
    }
}

/// Scan results, one at a time.
///
/// `index` is 1-based; `count` is the number of cached results. A scan that
/// found nothing is reported once with `(0, 0, None)`. Return `true` to be
/// handed the next result straight away.
pub trait ScanObserver: Send {
    fn on_scan_result(&mut self, index: usize, count: usize, info: Option<&BssInfo>) -> bool;
}

impl<F> ScanObserver for F
where
    F: FnMut(usize, usize, Option<&BssInfo>) -> bool + Send,
{
    fn on_scan_result(&mut self, index: usize, count: usize, info: Option<&BssInfo>) -> bool {
        self(index, count, info)
    }
}

/// Firmware update progress.
pub trait OtaObserver: Send {
    fn on_ota_status(&mut self, operation: OtaOperation, op_id: u32, status: OtaStatus);
}

impl<F> OtaObserver for F
where
    F: FnMut(OtaOperation, u32, OtaStatus) + Send,
{
    fn on_ota_status(&mut self, operation: OtaOperation, op_id: u32, status: OtaStatus) {
        self(operation, op_id, status)
    }
}

/// Result of a cipher-suite query or update.
///
/// A query delivers `Some(suites)` on success. An update delivers `None`
/// with `ok` reporting whether the device accepted it.
pub trait CipherSuiteObserver: Send {
    fn on_cipher_suites(&mut self, handle: CipherSuiteHandle, suites: Option<&[u16]>, ok: bool);
}

impl<F> CipherSuiteObserver for F
where
    F: FnMut(CipherSuiteHandle, Option<&[u16]>, bool) + Send,
{
    fn on_cipher_suites(&mut self, handle: CipherSuiteHandle, suites: Option<&[u16]>, ok: bool) {
        self(handle, suites, ok)
    }
}

/// Signing requests raised by the device for a TLS context.
///
/// Answer with [`Driver::extcrypto_sign_result`](crate::Driver::extcrypto_sign_result).
pub trait SignObserver: Send {
    fn on_sign_request(&mut self, tls: TlsHandle, request: &SignRequest);
}

impl<F> SignObserver for F
where
    F: FnMut(TlsHandle, &SignRequest) + Send,
{
    fn on_sign_request(&mut self, tls: TlsHandle, request: &SignRequest) {
        self(tls, request)
    }
}

/// DHCP server lease events.
pub trait DhcpsObserver: Send {
    fn on_dhcps_event(&mut self, event: &DhcpsEvent);
}

impl<F> DhcpsObserver for F
where
    F: FnMut(&DhcpsEvent) + Send,
{
    fn on_dhcps_event(&mut self, event: &DhcpsEvent) {
        self(event)
    }
}

/// Network interface address and data events.
pub trait NetifObserver: Send {
    fn on_netif_event(&mut self, if_idx: u8, event: &NetifEvent);
}

impl<F> NetifObserver for F
where
    F: FnMut(u8, &NetifEvent) + Send,
{
    fn on_netif_event(&mut self, if_idx: u8, event: &NetifEvent) {
        self(if_idx, event)
    }
}

/// Result of a MAC address query.
pub trait NetifInfoObserver: Send {
    fn on_mac_address(&mut self, if_idx: u8, result: Result<MacAddr, DeviceStatus>);
}

impl<F> NetifInfoObserver for F
where
    F: FnMut(u8, Result<MacAddr, DeviceStatus>) + Send,
{
    fn on_mac_address(&mut self, if_idx: u8, result: Result<MacAddr, DeviceStatus>) {
        self(if_idx, result)
    }
}

/// Provisioning client attach/detach.
pub trait ProvisioningObserver: Send {
    fn on_provisioning_event(&mut self, event: &ProvisioningEvent);
}

impl<F> ProvisioningObserver for F
where
    F: FnMut(&ProvisioningEvent) + Send,
{
    fn on_provisioning_event(&mut self, event: &ProvisioningEvent) {
        self(event)
    }
}

/// Power-save notifications.
pub trait PowerSaveObserver: Send {
    fn on_power_save_event(&mut self, event: PowerSaveEvent);
}

impl<F> PowerSaveObserver for F
where
    F: FnMut(PowerSaveEvent) + Send,
{
    fn on_power_save_event(&mut self, event: PowerSaveEvent) {
        self(event)
    }
}

/// Completed device-information refreshes. `None` when the refresh failed.
pub trait DeviceInfoObserver: Send {
    fn on_device_info(&mut self, info: Option<&DeviceInfo>);
}

impl<F> DeviceInfoObserver for F
where
    F: FnMut(Option<&DeviceInfo>) + Send,
{
    fn on_device_info(&mut self, info: Option<&DeviceInfo>) {
        self(info)
    }
}

/// Refreshed signal strength for an association.
pub trait RssiObserver: Send {
    fn on_rssi(&mut self, assoc: AssocHandle, rssi: i8);
}

impl<F> RssiObserver for F
where
    F: FnMut(AssocHandle, i8) + Send,
{
    fn on_rssi(&mut self, assoc: AssocHandle, rssi: i8) {
        self(assoc, rssi)
    }
}

/// Events for requests built through the raw engine API.
pub trait RequestObserver: Send {
    fn on_request_event(&mut self, event: &RequestEvent);
}

impl<F> RequestObserver for F
where
    F: FnMut(&RequestEvent) + Send,
{
    fn on_request_event(&mut self, event: &RequestEvent) {
        self(event)
    }
}

// ============================================================================
// Channel-backed observer
// ============================================================================

/// An owned copy of any observer notification.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Connection {
        assoc: AssocHandle,
        event: ConnectionEvent,
    },
    ScanResult {
        index: usize,
        count: usize,
        info: Option<BssInfo>,
    },
    Ota {
        operation: OtaOperation,
        op_id: u32,
        status: OtaStatus,
    },
    CipherSuites {
        handle: CipherSuiteHandle,
        suites: Option<Vec<u16>>,
        ok: bool,
    },
    SignRequest {
        tls: TlsHandle,
        request: SignRequest,
    },
    Dhcps(DhcpsEvent),
    Netif {
        if_idx: u8,
        event: NetifEvent,
    },
    MacAddress {
        if_idx: u8,
        result: Result<MacAddr, DeviceStatus>,
    },
    Provisioning(ProvisioningEvent),
    PowerSave(PowerSaveEvent),
    Rssi {
        assoc: AssocHandle,
        rssi: i8,
    },
    DeviceInfo(Option<DeviceInfo>),
    Request(RequestEvent),
}

/// Observer that forwards every notification into a channel.
///
/// As a scan observer it asks for every result in turn, so a whole scan is
/// streamed without further calls.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<DriverEvent>,
}

/// Create an [`EventSink`] and the receiver for its events.
pub fn event_channel() -> (EventSink, Receiver<DriverEvent>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (EventSink { tx }, rx)
}

impl EventSink {
    fn forward(&self, event: DriverEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

impl ConnectionObserver for EventSink {
    fn on_connection_event(&mut self, assoc: AssocHandle, event: ConnectionEvent) {
        self.forward(DriverEvent::Connection { assoc, event });
    }
}

impl ScanObserver for EventSink {
    fn on_scan_result(&mut self, index: usize, count: usize, info: Option<&BssInfo>) -> bool {
        self.forward(DriverEvent::ScanResult {
            index,
            count,
            info: info.cloned(),
        })
    }
}

impl OtaObserver for EventSink {
    fn on_ota_status(&mut self, operation: OtaOperation, op_id: u32, status: OtaStatus) {
        self.forward(DriverEvent::Ota {
            operation,
            op_id,
            status,
        });
    }
}

impl CipherSuiteObserver for EventSink {
    fn on_cipher_suites(&mut self, handle: CipherSuiteHandle, suites: Option<&[u16]>, ok: bool) {
        self.forward(DriverEvent::CipherSuites {
            handle,
            suites: suites.map(<[u16]>::to_vec),
            ok,
        });
    }
}

impl SignObserver for EventSink {
    fn on_sign_request(&mut self, tls: TlsHandle, request: &SignRequest) {
        self.forward(DriverEvent::SignRequest {
            tls,
            request: request.clone(),
        });
    }
}

impl DhcpsObserver for EventSink {
    fn on_dhcps_event(&mut self, event: &DhcpsEvent) {
        self.forward(DriverEvent::Dhcps(event.clone()));
    }
}

impl NetifObserver for EventSink {
    fn on_netif_event(&mut self, if_idx: u8, event: &NetifEvent) {
        self.forward(DriverEvent::Netif {
            if_idx,
            event: event.clone(),
        });
    }
}

impl NetifInfoObserver for EventSink {
    fn on_mac_address(&mut self, if_idx: u8, result: Result<MacAddr, DeviceStatus>) {
        self.forward(DriverEvent::MacAddress { if_idx, result });
    }
}

impl ProvisioningObserver for EventSink {
    fn on_provisioning_event(&mut self, event: &ProvisioningEvent) {
        self.forward(DriverEvent::Provisioning(event.clone()));
    }
}

impl PowerSaveObserver for EventSink {
    fn on_power_save_event(&mut self, event: PowerSaveEvent) {
        self.forward(DriverEvent::PowerSave(event));
    }
}

impl RssiObserver for EventSink {
    fn on_rssi(&mut self, assoc: AssocHandle, rssi: i8) {
        self.forward(DriverEvent::Rssi { assoc, rssi });
    }
}

impl DeviceInfoObserver for EventSink {
    fn on_device_info(&mut self, info: Option<&DeviceInfo>) {
        self.forward(DriverEvent::DeviceInfo(info.cloned()));
    }
}

impl RequestObserver for EventSink {
    fn on_request_event(&mut self, event: &RequestEvent) {
        self.forward(DriverEvent::Request(event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_observer() {
        let mut seen = Vec::new();
        {
            let mut obs = |assoc: AssocHandle, event: ConnectionEvent| seen.push((assoc, event));
            obs.on_connection_event(AssocHandle::Station, ConnectionEvent::Connected);
        }
        assert_eq!(seen, vec![(AssocHandle::Station, ConnectionEvent::Connected)]);
    }

    #[test]
    fn test_event_sink_forwards() {
        let (mut sink, rx) = event_channel();
        sink.on_power_save_event(PowerSaveEvent::Timeout);
        assert!(sink.on_scan_result(0, 0, None));
        assert_eq!(rx.try_recv().unwrap(), DriverEvent::PowerSave(PowerSaveEvent::Timeout));
        assert_eq!(
            rx.try_recv().unwrap(),
            DriverEvent::ScanResult {
                index: 0,
                count: 0,
                info: None
            }
        );
    }

    #[test]
    fn test_event_sink_stops_scan_when_receiver_gone() {
        let (mut sink, rx) = event_channel();
        drop(rx);
        assert!(!sink.on_scan_result(1, 2, None));
    }
}
