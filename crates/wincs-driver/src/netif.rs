//! Network interfaces.
//!
//! Address configuration of the device's interfaces, the MAC address query
//! and the raw frame monitor for interfaces running in L2-only mode.

use std::net::{IpAddr, Ipv4Addr};

use bytes::Bytes;
use tracing::{debug, trace, warn};
use wincs_protocol::{
    DeviceStatus, MacAddr, ParamValue, ProtocolError, CMD_NETIFC, NETIFC_DHCPC_EN, NETIFC_ETHER,
    NETIFC_GATEWAY, NETIFC_IPV6_GATEWAY, NETIFC_IPV6_GLO_ADDR, NETIFC_IP_MASK,
};

use crate::driver::{check_elems, Driver};
use crate::error::{DriverError, Result};
use crate::event::{RequestEvent, RequestEventKind, SourceCommand};
use crate::observer::NetifInfoObserver;
use crate::request::{DeviceCommand, Dispatcher, RequestHandle};
use crate::transport::Transport;

/// Longest IPv4 prefix accepted for an interface address.
const IPV4_PREFIX_MAX: u8 = 31;
/// Longest IPv6 prefix accepted for an interface address.
const IPV6_PREFIX_MAX: u8 = 127;

/// Interface notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetifEvent {
    /// The interface was given an address.
    AddressUpdate(IpAddr),
    /// A frame received on an L2-only interface.
    L2Frame { data: Bytes },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NetifState {
    /// Outstanding MAC address query.
    pub(crate) mac_query: Option<RequestHandle>,
}

/// Netmask with the top `prefix_len` bits set.
fn ipv4_netmask(prefix_len: u8) -> Ipv4Addr {
    let mask = u32::MAX
        .checked_shl(32 - u32::from(prefix_len))
        .unwrap_or(0);
    Ipv4Addr::from(mask)
}

/// Parameter id of a `NETIFC(if, id, value)` command.
fn netifc_param_id(src: &SourceCommand) -> Option<i32> {
    if src.cmd_id != CMD_NETIFC {
        return None;
    }
    src.params
        .get(1)
        .and_then(|p| p.as_int().ok())
        .and_then(|id| i32::try_from(id).ok())
}

impl<T: Transport> Driver<T> {
    /// Ask the device for the MAC address of an interface.
    ///
    /// The answer is delivered once to `observer`. Only one query may be
    /// outstanding; a second returns `RetryRequest`.
    pub fn netif_mac_address_get(
        &mut self,
        if_idx: u8,
        observer: Box<dyn NetifInfoObserver>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.netif_check_index(if_idx)?;
        if self.ctrl.netif.mac_query.is_some() {
            return Err(DriverError::RetryRequest);
        }
        let handle = self.send_request(
            Dispatcher::Netif,
            u32::from(if_idx),
            vec![DeviceCommand::config_at(
                CMD_NETIFC,
                if_idx.into(),
                NETIFC_ETHER,
                ParamValue::Invalid,
            )],
        )?;
        self.ctrl.netif.mac_query = Some(handle);
        self.observers.netif_info = Some(observer);
        Ok(())
    }

    /// Turn the DHCP client of an interface on or off.
    pub fn netif_dhcp_client_set(&mut self, if_idx: u8, enabled: bool) -> Result<()> {
        self.netif_send(if_idx, NETIFC_DHCPC_EN, ParamValue::Integer(enabled.into()))
    }

    /// Assign a static address.
    ///
    /// For IPv4 `prefix_len` is the netmask length (at most 31), for IPv6
    /// the prefix length (at most 127).
    pub fn netif_ip_address_set(&mut self, if_idx: u8, addr: IpAddr, prefix_len: u8) -> Result<()> {
        let (param_id, value) = match addr {
            IpAddr::V4(addr) => {
                if prefix_len > IPV4_PREFIX_MAX {
                    return Err(DriverError::InvalidArg);
                }
                (
                    NETIFC_IP_MASK,
                    ParamValue::Ipv4Prefix {
                        addr,
                        netmask: ipv4_netmask(prefix_len),
                    },
                )
            }
            IpAddr::V6(addr) => {
                if prefix_len > IPV6_PREFIX_MAX {
                    return Err(DriverError::InvalidArg);
                }
                (NETIFC_IPV6_GLO_ADDR, ParamValue::Ipv6Prefix { addr, prefix_len })
            }
        };
        self.netif_send(if_idx, param_id, value)
    }

    /// Set the default gateway of an interface.
    pub fn netif_route_set(&mut self, if_idx: u8, gateway: IpAddr) -> Result<()> {
        let param_id = match gateway {
            IpAddr::V4(_) => NETIFC_GATEWAY,
            IpAddr::V6(_) => NETIFC_IPV6_GATEWAY,
        };
        self.netif_send(if_idx, param_id, gateway.into())
    }

    fn netif_check_index(&self, if_idx: u8) -> Result<()> {
        if if_idx >= self.config.num_netifs {
            return Err(DriverError::InvalidArg);
        }
        Ok(())
    }

    fn netif_send(&mut self, if_idx: u8, param_id: i32, value: ParamValue) -> Result<()> {
        self.netif_check_index(if_idx)?;
        self.ensure_open()?;
        self.send_request(
            Dispatcher::Netif,
            u32::from(if_idx),
            vec![DeviceCommand::config_at(CMD_NETIFC, if_idx.into(), param_id, value)],
        )?;
        Ok(())
    }

    fn netif_mac_result(&mut self, if_idx: u8, result: std::result::Result<MacAddr, DeviceStatus>) {
        self.ctrl.netif.mac_query = None;
        if let Some(mut obs) = self.observers.netif_info.take() {
            obs.on_mac_address(if_idx, result);
        }
    }

    pub(crate) fn netif_request_event(&mut self, event: &RequestEvent) {
        let if_idx = u8::try_from(event.context).unwrap_or_default();
        let is_query = self.ctrl.netif.mac_query == Some(event.handle);
        match &event.kind {
            RequestEventKind::RspReceived { elems, src, .. } => {
                if !is_query || netifc_param_id(src) != Some(NETIFC_ETHER) {
                    return;
                }
                match elems.get(1).map(ParamValue::as_mac) {
                    Some(Ok(mac)) => {
                        debug!("Netif: if{} MAC {}", if_idx, mac);
                        self.netif_mac_result(if_idx, Ok(mac));
                    }
                    _ => warn!("Netif: malformed MAC address response"),
                }
            }
            RequestEventKind::CmdStatus { status, src, .. } => {
                if status.is_ok() {
                    return;
                }
                warn!("Netif: if{} command 0x{:04X} failed: {}", if_idx, src.cmd_id, status);
                if is_query && netifc_param_id(src) == Some(NETIFC_ETHER) {
                    self.netif_mac_result(if_idx, Err(*status));
                }
            }
            RequestEventKind::StatusComplete { .. } => {
                if is_query {
                    debug!("Netif: MAC query ended without an answer");
                    self.netif_mac_result(if_idx, Err(DeviceStatus::Error));
                }
            }
            RequestEventKind::TxComplete => {}
        }
    }

    /// `NETIFRX`: `(if_idx, length, data)`.
    pub(crate) fn netif_rx(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 3)?;
        let if_idx = elems[0].as_int()?;
        let data = Bytes::copy_from_slice(elems[2].as_bytes()?);
        let Ok(if_idx) = u8::try_from(if_idx) else {
            warn!("Netif: frame for interface {} dropped", if_idx);
            return Ok(());
        };
        trace!("Netif: if{} received {} bytes", if_idx, data.len());
        if let Some(obs) = self.observers.netif.as_mut() {
            obs.on_netif_event(if_idx, &NetifEvent::L2Frame { data });
        }
        Ok(())
    }
}
