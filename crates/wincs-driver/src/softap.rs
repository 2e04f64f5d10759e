//! Soft AP mode.
//!
//! Starts and stops an access point and tracks joined peers in a fixed table
//! of association slots, matched by MAC address.

use tracing::{debug, error, warn};
use wincs_protocol::{
    ParamValue, ProtocolError, CMD_WAP, CMD_WAPC, WAPC_CHANNEL, WAPC_CREDENTIALS, WAPC_HIDDEN,
    WAPC_MFP, WAPC_NETIF_IDX, WAPC_REKEY_INTERVAL, WAPC_SEC_TYPE, WAPC_SSID, WAP_REKEY_INTERVAL_MAX,
    WAP_REKEY_INTERVAL_MIN, WAP_STATE_DISABLED, WAP_STATE_ENABLED,
};

use crate::assoc::{AssocHandle, AssocRecord, ConnectionEvent, ConnectionState};
use crate::context::{AuthContext, BssContext, Channel};
use crate::dhcps::DhcpsEvent;
use crate::driver::{check_elems, Driver};
use crate::error::{DriverError, Result};
use crate::event::{RequestEvent, RequestEventKind};
use crate::pool::Pool;
use crate::request::{DeviceCommand, Dispatcher};
use crate::transport::Transport;

/// Soft AP settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApConfig {
    /// Network interface the AP is bound to.
    pub if_idx: u8,
    /// Group key rekey interval in seconds.
    pub rekey_interval_s: u32,
}

impl Default for ApConfig {
    fn default() -> Self {
        ApConfig {
            if_idx: 0,
            rekey_interval_s: WAP_REKEY_INTERVAL_MAX,
        }
    }
}

/// Soft AP state.
#[derive(Debug, Clone)]
pub(crate) struct ApState {
    pub(crate) is_ap: bool,
    pub(crate) peers: Pool<AssocRecord>,
}

impl ApState {
    pub(crate) fn new(num_assocs: usize) -> Self {
        ApState {
            is_ap: false,
            peers: Pool::with_capacity(num_assocs),
        }
    }
}

impl<T: Transport> Driver<T> {
    /// Start an access point.
    ///
    /// The start result, and later every joining or leaving peer, is reported
    /// through the connection observer.
    pub fn ap_start(&mut self, bss: &BssContext, auth: &AuthContext, config: &ApConfig) -> Result<()> {
        self.ensure_open()?;
        if !bss.is_valid(true) || !auth.is_valid() {
            return Err(DriverError::InvalidContext);
        }
        let Channel::Fixed(channel) = bss.channel else {
            return Err(DriverError::InvalidArg);
        };
        if !self.config.regulatory_channel_mask.contains(channel) {
            return Err(DriverError::InvalidArg);
        }
        if self.ctrl.ap.is_ap || self.ctrl.sta.state != ConnectionState::Disconnected {
            return Err(DriverError::RequestError);
        }
        if config.if_idx >= self.config.num_netifs
            || !(WAP_REKEY_INTERVAL_MIN..=WAP_REKEY_INTERVAL_MAX).contains(&config.rekey_interval_s)
        {
            return Err(DriverError::InvalidArg);
        }

        let mut cmds = vec![
            DeviceCommand::config(CMD_WAPC, WAPC_SSID, ParamValue::string(bss.ssid.as_bytes())),
            DeviceCommand::config(CMD_WAPC, WAPC_CHANNEL, i64::from(channel)),
            DeviceCommand::config(CMD_WAPC, WAPC_SEC_TYPE, i64::from(auth.auth_type.sec_type())),
        ];
        if !auth.password.is_empty() {
            cmds.push(DeviceCommand::config(
                CMD_WAPC,
                WAPC_CREDENTIALS,
                ParamValue::string(&auth.password),
            ));
        }
        cmds.extend([
            DeviceCommand::config(
                CMD_WAPC,
                WAPC_MFP,
                ParamValue::Unsigned(auth.mfp.to_device() as u64),
            ),
            DeviceCommand::config(CMD_WAPC, WAPC_HIDDEN, bss.cloaked),
            DeviceCommand::config(CMD_WAPC, WAPC_NETIF_IDX, ParamValue::Unsigned(config.if_idx.into())),
            DeviceCommand::config(
                CMD_WAPC,
                WAPC_REKEY_INTERVAL,
                ParamValue::Unsigned(config.rekey_interval_s.into()),
            ),
            DeviceCommand::new(CMD_WAP, vec![ParamValue::Integer(WAP_STATE_ENABLED)]),
        ]);

        self.send_request(Dispatcher::SoftAp, 0, cmds)?;

        debug!("SoftAp: starting '{}' on channel {}", bss.ssid, channel);
        self.ctrl.ap.is_ap = true;
        self.ctrl.ap.peers.clear();
        Ok(())
    }

    /// Stop the access point.
    pub fn ap_stop(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.ctrl.ap.is_ap {
            return Err(DriverError::RequestError);
        }
        self.send_request(
            Dispatcher::SoftAp,
            0,
            vec![DeviceCommand::new(
                CMD_WAP,
                vec![ParamValue::Integer(WAP_STATE_DISABLED)],
            )],
        )?;
        debug!("SoftAp: stopping");
        self.ctrl.ap.is_ap = false;
        self.ctrl.ap.peers.clear();
        Ok(())
    }

    /// Whether the device is running as an access point.
    pub fn ap_is_active(&self) -> bool {
        self.ctrl.ap.is_ap
    }

    /// Handles of every joined peer.
    pub fn ap_peers(&self) -> Vec<AssocHandle> {
        self.ctrl
            .ap
            .peers
            .iter()
            .map(|(i, _)| AssocHandle::Peer(i))
            .collect()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    pub(crate) fn ap_request_event(&mut self, event: &RequestEvent) {
        let RequestEventKind::CmdStatus { status, src, .. } = &event.kind else {
            return;
        };
        if src.cmd_id != CMD_WAP {
            if !status.is_ok() {
                warn!("SoftAp: command 0x{:04X} failed: {}", src.cmd_id, status);
            }
            return;
        }
        let Some(state) = src.params.first().and_then(|p| p.as_int().ok()) else {
            return;
        };
        let notify = match (state, status.is_ok()) {
            (WAP_STATE_DISABLED, true) => ConnectionEvent::Disconnected,
            (WAP_STATE_ENABLED, true) => ConnectionEvent::Connected,
            (WAP_STATE_ENABLED, false) => {
                warn!("SoftAp: start failed: {}", status);
                self.ctrl.ap.is_ap = false;
                self.ctrl.ap.peers.clear();
                ConnectionEvent::Failed
            }
            (WAP_STATE_DISABLED, false) => {
                warn!("SoftAp: stop failed: {}", status);
                ConnectionEvent::Failed
            }
            _ => return,
        };
        self.notify_connection(AssocHandle::SoftAp, notify);
    }

    /// `WAPSC`: `(assoc_id, peer)`.
    pub(crate) fn ap_peer_joined(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 2)?;
        let assoc_id = elems[0].as_int()?;
        let peer = elems[1].as_mac()?;

        let record = AssocRecord::new(assoc_id, peer);
        let slot = match self.ctrl.ap.peers.find(|r| r.peer == Some(peer)) {
            Some(i) => {
                error!("SoftAp: association already present for {}", peer);
                if let Some(existing) = self.ctrl.ap.peers.get_mut(i) {
                    *existing = record;
                }
                Some(i)
            }
            None => self.ctrl.ap.peers.acquire(record),
        };
        let Some(slot) = slot else {
            error!("SoftAp: no free association slot for {}", peer);
            return Ok(());
        };
        debug!("SoftAp: {} joined as peer#{}", peer, slot);
        self.notify_connection(AssocHandle::Peer(slot), ConnectionEvent::Connected);
        Ok(())
    }

    /// `WAPSD`: `(assoc_id, peer)`.
    pub(crate) fn ap_peer_left(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 2)?;
        let peer = elems[1].as_mac()?;
        let Some(slot) = self.ctrl.ap.peers.find(|r| r.peer == Some(peer)) else {
            error!("SoftAp: no association found for {}", peer);
            return Ok(());
        };
        self.ctrl.ap.peers.release(slot);
        debug!("SoftAp: {} left", peer);
        self.notify_connection(AssocHandle::Peer(slot), ConnectionEvent::Disconnected);
        Ok(())
    }

    /// `WAPAIP`: `(assoc_id, address)`.
    pub(crate) fn ap_peer_address_assigned(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 2)?;
        let assoc_id = elems[0].as_int()?;
        let ip = elems[1].as_ipv4()?;
        let Some(obs) = self.observers.dhcps.as_mut() else {
            return Ok(());
        };
        for (_, record) in self.ctrl.ap.peers.iter() {
            if record.assoc_id != Some(assoc_id) {
                continue;
            }
            if let Some(mac) = record.peer {
                obs.on_dhcps_event(&DhcpsEvent::LeaseAssigned { mac, ip });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rekey_interval() {
        let config = ApConfig::default();
        assert_eq!(config.rekey_interval_s, 86_400);
        assert_eq!(config.if_idx, 0);
    }

    #[test]
    fn test_ap_state_starts_idle() {
        let state = ApState::new(8);
        assert!(!state.is_ap);
        assert_eq!(state.peers.capacity(), 8);
        assert_eq!(state.peers.in_use(), 0);
    }
}
