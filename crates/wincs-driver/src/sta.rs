//! Station mode.
//!
//! Connects to an access point and tracks the link through the device's
//! link-up, link-down, connect-error and roam events.
//!
//! ```text
//! Disconnected --connect--> Connecting --link up--> Connected
//!      ^                        |                      |  \
//!      +------ error / down ----+                      |   roam (self loop)
//!      +--------------------- link down ---------------+
//! ```

use tracing::{debug, warn};
use wincs_protocol::{
    ParamValue, ProtocolError, CMD_NETIFC, CMD_WSTA, CMD_WSTAC, NETIFC_L2_ONLY, WSTAC_BSSID,
    WSTAC_CHANNEL, WSTAC_CONN_TIMEOUT, WSTAC_CREDENTIALS, WSTAC_MFP, WSTAC_NETIF_IDX,
    WSTAC_ROAMING, WSTAC_SEC_TYPE, WSTAC_SSID, WSTA_STATE_DISABLED, WSTA_STATE_ENABLED,
};

use crate::assoc::{AssocHandle, AssocRecord, ConnectionEvent, ConnectionState};
use crate::context::{AuthContext, AuthType, BssContext, Channel};
use crate::driver::{check_elems, Driver};
use crate::error::{DriverError, Result};
use crate::event::{RequestEvent, RequestEventKind};
use crate::netif::NetifEvent;
use crate::request::{DeviceCommand, Dispatcher, RequestHandle};
use crate::transport::Transport;

/// Association id assumed for the station link until the device reports one.
const STA_DEFAULT_ASSOC_ID: i64 = 1;

/// Roaming behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoamingMode {
    #[default]
    Off,
    /// Roam without renewing the IP address.
    Layer2,
    /// Roam and renew the IP address.
    Layer3,
}

impl RoamingMode {
    fn to_device(self) -> u64 {
        match self {
            RoamingMode::Off => 0,
            RoamingMode::Layer2 => 1,
            RoamingMode::Layer3 => 2,
        }
    }
}

/// Per-connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StaConfig {
    /// Connection timeout; `None` uses the driver default.
    pub conn_timeout_ms: Option<u32>,
    pub roaming: RoamingMode,
    /// Network interface the link is bound to.
    pub if_idx: u8,
    /// Bypass the device IP stack and deliver raw frames.
    pub l2_only: bool,
}

/// Station link state.
#[derive(Debug, Clone, Default)]
pub(crate) struct StaState {
    pub(crate) state: ConnectionState,
    pub(crate) assoc: Option<AssocRecord>,
    pub(crate) op_channel: Channel,
    pub(crate) if_idx: u8,
    /// Connect request whose enable command is not yet acknowledged.
    pub(crate) connect: Option<RequestHandle>,
}

impl<T: Transport> Driver<T> {
    /// Connect to an access point.
    ///
    /// Progress is reported through the connection observer.
    pub fn sta_connect(
        &mut self,
        bss: &BssContext,
        auth: &AuthContext,
        config: &StaConfig,
    ) -> Result<()> {
        self.ensure_open()?;
        if !bss.is_valid(false) || !auth.is_valid() {
            return Err(DriverError::InvalidContext);
        }
        if !self.config.regulatory_channel_mask.allows(bss.channel) {
            return Err(DriverError::InvalidArg);
        }
        if self.ctrl.ap.is_ap || self.ctrl.sta.state != ConnectionState::Disconnected {
            return Err(DriverError::RequestError);
        }
        if config.if_idx >= self.config.num_netifs {
            return Err(DriverError::InvalidArg);
        }

        let timeout = config
            .conn_timeout_ms
            .unwrap_or(self.config.sta_conn_timeout_ms);
        let bssid = match bss.bssid {
            Some(mac) => ParamValue::MacAddr(mac),
            None => ParamValue::Invalid,
        };

        let mut cmds = vec![
            DeviceCommand::config(CMD_WSTAC, WSTAC_SSID, ParamValue::string(bss.ssid.as_bytes())),
            DeviceCommand::config(CMD_WSTAC, WSTAC_CHANNEL, i64::from(bss.channel.to_device())),
            DeviceCommand::config(CMD_WSTAC, WSTAC_BSSID, bssid),
            DeviceCommand::config(CMD_WSTAC, WSTAC_SEC_TYPE, i64::from(auth.auth_type.sec_type())),
        ];
        if !auth.password.is_empty() {
            cmds.push(DeviceCommand::config(
                CMD_WSTAC,
                WSTAC_CREDENTIALS,
                ParamValue::string(&auth.password),
            ));
        }
        cmds.extend([
            DeviceCommand::config(
                CMD_WSTAC,
                WSTAC_MFP,
                ParamValue::Unsigned(auth.mfp.to_device() as u64),
            ),
            DeviceCommand::config(CMD_WSTAC, WSTAC_CONN_TIMEOUT, ParamValue::Unsigned(timeout.into())),
            DeviceCommand::config(
                CMD_WSTAC,
                WSTAC_NETIF_IDX,
                ParamValue::Unsigned(config.if_idx.into()),
            ),
            DeviceCommand::config(
                CMD_WSTAC,
                WSTAC_ROAMING,
                ParamValue::Unsigned(config.roaming.to_device()),
            ),
            DeviceCommand::config_at(CMD_NETIFC, config.if_idx.into(), NETIFC_L2_ONLY, config.l2_only),
            DeviceCommand::new(CMD_WSTA, vec![ParamValue::Integer(WSTA_STATE_ENABLED)]),
        ]);

        let request = self.send_request(Dispatcher::Station, 0, cmds)?;

        self.ctrl.sta.connect = Some(request);
        debug!("Sta: connecting to '{}' on {:?}", bss.ssid, bss.channel);
        self.ctrl.sta.state = ConnectionState::Connecting;
        self.ctrl.sta.if_idx = config.if_idx;
        self.ctrl.sta.assoc = Some(AssocRecord {
            assoc_id: Some(STA_DEFAULT_ASSOC_ID),
            peer: None,
            rssi: None,
            auth_type: Some(auth.auth_type),
        });
        Ok(())
    }

    /// Leave the current access point, or abandon a connect in progress.
    pub fn sta_disconnect(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.ctrl.sta.state == ConnectionState::Disconnected {
            return Err(DriverError::RequestError);
        }
        self.send_request(
            Dispatcher::Station,
            0,
            vec![DeviceCommand::new(
                CMD_WSTA,
                vec![ParamValue::Integer(WSTA_STATE_DISABLED)],
            )],
        )?;
        Ok(())
    }

    /// Change the roaming behaviour of the station link.
    pub fn sta_roaming_configure(&mut self, mode: RoamingMode) -> Result<()> {
        self.ensure_open()?;
        self.send_request(
            Dispatcher::Station,
            0,
            vec![DeviceCommand::config(
                CMD_WSTAC,
                WSTAC_ROAMING,
                ParamValue::Unsigned(mode.to_device()),
            )],
        )?;
        Ok(())
    }

    pub fn sta_state(&self) -> ConnectionState {
        self.ctrl.sta.state
    }

    /// Channel of the current link, `Any` while not connected.
    pub fn sta_operating_channel(&self) -> Channel {
        self.ctrl.sta.op_channel
    }

    /// Auth type of the current or pending link.
    pub fn sta_auth_type(&self) -> Option<AuthType> {
        self.ctrl.sta.assoc.as_ref().and_then(|r| r.auth_type)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    pub(crate) fn sta_request_event(&mut self, event: &RequestEvent) {
        let is_connect = self.ctrl.sta.connect == Some(event.handle);
        match &event.kind {
            RequestEventKind::CmdStatus { status, src, .. } => {
                let enabling = src.cmd_id == CMD_WSTA
                    && src.params.first().and_then(|p| p.as_int().ok()) == Some(WSTA_STATE_ENABLED);
                if enabling && is_connect {
                    self.ctrl.sta.connect = None;
                }
                if status.is_ok() {
                    return;
                }
                warn!("Sta: command 0x{:04X} failed: {}", src.cmd_id, status);
                if enabling && self.ctrl.sta.state == ConnectionState::Connecting {
                    self.sta_connect_failed();
                }
            }
            RequestEventKind::StatusComplete { .. } if is_connect => {
                self.ctrl.sta.connect = None;
                if self.ctrl.sta.state == ConnectionState::Connecting {
                    warn!("Sta: connect request lost before the device answered");
                    self.sta_connect_failed();
                }
            }
            _ => {}
        }
    }

    fn sta_connect_failed(&mut self) {
        self.sta_set_disconnected();
        self.notify_connection(AssocHandle::Station, ConnectionEvent::Failed);
    }

    /// `WSTALU`: `(assoc_id, bssid, channel)`.
    pub(crate) fn sta_link_up(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 3)?;
        let assoc_id = elems[0].as_int()?;
        let peer = elems[1].as_mac()?;
        let channel = elems[2].as_int()?;
        if self.ctrl.sta.state == ConnectionState::Connected {
            return Ok(());
        }
        let auth_type = self.sta_auth_type();
        let mut record = AssocRecord::new(assoc_id, peer);
        record.auth_type = auth_type;
        self.ctrl.sta.assoc = Some(record);
        self.ctrl.sta.op_channel = u8::try_from(channel)
            .map(Channel::from_device)
            .unwrap_or_default();
        self.ctrl.sta.state = ConnectionState::Connected;
        debug!("Sta: connected to {} on channel {}", peer, channel);
        self.notify_connection(AssocHandle::Station, ConnectionEvent::Connected);
        Ok(())
    }

    /// `WSTALD`: `(assoc_id)`.
    pub(crate) fn sta_link_down(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 1)?;
        let assoc_id = elems[0].as_int()?;
        if self.ctrl.sta.state == ConnectionState::Disconnected {
            return Ok(());
        }
        if !self.sta_assoc_id_matches(assoc_id) {
            debug!("Sta: link down for unknown association {}", assoc_id);
            return Ok(());
        }
        let was_connected = self.ctrl.sta.state == ConnectionState::Connected;
        self.sta_set_disconnected();
        debug!("Sta: link down (was connected: {})", was_connected);
        let event = if was_connected {
            ConnectionEvent::Disconnected
        } else {
            ConnectionEvent::Failed
        };
        self.notify_connection(AssocHandle::Station, event);
        Ok(())
    }

    /// `WSTAERR`: `(error)`.
    pub(crate) fn sta_connect_error(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 1)?;
        if self.ctrl.sta.state == ConnectionState::Connecting {
            warn!("Sta: connect failed ({:?})", elems[0]);
            self.sta_set_disconnected();
            self.notify_connection(AssocHandle::Station, ConnectionEvent::Failed);
        }
        Ok(())
    }

    /// `WSTAROAM`: `(assoc_id)`.
    pub(crate) fn sta_roamed(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 1)?;
        let assoc_id = elems[0].as_int()?;
        if self.ctrl.sta.state == ConnectionState::Connected && self.sta_assoc_id_matches(assoc_id) {
            debug!("Sta: roamed");
            self.notify_connection(AssocHandle::Station, ConnectionEvent::Roamed);
        }
        Ok(())
    }

    /// `WSTAAIP`: `(assoc_id, address)`.
    pub(crate) fn sta_address_assigned(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 2)?;
        let assoc_id = elems[0].as_int()?;
        let addr = elems[1].as_ip()?;
        if !self.sta_assoc_id_matches(assoc_id) {
            return Ok(());
        }
        debug!("Sta: address {}", addr);
        let if_idx = self.ctrl.sta.if_idx;
        if let Some(obs) = self.observers.netif.as_mut() {
            obs.on_netif_event(if_idx, &NetifEvent::AddressUpdate(addr));
        }
        Ok(())
    }

    fn sta_assoc_id_matches(&self, assoc_id: i64) -> bool {
        self.ctrl
            .sta
            .assoc
            .as_ref()
            .is_some_and(|r| r.assoc_id == Some(assoc_id))
    }

    fn sta_set_disconnected(&mut self) {
        self.ctrl.sta.state = ConnectionState::Disconnected;
        self.ctrl.sta.connect = None;
        self.ctrl.sta.op_channel = Channel::Any;
        self.ctrl.sta.assoc = None;
    }

    pub(crate) fn notify_connection(&mut self, assoc: AssocHandle, event: ConnectionEvent) {
        if let Some(obs) = self.observers.connection.as_mut() {
            obs.on_connection_event(assoc, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roaming_encoding() {
        assert_eq!(RoamingMode::Off.to_device(), 0);
        assert_eq!(RoamingMode::Layer3.to_device(), 2);
    }

    #[test]
    fn test_default_config() {
        let config = StaConfig::default();
        assert_eq!(config.conn_timeout_ms, None);
        assert_eq!(config.roaming, RoamingMode::Off);
        assert_eq!(config.if_idx, 0);
        assert!(!config.l2_only);
    }
}
