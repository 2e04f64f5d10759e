//! Associations.
//!
//! One record for the station link and a fixed table of records for peers
//! joined to the soft AP. Records are addressed by [`AssocHandle`].

use std::fmt;

use tracing::debug;
use wincs_protocol::{MacAddr, ParamValue, ProtocolError, CMD_ASSOC};

use crate::context::AuthType;
use crate::driver::{check_elems, Driver};
use crate::error::{DriverError, Result};
use crate::request::{DeviceCommand, Dispatcher};
use crate::transport::Transport;

/// Connection state of the station link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Connection notifications.
///
/// `Failed` is a notification only; the link is already back at
/// `Disconnected` when it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Failed,
    Roamed,
}

/// Refers to an association record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssocHandle {
    /// The station link to an access point.
    Station,
    /// A peer joined to the soft AP, by table slot.
    Peer(usize),
    /// The soft AP itself. Only used to report AP start and stop.
    SoftAp,
}

impl fmt::Display for AssocHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssocHandle::Station => write!(f, "sta"),
            AssocHandle::Peer(i) => write!(f, "peer#{}", i),
            AssocHandle::SoftAp => write!(f, "ap"),
        }
    }
}

/// One association.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssocRecord {
    /// Device association id.
    pub assoc_id: Option<i64>,
    /// Peer MAC address, once known.
    pub peer: Option<MacAddr>,
    /// Last reported signal strength.
    pub rssi: Option<i8>,
    pub auth_type: Option<AuthType>,
}

impl AssocRecord {
    pub(crate) fn new(assoc_id: i64, peer: MacAddr) -> Self {
        AssocRecord {
            assoc_id: Some(assoc_id),
            peer: Some(peer),
            rssi: None,
            auth_type: None,
        }
    }
}

impl<T: Transport> Driver<T> {
    /// The record behind `handle`, if it is currently valid.
    pub fn assoc_info(&self, handle: AssocHandle) -> Option<&AssocRecord> {
        match handle {
            AssocHandle::Station => self.ctrl.sta.assoc.as_ref(),
            AssocHandle::Peer(i) => self.ctrl.ap.peers.get(i),
            AssocHandle::SoftAp => None,
        }
    }

    /// Peer MAC address of an association.
    pub fn assoc_peer_address(&self, handle: AssocHandle) -> Result<MacAddr> {
        self.check_assoc_handle(handle)?;
        let record = self.assoc_info(handle).ok_or(DriverError::NotConnected)?;
        if let Some(peer) = record.peer {
            return Ok(peer);
        }
        if self.assoc_link_up(handle) {
            Err(DriverError::RetryRequest)
        } else {
            Err(DriverError::RequestError)
        }
    }

    /// Signal strength of an association.
    ///
    /// Without `refresh` the last reported value is returned. With `refresh`
    /// the device is asked for a new value, which arrives through the RSSI
    /// observer, and `RetryRequest` is returned.
    pub fn assoc_rssi(&mut self, handle: AssocHandle, refresh: bool) -> Result<i8> {
        self.ensure_open()?;
        self.check_assoc_handle(handle)?;
        let record = self.assoc_info(handle).ok_or(DriverError::NotConnected)?;
        if !self.assoc_link_up(handle) {
            return Err(DriverError::RequestError);
        }
        if !refresh {
            return record.rssi.ok_or(DriverError::RequestError);
        }
        let assoc_id = record.assoc_id.ok_or(DriverError::RequestError)?;
        self.send_request(
            Dispatcher::Assoc,
            0,
            vec![DeviceCommand::new(CMD_ASSOC, vec![ParamValue::Integer(assoc_id)])],
        )?;
        Err(DriverError::RetryRequest)
    }

    /// Drop an association. Only the station link can be dropped this way.
    pub fn assoc_disconnect(&mut self, handle: AssocHandle) -> Result<()> {
        self.check_assoc_handle(handle)?;
        if self.assoc_info(handle).is_none() {
            return Err(DriverError::NotConnected);
        }
        if self.ctrl.ap.is_ap {
            return Err(DriverError::OperationNotSupported);
        }
        self.sta_disconnect()
    }

    fn check_assoc_handle(&self, handle: AssocHandle) -> Result<()> {
        match handle {
            AssocHandle::Peer(i) if i >= self.ctrl.ap.peers.capacity() => {
                Err(DriverError::InvalidArg)
            }
            AssocHandle::SoftAp => Err(DriverError::InvalidArg),
            _ => Ok(()),
        }
    }

    fn assoc_link_up(&self, handle: AssocHandle) -> bool {
        match handle {
            AssocHandle::Station => {
                self.ctrl.sta.state == ConnectionState::Connected && !self.ctrl.ap.is_ap
            }
            AssocHandle::Peer(i) => self.ctrl.ap.is_ap && self.ctrl.ap.peers.is_in_use(i),
            AssocHandle::SoftAp => false,
        }
    }

    /// `ASSOC` event: `(assoc_id, peer_is_sta, peer, rssi)`.
    pub(crate) fn assoc_process_rssi(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 4)?;
        let assoc_id = elems[0].as_int()?;
        let peer_is_sta = elems[1].as_bool()?;
        let peer = elems[2].as_mac()?;
        let rssi = clamp_rssi(elems[3].as_int()?);

        let handle = if peer_is_sta {
            self.ctrl
                .ap
                .peers
                .find(|r| r.peer == Some(peer))
                .map(AssocHandle::Peer)
        } else {
            match &self.ctrl.sta.assoc {
                Some(r) if r.assoc_id == Some(assoc_id) => Some(AssocHandle::Station),
                _ => None,
            }
        };
        let Some(handle) = handle else {
            debug!("Assoc: RSSI for unknown association {}", assoc_id);
            return Ok(());
        };

        let record = match handle {
            AssocHandle::Station => self.ctrl.sta.assoc.as_mut(),
            AssocHandle::Peer(i) => self.ctrl.ap.peers.get_mut(i),
            AssocHandle::SoftAp => None,
        };
        if let Some(record) = record {
            record.rssi = Some(rssi);
        }
        if let Some(obs) = self.observers.rssi.as_mut() {
            obs.on_rssi(handle, rssi);
        }
        Ok(())
    }
}

pub(crate) fn clamp_rssi(value: i64) -> i8 {
    value.clamp(i64::from(i8::MIN), i64::from(i8::MAX)) as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_rssi() {
        assert_eq!(clamp_rssi(-60), -60);
        assert_eq!(clamp_rssi(-300), -128);
        assert_eq!(clamp_rssi(200), 127);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(AssocHandle::Station.to_string(), "sta");
        assert_eq!(AssocHandle::Peer(3).to_string(), "peer#3");
    }
}
