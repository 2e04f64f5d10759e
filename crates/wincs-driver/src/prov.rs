//! Provisioning service.
//!
//! The device runs a small TCP service a phone app can use to hand over
//! network credentials. Clients attaching and detaching are reported to the
//! provisioning observer while the service runs.

use std::net::IpAddr;

use tracing::{debug, warn};
use wincs_protocol::{
    ParamValue, ProtocolError, CMD_WPROV, CMD_WPROVC, WPROVC_ASCII, WPROVC_PORT,
    WPROVC_PROTOCOL_VERSION,
};

use crate::driver::{check_elems, Driver};
use crate::error::{DriverError, Result};
use crate::event::{RequestEvent, RequestEventKind};
use crate::observer::ProvisioningObserver;
use crate::request::{DeviceCommand, Dispatcher};
use crate::transport::Transport;

/// Framing used by the provisioning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvisioningProtocol {
    #[default]
    Binary,
    Ascii,
}

/// IP version the service listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpVersion {
    #[default]
    V4,
    V6,
}

/// Provisioning client notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningEvent {
    Attach { id: i64, addr: IpAddr },
    Detach { id: i64 },
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ProvState {
    pub(crate) running: bool,
}

impl<T: Transport> Driver<T> {
    /// Start the provisioning service on `port`.
    pub fn prov_start(
        &mut self,
        protocol: ProvisioningProtocol,
        port: u16,
        ip: IpVersion,
        observer: Option<Box<dyn ProvisioningObserver>>,
    ) -> Result<()> {
        self.ensure_open()?;
        if self.ctrl.prov.running {
            return Err(DriverError::Busy);
        }
        if port == 0 {
            return Err(DriverError::InvalidArg);
        }
        let version: u64 = match ip {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        };
        self.send_request(
            Dispatcher::Provisioning,
            0,
            vec![
                DeviceCommand::config(CMD_WPROVC, WPROVC_PORT, ParamValue::Unsigned(port.into())),
                DeviceCommand::config(
                    CMD_WPROVC,
                    WPROVC_ASCII,
                    protocol == ProvisioningProtocol::Ascii,
                ),
                DeviceCommand::config(
                    CMD_WPROVC,
                    WPROVC_PROTOCOL_VERSION,
                    ParamValue::Unsigned(version),
                ),
                DeviceCommand::new(CMD_WPROV, vec![ParamValue::Integer(1)]),
            ],
        )?;
        debug!("Prov: service starting on port {} ({:?}, {:?})", port, protocol, ip);
        self.ctrl.prov.running = true;
        self.observers.provisioning = observer;
        Ok(())
    }

    /// Stop the provisioning service.
    pub fn prov_stop(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.send_request(
            Dispatcher::Provisioning,
            0,
            vec![DeviceCommand::new(CMD_WPROV, vec![ParamValue::Integer(0)])],
        )?;
        debug!("Prov: service stopping");
        self.ctrl.prov.running = false;
        self.observers.provisioning = None;
        Ok(())
    }

    pub fn prov_is_running(&self) -> bool {
        self.ctrl.prov.running
    }

    pub(crate) fn prov_request_event(&mut self, event: &RequestEvent) {
        let RequestEventKind::CmdStatus { status, src, .. } = &event.kind else {
            return;
        };
        if status.is_ok() {
            return;
        }
        warn!("Prov: command 0x{:04X} failed: {}", src.cmd_id, status);
        let starting = src.cmd_id == CMD_WPROV
            && src.params.first().and_then(|p| p.as_int().ok()) == Some(1);
        if starting {
            self.ctrl.prov.running = false;
            self.observers.provisioning = None;
        }
    }

    /// `WPROVAT`: `(id, address, port)`.
    pub(crate) fn prov_attached(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 3)?;
        let id = elems[0].as_int()?;
        let addr = elems[1].as_ip()?;
        if let Some(obs) = self.observers.provisioning.as_mut() {
            obs.on_provisioning_event(&ProvisioningEvent::Attach { id, addr });
        }
        Ok(())
    }

    /// `WPROVDT`: `(id)`.
    pub(crate) fn prov_detached(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 1)?;
        let id = elems[0].as_int()?;
        if let Some(obs) = self.observers.provisioning.as_mut() {
            obs.on_provisioning_event(&ProvisioningEvent::Detach { id });
        }
        Ok(())
    }
}
