//! Over-the-air firmware update.
//!
//! One operation runs at a time: download (with verify), verify, activate or
//! invalidate. The device acknowledges the start with a command status and
//! an operation id, then reports progress and the outcome with `OTA` or
//! `OTAERR` events carrying that id.

use tracing::{debug, warn};
use wincs_protocol::{
    ParamValue, ProtocolError, CMD_OTAACT, CMD_OTAC, CMD_OTADL, CMD_OTAINV, CMD_OTAVFY,
    OTAC_FILE, OTAC_HOST, OTAC_PATH, OTAC_PORT, OTAC_TIMEOUT, OTAC_TLS_CONF,
    OTA_STATUS_ACTIVATE_DONE, OTA_STATUS_DEVICE_ERROR, OTA_STATUS_ERASE_DONE, OTA_STATUS_ERROR,
    OTA_STATUS_IMAGE_TOO_LARGE, OTA_STATUS_INVALIDATE_DONE, OTA_STATUS_INVALID_URL,
    OTA_STATUS_NO_STA_CONN, OTA_STATUS_PROTOCOL_ERROR, OTA_STATUS_TIMEOUT, OTA_STATUS_TLS_ERROR,
    OTA_STATUS_VERIFY_DONE, OTA_STATUS_WRITE_DONE,
};

use crate::driver::{check_elems, Driver};
use crate::error::{DriverError, Result};
use crate::event::{RequestEvent, RequestEventKind};
use crate::observer::OtaObserver;
use crate::ota_url::OtaUrl;
use crate::request::{DeviceCommand, Dispatcher, RequestHandle};
use crate::tls::TlsHandle;
use crate::transport::Transport;

/// The OTA operation in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtaOperation {
    DownloadVerify,
    Verify,
    Activate,
    Invalidate,
}

/// Progress and outcome of an OTA operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtaStatus {
    /// The device accepted the operation. Not terminal.
    Started,
    Complete,
    /// The operation could not be started or failed on the device.
    Failed,
    /// No station connection, or the server timed out.
    ConnectionError,
    /// Protocol, TLS or device error while downloading.
    ServerError,
    /// The image does not fit in flash.
    InsufficientStorage,
}

impl OtaStatus {
    pub fn is_terminal(self) -> bool {
        self != OtaStatus::Started
    }

    /// Map an event sub-status. `None` for progress that is not terminal.
    fn from_device(status: u16) -> Option<Self> {
        match status {
            OTA_STATUS_ERASE_DONE | OTA_STATUS_WRITE_DONE => None,
            OTA_STATUS_VERIFY_DONE | OTA_STATUS_ACTIVATE_DONE | OTA_STATUS_INVALIDATE_DONE => {
                Some(OtaStatus::Complete)
            }
            OTA_STATUS_NO_STA_CONN | OTA_STATUS_TIMEOUT => Some(OtaStatus::ConnectionError),
            OTA_STATUS_PROTOCOL_ERROR | OTA_STATUS_TLS_ERROR | OTA_STATUS_DEVICE_ERROR => {
                Some(OtaStatus::ServerError)
            }
            OTA_STATUS_IMAGE_TOO_LARGE => Some(OtaStatus::InsufficientStorage),
            OTA_STATUS_ERROR | OTA_STATUS_INVALID_URL => Some(OtaStatus::Failed),
            other => {
                debug!("Ota: unhandled status 0x{:04X}", other);
                Some(OtaStatus::Failed)
            }
        }
    }
}

/// OTA client options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OtaOptions {
    /// Download timeout in milliseconds.
    pub timeout_ms: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct OtaState {
    pub(crate) operation: Option<OtaOperation>,
    pub(crate) op_id: u32,
    /// Request carrying the start command until the device acknowledges it.
    pub(crate) start: Option<RequestHandle>,
}

impl<T: Transport> Driver<T> {
    /// Download, then verify, a firmware image.
    ///
    /// `tls` selects the TLS context for `https` downloads.
    pub fn ota_update_from_url(
        &mut self,
        url: &str,
        tls: Option<TlsHandle>,
        observer: Option<Box<dyn OtaObserver>>,
    ) -> Result<()> {
        self.ota_check_idle()?;
        if let Some(handle) = tls {
            if !self.tls_is_open(handle) {
                return Err(DriverError::InvalidArg);
            }
        }
        let url = OtaUrl::parse(url)?;

        let mut cmds = vec![DeviceCommand::config(
            CMD_OTAC,
            OTAC_HOST,
            ParamValue::string(url.host.to_string()),
        )];
        cmds.push(DeviceCommand::config(
            CMD_OTAC,
            OTAC_PORT,
            ParamValue::Unsigned(url.port.into()),
        ));
        if !url.path.is_empty() {
            cmds.push(DeviceCommand::config(CMD_OTAC, OTAC_PATH, ParamValue::string(&url.path)));
        }
        if !url.file.is_empty() {
            cmds.push(DeviceCommand::config(CMD_OTAC, OTAC_FILE, ParamValue::string(&url.file)));
        }
        let tls_idx = tls.map_or(0, |h| i64::from(h.value()));
        cmds.push(DeviceCommand::config(CMD_OTAC, OTAC_TLS_CONF, tls_idx));
        cmds.push(DeviceCommand::new(CMD_OTADL, vec![ParamValue::Integer(1)]));

        let request = self.send_request(Dispatcher::Ota, 0, cmds)?;
        debug!("Ota: download from {}:{}{}{}", url.host, url.port, url.path, url.file);
        self.ota_begin(OtaOperation::DownloadVerify, request, observer);
        Ok(())
    }

    /// Verify the image in flash.
    pub fn ota_verify_image(&mut self, observer: Option<Box<dyn OtaObserver>>) -> Result<()> {
        self.ota_simple(OtaOperation::Verify, CMD_OTAVFY, observer)
    }

    /// Mark the downloaded image active for the next boot.
    pub fn ota_activate_image(&mut self, observer: Option<Box<dyn OtaObserver>>) -> Result<()> {
        self.ota_simple(OtaOperation::Activate, CMD_OTAACT, observer)
    }

    /// Mark the running image invalid so the other image boots next.
    pub fn ota_invalidate_image(&mut self, observer: Option<Box<dyn OtaObserver>>) -> Result<()> {
        self.ota_simple(OtaOperation::Invalidate, CMD_OTAINV, observer)
    }

    /// Configure the OTA client.
    pub fn ota_options_set(&mut self, options: &OtaOptions) -> Result<()> {
        self.ensure_open()?;
        self.send_request(
            Dispatcher::Ota,
            0,
            vec![DeviceCommand::config(
                CMD_OTAC,
                OTAC_TIMEOUT,
                ParamValue::Unsigned(options.timeout_ms.into()),
            )],
        )?;
        Ok(())
    }

    /// The operation in progress, if any.
    pub fn ota_operation(&self) -> Option<OtaOperation> {
        self.ctrl.ota.operation
    }

    fn ota_check_idle(&self) -> Result<()> {
        self.ensure_open()?;
        if self.ctrl.ota.operation.is_some() {
            return Err(DriverError::Busy);
        }
        Ok(())
    }

    fn ota_simple(
        &mut self,
        operation: OtaOperation,
        cmd_id: u16,
        observer: Option<Box<dyn OtaObserver>>,
    ) -> Result<()> {
        self.ota_check_idle()?;
        let request =
            self.send_request(Dispatcher::Ota, 0, vec![DeviceCommand::new(cmd_id, Vec::new())])?;
        debug!("Ota: {:?} requested", operation);
        self.ota_begin(operation, request, observer);
        Ok(())
    }

    fn ota_begin(
        &mut self,
        operation: OtaOperation,
        request: RequestHandle,
        observer: Option<Box<dyn OtaObserver>>,
    ) {
        self.ctrl.ota.operation = Some(operation);
        self.ctrl.ota.op_id = 0;
        self.ctrl.ota.start = Some(request);
        self.observers.ota = observer;
        if operation != OtaOperation::Verify {
            self.ctrl.devinfo.invalidate();
        }
    }

    /// End the current operation and report `status` once.
    fn ota_finish(&mut self, operation: OtaOperation, status: OtaStatus) {
        self.ctrl.ota.operation = None;
        self.ctrl.ota.start = None;
        debug!("Ota: {:?} finished: {:?}", operation, status);
        let op_id = self.ctrl.ota.op_id;
        if let Some(mut obs) = self.observers.ota.take() {
            obs.on_ota_status(operation, op_id, status);
        }
    }

    fn ota_refresh_device_info(&mut self) {
        if !self.is_open() {
            return;
        }
        if let Err(e) = self.devinfo_refresh() {
            warn!("Ota: device info refresh failed: {}", e);
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    pub(crate) fn ota_request_event(&mut self, event: &RequestEvent) {
        match &event.kind {
            RequestEventKind::CmdStatus { status, src, .. } => {
                let cmd_id = src.cmd_id;
                if !matches!(cmd_id, CMD_OTADL | CMD_OTAVFY | CMD_OTAACT | CMD_OTAINV) {
                    if !status.is_ok() {
                        warn!("Ota: command 0x{:04X} failed: {}", cmd_id, status);
                    }
                    return;
                }
                if self.ctrl.ota.start == Some(event.handle) {
                    self.ctrl.ota.start = None;
                }
                let Some(operation) = self.ctrl.ota.operation else {
                    return;
                };
                if status.is_ok() {
                    let op_id = self.ctrl.ota.op_id;
                    if let Some(obs) = self.observers.ota.as_mut() {
                        obs.on_ota_status(operation, op_id, OtaStatus::Started);
                    }
                    return;
                }
                warn!("Ota: {:?} not started: {}", operation, status);
                self.ota_finish(operation, OtaStatus::Failed);
                if cmd_id != CMD_OTAVFY {
                    self.ota_refresh_device_info();
                }
            }
            RequestEventKind::RspReceived { rsp_id, elems, .. }
                if matches!(*rsp_id, CMD_OTADL | CMD_OTAVFY | CMD_OTAACT | CMD_OTAINV) =>
            {
                if elems.len() != 1 {
                    warn!("Ota: malformed response to 0x{:04X}", rsp_id);
                    return;
                }
                match elems[0].as_unsigned() {
                    Ok(id) => self.ctrl.ota.op_id = u32::try_from(id).unwrap_or(u32::MAX),
                    Err(e) => warn!("Ota: malformed operation id: {}", e),
                }
            }
            RequestEventKind::StatusComplete { .. } if self.ctrl.ota.start == Some(event.handle) => {
                // The start command was never acknowledged.
                self.ctrl.ota.start = None;
                let Some(operation) = self.ctrl.ota.operation else {
                    return;
                };
                warn!("Ota: {:?} lost before the device answered", operation);
                self.ota_finish(operation, OtaStatus::Failed);
                if operation != OtaOperation::Verify {
                    self.ota_refresh_device_info();
                }
            }
            _ => {}
        }
    }

    /// `OTA` / `OTAERR`: `(op_id, status)`.
    pub(crate) fn ota_process_event(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        let Some(operation) = self.ctrl.ota.operation else {
            return Ok(());
        };
        check_elems(elems, 2)?;
        let op_id = elems[0].as_unsigned()?;
        let status = elems[1].as_status()?;
        if op_id != u64::from(self.ctrl.ota.op_id) {
            debug!("Ota: event for stale operation {}", op_id);
            return Ok(());
        }
        let Some(outcome) = OtaStatus::from_device(status) else {
            debug!("Ota: progress 0x{:04X}", status);
            return Ok(());
        };
        self.ota_finish(operation, outcome);
        self.ota_refresh_device_info();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(OtaStatus::from_device(OTA_STATUS_ERASE_DONE), None);
        assert_eq!(OtaStatus::from_device(OTA_STATUS_WRITE_DONE), None);
        assert_eq!(
            OtaStatus::from_device(OTA_STATUS_VERIFY_DONE),
            Some(OtaStatus::Complete)
        );
        assert_eq!(
            OtaStatus::from_device(OTA_STATUS_TIMEOUT),
            Some(OtaStatus::ConnectionError)
        );
        assert_eq!(
            OtaStatus::from_device(OTA_STATUS_TLS_ERROR),
            Some(OtaStatus::ServerError)
        );
        assert_eq!(
            OtaStatus::from_device(OTA_STATUS_IMAGE_TOO_LARGE),
            Some(OtaStatus::InsufficientStorage)
        );
        assert_eq!(OtaStatus::from_device(0x7777), Some(OtaStatus::Failed));
    }

    #[test]
    fn test_started_is_not_terminal() {
        assert!(!OtaStatus::Started.is_terminal());
        assert!(OtaStatus::Complete.is_terminal());
    }
}
