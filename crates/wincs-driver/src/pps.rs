//! Power save.
//!
//! Combines the Wi-Fi radio power save mode with the device's own sleep
//! modes. Extreme deep sleep (XDS) can only be left by resetting the device,
//! so once requested it stays latched until the driver is reopened.

use tracing::{debug, warn};
use wincs_protocol::{
    DeviceStatus, ParamValue, ProtocolError, CMD_PPS, CMD_PPSC, CMD_WIFIC, PPSC_AUTO_SLEEP_TIMEOUT,
    PPSC_SEC_OSC, PPSC_SLEEP_DURATION, PPS_EVENT_TIMEOUT, WIFIC_POWERSAVE, WIFI_PS_RUN,
    WIFI_PS_WSM,
};

use crate::driver::{check_elems, Driver};
use crate::error::{DriverError, Result};
use crate::event::{RequestEvent, RequestEventKind};
use crate::observer::PowerSaveObserver;
use crate::request::{DeviceCommand, Dispatcher};
use crate::transport::Transport;

/// Power save modes, in increasing depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerSaveMode {
    /// Always on.
    Run,
    /// Wi-Fi sleep between beacons only.
    Wsm,
    /// Wi-Fi sleep plus device sleep between activity.
    Pps,
    /// Extreme deep sleep.
    Xds,
}

impl PowerSaveMode {
    /// Value of the `PPS` command enabling this mode.
    fn pps_value(self) -> i64 {
        match self {
            PowerSaveMode::Run | PowerSaveMode::Wsm => 0,
            PowerSaveMode::Pps => 1,
            PowerSaveMode::Xds => 2,
        }
    }
}

/// Where the device's power save stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerSaveState {
    #[default]
    Disabled,
    Enabled,
    /// Latched until the device is reset.
    XdsEnabled,
}

/// Power save notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerSaveEvent {
    /// The device refused the power save change.
    Error(DeviceStatus),
    /// The sleep period timed out.
    Timeout,
}

/// Device sleep options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerSaveOptions {
    /// Run the secondary oscillator while asleep.
    pub sec_osc_enabled: bool,
    /// Idle time before sleeping, in milliseconds.
    pub auto_sleep_timeout_ms: u32,
    /// Sleep duration, in milliseconds.
    pub sleep_duration_ms: u32,
}

impl Default for PowerSaveOptions {
    fn default() -> Self {
        PowerSaveOptions {
            sec_osc_enabled: false,
            auto_sleep_timeout_ms: 100,
            sleep_duration_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PpsState {
    pub(crate) state: PowerSaveState,
}

impl<T: Transport> Driver<T> {
    /// Configure device sleep.
    pub fn pps_options_set(&mut self, options: &PowerSaveOptions) -> Result<()> {
        self.ensure_open()?;
        self.send_request(
            Dispatcher::PowerSave,
            0,
            vec![
                DeviceCommand::config(CMD_PPSC, PPSC_SEC_OSC, ParamValue::Integer(options.sec_osc_enabled.into())),
                DeviceCommand::config(
                    CMD_PPSC,
                    PPSC_AUTO_SLEEP_TIMEOUT,
                    ParamValue::Integer(options.auto_sleep_timeout_ms.into()),
                ),
                DeviceCommand::config(
                    CMD_PPSC,
                    PPSC_SLEEP_DURATION,
                    ParamValue::Integer(options.sleep_duration_ms.into()),
                ),
            ],
        )?;
        Ok(())
    }

    /// Enter or leave a power save mode.
    ///
    /// Errors and sleep timeouts are reported to `observer`. Requesting XDS
    /// while it is already latched does nothing.
    pub fn pps_enable_set(
        &mut self,
        mode: PowerSaveMode,
        enabled: bool,
        observer: Option<Box<dyn PowerSaveObserver>>,
    ) -> Result<()> {
        self.ensure_open()?;
        if enabled && mode == PowerSaveMode::Run {
            return Err(DriverError::InvalidArg);
        }
        if enabled && mode == PowerSaveMode::Xds && self.ctrl.pps.state == PowerSaveState::XdsEnabled {
            return Ok(());
        }
        let (wifi_mode, pps_value) = if enabled {
            (WIFI_PS_WSM, mode.pps_value())
        } else {
            (WIFI_PS_RUN, 0)
        };
        self.send_request(
            Dispatcher::PowerSave,
            0,
            vec![
                DeviceCommand::config(CMD_WIFIC, WIFIC_POWERSAVE, ParamValue::Integer(wifi_mode)),
                DeviceCommand::new(CMD_PPS, vec![ParamValue::Integer(pps_value)]),
            ],
        )?;
        self.observers.power_save = observer;
        let state = match (enabled, mode) {
            (false, _) | (true, PowerSaveMode::Run | PowerSaveMode::Wsm) => PowerSaveState::Disabled,
            (true, PowerSaveMode::Pps) => PowerSaveState::Enabled,
            (true, PowerSaveMode::Xds) => PowerSaveState::XdsEnabled,
        };
        debug!("Pps: {:?} enabled={} -> {:?}", mode, enabled, state);
        self.ctrl.pps.state = state;
        Ok(())
    }

    pub fn pps_state(&self) -> PowerSaveState {
        self.ctrl.pps.state
    }

    pub(crate) fn pps_request_event(&mut self, event: &RequestEvent) {
        let RequestEventKind::CmdStatus { status, src, .. } = &event.kind else {
            return;
        };
        if status.is_ok() {
            return;
        }
        warn!("Pps: command 0x{:04X} failed: {}", src.cmd_id, status);
        if src.cmd_id == CMD_PPS {
            if let Some(obs) = self.observers.power_save.as_mut() {
                obs.on_power_save_event(PowerSaveEvent::Error(*status));
            }
        }
    }

    /// `PPS`: `(event)`.
    pub(crate) fn pps_process_event(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 1)?;
        let event = elems[0].as_int()?;
        if event != PPS_EVENT_TIMEOUT {
            debug!("Pps: event {} not handled", event);
            return Ok(());
        }
        if let Some(obs) = self.observers.power_save.as_mut() {
            obs.on_power_save_event(PowerSaveEvent::Timeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pps_command_values() {
        assert_eq!(PowerSaveMode::Wsm.pps_value(), 0);
        assert_eq!(PowerSaveMode::Pps.pps_value(), 1);
        assert_eq!(PowerSaveMode::Xds.pps_value(), 2);
    }
}
