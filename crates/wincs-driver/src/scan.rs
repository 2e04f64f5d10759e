//! BSS scanning.
//!
//! A scan clears the result cache, then the device reports each network it
//! finds with `WSCNIND` and finishes with `WSCNDONE`. Results are read back
//! through a cursor, either one call at a time or by letting the scan
//! observer ask for the next result.

use tracing::{debug, warn};
use wincs_protocol::{
    MacAddr, ParamValue, ProtocolError, CMD_WSCN, CMD_WSCNC, SCAN_PROBES_MAX, SCAN_PROBES_MIN,
    SCAN_SLOT_TIME_MAX, SCAN_SLOT_TIME_MIN, WSCNC_ACT_SLOT_TIME, WSCNC_CHANMASK24, WSCNC_CHANNEL,
    WSCNC_FILT_LIST, WSCNC_NUM_SLOTS, WSCNC_PASV_SLOT_TIME, WSCNC_PROBES_PER_SLOT,
    WSCNC_RSSI_THRESH, WSCN_ACTIVE, WSCN_PASSIVE,
};

use crate::assoc::clamp_rssi;
use crate::context::{AuthType, Channel, ChannelMask, Ssid};
use crate::driver::{check_elems, Driver};
use crate::error::{DriverError, Result};
use crate::event::{RequestEvent, RequestEventKind};
use crate::observer::ScanObserver;
use crate::request::{DeviceCommand, Dispatcher, RequestHandle};
use crate::transport::Transport;

/// One discovered network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BssInfo {
    pub ssid: Ssid,
    pub bssid: MacAddr,
    pub channel: u8,
    pub rssi: i8,
    /// Auth type recommended for the advertised security.
    pub auth_type: AuthType,
}

/// Probe or listen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    #[default]
    Active,
    Passive,
}

/// Which results a scan keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Keep every result, up to the cache size.
    #[default]
    All,
    /// Keep only the first result.
    StopOnFirst,
}

/// Scan timing. Zero means "device default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanParameters {
    pub num_slots: u8,
    pub active_slot_time_ms: u16,
    pub passive_slot_time_ms: u16,
    pub probes_per_slot: u8,
}

#[derive(Debug, Clone)]
pub(crate) struct ScanState {
    pub(crate) in_progress: bool,
    /// Scan request whose start command is not yet acknowledged.
    pub(crate) start: Option<RequestHandle>,
    /// Index of the current result; `None` is "before the first".
    pub(crate) cursor: Option<usize>,
    pub(crate) cache: Vec<BssInfo>,
    pub(crate) capacity: usize,
    pub(crate) match_mode: MatchMode,
    pub(crate) rssi_threshold: i8,
    pub(crate) channel_mask: ChannelMask,
    pub(crate) params: ScanParameters,
}

impl ScanState {
    pub(crate) fn new(capacity: usize, channel_mask: ChannelMask) -> Self {
        ScanState {
            in_progress: false,
            start: None,
            cursor: None,
            cache: Vec::with_capacity(capacity),
            capacity,
            match_mode: MatchMode::All,
            rssi_threshold: 0,
            channel_mask,
            params: ScanParameters::default(),
        }
    }
}

impl<T: Transport> Driver<T> {
    /// Start a scan.
    ///
    /// `ssid_filters` restricts an active scan to the listed networks.
    /// When the scan completes, `observer` (if any) is walked through the
    /// results.
    pub fn scan_first(
        &mut self,
        channel: Channel,
        mode: ScanMode,
        ssid_filters: &[Ssid],
        observer: Option<Box<dyn ScanObserver>>,
    ) -> Result<()> {
        self.ensure_open()?;
        if !channel.is_valid() || !self.config.regulatory_channel_mask.allows(channel) {
            return Err(DriverError::InvalidArg);
        }
        if mode == ScanMode::Passive && !ssid_filters.is_empty() {
            return Err(DriverError::InvalidArg);
        }
        if self.ctrl.scan.in_progress {
            return Err(DriverError::ScanInProgress);
        }

        self.ctrl.scan.cache.clear();
        self.ctrl.scan.cursor = None;

        let scan = &self.ctrl.scan;
        let mut cmds = vec![
            DeviceCommand::config(CMD_WSCNC, WSCNC_CHANMASK24, i64::from(scan.channel_mask.0)),
            DeviceCommand::config(CMD_WSCNC, WSCNC_CHANNEL, i64::from(channel.to_device())),
            DeviceCommand::config(CMD_WSCNC, WSCNC_RSSI_THRESH, i64::from(scan.rssi_threshold)),
            DeviceCommand::config(CMD_WSCNC, WSCNC_FILT_LIST, ParamValue::string("")),
        ];
        cmds.extend(ssid_filters.iter().map(|ssid| {
            DeviceCommand::config(CMD_WSCNC, WSCNC_FILT_LIST, ParamValue::string(ssid.as_bytes()))
        }));
        let act_pasv = match mode {
            ScanMode::Active => WSCN_ACTIVE,
            ScanMode::Passive => WSCN_PASSIVE,
        };
        cmds.push(DeviceCommand::new(CMD_WSCN, vec![ParamValue::Integer(act_pasv)]));

        let request = self.send_request(Dispatcher::Scan, 0, cmds)?;

        debug!("Scan: started on {:?} ({:?})", channel, mode);
        self.ctrl.scan.in_progress = true;
        self.ctrl.scan.start = Some(request);
        self.observers.scan = observer;
        Ok(())
    }

    /// Move to the next result.
    ///
    /// With an observer, results are handed over for as long as the observer
    /// returns `true`.
    pub fn scan_next(&mut self, observer: Option<Box<dyn ScanObserver>>) -> Result<()> {
        self.ensure_open()?;
        if self.ctrl.scan.in_progress {
            return Err(DriverError::ScanInProgress);
        }
        let next = self.ctrl.scan.cursor.map_or(0, |c| c + 1);
        if next >= self.ctrl.scan.cache.len() {
            return Err(DriverError::BssFindEnd);
        }
        self.ctrl.scan.cursor = Some(next);
        self.observers.scan = observer;
        self.scan_walk();
        Ok(())
    }

    /// Rewind to the first result and behave like [`scan_next`](Self::scan_next).
    pub fn scan_reset(&mut self, observer: Option<Box<dyn ScanObserver>>) -> Result<()> {
        self.ensure_open()?;
        if self.ctrl.scan.in_progress {
            return Err(DriverError::ScanInProgress);
        }
        self.ctrl.scan.cursor = None;
        self.scan_next(observer)
    }

    /// The result under the cursor.
    pub fn scan_get_info(&self) -> Result<&BssInfo> {
        self.ensure_open()?;
        self.ctrl
            .scan
            .cursor
            .and_then(|c| self.ctrl.scan.cache.get(c))
            .ok_or(DriverError::NoBssInfo)
    }

    /// Number of cached results.
    pub fn scan_result_count(&self) -> usize {
        if self.is_open() {
            self.ctrl.scan.cache.len()
        } else {
            0
        }
    }

    pub fn scan_in_progress(&self) -> bool {
        self.is_open() && self.ctrl.scan.in_progress
    }

    /// Configure scan timing. Zero fields keep their current value.
    pub fn scan_set_parameters(&mut self, params: ScanParameters) -> Result<()> {
        self.ensure_open()?;
        let slot_time_ok = |t: u16| t == 0 || (SCAN_SLOT_TIME_MIN..=SCAN_SLOT_TIME_MAX).contains(&t);
        if !slot_time_ok(params.active_slot_time_ms)
            || !slot_time_ok(params.passive_slot_time_ms)
            || !(params.probes_per_slot == 0
                || (SCAN_PROBES_MIN..=SCAN_PROBES_MAX).contains(&params.probes_per_slot))
        {
            return Err(DriverError::InvalidArg);
        }

        let current = &mut self.ctrl.scan.params;
        if params.active_slot_time_ms != 0 {
            current.active_slot_time_ms = params.active_slot_time_ms;
        }
        if params.passive_slot_time_ms != 0 {
            current.passive_slot_time_ms = params.passive_slot_time_ms;
        }
        if params.num_slots != 0 {
            current.num_slots = params.num_slots;
        }
        if params.probes_per_slot != 0 {
            current.probes_per_slot = params.probes_per_slot;
        }
        let current = *current;

        let fields = [
            (WSCNC_ACT_SLOT_TIME, i64::from(current.active_slot_time_ms)),
            (WSCNC_PASV_SLOT_TIME, i64::from(current.passive_slot_time_ms)),
            (WSCNC_NUM_SLOTS, i64::from(current.num_slots)),
            (WSCNC_PROBES_PER_SLOT, i64::from(current.probes_per_slot)),
        ];
        let cmds: Vec<DeviceCommand> = fields
            .into_iter()
            .filter(|(_, value)| *value != 0)
            .map(|(id, value)| DeviceCommand::config(CMD_WSCNC, id, value))
            .collect();
        if cmds.is_empty() {
            return Ok(());
        }
        self.send_request(Dispatcher::Scan, 0, cmds)?;
        Ok(())
    }

    /// Current scan timing as last set or reported by the device.
    pub fn scan_parameters(&self) -> ScanParameters {
        self.ctrl.scan.params
    }

    /// RSSI threshold applied to subsequent scans.
    pub fn scan_set_rssi_threshold(&mut self, rssi: i8) -> Result<()> {
        self.ensure_open()?;
        self.ctrl.scan.rssi_threshold = rssi;
        Ok(())
    }

    /// Channels covered by an any-channel scan. Must be within the
    /// regulatory mask.
    pub fn scan_set_channel_mask(&mut self, mask: ChannelMask) -> Result<()> {
        self.ensure_open()?;
        if !mask.is_subset_of(self.config.regulatory_channel_mask) {
            return Err(DriverError::InvalidArg);
        }
        self.ctrl.scan.channel_mask = mask;
        Ok(())
    }

    pub fn scan_channel_mask(&self) -> Result<ChannelMask> {
        self.ensure_open()?;
        Ok(self.ctrl.scan.channel_mask)
    }

    pub fn scan_set_match_mode(&mut self, mode: MatchMode) -> Result<()> {
        self.ensure_open()?;
        self.ctrl.scan.match_mode = mode;
        Ok(())
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Hand results to the scan observer while it asks for more.
    fn scan_walk(&mut self) {
        let count = self.ctrl.scan.cache.len();
        loop {
            let Some(index) = self.ctrl.scan.cursor else {
                return;
            };
            let Some(info) = self.ctrl.scan.cache.get(index) else {
                return;
            };
            let Some(obs) = self.observers.scan.as_mut() else {
                return;
            };
            if !obs.on_scan_result(index + 1, count, Some(info)) {
                self.observers.scan = None;
                return;
            }
            if index + 1 >= count {
                self.observers.scan = None;
                return;
            }
            self.ctrl.scan.cursor = Some(index + 1);
        }
    }

    pub(crate) fn scan_request_event(&mut self, event: &RequestEvent) {
        match &event.kind {
            RequestEventKind::RspReceived { rsp_id, elems, .. } if *rsp_id == CMD_WSCNC => {
                if let Err(e) = self.scan_process_config_rsp(elems) {
                    warn!("Scan: malformed WSCNC response: {}", e);
                }
            }
            RequestEventKind::CmdStatus { status, src, .. } => {
                let is_start = src.cmd_id == CMD_WSCN && self.ctrl.scan.start == Some(event.handle);
                if is_start {
                    self.ctrl.scan.start = None;
                }
                if status.is_ok() {
                    return;
                }
                warn!("Scan: command 0x{:04X} failed: {}", src.cmd_id, status);
                if is_start {
                    self.scan_abort();
                }
            }
            RequestEventKind::StatusComplete { .. } if self.ctrl.scan.start == Some(event.handle) => {
                warn!("Scan: request lost before the device answered");
                self.ctrl.scan.start = None;
                self.scan_abort();
            }
            _ => {}
        }
    }

    /// End a scan the device never started. The observer hears about it once.
    fn scan_abort(&mut self) {
        self.ctrl.scan.in_progress = false;
        if let Some(mut obs) = self.observers.scan.take() {
            obs.on_scan_result(0, 0, None);
        }
    }

    fn scan_process_config_rsp(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 2)?;
        let id = elems[0].as_int()?;
        let value = elems[1].as_int()?;
        let params = &mut self.ctrl.scan.params;
        match i32::try_from(id).unwrap_or(-1) {
            WSCNC_ACT_SLOT_TIME => params.active_slot_time_ms = u16::try_from(value).unwrap_or(0),
            WSCNC_PASV_SLOT_TIME => params.passive_slot_time_ms = u16::try_from(value).unwrap_or(0),
            WSCNC_NUM_SLOTS => params.num_slots = u8::try_from(value).unwrap_or(0),
            WSCNC_PROBES_PER_SLOT => params.probes_per_slot = u8::try_from(value).unwrap_or(0),
            _ => {}
        }
        Ok(())
    }

    /// `WSCNIND`: `(rssi, sec_type, channel, bssid, ssid)`.
    pub(crate) fn scan_result_indication(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 5)?;
        let scan = &mut self.ctrl.scan;
        if !scan.in_progress {
            debug!("Scan: result outside a scan dropped");
            return Ok(());
        }
        if scan.cache.len() >= scan.capacity {
            return Ok(());
        }
        if scan.match_mode == MatchMode::StopOnFirst && !scan.cache.is_empty() {
            return Ok(());
        }
        let sec_type = elems[1].as_int()?;
        let Some(auth_type) = u8::try_from(sec_type).ok().and_then(AuthType::recommended_for) else {
            debug!("Scan: dropping result with security type {}", sec_type);
            return Ok(());
        };
        let info = BssInfo {
            rssi: clamp_rssi(elems[0].as_int()?),
            channel: u8::try_from(elems[2].as_int()?).unwrap_or(0),
            bssid: elems[3].as_mac()?,
            ssid: Ssid::from_device(elems[4].as_bytes()?),
            auth_type,
        };
        scan.cache.push(info);
        Ok(())
    }

    /// `WSCNDONE`: `(num_results)`.
    pub(crate) fn scan_done(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 1)?;
        if !self.ctrl.scan.in_progress {
            return Ok(());
        }
        self.ctrl.scan.in_progress = false;
        self.ctrl.scan.start = None;
        debug!(
            "Scan: complete, {} reported, {} cached",
            elems[0].as_int().unwrap_or(0),
            self.ctrl.scan.cache.len()
        );
        if self.observers.scan.is_none() {
            return Ok(());
        }
        if self.ctrl.scan.cache.is_empty() {
            if let Some(mut obs) = self.observers.scan.take() {
                obs.on_scan_result(0, 0, None);
            }
            return Ok(());
        }
        self.ctrl.scan.cursor = Some(0);
        self.scan_walk();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_state_defaults() {
        let state = ScanState::new(50, ChannelMask::ALL_2_4GHZ);
        assert!(!state.in_progress);
        assert_eq!(state.cursor, None);
        assert_eq!(state.capacity, 50);
        assert_eq!(state.match_mode, MatchMode::All);
        assert_eq!(state.params, ScanParameters::default());
    }
}
