//! Device information.
//!
//! A cached copy of the device id, the firmware images held in flash and the
//! version of the running firmware. The cache is dropped when an OTA
//! operation starts and read back once it ends. A registered
//! [`DeviceInfoObserver`] hears about every refresh as it completes.

use tracing::{debug, warn};
use wincs_protocol::{
    ParamValue, CFG_BUILD_HASH, CFG_BUILD_TIME, CFG_VERSION, CMD_CFG, CMD_DI, DI_ID,
    DI_IMAGE_SEQ_NUM, DI_IMAGE_SRC_ADDR, DI_IMAGE_STATE, DI_IMAGE_VERSION, DI_NUM_IMAGES,
};

use crate::driver::Driver;
use crate::error::Result;
use crate::event::{RequestEvent, RequestEventKind};
use crate::observer::DeviceInfoObserver;
use crate::request::{DeviceCommand, Dispatcher};
use crate::transport::Transport;

/// Most firmware images reported.
const MAX_IMAGES: usize = 2;

/// One firmware image slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageInfo {
    pub seq_num: u32,
    pub version: u32,
    /// Flash address of the image.
    pub src_addr: u32,
    /// Raw image state.
    pub state: u8,
}

/// Version and build of the running firmware.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FirmwareVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub build_hash: Vec<u8>,
    /// Build time, seconds since the Unix epoch.
    pub build_time_utc: u32,
}

impl FirmwareVersion {
    /// Parse `major.minor.patch`.
    fn parse_version(&mut self, text: &str) -> Option<()> {
        let mut parts = text.trim().split('.').map(|p| p.parse::<u16>().ok());
        let (major, minor, patch) = (parts.next()??, parts.next()??, parts.next()??);
        if parts.next().is_some() {
            return None;
        }
        self.major = major;
        self.minor = minor;
        self.patch = patch;
        Some(())
    }
}

/// Device identity, flash image table and firmware version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub id: u32,
    pub num_images: u8,
    pub images: [ImageInfo; MAX_IMAGES],
    /// `None` when the device did not report a version.
    pub firmware: Option<FirmwareVersion>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct DevInfoState {
    pub(crate) info: DeviceInfo,
    valid: bool,
    refreshing: bool,
}

impl DevInfoState {
    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    fn apply(&mut self, id: (i32, i32), value: &ParamValue) -> Option<()> {
        let (param, index) = id;
        let value = u32::try_from(value.as_unsigned().ok()?).ok()?;
        match param {
            DI_ID => self.info.id = value,
            DI_NUM_IMAGES => self.info.num_images = u8::try_from(value).ok()?,
            _ => {
                let image = self.info.images.get_mut(usize::try_from(index).ok()?)?;
                match param {
                    DI_IMAGE_SEQ_NUM => image.seq_num = value,
                    DI_IMAGE_VERSION => image.version = value,
                    DI_IMAGE_SRC_ADDR => image.src_addr = value,
                    DI_IMAGE_STATE => image.state = u8::try_from(value).ok()?,
                    _ => return None,
                }
            }
        }
        Some(())
    }

    fn apply_firmware(&mut self, param: i64, value: &ParamValue) -> Option<()> {
        let firmware = self.info.firmware.get_or_insert_with(FirmwareVersion::default);
        match i32::try_from(param).ok()? {
            CFG_VERSION => firmware.parse_version(value.as_str().ok()?),
            CFG_BUILD_HASH => {
                firmware.build_hash = value.as_bytes().ok()?.to_vec();
                Some(())
            }
            CFG_BUILD_TIME => {
                firmware.build_time_utc = u32::try_from(value.as_unsigned().ok()?).ok()?;
                Some(())
            }
            _ => None,
        }
    }

    fn current(&self) -> Option<&DeviceInfo> {
        self.valid.then_some(&self.info)
    }
}

impl<T: Transport> Driver<T> {
    /// Cached device information, `None` until a refresh completes.
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.ctrl.devinfo.current()
    }

    /// Version of the running firmware, from the cached device information.
    pub fn device_firmware_version(&self) -> Option<&FirmwareVersion> {
        self.device_info().and_then(|info| info.firmware.as_ref())
    }

    /// Observer told about every completed refresh, including the ones an
    /// OTA operation starts.
    pub fn set_device_info_observer(&mut self, observer: Option<Box<dyn DeviceInfoObserver>>) {
        self.observers.devinfo = observer;
    }

    /// Read the device information back from the device.
    pub fn devinfo_refresh(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.ctrl.devinfo.refreshing {
            return Ok(());
        }
        self.send_request(
            Dispatcher::DeviceInfo,
            0,
            vec![
                DeviceCommand::new(CMD_DI, Vec::new()),
                DeviceCommand::new(CMD_CFG, Vec::new()),
            ],
        )?;
        self.ctrl.devinfo.invalidate();
        self.ctrl.devinfo.info = DeviceInfo::default();
        self.ctrl.devinfo.refreshing = true;
        Ok(())
    }

    /// `DI` responses: `(id, value)`, with the image index as the id's
    /// fractional part. `CFG` responses: `(param, value)`.
    pub(crate) fn devinfo_request_event(&mut self, event: &RequestEvent) {
        match &event.kind {
            RequestEventKind::RspReceived { rsp_id, elems, .. } => {
                let [id, value] = elems.as_slice() else {
                    warn!("Devinfo: response with {} elements", elems.len());
                    return;
                };
                let applied = match *rsp_id {
                    CMD_DI => id
                        .as_frac()
                        .ok()
                        .and_then(|id| self.ctrl.devinfo.apply(id, value)),
                    CMD_CFG => id
                        .as_int()
                        .ok()
                        .and_then(|param| self.ctrl.devinfo.apply_firmware(param, value)),
                    _ => None,
                };
                if applied.is_none() {
                    debug!("Devinfo: ignored 0x{:04X} {:?} = {:?}", rsp_id, id, value);
                }
            }
            RequestEventKind::CmdStatus { status, src, .. } if !status.is_ok() => {
                warn!("Devinfo: query 0x{:04X} failed: {}", src.cmd_id, status);
            }
            RequestEventKind::StatusComplete { num_errors, .. } => {
                let state = &mut self.ctrl.devinfo;
                state.refreshing = false;
                state.valid = *num_errors == 0;
                debug!("Devinfo: refreshed (valid={})", state.valid);
                if let Some(obs) = self.observers.devinfo.as_mut() {
                    obs.on_device_info(self.ctrl.devinfo.current());
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_fields() {
        let mut state = DevInfoState::default();
        assert!(state.apply((DI_ID, -1), &ParamValue::Unsigned(0x1234)).is_some());
        assert!(state.apply((DI_NUM_IMAGES, -1), &ParamValue::Integer(2)).is_some());
        assert!(state
            .apply((DI_IMAGE_VERSION, 1), &ParamValue::Unsigned(0x0102_0300))
            .is_some());
        assert_eq!(state.info.id, 0x1234);
        assert_eq!(state.info.num_images, 2);
        assert_eq!(state.info.images[1].version, 0x0102_0300);
    }

    #[test]
    fn test_apply_rejects_bad_image_index() {
        let mut state = DevInfoState::default();
        assert!(state.apply((DI_IMAGE_STATE, 5), &ParamValue::Integer(1)).is_none());
        assert!(state.apply((DI_IMAGE_STATE, -1), &ParamValue::Integer(1)).is_none());
        assert!(state.apply((99, 0), &ParamValue::Integer(1)).is_none());
    }

    #[test]
    fn test_apply_firmware_fields() {
        let mut state = DevInfoState::default();
        let version = ParamValue::string("3.1.2");
        assert!(state.apply_firmware(CFG_VERSION.into(), &version).is_some());
        let hash = ParamValue::bytes([0xDE, 0xAD, 0xBE, 0xEF, 0x01]);
        assert!(state.apply_firmware(CFG_BUILD_HASH.into(), &hash).is_some());
        let time = ParamValue::Unsigned(1_700_000_000);
        assert!(state.apply_firmware(CFG_BUILD_TIME.into(), &time).is_some());

        let firmware = state.info.firmware.unwrap();
        assert_eq!((firmware.major, firmware.minor, firmware.patch), (3, 1, 2));
        assert_eq!(firmware.build_hash, vec![0xDE, 0xAD, 0xBE, 0xEF, 0x01]);
        assert_eq!(firmware.build_time_utc, 1_700_000_000);
    }

    #[test]
    fn test_malformed_version_is_ignored() {
        let mut firmware = FirmwareVersion::default();
        assert!(firmware.parse_version("3.1").is_none());
        assert!(firmware.parse_version("3.1.2.4").is_none());
        assert!(firmware.parse_version("v3.1.2").is_none());
        assert_eq!(firmware, FirmwareVersion::default());
    }
}
