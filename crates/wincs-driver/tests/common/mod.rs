//! Scripted fake coprocessor shared by the integration tests.
//!
//! The fake sits on the device end of a [`ChannelTransport`] pair. Tests
//! read the commands the driver sent, then script the device's status,
//! responses and unsolicited events by hand.

#![allow(dead_code)]

use wincs_driver::protocol::{
    CommandFrame, DeviceMessage, DeviceStatus, FrameCodec, LinkSide, ParamValue,
};
use wincs_driver::{ChannelTransport, Driver, DriverConfig, Transport};

/// Install a test-writer subscriber once. `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct FakeDevice {
    link: ChannelTransport,
    rx: FrameCodec,
    tx: FrameCodec,
}

/// An open driver with default configuration and its fake device.
pub fn setup() -> (Driver<ChannelTransport>, FakeDevice) {
    setup_with(DriverConfig::default())
}

pub fn setup_with(config: DriverConfig) -> (Driver<ChannelTransport>, FakeDevice) {
    init_tracing();
    let (host, device) = ChannelTransport::new_pair();
    let mut driver = Driver::new(config, host).expect("valid config");
    driver.open().expect("open");
    (driver, FakeDevice::new(device))
}

impl FakeDevice {
    pub fn new(link: ChannelTransport) -> Self {
        FakeDevice {
            link,
            rx: FrameCodec::with_side(LinkSide::Device),
            tx: FrameCodec::with_side(LinkSide::Device),
        }
    }

    /// Every command the driver has sent since the last call.
    pub fn commands(&mut self) -> Vec<CommandFrame> {
        while let Some(chunk) = self.link.try_recv() {
            self.rx.push(&chunk);
        }
        let mut out = Vec::new();
        while let Some(cmd) = self.rx.next_command().expect("well-formed command") {
            out.push(cmd);
        }
        out
    }

    pub fn send(&mut self, msg: DeviceMessage) {
        let frame = self.tx.encode_frame(&msg.encode()).expect("encodable");
        self.link.send(&frame).expect("host end open");
    }

    pub fn status(&mut self, cmd: &CommandFrame, status: DeviceStatus) {
        self.send(DeviceMessage::Status {
            seq: cmd.seq,
            cmd_id: cmd.cmd_id,
            status,
        });
    }

    pub fn respond(&mut self, cmd: &CommandFrame, elems: Vec<ParamValue>) {
        self.send(DeviceMessage::Response {
            seq: cmd.seq,
            rsp_id: cmd.cmd_id,
            elems,
        });
    }

    pub fn event(&mut self, aec_id: u16, elems: Vec<ParamValue>) {
        self.send(DeviceMessage::Event { aec_id, elems });
    }

    /// Acknowledge every pending command with `Ok` and return them.
    pub fn ack_all(&mut self) -> Vec<CommandFrame> {
        let cmds = self.commands();
        for cmd in &cmds {
            self.status(cmd, DeviceStatus::Ok);
        }
        cmds
    }
}

/// Value of a `CMD(param_id, value)` config command, if `cmd` is one.
pub fn config_value(cmd: &CommandFrame, cmd_id: u16, param_id: i32) -> Option<&ParamValue> {
    match cmd.params.as_slice() {
        [ParamValue::Integer(id), value] if cmd.cmd_id == cmd_id && *id == i64::from(param_id) => {
            Some(value)
        }
        _ => None,
    }
}

/// Find the value of a config command within a batch.
pub fn find_config<'a>(cmds: &'a [CommandFrame], cmd_id: u16, param_id: i32) -> Option<&'a ParamValue> {
    cmds.iter().find_map(|c| config_value(c, cmd_id, param_id))
}
