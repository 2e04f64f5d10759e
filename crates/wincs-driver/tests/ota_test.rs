//! Firmware update flows against the fake device.

mod common;

use common::{find_config, setup, FakeDevice};
use wincs_driver::protocol::{
    DeviceStatus, ParamValue, AEC_OTA, AEC_OTAERR, CMD_DI, CMD_OTAACT, CMD_OTADL, CMD_OTAC,
    CMD_OTAINV, CMD_OTAVFY, OTAC_FILE, OTAC_HOST, OTAC_PATH, OTAC_PORT, OTAC_TLS_CONF,
    OTA_STATUS_ACTIVATE_DONE, OTA_STATUS_IMAGE_TOO_LARGE, OTA_STATUS_INVALIDATE_DONE,
    OTA_STATUS_PROTOCOL_ERROR, OTA_STATUS_TIMEOUT, OTA_STATUS_TLS_ERROR, OTA_STATUS_VERIFY_DONE,
    OTA_STATUS_WRITE_DONE,
};
use wincs_driver::{
    event_channel, ChannelTransport, Driver, DriverError, DriverEvent, OtaOperation, OtaStatus,
};

fn ota_statuses(rx: &crossbeam_channel::Receiver<DriverEvent>) -> Vec<(OtaOperation, u32, OtaStatus)> {
    rx.try_iter()
        .filter_map(|e| match e {
            DriverEvent::Ota {
                operation,
                op_id,
                status,
            } => Some((operation, op_id, status)),
            _ => None,
        })
        .collect()
}

/// Ack a started operation, answering the start command with `op_id`.
fn accept(device: &mut FakeDevice, start_cmd: u16, op_id: u64) -> Vec<wincs_driver::protocol::CommandFrame> {
    let cmds = device.commands();
    for cmd in &cmds {
        if cmd.cmd_id == start_cmd {
            device.respond(cmd, vec![ParamValue::Unsigned(op_id)]);
        }
        device.status(cmd, DeviceStatus::Ok);
    }
    cmds
}

fn ota_event(device: &mut FakeDevice, aec: u16, op_id: u64, status: u16) {
    device.event(aec, vec![ParamValue::Unsigned(op_id), ParamValue::Status(status)]);
}

fn started_download(driver: &mut Driver<ChannelTransport>, device: &mut FakeDevice) -> crossbeam_channel::Receiver<DriverEvent> {
    let (sink, events) = event_channel();
    driver
        .ota_update_from_url("http://10.0.0.2/images/fw.bin", None, Some(Box::new(sink)))
        .unwrap();
    accept(device, CMD_OTADL, 3);
    driver.poll().unwrap();
    events
}

#[test]
fn test_download_over_https() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    let tls = driver.tls_open().unwrap();

    driver
        .ota_update_from_url("https://example.com:443/fw/app.bin", Some(tls), Some(Box::new(sink)))
        .unwrap();
    assert_eq!(driver.ota_operation(), Some(OtaOperation::DownloadVerify));

    let cmds = accept(&mut device, CMD_OTADL, 3);
    assert_eq!(find_config(&cmds, CMD_OTAC, OTAC_HOST), Some(&ParamValue::string("example.com")));
    assert_eq!(find_config(&cmds, CMD_OTAC, OTAC_PORT), Some(&ParamValue::Unsigned(443)));
    assert_eq!(find_config(&cmds, CMD_OTAC, OTAC_PATH), Some(&ParamValue::string("/fw/")));
    assert_eq!(find_config(&cmds, CMD_OTAC, OTAC_FILE), Some(&ParamValue::string("app.bin")));
    assert_eq!(
        find_config(&cmds, CMD_OTAC, OTAC_TLS_CONF),
        Some(&ParamValue::Integer(i64::from(tls.value())))
    );

    ota_event(&mut device, AEC_OTA, 3, OTA_STATUS_WRITE_DONE);
    ota_event(&mut device, AEC_OTA, 3, OTA_STATUS_VERIFY_DONE);
    driver.poll().unwrap();

    assert_eq!(
        ota_statuses(&events),
        vec![
            (OtaOperation::DownloadVerify, 3, OtaStatus::Started),
            (OtaOperation::DownloadVerify, 3, OtaStatus::Complete),
        ]
    );
    assert_eq!(driver.ota_operation(), None);

    // Completion refreshes the cached device information.
    assert!(device.commands().iter().any(|c| c.cmd_id == CMD_DI));
}

#[test]
fn test_one_operation_at_a_time() {
    let (mut driver, mut device) = setup();
    let events = started_download(&mut driver, &mut device);

    assert_eq!(driver.ota_activate_image(None), Err(DriverError::Busy));
    assert_eq!(
        driver.ota_update_from_url("http://10.0.0.2/fw.bin", None, None),
        Err(DriverError::Busy)
    );

    ota_event(&mut device, AEC_OTAERR, 3, OTA_STATUS_TIMEOUT);
    driver.poll().unwrap();
    // A late event for the finished operation is ignored.
    ota_event(&mut device, AEC_OTA, 3, OTA_STATUS_VERIFY_DONE);
    driver.poll().unwrap();

    let terminal: Vec<_> = ota_statuses(&events)
        .into_iter()
        .filter(|(_, _, s)| s.is_terminal())
        .collect();
    assert_eq!(
        terminal,
        vec![(OtaOperation::DownloadVerify, 3, OtaStatus::ConnectionError)]
    );
    assert!(driver.ota_activate_image(None).is_ok());
}

#[test]
fn test_stale_operation_id_is_ignored() {
    let (mut driver, mut device) = setup();
    let events = started_download(&mut driver, &mut device);

    ota_event(&mut device, AEC_OTA, 9, OTA_STATUS_VERIFY_DONE);
    driver.poll().unwrap();
    assert_eq!(driver.ota_operation(), Some(OtaOperation::DownloadVerify));
    assert_eq!(
        ota_statuses(&events),
        vec![(OtaOperation::DownloadVerify, 3, OtaStatus::Started)]
    );
}

#[test]
fn test_refused_start_reports_failed() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    driver.ota_activate_image(Some(Box::new(sink))).unwrap();
    for cmd in device.commands() {
        assert_eq!(cmd.cmd_id, CMD_OTAACT);
        device.status(&cmd, DeviceStatus::Busy);
    }
    driver.poll().unwrap();

    assert_eq!(
        ota_statuses(&events),
        vec![(OtaOperation::Activate, 0, OtaStatus::Failed)]
    );
    assert_eq!(driver.ota_operation(), None);
}

#[test]
fn test_activate_completes() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    driver.ota_activate_image(Some(Box::new(sink))).unwrap();
    accept(&mut device, CMD_OTAACT, 12);
    ota_event(&mut device, AEC_OTA, 12, OTA_STATUS_ACTIVATE_DONE);
    driver.poll().unwrap();
    assert_eq!(
        ota_statuses(&events).last(),
        Some(&(OtaOperation::Activate, 12, OtaStatus::Complete))
    );
}

#[test]
fn test_verify_completes() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    driver.ota_verify_image(Some(Box::new(sink))).unwrap();
    assert_eq!(driver.ota_operation(), Some(OtaOperation::Verify));
    accept(&mut device, CMD_OTAVFY, 21);
    ota_event(&mut device, AEC_OTA, 21, OTA_STATUS_VERIFY_DONE);
    driver.poll().unwrap();

    assert_eq!(
        ota_statuses(&events),
        vec![
            (OtaOperation::Verify, 21, OtaStatus::Started),
            (OtaOperation::Verify, 21, OtaStatus::Complete),
        ]
    );
    assert_eq!(driver.ota_operation(), None);
}

#[test]
fn test_invalidate_completes() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    driver.ota_invalidate_image(Some(Box::new(sink))).unwrap();
    assert_eq!(driver.ota_operation(), Some(OtaOperation::Invalidate));
    accept(&mut device, CMD_OTAINV, 22);
    ota_event(&mut device, AEC_OTA, 22, OTA_STATUS_INVALIDATE_DONE);
    driver.poll().unwrap();

    assert_eq!(
        ota_statuses(&events).last(),
        Some(&(OtaOperation::Invalidate, 22, OtaStatus::Complete))
    );
    assert!(device.commands().iter().any(|c| c.cmd_id == CMD_DI));
}

#[test]
fn test_refused_verify_keeps_device_info() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    driver.ota_verify_image(Some(Box::new(sink))).unwrap();
    for cmd in device.commands() {
        assert_eq!(cmd.cmd_id, CMD_OTAVFY);
        device.status(&cmd, DeviceStatus::Busy);
    }
    driver.poll().unwrap();

    assert_eq!(
        ota_statuses(&events),
        vec![(OtaOperation::Verify, 0, OtaStatus::Failed)]
    );
    // Verify leaves flash alone, so nothing is read back.
    assert!(device.commands().is_empty());
}

#[test]
fn test_server_errors_end_the_download() {
    for status in [OTA_STATUS_TLS_ERROR, OTA_STATUS_PROTOCOL_ERROR] {
        let (mut driver, mut device) = setup();
        let events = started_download(&mut driver, &mut device);
        ota_event(&mut device, AEC_OTAERR, 3, status);
        driver.poll().unwrap();

        assert_eq!(
            ota_statuses(&events).last(),
            Some(&(OtaOperation::DownloadVerify, 3, OtaStatus::ServerError)),
            "0x{:04X}",
            status
        );
        assert_eq!(driver.ota_operation(), None);
    }
}

#[test]
fn test_image_too_large_reports_insufficient_storage() {
    let (mut driver, mut device) = setup();
    let events = started_download(&mut driver, &mut device);
    ota_event(&mut device, AEC_OTAERR, 3, OTA_STATUS_IMAGE_TOO_LARGE);
    driver.poll().unwrap();

    assert_eq!(
        ota_statuses(&events).last(),
        Some(&(OtaOperation::DownloadVerify, 3, OtaStatus::InsufficientStorage))
    );
    assert!(driver.ota_activate_image(None).is_ok());
}

#[test]
fn test_lost_start_reports_failed_after_reset() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    driver
        .ota_update_from_url("http://10.0.0.2/images/fw.bin", None, Some(Box::new(sink)))
        .unwrap();

    // The device never answers; the link is reset.
    driver.reset_transport();
    assert_eq!(
        ota_statuses(&events),
        vec![(OtaOperation::DownloadVerify, 0, OtaStatus::Failed)]
    );
    assert_eq!(driver.ota_operation(), None);
    assert!(device.commands().iter().any(|c| c.cmd_id == CMD_DI));
    assert!(driver.ota_verify_image(None).is_ok());
}

#[test]
fn test_close_during_start_sends_nothing_more() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    driver.ota_activate_image(Some(Box::new(sink))).unwrap();
    driver.close();

    assert_eq!(
        ota_statuses(&events),
        vec![(OtaOperation::Activate, 0, OtaStatus::Failed)]
    );
    let cmds = device.commands();
    assert!(cmds.iter().all(|c| c.cmd_id == CMD_OTAACT));
}

#[test]
fn test_bad_urls_are_refused() {
    let (mut driver, _device) = setup();
    for url in ["ftp://h/fw.bin", "not a url", "mailto:ops@example.com"] {
        assert_eq!(
            driver.ota_update_from_url(url, None, None),
            Err(DriverError::InvalidArg),
            "{}",
            url
        );
    }
    // A TLS handle must be open.
    let tls = driver.tls_open().unwrap();
    driver.tls_close(tls).unwrap();
    assert_eq!(
        driver.ota_update_from_url("https://h/fw.bin", Some(tls), None),
        Err(DriverError::InvalidArg)
    );
    assert_eq!(driver.ota_operation(), None);
}
