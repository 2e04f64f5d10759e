//! TLS contexts, cipher-suite lists and the signing relay.

mod common;

use common::{setup, setup_with};
use wincs_driver::protocol::{
    DeviceStatus, ParamValue, AEC_EXTCRYPTO, CMD_EXTCRYPTO, CMD_TLSC, CMD_TLSCSC,
    EXTCRYPTO_CURVE_SECP256R1, EXTCRYPTO_OP_SIGN, EXTCRYPTO_SIGN_ECDSA, EXTCRYPTO_SRC_TLSC,
    EXTCRYPTO_STATUS_SUCCESS, TLSC_CIPHER_SUITES_IDX, TLSC_EXTCRYPTO_OPS, TLSC_SERVER_NAME,
};
use wincs_driver::{
    event_channel, CipherSuiteList, DriverConfig, DriverError, DriverEvent, EcCurve, SignRequest,
};

#[test]
fn test_tls_pool_reuses_released_slots() {
    let (mut driver, _device) = setup();
    let a = driver.tls_open().unwrap();
    let b = driver.tls_open().unwrap();
    assert_ne!(a, b);
    assert_eq!(driver.tls_open(), Err(DriverError::RetryRequest));

    driver.tls_close(a).unwrap();
    assert!(!driver.tls_is_open(a));
    assert_eq!(driver.tls_close(a), Err(DriverError::InvalidArg));
    assert_eq!(driver.tls_open(), Ok(a));
}

#[test]
fn test_tls_field_commands() {
    let (mut driver, mut device) = setup();
    let tls = driver.tls_open().unwrap();
    driver.tls_sni_set(tls, "iot.example.com").unwrap();
    assert_eq!(
        driver.tls_sni_set(tls, &"x".repeat(300)),
        Err(DriverError::InvalidArg)
    );
    assert_eq!(
        driver.tls_hostname_check_set(tls, None, true),
        Err(DriverError::InvalidArg)
    );

    let cmds = device.commands();
    assert_eq!(cmds.len(), 1);
    assert_eq!(cmds[0].cmd_id, CMD_TLSC);
    assert_eq!(
        cmds[0].params,
        vec![
            ParamValue::Integer(tls.value().into()),
            ParamValue::Integer(TLSC_SERVER_NAME.into()),
            ParamValue::string("iot.example.com"),
        ]
    );

    driver.tls_close(tls).unwrap();
    assert_eq!(driver.tls_sni_set(tls, "a"), Err(DriverError::InvalidArg));
}

#[test]
fn test_cipher_pool_exhaustion() {
    let config = DriverConfig {
        num_cipher_suites: 2,
        ..DriverConfig::default()
    };
    let (mut driver, _device) = setup_with(config);
    let first = driver.cipher_suite_open().unwrap();
    let _second = driver.cipher_suite_open().unwrap();
    assert_eq!(driver.cipher_suite_open(), Err(DriverError::RetryRequest));
    driver.cipher_suite_close(first).unwrap();
    assert_eq!(driver.cipher_suite_open(), Ok(first));
}

#[test]
fn test_cipher_query_collects_responses() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    let cs = driver.cipher_suite_open().unwrap();

    driver
        .cipher_suite_get(cs, CipherSuiteList::Available, Some(Box::new(sink)))
        .unwrap();
    assert!(driver.cipher_suite_is_busy(cs));
    assert_eq!(
        driver.cipher_suite_get(cs, CipherSuiteList::Current, None),
        Err(DriverError::RetryRequest)
    );

    let cmds = device.commands();
    assert_eq!(cmds.len(), 1);
    let slot = i32::from(cs.value());
    let rsp = |index: i32, value: ParamValue| vec![ParamValue::Frac { i: slot, f: index }, value];
    device.respond(&cmds[0], rsp(-1, ParamValue::Integer(2)));
    device.respond(&cmds[0], rsp(0, ParamValue::Unsigned(0xC02B)));
    device.respond(&cmds[0], rsp(1, ParamValue::Unsigned(0xC02F)));
    device.status(&cmds[0], DeviceStatus::Ok);
    driver.poll().unwrap();

    assert!(!driver.cipher_suite_is_busy(cs));
    assert_eq!(
        events.try_iter().collect::<Vec<_>>(),
        vec![DriverEvent::CipherSuites {
            handle: cs,
            suites: Some(vec![0xC02B, 0xC02F]),
            ok: true
        }]
    );
}

#[test]
fn test_cipher_update_reports_refused_suites() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    let cs = driver.cipher_suite_open().unwrap();

    driver
        .cipher_suite_set(cs, &[0xC02B, 0x0001], Some(Box::new(sink)))
        .unwrap();
    let cmds = device.commands();
    assert_eq!(cmds.len(), 3);
    assert!(cmds.iter().all(|c| c.cmd_id == CMD_TLSCSC));
    device.status(&cmds[0], DeviceStatus::Ok);
    device.status(&cmds[1], DeviceStatus::Ok);
    device.status(&cmds[2], DeviceStatus::InvalidParameter);
    driver.poll().unwrap();

    assert_eq!(
        events.try_iter().collect::<Vec<_>>(),
        vec![
            DriverEvent::CipherSuites {
                handle: cs,
                suites: Some(vec![0x0001]),
                ok: false
            },
            DriverEvent::CipherSuites {
                handle: cs,
                suites: None,
                ok: false
            },
        ]
    );
}

#[test]
fn test_cipher_update_fills_every_slot() {
    let (mut driver, mut device) = setup();
    let cs = driver.cipher_suite_open().unwrap();
    let too_many: Vec<u16> = (0..33).map(|i| 0xC000 + i).collect();
    assert_eq!(
        driver.cipher_suite_set(cs, &too_many, None),
        Err(DriverError::InvalidArg)
    );
    assert!(!driver.cipher_suite_is_busy(cs));

    let (sink, events) = event_channel();
    driver
        .cipher_suite_set(cs, &too_many[..32], Some(Box::new(sink)))
        .unwrap();
    let cmds = device.ack_all();
    assert_eq!(cmds.len(), 33);
    assert!(cmds.iter().all(|c| c.cmd_id == CMD_TLSCSC));
    driver.poll().unwrap();

    assert_eq!(
        events.try_iter().collect::<Vec<_>>(),
        vec![DriverEvent::CipherSuites {
            handle: cs,
            suites: None,
            ok: true
        }]
    );
}

#[test]
fn test_lost_cipher_query_frees_the_slot() {
    let (mut driver, _device) = setup();
    let (sink, events) = event_channel();
    let cs = driver.cipher_suite_open().unwrap();
    driver
        .cipher_suite_get(cs, CipherSuiteList::Current, Some(Box::new(sink)))
        .unwrap();

    driver.reset_transport();
    assert_eq!(
        events.try_iter().collect::<Vec<_>>(),
        vec![DriverEvent::CipherSuites {
            handle: cs,
            suites: None,
            ok: false
        }]
    );
    assert!(!driver.cipher_suite_is_busy(cs));
    assert!(driver.cipher_suite_get(cs, CipherSuiteList::Current, None).is_ok());
}

#[test]
fn test_closed_cipher_context_drops_late_completion() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    let cs = driver.cipher_suite_open().unwrap();
    driver.cipher_suite_set(cs, &[0xC02B], Some(Box::new(sink))).unwrap();

    // The slot is reopened before the device answers the first update.
    driver.cipher_suite_close(cs).unwrap();
    let reopened = driver.cipher_suite_open().unwrap();
    assert_eq!(reopened, cs);
    device.ack_all();
    driver.poll().unwrap();

    assert!(events.try_iter().next().is_none());
    assert!(!driver.cipher_suite_is_busy(reopened));
}

#[test]
fn test_tls_selects_cipher_suites() {
    let (mut driver, mut device) = setup();
    let tls = driver.tls_open().unwrap();
    let cs = driver.cipher_suite_open().unwrap();
    driver.tls_cipher_suite_set(tls, cs).unwrap();
    let cmds = device.commands();
    assert_eq!(cmds[0].params[1], ParamValue::Integer(TLSC_CIPHER_SUITES_IDX.into()));
    assert_eq!(cmds[0].params[2], ParamValue::Integer(cs.value().into()));

    driver.cipher_suite_close(cs).unwrap();
    assert_eq!(
        driver.tls_cipher_suite_set(tls, cs),
        Err(DriverError::InvalidArg)
    );
}

#[test]
fn test_sign_request_relay() {
    let (mut driver, mut device) = setup();
    let (sink, events) = event_channel();
    let tls = driver.tls_open().unwrap();
    driver.tls_sign_observer_set(tls, Some(Box::new(sink))).unwrap();
    let cmds = device.ack_all();
    assert_eq!(cmds[0].params[1], ParamValue::Integer(TLSC_EXTCRYPTO_OPS.into()));
    assert_eq!(cmds[0].params[2], ParamValue::Integer(1));

    let digest = [0x5Au8; 32];
    device.event(
        AEC_EXTCRYPTO,
        vec![
            ParamValue::Unsigned(77),
            ParamValue::Integer(EXTCRYPTO_OP_SIGN),
            ParamValue::Integer(EXTCRYPTO_SRC_TLSC),
            ParamValue::Integer(tls.value().into()),
            ParamValue::Integer(EXTCRYPTO_SIGN_ECDSA),
            ParamValue::Integer(EXTCRYPTO_CURVE_SECP256R1),
            ParamValue::bytes(digest),
        ],
    );
    driver.poll().unwrap();

    let request = match events.try_recv().unwrap() {
        DriverEvent::SignRequest { tls: got, request } => {
            assert_eq!(got, tls);
            request
        }
        other => panic!("unexpected event {:?}", other),
    };
    assert_eq!(
        request,
        SignRequest {
            context: 77,
            curve: EcCurve::Secp256r1,
            data: bytes::Bytes::copy_from_slice(&digest),
        }
    );

    let signature = [0x30u8, 0x44, 0x02, 0x20];
    assert_eq!(
        driver.extcrypto_sign_result(request.context.into(), true, None),
        Err(DriverError::InvalidArg)
    );
    driver
        .extcrypto_sign_result(request.context.into(), true, Some(&signature))
        .unwrap();
    let cmds = device.commands();
    assert_eq!(cmds[0].cmd_id, CMD_EXTCRYPTO);
    assert_eq!(
        cmds[0].params,
        vec![
            ParamValue::Unsigned(77),
            ParamValue::Integer(EXTCRYPTO_STATUS_SUCCESS),
            ParamValue::bytes(signature),
        ]
    );
}
