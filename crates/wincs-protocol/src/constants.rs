//! Protocol constants
//!
//! These constants define the command ids, event ids, configuration parameter
//! ids and option values used on the WINCS02 command link.

// ============================================================================
// Frame Layout
// ============================================================================

/// Header byte for host → device frames.
pub const FRAME_HEADER_HOST: u8 = b'<';
/// Header byte for device → host frames.
pub const FRAME_HEADER_DEVICE: u8 = b'>';

/// Message kind: a command from the host.
pub const MSG_KIND_COMMAND: u8 = 0x01;
/// Message kind: the acknowledgement status of one command.
pub const MSG_KIND_STATUS: u8 = 0x02;
/// Message kind: a response produced by one command.
pub const MSG_KIND_RESPONSE: u8 = 0x03;
/// Message kind: an unsolicited device event.
pub const MSG_KIND_EVENT: u8 = 0x04;

/// Maximum number of parameter elements carried by one message.
pub const MAX_PARAM_ELEMS: usize = 16;

// ============================================================================
// Parameter Type Tags
// ============================================================================

pub const TYPE_INVALID: u8 = 0;
pub const TYPE_INTEGER: u8 = 1;
pub const TYPE_INTEGER_UNSIGNED: u8 = 2;
pub const TYPE_INTEGER_FRAC: u8 = 3;
pub const TYPE_BOOL: u8 = 4;
pub const TYPE_STRING: u8 = 5;
pub const TYPE_BYTE_ARRAY: u8 = 6;
pub const TYPE_MACADDR: u8 = 7;
pub const TYPE_IPV4ADDR: u8 = 8;
pub const TYPE_IPV6ADDR: u8 = 9;
pub const TYPE_STATUS: u8 = 10;

// ============================================================================
// Command IDs (host → device)
// ============================================================================

/// Device information query.
pub const CMD_DI: u16 = 0x0001;
/// Firmware configuration query.
pub const CMD_CFG: u16 = 0x0002;
/// Network interface configuration.
pub const CMD_NETIFC: u16 = 0x0010;
/// Station configuration.
pub const CMD_WSTAC: u16 = 0x0020;
/// Station enable/disable.
pub const CMD_WSTA: u16 = 0x0021;
/// Soft-AP configuration.
pub const CMD_WAPC: u16 = 0x0030;
/// Soft-AP enable/disable.
pub const CMD_WAP: u16 = 0x0031;
/// Association information query.
pub const CMD_ASSOC: u16 = 0x0038;
/// Scan configuration.
pub const CMD_WSCNC: u16 = 0x0040;
/// Start a scan.
pub const CMD_WSCN: u16 = 0x0041;
/// General Wi-Fi configuration.
pub const CMD_WIFIC: u16 = 0x0048;
/// OTA configuration.
pub const CMD_OTAC: u16 = 0x0050;
/// OTA download.
pub const CMD_OTADL: u16 = 0x0051;
/// OTA verify image.
pub const CMD_OTAVFY: u16 = 0x0052;
/// OTA activate image.
pub const CMD_OTAACT: u16 = 0x0053;
/// OTA invalidate image.
pub const CMD_OTAINV: u16 = 0x0054;
/// TLS context configuration.
pub const CMD_TLSC: u16 = 0x0060;
/// TLS cipher suite configuration.
pub const CMD_TLSCSC: u16 = 0x0061;
/// DHCP server configuration.
pub const CMD_DHCPSC: u16 = 0x0070;
/// Provisioning configuration.
pub const CMD_WPROVC: u16 = 0x0080;
/// Provisioning enable/disable.
pub const CMD_WPROV: u16 = 0x0081;
/// External crypto operation result.
pub const CMD_EXTCRYPTO: u16 = 0x0090;
/// Power save configuration.
pub const CMD_PPSC: u16 = 0x00A0;
/// Power save enable.
pub const CMD_PPS: u16 = 0x00A1;

// ============================================================================
// Asynchronous Event Codes (device → host, unsolicited)
// ============================================================================

/// Station link up: assoc id, BSSID, channel.
pub const AEC_WSTALU: u16 = 0x8020;
/// Station link down: assoc id.
pub const AEC_WSTALD: u16 = 0x8021;
/// Station connect error: error code.
pub const AEC_WSTAERR: u16 = 0x8022;
/// Station roamed: assoc id.
pub const AEC_WSTAROAM: u16 = 0x8023;
/// Station address assigned: assoc id, address.
pub const AEC_WSTAAIP: u16 = 0x8024;
/// Soft-AP station connected: assoc id, MAC.
pub const AEC_WAPSC: u16 = 0x8030;
/// Soft-AP station disconnected: assoc id, MAC.
pub const AEC_WAPSD: u16 = 0x8031;
/// Soft-AP address assigned to a station: assoc id, IPv4.
pub const AEC_WAPAIP: u16 = 0x8032;
/// Association RSSI report: assoc id, peer is STA, MAC, RSSI.
pub const AEC_ASSOC: u16 = 0x8038;
/// Scan indication: RSSI, security type, channel, BSSID, SSID.
pub const AEC_WSCNIND: u16 = 0x8040;
/// Scan done: number of results.
pub const AEC_WSCNDONE: u16 = 0x8041;
/// Network interface received L2 frame: interface, length, data.
pub const AEC_NETIFRX: u16 = 0x8010;
/// OTA progress: operation id, sub-status.
pub const AEC_OTA: u16 = 0x8050;
/// OTA error: operation id, sub-status.
pub const AEC_OTAERR: u16 = 0x8051;
/// External crypto request.
pub const AEC_EXTCRYPTO: u16 = 0x8090;
/// Provisioning attach: id, address, port.
pub const AEC_WPROVAT: u16 = 0x8080;
/// Provisioning detach: id.
pub const AEC_WPROVDT: u16 = 0x8081;
/// Power save notification: event code.
pub const AEC_PPS: u16 = 0x80A0;

// ============================================================================
// Device Information (DI) Parameter IDs
// ============================================================================

pub const DI_ID: i32 = 1;
pub const DI_NUM_IMAGES: i32 = 2;
pub const DI_IMAGE_SEQ_NUM: i32 = 3;
pub const DI_IMAGE_VERSION: i32 = 4;
pub const DI_IMAGE_SRC_ADDR: i32 = 5;
pub const DI_IMAGE_STATE: i32 = 6;

// ============================================================================
// Firmware Configuration (CFG) Parameter IDs
// ============================================================================

/// Version string, `major.minor.patch`.
pub const CFG_VERSION: i32 = 1;
/// Build hash, byte array.
pub const CFG_BUILD_HASH: i32 = 2;
/// Build time, seconds since the Unix epoch.
pub const CFG_BUILD_TIME: i32 = 3;

// ============================================================================
// NETIFC Parameter IDs
// ============================================================================

pub const NETIFC_ETHER: i32 = 1;
pub const NETIFC_DHCPC_EN: i32 = 2;
pub const NETIFC_IP_MASK: i32 = 3;
pub const NETIFC_GATEWAY: i32 = 4;
pub const NETIFC_IPV6_GLO_ADDR: i32 = 5;
pub const NETIFC_IPV6_GATEWAY: i32 = 6;
pub const NETIFC_L2_ONLY: i32 = 7;

// ============================================================================
// WSTAC Parameter IDs
// ============================================================================

pub const WSTAC_SSID: i32 = 1;
pub const WSTAC_SEC_TYPE: i32 = 2;
pub const WSTAC_CREDENTIALS: i32 = 3;
pub const WSTAC_CHANNEL: i32 = 4;
pub const WSTAC_BSSID: i32 = 5;
pub const WSTAC_CONN_TIMEOUT: i32 = 7;
pub const WSTAC_ROAMING: i32 = 8;
pub const WSTAC_MFP: i32 = 9;
pub const WSTAC_NETIF_IDX: i32 = 10;

/// WSTA state: disabled.
pub const WSTA_STATE_DISABLED: i64 = 0;
/// WSTA state: enabled.
pub const WSTA_STATE_ENABLED: i64 = 1;

// ============================================================================
// WAPC Parameter IDs
// ============================================================================

pub const WAPC_SSID: i32 = 1;
pub const WAPC_SEC_TYPE: i32 = 2;
pub const WAPC_CREDENTIALS: i32 = 3;
pub const WAPC_CHANNEL: i32 = 4;
pub const WAPC_HIDDEN: i32 = 5;
pub const WAPC_NETIF_IDX: i32 = 6;
pub const WAPC_REKEY_INTERVAL: i32 = 7;
pub const WAPC_MFP: i32 = 8;

/// Soft-AP state: disabled.
pub const WAP_STATE_DISABLED: i64 = 0;
/// Soft-AP state: enabled.
pub const WAP_STATE_ENABLED: i64 = 1;

/// Minimum group rekey interval in seconds.
pub const WAP_REKEY_INTERVAL_MIN: u32 = 60;
/// Maximum group rekey interval in seconds.
pub const WAP_REKEY_INTERVAL_MAX: u32 = 86_400;

/// Management frame protection option values (shared by WSTAC and WAPC).
pub const MFP_TYPE_DISABLED: i64 = 0;
pub const MFP_TYPE_ENABLED: i64 = 1;
pub const MFP_TYPE_REQUIRED: i64 = 2;

// ============================================================================
// Security Types (as reported and accepted by the device)
// ============================================================================

pub const SEC_TYPE_OPEN: u8 = 0;
pub const SEC_TYPE_WEP: u8 = 1;
pub const SEC_TYPE_WPA_WPA2_PERSONAL: u8 = 2;
pub const SEC_TYPE_WPA2_PERSONAL: u8 = 3;
pub const SEC_TYPE_WPA2_WPA3_PERSONAL: u8 = 4;
pub const SEC_TYPE_WPA3_PERSONAL: u8 = 5;
pub const SEC_TYPE_WPA2_ENTERPRISE: u8 = 6;
pub const SEC_TYPE_WPA2_WPA3_ENTERPRISE: u8 = 7;
pub const SEC_TYPE_WPA3_ENTERPRISE: u8 = 8;
pub const SEC_TYPE_WPA3_192_ENTERPRISE: u8 = 9;
/// Number of security types the device reports.
pub const NUM_SEC_TYPES: usize = 10;

// ============================================================================
// WSCNC Parameter IDs
// ============================================================================

pub const WSCNC_ACT_SLOT_TIME: i32 = 1;
pub const WSCNC_PASV_SLOT_TIME: i32 = 2;
pub const WSCNC_NUM_SLOTS: i32 = 3;
pub const WSCNC_PROBES_PER_SLOT: i32 = 4;
pub const WSCNC_RSSI_THRESH: i32 = 5;
pub const WSCNC_FILT_LIST: i32 = 6;
pub const WSCNC_CHANMASK24: i32 = 7;
pub const WSCNC_CHANNEL: i32 = 8;

/// WSCN scan type: passive.
pub const WSCN_PASSIVE: i64 = 0;
/// WSCN scan type: active.
pub const WSCN_ACTIVE: i64 = 1;

/// Minimum slot time in milliseconds.
pub const SCAN_SLOT_TIME_MIN: u16 = 10;
/// Maximum slot time in milliseconds.
pub const SCAN_SLOT_TIME_MAX: u16 = 1500;
/// Minimum probes per slot.
pub const SCAN_PROBES_MIN: u8 = 1;
/// Maximum probes per slot.
pub const SCAN_PROBES_MAX: u8 = 2;

// ============================================================================
// WIFIC Parameter IDs
// ============================================================================

pub const WIFIC_POWERSAVE: i32 = 1;

/// Wi-Fi power save mode: always on.
pub const WIFI_PS_RUN: i64 = 0;
/// Wi-Fi power save mode: wireless sleep.
pub const WIFI_PS_WSM: i64 = 1;

// ============================================================================
// OTA Parameter IDs and Sub-Status Codes
// ============================================================================

pub const OTAC_HOST: i32 = 1;
pub const OTAC_PORT: i32 = 2;
pub const OTAC_PATH: i32 = 3;
pub const OTAC_FILE: i32 = 4;
pub const OTAC_TLS_CONF: i32 = 5;
pub const OTAC_TIMEOUT: i32 = 6;

/// Image erase completed.
pub const OTA_STATUS_ERASE_DONE: u16 = 1;
/// Image write completed.
pub const OTA_STATUS_WRITE_DONE: u16 = 2;
/// Image verify completed.
pub const OTA_STATUS_VERIFY_DONE: u16 = 3;
/// Image activate completed.
pub const OTA_STATUS_ACTIVATE_DONE: u16 = 4;
/// Image invalidate completed.
pub const OTA_STATUS_INVALIDATE_DONE: u16 = 5;
/// Generic OTA error.
pub const OTA_STATUS_ERROR: u16 = 0x100;
/// Invalid or missing URL parameters.
pub const OTA_STATUS_INVALID_URL: u16 = 0x101;
/// No station connection available.
pub const OTA_STATUS_NO_STA_CONN: u16 = 0x102;
/// Server connection timed out.
pub const OTA_STATUS_TIMEOUT: u16 = 0x103;
/// Protocol error from the server.
pub const OTA_STATUS_PROTOCOL_ERROR: u16 = 0x104;
/// TLS negotiation error.
pub const OTA_STATUS_TLS_ERROR: u16 = 0x105;
/// Image is larger than the available partition.
pub const OTA_STATUS_IMAGE_TOO_LARGE: u16 = 0x106;
/// Device internal error.
pub const OTA_STATUS_DEVICE_ERROR: u16 = 0x107;

// ============================================================================
// TLSC Parameter IDs
// ============================================================================

pub const TLSC_CA_CERT_NAME: i32 = 1;
pub const TLSC_CERT_NAME: i32 = 2;
pub const TLSC_PRI_KEY_NAME: i32 = 3;
pub const TLSC_PRI_KEY_PASSWORD: i32 = 4;
pub const TLSC_SERVER_NAME: i32 = 5;
pub const TLSC_DOMAIN_NAME: i32 = 6;
pub const TLSC_DH_PARAM_NAME: i32 = 7;
pub const TLSC_PEER_AUTH: i32 = 8;
pub const TLSC_PEER_DOMAIN_VERIFY: i32 = 9;
pub const TLSC_CIPHER_SUITES_IDX: i32 = 10;
pub const TLSC_EXTCRYPTO_OPS: i32 = 11;

/// Maximum length of a certificate or key name.
pub const TLS_NAME_MAX_LEN: usize = 32;
/// Maximum length of a private key password.
pub const TLS_PASSWORD_MAX_LEN: usize = 64;
/// Maximum length of an SNI value or verified domain name.
pub const TLS_SERVER_NAME_MAX_LEN: usize = 255;

// ============================================================================
// TLSCSC Parameter IDs
// ============================================================================

pub const TLSCSC_CIPHER_SUITES: i32 = 1;
pub const TLSCSC_CIPHER_SUITES_AVAIL: i32 = 2;

/// Maximum number of algorithms in one cipher suite list.
pub const TLS_MAX_CIPHER_SUITES: usize = 32;

// ============================================================================
// DHCPSC Parameter IDs
// ============================================================================

pub const DHCPSC_ENABLED: i32 = 1;
pub const DHCPSC_POOL_START: i32 = 2;
pub const DHCPSC_NETIF_IDX: i32 = 3;
pub const DHCPSC_GATEWAY: i32 = 4;

// ============================================================================
// WPROVC Parameter IDs
// ============================================================================

pub const WPROVC_PORT: i32 = 1;
pub const WPROVC_ASCII: i32 = 2;
pub const WPROVC_PROTOCOL_VERSION: i32 = 3;

// ============================================================================
// External Crypto Values
// ============================================================================

/// EXTCRYPTO request: sign operation.
pub const EXTCRYPTO_OP_SIGN: i64 = 1;
/// EXTCRYPTO request source: a TLS context.
pub const EXTCRYPTO_SRC_TLSC: i64 = 1;
/// EXTCRYPTO signature type: ECDSA.
pub const EXTCRYPTO_SIGN_ECDSA: i64 = 1;
pub const EXTCRYPTO_CURVE_SECP256R1: i64 = 23;
pub const EXTCRYPTO_CURVE_SECP384R1: i64 = 24;
pub const EXTCRYPTO_CURVE_SECP521R1: i64 = 25;
/// EXTCRYPTO result status: success.
pub const EXTCRYPTO_STATUS_SUCCESS: i64 = 0;
/// EXTCRYPTO result status: failure.
pub const EXTCRYPTO_STATUS_FAILURE: i64 = 1;

// ============================================================================
// Power Save Parameter IDs
// ============================================================================

pub const PPSC_SEC_OSC: i32 = 1;
pub const PPSC_AUTO_SLEEP_TIMEOUT: i32 = 2;
pub const PPSC_SLEEP_DURATION: i32 = 3;

/// PPS notification: sleep period timed out.
pub const PPS_EVENT_TIMEOUT: i64 = 1;
