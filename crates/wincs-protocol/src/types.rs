//! Common types used in the protocol.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Length of a MAC address in bytes.
pub const MAC_ADDR_LEN: usize = 6;

/// A 6-byte IEEE 802 MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; MAC_ADDR_LEN]);

impl MacAddr {
    /// Create a new MAC address from bytes.
    pub fn new(bytes: [u8; MAC_ADDR_LEN]) -> Self {
        MacAddr(bytes)
    }

    /// Create from a slice. Returns None if slice is wrong length.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() == MAC_ADDR_LEN {
            let mut bytes = [0u8; MAC_ADDR_LEN];
            bytes.copy_from_slice(slice);
            Some(MacAddr(bytes))
        } else {
            None
        }
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; MAC_ADDR_LEN] {
        &self.0
    }

    /// True for the all-zero address, which the device uses for "none".
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Get the bytes as a hex string.
    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl AsRef<[u8]> for MacAddr {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; MAC_ADDR_LEN];
        let mut parts = s.split(|c| c == ':' || c == '-');
        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| ProtocolError::InvalidData(format!("short MAC address: {s}")))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| ProtocolError::InvalidData(format!("bad MAC address: {s}")))?;
        }
        if parts.next().is_some() {
            return Err(ProtocolError::InvalidData(format!("long MAC address: {s}")));
        }
        Ok(MacAddr(bytes))
    }
}

/// Encode bytes as a lowercase hex string.
pub fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_addr_parse_and_display() {
        let mac: MacAddr = "AA:BB:CC:DD:EE:FF".parse().expect("valid MAC");
        assert_eq!(mac.as_bytes(), &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(mac.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(mac.to_hex(), "aabbccddeeff");
        assert!(!mac.is_zero());
    }

    #[test]
    fn test_mac_addr_rejects_bad_input() {
        assert!("AA:BB:CC".parse::<MacAddr>().is_err());
        assert!("AA:BB:CC:DD:EE:FF:00".parse::<MacAddr>().is_err());
        assert!("GG:BB:CC:DD:EE:FF".parse::<MacAddr>().is_err());
        assert!(MacAddr::from_slice(&[1, 2, 3]).is_none());
        assert!(MacAddr::default().is_zero());
    }
}
