//! Typed parameter elements.
//!
//! Every command, response and event carries a list of parameter elements.
//! On the wire each element is a type-length-value triple:
//!
//! ```text
//! +------+--------+--------+-------------------+
//! | type | len_lo | len_hi | value[0..len]     |
//! +------+--------+--------+-------------------+
//! ```
//!
//! Integers use the narrowest of 1, 2, 4 or 8 little-endian bytes that holds
//! the value. A fractional value is two little-endian `i32`s. The `Invalid`
//! type carries no value; the device reads it as "query" or "clear".

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, Bytes};

use crate::constants::*;
use crate::error::ProtocolError;
use crate::types::{MacAddr, MAC_ADDR_LEN};

/// A single typed parameter element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// No value.
    Invalid,
    /// Signed integer.
    Integer(i64),
    /// Unsigned integer.
    Unsigned(u64),
    /// Integer with a fractional part, used for `id.index` style identifiers.
    Frac {
        /// Integer part.
        i: i32,
        /// Fractional part; `-1` when absent.
        f: i32,
    },
    /// Boolean.
    Bool(bool),
    /// String; not required to be UTF-8 (SSIDs are arbitrary bytes).
    String(Bytes),
    /// Opaque byte array.
    ByteArray(Bytes),
    /// MAC address.
    MacAddr(MacAddr),
    /// IPv4 address.
    Ipv4(Ipv4Addr),
    /// IPv6 address.
    Ipv6(Ipv6Addr),
    /// IPv4 address followed by its netmask.
    Ipv4Prefix {
        /// Interface address.
        addr: Ipv4Addr,
        /// Network mask.
        netmask: Ipv4Addr,
    },
    /// IPv6 address followed by its prefix length.
    Ipv6Prefix {
        /// Interface address.
        addr: Ipv6Addr,
        /// Prefix length in bits.
        prefix_len: u8,
    },
    /// Status code.
    Status(u16),
}

impl ParamValue {
    /// Build a string element.
    pub fn string(s: impl AsRef<[u8]>) -> Self {
        ParamValue::String(Bytes::copy_from_slice(s.as_ref()))
    }

    /// Build a byte array element.
    pub fn bytes(data: impl AsRef<[u8]>) -> Self {
        ParamValue::ByteArray(Bytes::copy_from_slice(data.as_ref()))
    }

    /// The wire type tag.
    pub fn type_tag(&self) -> u8 {
        match self {
            ParamValue::Invalid => TYPE_INVALID,
            ParamValue::Integer(_) => TYPE_INTEGER,
            ParamValue::Unsigned(_) => TYPE_INTEGER_UNSIGNED,
            ParamValue::Frac { .. } => TYPE_INTEGER_FRAC,
            ParamValue::Bool(_) => TYPE_BOOL,
            ParamValue::String(_) => TYPE_STRING,
            ParamValue::ByteArray(_) => TYPE_BYTE_ARRAY,
            ParamValue::MacAddr(_) => TYPE_MACADDR,
            ParamValue::Ipv4(_) => TYPE_IPV4ADDR,
            ParamValue::Ipv6(_) => TYPE_IPV6ADDR,
            ParamValue::Ipv4Prefix { .. } => TYPE_IPV4ADDR,
            ParamValue::Ipv6Prefix { .. } => TYPE_IPV6ADDR,
            ParamValue::Status(_) => TYPE_STATUS,
        }
    }

    /// Human-readable type name, for errors and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Invalid => "invalid",
            ParamValue::Integer(_) => "integer",
            ParamValue::Unsigned(_) => "unsigned",
            ParamValue::Frac { .. } => "frac",
            ParamValue::Bool(_) => "bool",
            ParamValue::String(_) => "string",
            ParamValue::ByteArray(_) => "byte array",
            ParamValue::MacAddr(_) => "MAC address",
            ParamValue::Ipv4(_) => "IPv4 address",
            ParamValue::Ipv6(_) => "IPv6 address",
            ParamValue::Ipv4Prefix { .. } => "IPv4 address/mask",
            ParamValue::Ipv6Prefix { .. } => "IPv6 address/prefix",
            ParamValue::Status(_) => "status",
        }
    }

    /// Length of the value part on the wire.
    pub fn value_len(&self) -> usize {
        match self {
            ParamValue::Invalid => 0,
            ParamValue::Integer(v) => signed_width(*v),
            ParamValue::Unsigned(v) => unsigned_width(*v),
            ParamValue::Frac { .. } => 8,
            ParamValue::Bool(_) => 1,
            ParamValue::String(b) | ParamValue::ByteArray(b) => b.len(),
            ParamValue::MacAddr(_) => MAC_ADDR_LEN,
            ParamValue::Ipv4(_) => 4,
            ParamValue::Ipv6(_) => 16,
            ParamValue::Ipv4Prefix { .. } => 8,
            ParamValue::Ipv6Prefix { .. } => 17,
            ParamValue::Status(_) => 2,
        }
    }

    /// Total encoded length including the type and length header.
    pub fn encoded_len(&self) -> usize {
        3 + self.value_len()
    }

    /// Append the encoded element to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.type_tag());
        buf.put_u16_le(self.value_len() as u16);
        match self {
            ParamValue::Invalid => {}
            ParamValue::Integer(v) => {
                let width = signed_width(*v);
                buf.extend_from_slice(&v.to_le_bytes()[..width]);
            }
            ParamValue::Unsigned(v) => {
                let width = unsigned_width(*v);
                buf.extend_from_slice(&v.to_le_bytes()[..width]);
            }
            ParamValue::Frac { i, f } => {
                buf.put_i32_le(*i);
                buf.put_i32_le(*f);
            }
            ParamValue::Bool(v) => buf.push(u8::from(*v)),
            ParamValue::String(b) | ParamValue::ByteArray(b) => buf.extend_from_slice(b),
            ParamValue::MacAddr(mac) => buf.extend_from_slice(mac.as_bytes()),
            ParamValue::Ipv4(addr) => buf.extend_from_slice(&addr.octets()),
            ParamValue::Ipv6(addr) => buf.extend_from_slice(&addr.octets()),
            ParamValue::Ipv4Prefix { addr, netmask } => {
                buf.extend_from_slice(&addr.octets());
                buf.extend_from_slice(&netmask.octets());
            }
            ParamValue::Ipv6Prefix { addr, prefix_len } => {
                buf.extend_from_slice(&addr.octets());
                buf.push(*prefix_len);
            }
            ParamValue::Status(code) => buf.put_u16_le(*code),
        }
    }

    /// Decode one element from the front of `data`, advancing it.
    pub fn decode(data: &mut &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < 3 {
            return Err(ProtocolError::FrameTooShort {
                expected: 3,
                actual: data.len(),
            });
        }
        let type_tag = data.get_u8();
        let len = data.get_u16_le() as usize;
        if data.len() < len {
            return Err(ProtocolError::FrameTooShort {
                expected: len,
                actual: data.len(),
            });
        }
        let value = &data[..len];
        let bad_len = || ProtocolError::InvalidParamLength { type_tag, len };

        let param = match type_tag {
            TYPE_INVALID => ParamValue::Invalid,
            TYPE_INTEGER => ParamValue::Integer(read_signed(value).ok_or_else(bad_len)?),
            TYPE_INTEGER_UNSIGNED => {
                ParamValue::Unsigned(read_unsigned(value).ok_or_else(bad_len)?)
            }
            TYPE_INTEGER_FRAC => {
                if len != 8 {
                    return Err(bad_len());
                }
                let mut v = value;
                ParamValue::Frac {
                    i: v.get_i32_le(),
                    f: v.get_i32_le(),
                }
            }
            TYPE_BOOL => match value {
                [b] => ParamValue::Bool(*b != 0),
                _ => return Err(bad_len()),
            },
            TYPE_STRING => ParamValue::String(Bytes::copy_from_slice(value)),
            TYPE_BYTE_ARRAY => ParamValue::ByteArray(Bytes::copy_from_slice(value)),
            TYPE_MACADDR => ParamValue::MacAddr(MacAddr::from_slice(value).ok_or_else(bad_len)?),
            TYPE_IPV4ADDR => match len {
                4 => ParamValue::Ipv4(Ipv4Addr::new(value[0], value[1], value[2], value[3])),
                8 => ParamValue::Ipv4Prefix {
                    addr: Ipv4Addr::new(value[0], value[1], value[2], value[3]),
                    netmask: Ipv4Addr::new(value[4], value[5], value[6], value[7]),
                },
                _ => return Err(bad_len()),
            },
            TYPE_IPV6ADDR => {
                if len != 16 && len != 17 {
                    return Err(bad_len());
                }
                let octets: [u8; 16] = value[..16].try_into().map_err(|_| bad_len())?;
                let addr = Ipv6Addr::from(octets);
                match value.get(16) {
                    Some(&prefix_len) => ParamValue::Ipv6Prefix { addr, prefix_len },
                    None => ParamValue::Ipv6(addr),
                }
            }
            TYPE_STATUS => {
                if len != 2 {
                    return Err(bad_len());
                }
                ParamValue::Status(u16::from_le_bytes([value[0], value[1]]))
            }
            other => return Err(ProtocolError::UnknownParamType(other)),
        };

        data.advance(len);
        Ok(param)
    }

    // ========================================================================
    // Typed readers
    // ========================================================================

    fn mismatch(&self, expected: &'static str) -> ProtocolError {
        ProtocolError::ParamTypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    /// True when the element carries no value.
    pub fn is_invalid(&self) -> bool {
        matches!(self, ParamValue::Invalid)
    }

    /// Read as a signed integer. Unsigned and bool elements are widened.
    pub fn as_int(&self) -> Result<i64, ProtocolError> {
        match self {
            ParamValue::Integer(v) => Ok(*v),
            ParamValue::Unsigned(v) => i64::try_from(*v).map_err(|_| self.mismatch("integer")),
            ParamValue::Bool(v) => Ok(i64::from(*v)),
            _ => Err(self.mismatch("integer")),
        }
    }

    /// Read as an unsigned integer.
    pub fn as_unsigned(&self) -> Result<u64, ProtocolError> {
        match self {
            ParamValue::Unsigned(v) => Ok(*v),
            ParamValue::Integer(v) => u64::try_from(*v).map_err(|_| self.mismatch("unsigned")),
            _ => Err(self.mismatch("unsigned")),
        }
    }

    /// Read a fractional identifier. A plain integer reads as `{i, -1}`.
    pub fn as_frac(&self) -> Result<(i32, i32), ProtocolError> {
        match self {
            ParamValue::Frac { i, f } => Ok((*i, *f)),
            ParamValue::Integer(v) => i32::try_from(*v)
                .map(|i| (i, -1))
                .map_err(|_| self.mismatch("frac")),
            _ => Err(self.mismatch("frac")),
        }
    }

    /// Read as a boolean. Integers read as `!= 0`.
    pub fn as_bool(&self) -> Result<bool, ProtocolError> {
        match self {
            ParamValue::Bool(v) => Ok(*v),
            ParamValue::Integer(v) => Ok(*v != 0),
            ParamValue::Unsigned(v) => Ok(*v != 0),
            _ => Err(self.mismatch("bool")),
        }
    }

    /// Read the raw bytes of a string or byte array element.
    pub fn as_bytes(&self) -> Result<&[u8], ProtocolError> {
        match self {
            ParamValue::String(b) | ParamValue::ByteArray(b) => Ok(b),
            _ => Err(self.mismatch("string")),
        }
    }

    /// Read a string element as UTF-8.
    pub fn as_str(&self) -> Result<&str, ProtocolError> {
        std::str::from_utf8(self.as_bytes()?).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Read as a MAC address.
    pub fn as_mac(&self) -> Result<MacAddr, ProtocolError> {
        match self {
            ParamValue::MacAddr(mac) => Ok(*mac),
            _ => Err(self.mismatch("MAC address")),
        }
    }

    /// Read as an IPv4 address.
    pub fn as_ipv4(&self) -> Result<Ipv4Addr, ProtocolError> {
        match self {
            ParamValue::Ipv4(addr) | ParamValue::Ipv4Prefix { addr, .. } => Ok(*addr),
            _ => Err(self.mismatch("IPv4 address")),
        }
    }

    /// Read as either address family.
    pub fn as_ip(&self) -> Result<IpAddr, ProtocolError> {
        match self {
            ParamValue::Ipv4(addr) | ParamValue::Ipv4Prefix { addr, .. } => Ok(IpAddr::V4(*addr)),
            ParamValue::Ipv6(addr) | ParamValue::Ipv6Prefix { addr, .. } => Ok(IpAddr::V6(*addr)),
            _ => Err(self.mismatch("IP address")),
        }
    }

    /// Read as a status code.
    pub fn as_status(&self) -> Result<u16, ProtocolError> {
        match self {
            ParamValue::Status(code) => Ok(*code),
            ParamValue::Integer(v) => u16::try_from(*v).map_err(|_| self.mismatch("status")),
            _ => Err(self.mismatch("status")),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::string(s)
    }
}

impl From<MacAddr> for ParamValue {
    fn from(mac: MacAddr) -> Self {
        ParamValue::MacAddr(mac)
    }
}

impl From<Ipv4Addr> for ParamValue {
    fn from(addr: Ipv4Addr) -> Self {
        ParamValue::Ipv4(addr)
    }
}

impl From<Ipv6Addr> for ParamValue {
    fn from(addr: Ipv6Addr) -> Self {
        ParamValue::Ipv6(addr)
    }
}

impl From<IpAddr> for ParamValue {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => ParamValue::Ipv4(v4),
            IpAddr::V6(v6) => ParamValue::Ipv6(v6),
        }
    }
}

/// Encode a parameter list preceded by its element count.
pub fn encode_params(params: &[ParamValue], buf: &mut Vec<u8>) {
    buf.push(params.len() as u8);
    for param in params {
        param.encode(buf);
    }
}

/// Decode a parameter list preceded by its element count.
pub fn decode_params(data: &mut &[u8]) -> Result<Vec<ParamValue>, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::FrameTooShort {
            expected: 1,
            actual: 0,
        });
    }
    let count = data.get_u8() as usize;
    if count > MAX_PARAM_ELEMS {
        return Err(ProtocolError::TooManyParams {
            max: MAX_PARAM_ELEMS,
            actual: count,
        });
    }
    let mut params = Vec::with_capacity(count);
    for _ in 0..count {
        params.push(ParamValue::decode(data)?);
    }
    Ok(params)
}

// ============================================================================
// Integer width helpers
// ============================================================================

fn signed_width(v: i64) -> usize {
    if i8::try_from(v).is_ok() {
        1
    } else if i16::try_from(v).is_ok() {
        2
    } else if i32::try_from(v).is_ok() {
        4
    } else {
        8
    }
}

fn unsigned_width(v: u64) -> usize {
    if v <= u8::MAX as u64 {
        1
    } else if v <= u16::MAX as u64 {
        2
    } else if v <= u32::MAX as u64 {
        4
    } else {
        8
    }
}

fn read_signed(value: &[u8]) -> Option<i64> {
    let mut v = value;
    match value.len() {
        1 => Some(v.get_i8() as i64),
        2 => Some(v.get_i16_le() as i64),
        4 => Some(v.get_i32_le() as i64),
        8 => Some(v.get_i64_le()),
        _ => None,
    }
}

fn read_unsigned(value: &[u8]) -> Option<u64> {
    let mut v = value;
    match value.len() {
        1 => Some(v.get_u8() as u64),
        2 => Some(v.get_u16_le() as u64),
        4 => Some(v.get_u32_le() as u64),
        8 => Some(v.get_u64_le()),
        _ => None,
    }
}
