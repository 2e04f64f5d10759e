//! BSS and authentication contexts.
//!
//! A [`BssContext`] names the network to join or create; an [`AuthContext`]
//! says how to authenticate to it. Both are plain values validated before a
//! connect or AP start uses them.

use serde::{Deserialize, Serialize};
use wincs_protocol::{
    MacAddr, MFP_TYPE_DISABLED, MFP_TYPE_ENABLED, MFP_TYPE_REQUIRED, SEC_TYPE_OPEN,
    SEC_TYPE_WPA2_PERSONAL, SEC_TYPE_WPA2_WPA3_PERSONAL, SEC_TYPE_WPA3_PERSONAL,
    SEC_TYPE_WPA_WPA2_PERSONAL,
};

use crate::error::{DriverError, Result};

/// Maximum SSID length in bytes.
pub const MAX_SSID_LEN: usize = 32;
/// Highest 2.4 GHz channel number.
pub const MAX_CHANNEL_2_4GHZ: u8 = 13;

// ============================================================================
// Channels
// ============================================================================

/// A 2.4 GHz channel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Channel {
    /// Any channel.
    #[default]
    Any,
    /// A specific channel, 1..=13.
    Fixed(u8),
}

impl Channel {
    /// The device encoding: 0 for any, otherwise the channel number.
    pub fn to_device(self) -> u8 {
        match self {
            Channel::Any => 0,
            Channel::Fixed(ch) => ch,
        }
    }

    /// Decode from the device encoding.
    pub fn from_device(value: u8) -> Self {
        match value {
            0 => Channel::Any,
            ch => Channel::Fixed(ch),
        }
    }

    /// Whether the channel number itself is in range.
    pub fn is_valid(self) -> bool {
        match self {
            Channel::Any => true,
            Channel::Fixed(ch) => (1..=MAX_CHANNEL_2_4GHZ).contains(&ch),
        }
    }
}

/// A set of 2.4 GHz channels; bit `n-1` selects channel `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMask(pub u16);

impl ChannelMask {
    /// No channels.
    pub const NONE: ChannelMask = ChannelMask(0);
    /// Channels 1 to 13.
    pub const ALL_2_4GHZ: ChannelMask = ChannelMask(0x1FFF);

    /// A mask holding a single channel.
    pub fn single(channel: u8) -> Self {
        if (1..=MAX_CHANNEL_2_4GHZ).contains(&channel) {
            ChannelMask(1 << (channel - 1))
        } else {
            ChannelMask::NONE
        }
    }

    /// Whether `channel` is a member.
    pub fn contains(self, channel: u8) -> bool {
        (1..=16).contains(&channel) && self.0 & (1 << (channel - 1)) != 0
    }

    /// Whether a channel selection is allowed by this mask. `Any` always is.
    pub fn allows(self, channel: Channel) -> bool {
        match channel {
            Channel::Any => true,
            Channel::Fixed(ch) => self.contains(ch),
        }
    }

    /// Whether every channel of `self` is also in `other`.
    pub fn is_subset_of(self, other: ChannelMask) -> bool {
        self.0 & !other.0 == 0
    }

    /// True when no channel is selected.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        ChannelMask::ALL_2_4GHZ
    }
}

// ============================================================================
// SSID
// ============================================================================

/// A network name of up to 32 bytes. Not required to be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Ssid(Vec<u8>);

impl Ssid {
    /// Create an SSID, rejecting names longer than 32 bytes.
    pub fn new(name: impl AsRef<[u8]>) -> Result<Self> {
        let name = name.as_ref();
        if name.len() > MAX_SSID_LEN {
            return Err(DriverError::InvalidArg);
        }
        Ok(Ssid(name.to_vec()))
    }

    /// Build from device bytes, truncating at 32 bytes.
    pub(crate) fn from_device(name: &[u8]) -> Self {
        Ssid(name[..name.len().min(MAX_SSID_LEN)].to_vec())
    }

    /// The raw name bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the empty name.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Ssid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

// ============================================================================
// BSS Context
// ============================================================================

/// The network to connect to, or to create in AP mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BssContext {
    /// Network name.
    pub ssid: Ssid,
    /// Restrict to one access point.
    pub bssid: Option<MacAddr>,
    /// Channel selection.
    pub channel: Channel,
    /// Hide the SSID when running as an AP.
    pub cloaked: bool,
}

impl BssContext {
    /// A context for `ssid` on any channel.
    pub fn new(ssid: impl AsRef<[u8]>) -> Result<Self> {
        Ok(BssContext {
            ssid: Ssid::new(ssid)?,
            ..Default::default()
        })
    }

    /// Set the channel.
    pub fn with_channel(mut self, channel: u8) -> Result<Self> {
        let channel = Channel::from_device(channel);
        if !channel.is_valid() {
            return Err(DriverError::InvalidArg);
        }
        self.channel = channel;
        Ok(self)
    }

    /// Set the BSSID. An all-zero address is rejected.
    pub fn with_bssid(mut self, bssid: MacAddr) -> Result<Self> {
        if bssid.is_zero() {
            return Err(DriverError::InvalidContext);
        }
        self.bssid = Some(bssid);
        Ok(self)
    }

    /// Set the cloaked flag.
    pub fn with_cloaked(mut self, cloaked: bool) -> Self {
        self.cloaked = cloaked;
        self
    }

    /// Validate the context. `require_ssid` rejects an empty name.
    pub fn is_valid(&self, require_ssid: bool) -> bool {
        if !self.channel.is_valid() || self.ssid.len() > MAX_SSID_LEN {
            return false;
        }
        if matches!(self.bssid, Some(bssid) if bssid.is_zero()) {
            return false;
        }
        !(require_ssid && self.ssid.is_empty())
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Authentication method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthType {
    /// No security.
    Open,
    /// WPA or WPA2 personal (mixed mode).
    WpaWpa2Personal,
    /// WPA2 personal.
    Wpa2Personal,
    /// WPA2 or WPA3 personal (transition mode).
    Wpa2Wpa3Personal,
    /// WPA3 personal (SAE).
    Wpa3Personal,
}

impl AuthType {
    /// Device security-type code.
    pub fn sec_type(self) -> u8 {
        match self {
            AuthType::Open => SEC_TYPE_OPEN,
            AuthType::WpaWpa2Personal => SEC_TYPE_WPA_WPA2_PERSONAL,
            AuthType::Wpa2Personal => SEC_TYPE_WPA2_PERSONAL,
            AuthType::Wpa2Wpa3Personal => SEC_TYPE_WPA2_WPA3_PERSONAL,
            AuthType::Wpa3Personal => SEC_TYPE_WPA3_PERSONAL,
        }
    }

    /// Recommended auth type for a security type reported by a scan.
    ///
    /// WEP and enterprise networks have no safe personal mapping and yield
    /// `None`.
    pub fn recommended_for(sec_type: u8) -> Option<Self> {
        const MAP: [Option<AuthType>; wincs_protocol::NUM_SEC_TYPES] = [
            Some(AuthType::Open),
            None,
            Some(AuthType::WpaWpa2Personal),
            Some(AuthType::Wpa2Personal),
            Some(AuthType::Wpa2Wpa3Personal),
            Some(AuthType::Wpa3Personal),
            None,
            None,
            None,
            None,
        ];
        MAP.get(sec_type as usize).copied().flatten()
    }
}

/// Management frame protection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MfpPolicy {
    /// MFP used when the peer supports it.
    #[default]
    Enabled,
    /// MFP required.
    Required,
    /// MFP disabled.
    Disabled,
}

impl MfpPolicy {
    pub(crate) fn to_device(self) -> i64 {
        match self {
            MfpPolicy::Enabled => MFP_TYPE_ENABLED,
            MfpPolicy::Required => MFP_TYPE_REQUIRED,
            MfpPolicy::Disabled => MFP_TYPE_DISABLED,
        }
    }
}

/// Authentication settings.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Authentication method.
    pub auth_type: AuthType,
    /// Passphrase for personal methods.
    pub password: Vec<u8>,
    /// MFP policy.
    pub mfp: MfpPolicy,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("auth_type", &self.auth_type)
            .field("password_len", &self.password.len())
            .field("mfp", &self.mfp)
            .finish()
    }
}

impl AuthContext {
    /// Open authentication.
    pub fn open() -> Self {
        AuthContext {
            auth_type: AuthType::Open,
            password: Vec::new(),
            mfp: MfpPolicy::Disabled,
        }
    }

    /// A personal (PSK/SAE) method with a passphrase.
    pub fn personal(auth_type: AuthType, password: impl AsRef<[u8]>) -> Result<Self> {
        let ctx = AuthContext {
            auth_type,
            password: password.as_ref().to_vec(),
            mfp: match auth_type {
                AuthType::Wpa3Personal => MfpPolicy::Required,
                _ => MfpPolicy::Enabled,
            },
        };
        if !ctx.is_valid() {
            return Err(DriverError::InvalidContext);
        }
        Ok(ctx)
    }

    /// Override the MFP policy.
    pub fn with_mfp(mut self, mfp: MfpPolicy) -> Self {
        self.mfp = mfp;
        self
    }

    /// Validate the passphrase against the method.
    ///
    /// WPA/WPA2 passphrases are 8..=63 printable ASCII characters or exactly
    /// 64 hex digits. WPA3-only passphrases are 1..=63 bytes. Open takes none.
    pub fn is_valid(&self) -> bool {
        let pw = &self.password;
        match self.auth_type {
            AuthType::Open => pw.is_empty(),
            AuthType::Wpa3Personal => (1..=63).contains(&pw.len()),
            AuthType::WpaWpa2Personal | AuthType::Wpa2Personal | AuthType::Wpa2Wpa3Personal => {
                if pw.len() == 64 {
                    pw.iter().all(u8::is_ascii_hexdigit)
                } else {
                    (8..=63).contains(&pw.len()) && pw.iter().all(|b| (0x20..=0x7E).contains(b))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_mask_membership() {
        let mask = ChannelMask::ALL_2_4GHZ;
        assert!(mask.contains(1));
        assert!(mask.contains(13));
        assert!(!mask.contains(14));
        assert!(!mask.contains(0));
        assert!(mask.allows(Channel::Any));
        assert!(ChannelMask::single(6).is_subset_of(mask));
        assert!(!ChannelMask(0x2000).is_subset_of(mask));
        assert_eq!(ChannelMask::single(14), ChannelMask::NONE);
    }

    #[test]
    fn test_bss_context_validation() {
        let bss = BssContext::new("Net1").unwrap().with_channel(6).unwrap();
        assert!(bss.is_valid(true));
        assert!(BssContext::new([b'x'; 33]).is_err());
        assert!(BssContext::new("Net1").unwrap().with_channel(14).is_err());
        assert!(!BssContext::default().is_valid(true));
        assert!(BssContext::default().is_valid(false));
        assert_eq!(
            BssContext::new("Net1")
                .unwrap()
                .with_bssid(MacAddr::default()),
            Err(DriverError::InvalidContext)
        );
    }

    #[test]
    fn test_auth_context_passphrase_rules() {
        assert!(AuthContext::open().is_valid());
        assert!(AuthContext::personal(AuthType::Wpa2Personal, "password123").is_ok());
        assert!(AuthContext::personal(AuthType::Wpa2Personal, "short").is_err());
        assert!(AuthContext::personal(AuthType::Wpa2Personal, "a".repeat(64)).is_ok());
        assert!(AuthContext::personal(AuthType::Wpa2Personal, "z".repeat(64)).is_err());
        assert!(AuthContext::personal(AuthType::Wpa3Personal, "pw").is_ok());

        let wpa3 = AuthContext::personal(AuthType::Wpa3Personal, "pw").unwrap();
        assert_eq!(wpa3.mfp, MfpPolicy::Required);
    }

    #[test]
    fn test_recommended_auth_map() {
        assert_eq!(AuthType::recommended_for(0), Some(AuthType::Open));
        assert_eq!(AuthType::recommended_for(1), None);
        assert_eq!(AuthType::recommended_for(3), Some(AuthType::Wpa2Personal));
        assert_eq!(AuthType::recommended_for(7), None);
        assert_eq!(AuthType::recommended_for(200), None);
    }
}
