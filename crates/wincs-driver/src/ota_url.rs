//! Firmware download URLs.
//!
//! Splits an `http`/`https` URL into the pieces the device's OTA client is
//! programmed with: host, port, directory path and file name.

use std::net::{Ipv4Addr, Ipv6Addr};

use tracing::{debug, warn};
use url::{Host, Url};

use crate::error::{DriverError, Result};

/// Download scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlScheme {
    Http,
    Https,
}

impl UrlScheme {
    /// Port used when the URL names none.
    pub fn default_port(self) -> u16 {
        match self {
            UrlScheme::Http => 80,
            UrlScheme::Https => 443,
        }
    }
}

/// Server host of a download URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlHost {
    Domain(String),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
}

impl std::fmt::Display for UrlHost {
    /// Formats the host as sent to the device; IPv6 without brackets.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlHost::Domain(name) => write!(f, "{}", name),
            UrlHost::Ipv4(addr) => write!(f, "{}", addr),
            UrlHost::Ipv6(addr) => write!(f, "{}", addr),
        }
    }
}

/// A parsed firmware download URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaUrl {
    pub scheme: UrlScheme,
    /// Userinfo, if present. Not sent to the device.
    pub userinfo: Option<String>,
    pub host: UrlHost,
    pub port: u16,
    /// Directory part of the path including the trailing `/`. May be empty.
    pub path: String,
    /// Final path segment. May be empty.
    pub file: String,
}

impl OtaUrl {
    /// Parse a download URL.
    ///
    /// Fails with `InvalidArg` for malformed URLs, schemes other than `http`
    /// and `https`, and URLs without a host.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| {
            warn!("Ota: invalid URL '{}': {}", input, e);
            DriverError::InvalidArg
        })?;

        let scheme = match url.scheme() {
            "https" => UrlScheme::Https,
            "http" => UrlScheme::Http,
            other => {
                warn!("Ota: scheme '{}' not supported", other);
                return Err(DriverError::InvalidArg);
            }
        };

        let host = match url.host() {
            Some(Host::Domain(name)) if !name.is_empty() => UrlHost::Domain(name.to_string()),
            Some(Host::Ipv4(addr)) => UrlHost::Ipv4(addr),
            Some(Host::Ipv6(addr)) => UrlHost::Ipv6(addr),
            _ => return Err(DriverError::InvalidArg),
        };

        let userinfo = match (url.username(), url.password()) {
            ("", None) => None,
            (user, None) => Some(user.to_string()),
            (user, Some(pass)) => Some(format!("{}:{}", user, pass)),
        };

        let port = match url.port() {
            Some(0) | None => scheme.default_port(),
            Some(port) => port,
        };

        let full_path = url.path();
        let (path, file) = match full_path.rfind('/') {
            Some(i) => (&full_path[..=i], &full_path[i + 1..]),
            None => ("", full_path),
        };

        let parsed = OtaUrl {
            scheme,
            userinfo,
            host,
            port,
            path: path.to_string(),
            file: file.to_string(),
        };
        debug!(
            "Ota: URL host={} port={} path='{}' file='{}'",
            parsed.host, parsed.port, parsed.path, parsed.file
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_with_explicit_port() {
        let url = OtaUrl::parse("https://cdn.example.com:443/fw/v2.bin").unwrap();
        assert_eq!(url.scheme, UrlScheme::Https);
        assert_eq!(url.host, UrlHost::Domain("cdn.example.com".into()));
        assert_eq!(url.port, 443);
        assert_eq!(url.path, "/fw/");
        assert_eq!(url.file, "v2.bin");
        assert_eq!(url.userinfo, None);
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(OtaUrl::parse("http://h/a.bin").unwrap().port, 80);
        assert_eq!(OtaUrl::parse("https://h/a.bin").unwrap().port, 443);
        assert_eq!(OtaUrl::parse("http://h:8080/a.bin").unwrap().port, 8080);
    }

    #[test]
    fn test_query_and_fragment_dropped() {
        let url = OtaUrl::parse("http://h/dir/sub/img.bin?x=1#frag").unwrap();
        assert_eq!(url.path, "/dir/sub/");
        assert_eq!(url.file, "img.bin");
    }

    #[test]
    fn test_userinfo_and_ipv6_host() {
        let url = OtaUrl::parse("https://user:pw@[fe80::1]:8443/img.bin").unwrap();
        assert_eq!(url.userinfo.as_deref(), Some("user:pw"));
        assert_eq!(url.host.to_string(), "fe80::1");
        assert_eq!(url.port, 8443);
        assert_eq!(url.path, "/");
        assert_eq!(url.file, "img.bin");
    }

    #[test]
    fn test_ipv4_host() {
        let url = OtaUrl::parse("http://192.168.1.10/fw.bin").unwrap();
        assert_eq!(url.host, UrlHost::Ipv4(Ipv4Addr::new(192, 168, 1, 10)));
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert_eq!(OtaUrl::parse("ftp://h/a.bin"), Err(DriverError::InvalidArg));
        assert_eq!(OtaUrl::parse("no scheme"), Err(DriverError::InvalidArg));
        assert_eq!(OtaUrl::parse("https://[::1/a.bin"), Err(DriverError::InvalidArg));
    }
}
