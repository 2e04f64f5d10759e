//! TLS contexts.
//!
//! The device holds a small number of TLS configurations. A context is
//! opened from the pool, programmed field by field, and referenced by other
//! features (OTA, sockets) through its [`TlsHandle`]. Closing only returns
//! the slot; the device configuration is left as it was.

use tracing::{debug, warn};
use wincs_protocol::{
    ParamValue, CMD_TLSC, TLSC_CA_CERT_NAME, TLSC_CERT_NAME, TLSC_CIPHER_SUITES_IDX,
    TLSC_DH_PARAM_NAME, TLSC_DOMAIN_NAME, TLSC_EXTCRYPTO_OPS, TLSC_PEER_AUTH,
    TLSC_PEER_DOMAIN_VERIFY, TLSC_PRI_KEY_NAME, TLSC_PRI_KEY_PASSWORD, TLSC_SERVER_NAME,
    TLS_NAME_MAX_LEN, TLS_PASSWORD_MAX_LEN, TLS_SERVER_NAME_MAX_LEN,
};

use crate::cipher::CipherSuiteHandle;
use crate::driver::Driver;
use crate::error::{DriverError, Result};
use crate::event::{RequestEvent, RequestEventKind};
use crate::observer::SignObserver;
use crate::pool::pool_handle;
use crate::request::{DeviceCommand, Dispatcher};
use crate::transport::Transport;

pool_handle!(
    /// Refers to an open TLS context.
    TlsHandle
);

/// Host-side state of one open TLS context.
#[derive(Default)]
pub(crate) struct TlsContext {
    pub(crate) sign_observer: Option<Box<dyn SignObserver>>,
}

impl<T: Transport> Driver<T> {
    /// Take a TLS context from the pool.
    ///
    /// Returns `RetryRequest` when every context is in use.
    pub fn tls_open(&mut self) -> Result<TlsHandle> {
        self.ensure_open()?;
        let index = self
            .ctrl
            .tls
            .acquire(TlsContext::default())
            .ok_or(DriverError::RetryRequest)?;
        match TlsHandle::from_index(index) {
            Some(handle) => {
                debug!(
                    "Tls: opened {} ({}/{} in use)",
                    handle,
                    self.ctrl.tls.in_use(),
                    self.ctrl.tls.capacity()
                );
                Ok(handle)
            }
            None => {
                self.ctrl.tls.release(index);
                Err(DriverError::RetryRequest)
            }
        }
    }

    /// Return a TLS context to the pool. No device command is sent.
    pub fn tls_close(&mut self, handle: TlsHandle) -> Result<()> {
        self.ensure_open()?;
        self.ctrl
            .tls
            .release(handle.index())
            .ok_or(DriverError::InvalidArg)?;
        debug!("Tls: closed {} ({} in use)", handle, self.ctrl.tls.in_use());
        Ok(())
    }

    /// Whether `handle` refers to an open context.
    pub fn tls_is_open(&self, handle: TlsHandle) -> bool {
        self.ctrl.tls.is_in_use(handle.index())
    }

    /// Set the CA certificate used to authenticate the peer.
    pub fn tls_ca_cert_set(&mut self, handle: TlsHandle, ca_cert: &str, peer_auth: bool) -> Result<()> {
        self.tls_check(handle)?;
        check_len(ca_cert, TLS_NAME_MAX_LEN)?;
        self.tls_send(
            handle,
            vec![
                tls_field(handle, TLSC_PEER_AUTH, peer_auth),
                tls_field(handle, TLSC_CA_CERT_NAME, ca_cert),
            ],
        )
    }

    /// Set the certificate presented to the peer.
    pub fn tls_cert_set(&mut self, handle: TlsHandle, cert: &str) -> Result<()> {
        self.tls_check(handle)?;
        check_len(cert, TLS_NAME_MAX_LEN)?;
        self.tls_send(handle, vec![tls_field(handle, TLSC_CERT_NAME, cert)])
    }

    /// Set the private key, and its password if it is encrypted.
    pub fn tls_private_key_set(
        &mut self,
        handle: TlsHandle,
        key: &str,
        password: Option<&str>,
    ) -> Result<()> {
        self.tls_check(handle)?;
        check_len(key, TLS_NAME_MAX_LEN)?;
        let password = password.unwrap_or("");
        check_len(password, TLS_PASSWORD_MAX_LEN)?;
        self.tls_send(
            handle,
            vec![
                tls_field(handle, TLSC_PRI_KEY_NAME, key),
                tls_field(handle, TLSC_PRI_KEY_PASSWORD, password),
            ],
        )
    }

    /// Set the Diffie-Hellman parameters file.
    pub fn tls_dh_params_set(&mut self, handle: TlsHandle, dh_params: &str) -> Result<()> {
        self.tls_check(handle)?;
        check_len(dh_params, TLS_NAME_MAX_LEN)?;
        self.tls_send(handle, vec![tls_field(handle, TLSC_DH_PARAM_NAME, dh_params)])
    }

    /// Set the server name sent in the SNI extension.
    pub fn tls_sni_set(&mut self, handle: TlsHandle, server_name: &str) -> Result<()> {
        self.tls_check(handle)?;
        check_len(server_name, TLS_SERVER_NAME_MAX_LEN)?;
        self.tls_send(handle, vec![tls_field(handle, TLSC_SERVER_NAME, server_name)])
    }

    /// Configure peer hostname checking.
    ///
    /// `verify` requires `domain`.
    pub fn tls_hostname_check_set(
        &mut self,
        handle: TlsHandle,
        domain: Option<&str>,
        verify: bool,
    ) -> Result<()> {
        self.tls_check(handle)?;
        if verify && domain.is_none() {
            return Err(DriverError::InvalidArg);
        }
        if let Some(domain) = domain {
            check_len(domain, TLS_SERVER_NAME_MAX_LEN)?;
        }
        let mut cmds = vec![tls_field(handle, TLSC_PEER_DOMAIN_VERIFY, verify)];
        if let Some(domain) = domain {
            cmds.push(tls_field(handle, TLSC_DOMAIN_NAME, domain));
        }
        self.tls_send(handle, cmds)
    }

    /// Route signing with this context's key to `observer`.
    ///
    /// `None` hands signing back to the device.
    pub fn tls_sign_observer_set(
        &mut self,
        handle: TlsHandle,
        observer: Option<Box<dyn SignObserver>>,
    ) -> Result<()> {
        self.tls_check(handle)?;
        let ops = i64::from(observer.is_some());
        if let Some(ctx) = self.ctrl.tls.get_mut(handle.index()) {
            ctx.sign_observer = observer;
        }
        self.tls_send(handle, vec![tls_field(handle, TLSC_EXTCRYPTO_OPS, ops)])
    }

    /// Select the cipher-suite list this context uses.
    pub fn tls_cipher_suite_set(&mut self, handle: TlsHandle, suites: CipherSuiteHandle) -> Result<()> {
        self.tls_check(handle)?;
        if !self.ctrl.cipher.is_in_use(suites.index()) {
            return Err(DriverError::InvalidArg);
        }
        self.tls_send(
            handle,
            vec![tls_field(handle, TLSC_CIPHER_SUITES_IDX, i64::from(suites.value()))],
        )
    }

    fn tls_check(&self, handle: TlsHandle) -> Result<()> {
        self.ensure_open()?;
        if !self.tls_is_open(handle) {
            return Err(DriverError::InvalidArg);
        }
        Ok(())
    }

    fn tls_send(&mut self, handle: TlsHandle, cmds: Vec<DeviceCommand>) -> Result<()> {
        self.send_request(Dispatcher::Tls, u32::from(handle.value()), cmds)?;
        Ok(())
    }

    pub(crate) fn tls_request_event(&mut self, event: &RequestEvent) {
        if let RequestEventKind::CmdStatus { status, src, .. } = &event.kind {
            if !status.is_ok() {
                warn!(
                    "Tls: context {} field update failed: {}",
                    event.context, status
                );
                debug!("Tls: failed command params {:?}", src.params);
            }
        }
    }
}

fn tls_field(handle: TlsHandle, param_id: i32, value: impl Into<ParamValue>) -> DeviceCommand {
    DeviceCommand::config_at(CMD_TLSC, i64::from(handle.value()), param_id, value)
}

fn check_len(value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(DriverError::InvalidArg);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_command_shape() {
        let handle = TlsHandle::from_index(1).unwrap();
        let cmd = tls_field(handle, TLSC_SERVER_NAME, "example.com");
        assert_eq!(cmd.cmd_id, CMD_TLSC);
        assert_eq!(cmd.params[0], ParamValue::Integer(2));
        assert_eq!(cmd.params[1], ParamValue::Integer(TLSC_SERVER_NAME.into()));
        assert_eq!(cmd.params[2], ParamValue::string("example.com"));
    }

    #[test]
    fn test_length_limits() {
        assert!(check_len(&"a".repeat(32), TLS_NAME_MAX_LEN).is_ok());
        assert_eq!(
            check_len(&"a".repeat(33), TLS_NAME_MAX_LEN),
            Err(DriverError::InvalidArg)
        );
    }
}
