//! TLS cipher-suite lists.
//!
//! A cipher-suite context names a list of cipher suites on the device that
//! TLS contexts can select. Each slot allows one query or update at a time;
//! the pending token records which request it is waiting on so a late
//! completion always reaches the observer that started it.

use tracing::{debug, warn};
use wincs_protocol::{
    ParamValue, ProtocolError, CMD_TLSCSC, TLSCSC_CIPHER_SUITES, TLSCSC_CIPHER_SUITES_AVAIL,
    TLS_MAX_CIPHER_SUITES,
};

use crate::driver::{check_elems, Driver};
use crate::error::{DriverError, Result};
use crate::event::{RequestEvent, RequestEventKind};
use crate::observer::CipherSuiteObserver;
use crate::pool::pool_handle;
use crate::request::{DeviceCommand, Dispatcher, RequestHandle};
use crate::transport::Transport;

pool_handle!(
    /// Refers to an open cipher-suite context.
    CipherSuiteHandle
);

/// Which list a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuiteList {
    /// The suites currently configured.
    Current,
    /// Every suite the device supports.
    Available,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Query,
    Update,
}

struct PendingOp {
    request: RequestHandle,
    kind: PendingKind,
    observer: Option<Box<dyn CipherSuiteObserver>>,
}

/// Host-side state of one open cipher-suite context.
#[derive(Default)]
pub(crate) struct CipherSuiteContext {
    pending: Option<PendingOp>,
    /// Suites collected from query responses.
    suites: Vec<u16>,
    /// Count reported by the device for the current query.
    expected: Option<usize>,
}

impl<T: Transport> Driver<T> {
    /// Take a cipher-suite context from the pool.
    ///
    /// Returns `RetryRequest` when every context is in use.
    pub fn cipher_suite_open(&mut self) -> Result<CipherSuiteHandle> {
        self.ensure_open()?;
        let index = self
            .ctrl
            .cipher
            .acquire(CipherSuiteContext::default())
            .ok_or(DriverError::RetryRequest)?;
        match CipherSuiteHandle::from_index(index) {
            Some(handle) => Ok(handle),
            None => {
                self.ctrl.cipher.release(index);
                Err(DriverError::RetryRequest)
            }
        }
    }

    /// Return a cipher-suite context to the pool. No device command is sent.
    pub fn cipher_suite_close(&mut self, handle: CipherSuiteHandle) -> Result<()> {
        self.ensure_open()?;
        self.ctrl
            .cipher
            .release(handle.index())
            .ok_or(DriverError::InvalidArg)?;
        Ok(())
    }

    /// Replace the suites of a context.
    ///
    /// The outcome arrives through `observer` as `(handle, None, ok)`.
    /// Each suite the device refuses is reported first as
    /// `(handle, Some(&[suite]), false)`.
    pub fn cipher_suite_set(
        &mut self,
        handle: CipherSuiteHandle,
        suites: &[u16],
        observer: Option<Box<dyn CipherSuiteObserver>>,
    ) -> Result<()> {
        self.cipher_check_idle(handle)?;
        if suites.len() > TLS_MAX_CIPHER_SUITES || suites.len() >= self.config.max_request_commands {
            return Err(DriverError::InvalidArg);
        }
        let slot = i64::from(handle.value());
        let mut cmds = Vec::with_capacity(suites.len() + 1);
        cmds.push(DeviceCommand::config_at(CMD_TLSCSC, slot, TLSCSC_CIPHER_SUITES, 0i64));
        cmds.extend(suites.iter().map(|&suite| {
            DeviceCommand::config_at(CMD_TLSCSC, slot, TLSCSC_CIPHER_SUITES, i64::from(suite))
        }));
        let request = self.send_request(Dispatcher::CipherSuite, u32::from(handle.value()), cmds)?;
        debug!("Cipher: {} update with {} suites", handle, suites.len());
        self.cipher_set_pending(handle, request, PendingKind::Update, observer);
        Ok(())
    }

    /// Read a suite list. The result arrives through `observer`.
    pub fn cipher_suite_get(
        &mut self,
        handle: CipherSuiteHandle,
        list: CipherSuiteList,
        observer: Option<Box<dyn CipherSuiteObserver>>,
    ) -> Result<()> {
        self.cipher_check_idle(handle)?;
        let param_id = match list {
            CipherSuiteList::Current => TLSCSC_CIPHER_SUITES,
            CipherSuiteList::Available => TLSCSC_CIPHER_SUITES_AVAIL,
        };
        let cmd = DeviceCommand::new(
            CMD_TLSCSC,
            vec![
                ParamValue::Integer(handle.value().into()),
                ParamValue::Integer(param_id.into()),
            ],
        );
        let request = self.send_request(Dispatcher::CipherSuite, u32::from(handle.value()), vec![cmd])?;
        self.cipher_set_pending(handle, request, PendingKind::Query, observer);
        Ok(())
    }

    /// Whether a query or update is outstanding on `handle`.
    pub fn cipher_suite_is_busy(&self, handle: CipherSuiteHandle) -> bool {
        self.ctrl
            .cipher
            .get(handle.index())
            .is_some_and(|ctx| ctx.pending.is_some())
    }

    fn cipher_check_idle(&self, handle: CipherSuiteHandle) -> Result<()> {
        self.ensure_open()?;
        let ctx = self
            .ctrl
            .cipher
            .get(handle.index())
            .ok_or(DriverError::InvalidArg)?;
        if ctx.pending.is_some() {
            return Err(DriverError::RetryRequest);
        }
        Ok(())
    }

    fn cipher_set_pending(
        &mut self,
        handle: CipherSuiteHandle,
        request: RequestHandle,
        kind: PendingKind,
        observer: Option<Box<dyn CipherSuiteObserver>>,
    ) {
        if let Some(ctx) = self.ctrl.cipher.get_mut(handle.index()) {
            ctx.suites.clear();
            ctx.expected = None;
            ctx.pending = Some(PendingOp {
                request,
                kind,
                observer,
            });
        }
    }

    /// Clear the pending token if it belongs to `request`, returning it.
    fn cipher_take_pending(&mut self, handle: CipherSuiteHandle, request: RequestHandle) -> Option<PendingOp> {
        let ctx = self.ctrl.cipher.get_mut(handle.index())?;
        match &ctx.pending {
            Some(p) if p.request == request => ctx.pending.take(),
            _ => None,
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    pub(crate) fn cipher_request_event(&mut self, event: &RequestEvent) {
        let Some(handle) = usize::try_from(event.context)
            .ok()
            .and_then(|v| v.checked_sub(1))
            .and_then(CipherSuiteHandle::from_index)
        else {
            return;
        };
        let kind = match self.ctrl.cipher.get(handle.index()).and_then(|c| c.pending.as_ref()) {
            Some(p) if p.request == event.handle => p.kind,
            _ => {
                debug!("Cipher: {} event for stale request {}", handle, event.handle);
                return;
            }
        };

        match (&event.kind, kind) {
            (RequestEventKind::RspReceived { rsp_id, elems, .. }, PendingKind::Query)
                if *rsp_id == CMD_TLSCSC =>
            {
                if let Err(e) = self.cipher_process_rsp(handle, elems) {
                    warn!("Cipher: malformed response: {}", e);
                }
            }
            (RequestEventKind::CmdStatus { status, .. }, PendingKind::Query) => {
                let Some(mut pending) = self.cipher_take_pending(handle, event.handle) else {
                    return;
                };
                let Some(obs) = pending.observer.as_mut() else {
                    return;
                };
                if status.is_ok() {
                    let ctx = self.ctrl.cipher.get(handle.index());
                    let suites: &[u16] = ctx.map_or(&[], |c| {
                        let n = c.expected.unwrap_or(c.suites.len()).min(c.suites.len());
                        &c.suites[..n]
                    });
                    obs.on_cipher_suites(handle, Some(suites), true);
                } else {
                    warn!("Cipher: {} query failed: {}", handle, status);
                    obs.on_cipher_suites(handle, None, false);
                }
            }
            (RequestEventKind::CmdStatus { status, src, .. }, PendingKind::Update) => {
                // The first command clears the list; the rest each add one suite.
                if status.is_ok() || src.index == 0 {
                    return;
                }
                let suite = src
                    .params
                    .get(2)
                    .and_then(|p| p.as_int().ok())
                    .and_then(|v| u16::try_from(v).ok());
                warn!("Cipher: {} suite {:?} refused: {}", handle, suite, status);
                let Some(suite) = suite else {
                    return;
                };
                if let Some(obs) = self
                    .ctrl
                    .cipher
                    .get_mut(handle.index())
                    .and_then(|c| c.pending.as_mut())
                    .and_then(|p| p.observer.as_mut())
                {
                    obs.on_cipher_suites(handle, Some(&[suite]), false);
                }
            }
            (RequestEventKind::StatusComplete { num_errors, .. }, _) => {
                let Some(mut pending) = self.cipher_take_pending(handle, event.handle) else {
                    return;
                };
                // A query still pending here never got its status.
                let ok = pending.kind == PendingKind::Update && *num_errors == 0;
                if !ok {
                    warn!("Cipher: {} {:?} ended with {} errors", handle, pending.kind, num_errors);
                }
                if let Some(obs) = pending.observer.as_mut() {
                    obs.on_cipher_suites(handle, None, ok);
                }
            }
            _ => {}
        }
    }

    /// `TLSCSC` response: `(frac{slot, index}, value)`. Index -1 carries the
    /// number of suites.
    fn cipher_process_rsp(&mut self, handle: CipherSuiteHandle, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        check_elems(elems, 2)?;
        let (_, index) = elems[0].as_frac()?;
        let Some(ctx) = self.ctrl.cipher.get_mut(handle.index()) else {
            return Ok(());
        };
        if index == -1 {
            let count = usize::try_from(elems[1].as_int()?).unwrap_or(0);
            ctx.expected = Some(count.min(TLS_MAX_CIPHER_SUITES));
            return Ok(());
        }
        let Ok(index) = usize::try_from(index) else {
            return Ok(());
        };
        if index >= TLS_MAX_CIPHER_SUITES {
            return Ok(());
        }
        let suite = u16::try_from(elems[1].as_unsigned()?).unwrap_or(0);
        if ctx.suites.len() <= index {
            ctx.suites.resize(index + 1, 0);
        }
        ctx.suites[index] = suite;
        Ok(())
    }
}
