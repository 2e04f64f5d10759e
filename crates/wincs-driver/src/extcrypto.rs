//! External signing relay.
//!
//! When a TLS context's private key lives on the host, the device asks the
//! host to sign the handshake digest. The request is routed to the sign
//! observer of that TLS context, and the signature goes back with
//! [`Driver::extcrypto_sign_result`].

use bytes::Bytes;
use tracing::{debug, warn};
use wincs_protocol::{
    ParamValue, ProtocolError, CMD_EXTCRYPTO, EXTCRYPTO_CURVE_SECP256R1, EXTCRYPTO_CURVE_SECP384R1,
    EXTCRYPTO_CURVE_SECP521R1, EXTCRYPTO_OP_SIGN, EXTCRYPTO_SIGN_ECDSA, EXTCRYPTO_SRC_TLSC,
    EXTCRYPTO_STATUS_FAILURE, EXTCRYPTO_STATUS_SUCCESS,
};

use crate::driver::{check_elems, Driver};
use crate::error::{DriverError, Result};
use crate::event::{RequestEvent, RequestEventKind};
use crate::request::{DeviceCommand, Dispatcher};
use crate::tls::TlsHandle;
use crate::transport::Transport;

/// ECDSA curve of a signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    Secp256r1,
    Secp384r1,
    Secp521r1,
}

impl EcCurve {
    fn from_device(curve: i64) -> Option<Self> {
        match curve {
            EXTCRYPTO_CURVE_SECP256R1 => Some(EcCurve::Secp256r1),
            EXTCRYPTO_CURVE_SECP384R1 => Some(EcCurve::Secp384r1),
            EXTCRYPTO_CURVE_SECP521R1 => Some(EcCurve::Secp521r1),
            _ => None,
        }
    }
}

/// A request to sign `data` with the key of a TLS context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    /// Pass back to [`Driver::extcrypto_sign_result`].
    pub context: u16,
    pub curve: EcCurve,
    /// The digest to sign.
    pub data: Bytes,
}

impl<T: Transport> Driver<T> {
    /// Return the result of a signing request.
    ///
    /// A successful result must carry a signature.
    pub fn extcrypto_sign_result(
        &mut self,
        context: u32,
        ok: bool,
        signature: Option<&[u8]>,
    ) -> Result<()> {
        if ok && signature.is_none() {
            return Err(DriverError::InvalidArg);
        }
        let context = u16::try_from(context).map_err(|_| DriverError::InvalidArg)?;
        self.ensure_open()?;

        let status = if ok {
            EXTCRYPTO_STATUS_SUCCESS
        } else {
            EXTCRYPTO_STATUS_FAILURE
        };
        let mut params = vec![
            ParamValue::Unsigned(context.into()),
            ParamValue::Integer(status),
        ];
        if let Some(signature) = signature {
            params.push(ParamValue::bytes(signature));
        }
        self.send_request(
            Dispatcher::ExtCrypto,
            u32::from(context),
            vec![DeviceCommand::new(CMD_EXTCRYPTO, params)],
        )?;
        debug!("ExtCrypto: result for context {} sent (ok={})", context, ok);
        Ok(())
    }

    pub(crate) fn extcrypto_request_event(&mut self, event: &RequestEvent) {
        if let RequestEventKind::CmdStatus { status, .. } = &event.kind {
            if !status.is_ok() {
                warn!("ExtCrypto: result for context {} refused: {}", event.context, status);
            }
        }
    }

    /// `EXTCRYPTO`: `(context, op, src_type, src_id, sign_type, curve, data)`.
    pub(crate) fn extcrypto_process_event(&mut self, elems: &[ParamValue]) -> std::result::Result<(), ProtocolError> {
        if elems.len() < 2 {
            return Err(ProtocolError::ParamCount {
                expected: 2,
                actual: elems.len(),
            });
        }
        let context = elems[0].as_unsigned()?;
        let op = elems[1].as_int()?;
        if op != EXTCRYPTO_OP_SIGN {
            debug!("ExtCrypto: op type {} not handled", op);
            return Ok(());
        }
        check_elems(elems, 7)?;
        let src_type = elems[2].as_int()?;
        let src_id = elems[3].as_int()?;
        let sign_type = elems[4].as_int()?;
        let curve = elems[5].as_int()?;
        let data = Bytes::copy_from_slice(elems[6].as_bytes()?);

        if src_type != EXTCRYPTO_SRC_TLSC || sign_type != EXTCRYPTO_SIGN_ECDSA {
            debug!("ExtCrypto: source {} sign type {} not handled", src_type, sign_type);
            return Ok(());
        }
        let Some(curve) = EcCurve::from_device(curve) else {
            debug!("ExtCrypto: curve {} not handled", curve);
            return Ok(());
        };
        let Ok(context) = u16::try_from(context) else {
            warn!("ExtCrypto: context {} out of range", context);
            return Ok(());
        };
        let Some(tls) = usize::try_from(src_id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(TlsHandle::from_index)
        else {
            return Ok(());
        };

        let request = SignRequest {
            context,
            curve,
            data,
        };
        match self
            .ctrl
            .tls
            .get_mut(tls.index())
            .and_then(|ctx| ctx.sign_observer.as_mut())
        {
            Some(obs) => obs.on_sign_request(tls, &request),
            None => debug!("ExtCrypto: no sign observer on {}", tls),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_mapping() {
        assert_eq!(EcCurve::from_device(23), Some(EcCurve::Secp256r1));
        assert_eq!(EcCurve::from_device(25), Some(EcCurve::Secp521r1));
        assert_eq!(EcCurve::from_device(29), None);
    }
}
