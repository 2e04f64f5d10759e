//! The driver instance.
//!
//! A [`Driver`] owns one [`CommandEngine`], the per-instance control block
//! and the registered observers. Feature modules add their operations to it
//! in their own `impl` blocks; this module holds the lifecycle, the raw
//! request API and the dispatch loop that routes engine events back to the
//! feature that owns them.
//!
//! Nothing here blocks. The application calls [`Driver::poll`] (or
//! [`Driver::feed`] with bytes read elsewhere) and every observer runs from
//! inside that call.

use tracing::{debug, trace, warn};
use wincs_protocol::{
    ParamValue, ProtocolError, AEC_ASSOC, AEC_EXTCRYPTO, AEC_NETIFRX, AEC_OTA, AEC_OTAERR,
    AEC_PPS, AEC_WAPAIP, AEC_WAPSC, AEC_WAPSD, AEC_WPROVAT, AEC_WPROVDT, AEC_WSCNDONE,
    AEC_WSCNIND, AEC_WSTAAIP, AEC_WSTAERR, AEC_WSTALD, AEC_WSTALU, AEC_WSTAROAM,
};

use crate::config::DriverConfig;
use crate::control::{ControlBlock, Observers};
use crate::engine::{CommandEngine, EngineLimits};
use crate::error::{ConfigError, DriverError, Result, SubmitError, SubmitFailure, TransportError};
use crate::event::{EngineEvent, RequestEvent, RequestEventKind, UnsolicitedEvent};
use crate::observer::{ConnectionObserver, NetifObserver, RequestObserver, RssiObserver};
use crate::request::{CommandRequest, DeviceCommand, Dispatcher, RequestHandle};
use crate::transport::Transport;

/// Fail with [`ProtocolError::ParamCount`] unless `elems` holds exactly `n`
/// elements.
pub(crate) fn check_elems(elems: &[ParamValue], n: usize) -> std::result::Result<(), ProtocolError> {
    if elems.len() != n {
        return Err(ProtocolError::ParamCount {
            expected: n,
            actual: elems.len(),
        });
    }
    Ok(())
}

/// Host driver for one coprocessor.
///
/// ```rust,ignore
/// use wincs_driver::{AuthContext, BssContext, Driver, DriverConfig, StaConfig};
///
/// let mut driver = Driver::new(DriverConfig::default(), transport)?;
/// driver.open()?;
/// driver.set_connection_observer(Some(Box::new(|assoc, event| println!("{assoc}: {event:?}"))));
///
/// let bss = BssContext::new("Net1")?.with_channel(6)?;
/// driver.sta_connect(&bss, &AuthContext::open(), &StaConfig::default())?;
/// loop {
///     driver.poll()?;
/// }
/// ```
pub struct Driver<T> {
    pub(crate) config: DriverConfig,
    engine: CommandEngine<T>,
    pub(crate) ctrl: ControlBlock,
    pub(crate) observers: Observers,
    open: bool,
}

impl<T: Transport> Driver<T> {
    /// Create a closed driver. The configuration is validated first.
    pub fn new(config: DriverConfig, transport: T) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let engine = CommandEngine::new(transport, EngineLimits::from(&config));
        let ctrl = ControlBlock::new(&config);
        Ok(Driver {
            config,
            engine,
            ctrl,
            observers: Observers::default(),
            open: false,
        })
    }

    /// Open the driver. Every feature starts from its idle state.
    pub fn open(&mut self) -> Result<()> {
        if self.open {
            return Err(DriverError::RequestError);
        }
        self.ctrl = ControlBlock::new(&self.config);
        self.open = true;
        debug!("Driver: opened");
        Ok(())
    }

    /// Close the driver.
    ///
    /// Outstanding requests are completed as failed before the observers
    /// are dropped. Features see those completions with the driver already
    /// closed, so nothing new is sent.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.engine.fail_all();
        self.open = false;
        self.dispatch_pending();
        self.observers = Observers::default();
        debug!("Driver: closed");
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        self.engine.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.engine.transport_mut()
    }

    /// Requests awaiting device status.
    pub fn in_flight(&self) -> usize {
        self.engine.in_flight()
    }

    /// Read from the transport and dispatch everything decoded.
    ///
    /// Returns the number of events dispatched.
    pub fn poll(&mut self) -> std::result::Result<usize, TransportError> {
        if !self.open {
            return Ok(0);
        }
        self.engine.receive()?;
        Ok(self.dispatch_pending())
    }

    /// Decode bytes read outside the transport and dispatch the result.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        if !self.open {
            return 0;
        }
        self.engine.feed(bytes);
        self.dispatch_pending()
    }

    /// Fail every in-flight request, for use after the link was reset.
    ///
    /// Feature state is left alone; the device reports its own state changes
    /// once the link is back.
    pub fn reset_transport(&mut self) {
        debug!("Driver: transport reset, {} requests failed", self.engine.in_flight());
        self.engine.fail_all();
        self.dispatch_pending();
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub fn set_connection_observer(&mut self, observer: Option<Box<dyn ConnectionObserver>>) {
        self.observers.connection = observer;
    }

    pub fn set_rssi_observer(&mut self, observer: Option<Box<dyn RssiObserver>>) {
        self.observers.rssi = observer;
    }

    pub fn set_netif_observer(&mut self, observer: Option<Box<dyn NetifObserver>>) {
        self.observers.netif = observer;
    }

    /// Observer for requests built with [`begin_request`](Self::begin_request).
    pub fn set_request_observer(&mut self, observer: Option<Box<dyn RequestObserver>>) {
        self.observers.application = observer;
    }

    // ========================================================================
    // Raw requests
    // ========================================================================

    /// Start a request for up to `count` commands and `extra` bytes of
    /// string or byte-array data. Its events go to the request observer.
    pub fn begin_request(&mut self, count: usize, extra: usize, context: u32) -> Result<CommandRequest> {
        self.ensure_open()?;
        self.engine
            .begin_request(count, extra, Dispatcher::Application, context)
    }

    /// Send a request. On failure the request comes back inside the error
    /// and should be passed to [`discard`](Self::discard).
    pub fn submit(&mut self, req: CommandRequest) -> std::result::Result<RequestHandle, SubmitError> {
        if !self.open {
            return Err(SubmitError::new(SubmitFailure::NotOpen, req));
        }
        self.engine.submit(req)
    }

    /// Abandon an unsent request. Its completion is dispatched at once.
    pub fn discard(&mut self, req: CommandRequest) {
        self.engine.discard(req);
        self.dispatch_pending();
    }

    // ========================================================================
    // Internals shared by feature modules
    // ========================================================================

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(DriverError::NotOpen)
        }
    }

    /// Build and submit a feature request in one step.
    pub(crate) fn send_request(
        &mut self,
        dispatcher: Dispatcher,
        context: u32,
        commands: Vec<DeviceCommand>,
    ) -> Result<RequestHandle> {
        let extra = commands.iter().map(DeviceCommand::extra_len).sum();
        let mut req = self
            .engine
            .begin_request(commands.len(), extra, dispatcher, context)?;
        for command in commands {
            if let Err(e) = req.push(command) {
                warn!("Driver: {:?} request not built: {}", dispatcher, e);
                self.engine.discard(req);
                return Err(e.into());
            }
        }
        match self.engine.submit(req) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                warn!("Driver: {:?} request not sent: {}", dispatcher, e);
                self.engine.discard(e.into_request());
                Err(DriverError::RequestError)
            }
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn dispatch_pending(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.engine.next_event() {
            match event {
                EngineEvent::Request(event) => self.dispatch_request(&event),
                EngineEvent::Unsolicited(event) => self.dispatch_unsolicited(&event),
            }
            count += 1;
        }
        count
    }

    fn dispatch_request(&mut self, event: &RequestEvent) {
        if let RequestEventKind::StatusComplete {
            num_cmds,
            num_errors,
        } = event.kind
        {
            trace!(
                "Driver: {} complete ({:?}, {}/{} failed)",
                event.handle,
                event.dispatcher,
                num_errors,
                num_cmds
            );
        }
        match event.dispatcher {
            Dispatcher::Application => {
                if let Some(obs) = self.observers.application.as_mut() {
                    obs.on_request_event(event);
                }
            }
            Dispatcher::DeviceInfo => self.devinfo_request_event(event),
            Dispatcher::Station => self.sta_request_event(event),
            Dispatcher::SoftAp => self.ap_request_event(event),
            Dispatcher::Assoc => {
                if let RequestEventKind::CmdStatus { status, .. } = &event.kind {
                    if !status.is_ok() {
                        warn!("Assoc: RSSI query failed: {}", status);
                    }
                }
            }
            Dispatcher::Scan => self.scan_request_event(event),
            Dispatcher::Netif => self.netif_request_event(event),
            Dispatcher::Ota => self.ota_request_event(event),
            Dispatcher::Tls => self.tls_request_event(event),
            Dispatcher::CipherSuite => self.cipher_request_event(event),
            Dispatcher::Dhcps => self.dhcps_request_event(event),
            Dispatcher::Provisioning => self.prov_request_event(event),
            Dispatcher::ExtCrypto => self.extcrypto_request_event(event),
            Dispatcher::PowerSave => self.pps_request_event(event),
        }
    }

    fn dispatch_unsolicited(&mut self, event: &UnsolicitedEvent) {
        if !self.open {
            return;
        }
        let elems = event.elems.as_slice();
        let result = match event.aec_id {
            AEC_ASSOC => self.assoc_process_rssi(elems),
            AEC_WSTALU => self.sta_link_up(elems),
            AEC_WSTALD => self.sta_link_down(elems),
            AEC_WSTAERR => self.sta_connect_error(elems),
            AEC_WSTAROAM => self.sta_roamed(elems),
            AEC_WSTAAIP => self.sta_address_assigned(elems),
            AEC_WAPSC => self.ap_peer_joined(elems),
            AEC_WAPSD => self.ap_peer_left(elems),
            AEC_WAPAIP => self.ap_peer_address_assigned(elems),
            AEC_WSCNIND => self.scan_result_indication(elems),
            AEC_WSCNDONE => self.scan_done(elems),
            AEC_OTA | AEC_OTAERR => self.ota_process_event(elems),
            AEC_EXTCRYPTO => self.extcrypto_process_event(elems),
            AEC_NETIFRX => self.netif_rx(elems),
            AEC_WPROVAT => self.prov_attached(elems),
            AEC_WPROVDT => self.prov_detached(elems),
            AEC_PPS => self.pps_process_event(elems),
            other => {
                debug!("Driver: event 0x{:04X} not handled", other);
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("Driver: dropping malformed event 0x{:04X}: {}", event.aec_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;

    fn driver() -> (Driver<ChannelTransport>, ChannelTransport) {
        let (host, device) = ChannelTransport::new_pair();
        (Driver::new(DriverConfig::default(), host).unwrap(), device)
    }

    #[test]
    fn test_check_elems() {
        assert!(check_elems(&[ParamValue::Integer(1)], 1).is_ok());
        assert_eq!(
            check_elems(&[], 2),
            Err(ProtocolError::ParamCount {
                expected: 2,
                actual: 0
            })
        );
    }

    #[test]
    fn test_closed_driver_refuses_operations() {
        let (mut driver, _device) = driver();
        assert!(!driver.is_open());
        assert_eq!(driver.begin_request(1, 0, 0).err(), Some(DriverError::NotOpen));
        assert_eq!(driver.tls_open().err(), Some(DriverError::NotOpen));
        assert_eq!(driver.poll().unwrap(), 0);
    }

    #[test]
    fn test_open_twice_refused() {
        let (mut driver, _device) = driver();
        driver.open().unwrap();
        assert_eq!(driver.open(), Err(DriverError::RequestError));
        driver.close();
        assert!(driver.open().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (host, _device) = ChannelTransport::new_pair();
        let config = DriverConfig {
            num_tls_contexts: 0,
            ..DriverConfig::default()
        };
        assert!(Driver::new(config, host).is_err());
    }
}
