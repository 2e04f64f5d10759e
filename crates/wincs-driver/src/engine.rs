//! Command engine.
//!
//! Turns [`CommandRequest`]s into framed commands, correlates device status
//! and responses back to the request that produced them, and queues the
//! resulting [`EngineEvent`]s for the dispatch loop.
//!
//! Every request that leaves [`CommandEngine::begin_request`] produces exactly
//! one `StatusComplete`, whether it is acknowledged, discarded or failed by a
//! transport reset. `StatusComplete` is always the last event of its request.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace, warn};
use wincs_protocol::{
    CommandFrame, DeviceMessage, DeviceStatus, FrameCodec, ParamValue, ProtocolError,
};

use crate::config::DriverConfig;
use crate::error::{DriverError, Result, SubmitError, SubmitFailure, TransportError};
use crate::event::{EngineEvent, RequestEvent, RequestEventKind, SourceCommand, UnsolicitedEvent};
use crate::request::{CommandRequest, DeviceCommand, Dispatcher, RequestHandle};
use crate::transport::Transport;

/// Sizing limits for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    pub max_in_flight: usize,
    pub max_commands: usize,
    pub max_extra: usize,
}

impl From<&DriverConfig> for EngineLimits {
    fn from(config: &DriverConfig) -> Self {
        EngineLimits {
            max_in_flight: config.max_inflight_requests,
            max_commands: config.max_request_commands,
            max_extra: config.max_request_extra,
        }
    }
}

/// A submitted request awaiting device status.
#[derive(Debug)]
struct InFlight {
    dispatcher: Dispatcher,
    context: u32,
    commands: Vec<DeviceCommand>,
    remaining: usize,
    num_errors: usize,
}

impl InFlight {
    fn source(&self, index: usize) -> SourceCommand {
        let (cmd_id, params) = match self.commands.get(index) {
            Some(cmd) => (cmd.cmd_id, cmd.params.clone()),
            None => (0, Vec::new()),
        };
        SourceCommand {
            index,
            cmd_id,
            params,
        }
    }
}

/// The request/response engine over one transport.
pub struct CommandEngine<T> {
    transport: T,
    codec: FrameCodec,
    rx_buf: Vec<u8>,
    limits: EngineLimits,
    next_handle: u32,
    next_seq: u16,
    in_flight: HashMap<RequestHandle, InFlight>,
    by_seq: HashMap<u16, (RequestHandle, usize)>,
    events: VecDeque<EngineEvent>,
}

impl<T: Transport> CommandEngine<T> {
    pub fn new(transport: T, limits: EngineLimits) -> Self {
        CommandEngine {
            transport,
            codec: FrameCodec::new(),
            rx_buf: Vec::new(),
            limits,
            next_handle: 1,
            next_seq: 1,
            in_flight: HashMap::new(),
            by_seq: HashMap::new(),
            events: VecDeque::new(),
        }
    }

    pub fn limits(&self) -> EngineLimits {
        self.limits
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Requests currently awaiting status.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether `handle` is awaiting status.
    pub fn is_in_flight(&self, handle: RequestHandle) -> bool {
        self.in_flight.contains_key(&handle)
    }

    /// Start a request for up to `count` commands and `extra` bytes of data.
    pub fn begin_request(
        &mut self,
        count: usize,
        extra: usize,
        dispatcher: Dispatcher,
        context: u32,
    ) -> Result<CommandRequest> {
        if count == 0 || count > self.limits.max_commands || extra > self.limits.max_extra {
            return Err(DriverError::InvalidArg);
        }
        if self.in_flight.len() >= self.limits.max_in_flight {
            return Err(DriverError::RetryRequest);
        }
        let handle = RequestHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        Ok(CommandRequest::new(handle, count, extra, dispatcher, context))
    }

    /// Frame and send every command of `req`.
    ///
    /// On failure the request is handed back inside the error and must be
    /// passed to [`discard`](Self::discard).
    pub fn submit(&mut self, req: CommandRequest) -> std::result::Result<RequestHandle, SubmitError> {
        if req.is_empty() {
            return Err(SubmitError::new(SubmitFailure::Empty, req));
        }
        if self.in_flight.len() >= self.limits.max_in_flight {
            return Err(SubmitError::new(SubmitFailure::TooManyInFlight, req));
        }

        let (seqs, frames) = match self.encode_request(&req) {
            Ok(encoded) => encoded,
            Err(e) => {
                return Err(SubmitError::new(
                    SubmitFailure::Transport(TransportError::Encode(e)),
                    req,
                ))
            }
        };

        for frame in &frames {
            if let Err(e) = self.transport.send(frame) {
                warn!("Engine: send failed for {}: {}", req.handle(), e);
                return Err(SubmitError::new(SubmitFailure::Transport(e), req));
            }
        }
        if let Some(last) = seqs.last() {
            self.next_seq = last.wrapping_add(1);
        }

        let handle = req.handle();
        let dispatcher = req.dispatcher();
        let context = req.context();
        let commands = req.into_commands();
        for (index, seq) in seqs.iter().enumerate() {
            self.by_seq.insert(*seq, (handle, index));
        }
        debug!(
            "Engine: submitted {} ({:?}, {} commands)",
            handle,
            dispatcher,
            commands.len()
        );
        self.in_flight.insert(
            handle,
            InFlight {
                dispatcher,
                context,
                remaining: commands.len(),
                num_errors: 0,
                commands,
            },
        );
        self.push_request(handle, dispatcher, context, RequestEventKind::TxComplete);
        Ok(handle)
    }

    /// Abandon a request that was never submitted. Its dispatcher still sees
    /// a `StatusComplete`, with every command counted as an error.
    pub fn discard(&mut self, req: CommandRequest) {
        let n = req.len();
        debug!("Engine: discarding {} ({} commands)", req.handle(), n);
        self.push_request(
            req.handle(),
            req.dispatcher(),
            req.context(),
            RequestEventKind::StatusComplete {
                num_cmds: n,
                num_errors: n,
            },
        );
    }

    /// Pull whatever the transport has and decode it.
    pub fn receive(&mut self) -> std::result::Result<usize, TransportError> {
        self.rx_buf.clear();
        let n = self.transport.receive(&mut self.rx_buf)?;
        if n > 0 {
            self.codec.push(&self.rx_buf);
            self.drain_codec();
        }
        Ok(n)
    }

    /// Decode bytes delivered by the caller instead of the transport.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.codec.push(bytes);
        self.drain_codec();
    }

    /// Next queued event.
    pub fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.pop_front()
    }

    /// Complete every in-flight request as failed and drop partial input.
    pub fn fail_all(&mut self) {
        let mut handles: Vec<RequestHandle> = self.in_flight.keys().copied().collect();
        handles.sort();
        for handle in handles {
            if let Some(rec) = self.in_flight.remove(&handle) {
                debug!(
                    "Engine: failing {} with {} commands unacknowledged",
                    handle, rec.remaining
                );
                self.push_request(
                    handle,
                    rec.dispatcher,
                    rec.context,
                    RequestEventKind::StatusComplete {
                        num_cmds: rec.commands.len(),
                        num_errors: rec.num_errors + rec.remaining,
                    },
                );
            }
        }
        self.by_seq.clear();
        self.codec.clear();
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    fn drain_codec(&mut self) {
        loop {
            match self.codec.next_message() {
                Ok(Some(msg)) => self.process_message(msg),
                Ok(None) => break,
                Err(e) => warn!("Engine: dropping undecodable frame: {}", e),
            }
        }
    }

    fn process_message(&mut self, msg: DeviceMessage) {
        match msg {
            DeviceMessage::Status {
                seq,
                cmd_id,
                status,
            } => self.process_status(seq, cmd_id, status),
            DeviceMessage::Response { seq, rsp_id, elems } => {
                self.process_response(seq, rsp_id, elems)
            }
            DeviceMessage::Event { aec_id, elems } => {
                trace!("Engine: event 0x{:04X} ({} elems)", aec_id, elems.len());
                self.events
                    .push_back(EngineEvent::Unsolicited(UnsolicitedEvent { aec_id, elems }));
            }
        }
    }

    fn process_status(&mut self, seq: u16, cmd_id: u16, status: DeviceStatus) {
        let Some((handle, index)) = self.by_seq.remove(&seq) else {
            warn!("Engine: status for unknown seq {} (cmd 0x{:04X})", seq, cmd_id);
            return;
        };
        let Some(rec) = self.in_flight.get_mut(&handle) else {
            warn!("Engine: status for released {} (seq {})", handle, seq);
            return;
        };
        let src = rec.source(index);
        if src.cmd_id != cmd_id {
            warn!(
                "Engine: status cmd 0x{:04X} does not match sent 0x{:04X} (seq {})",
                cmd_id, src.cmd_id, seq
            );
        }
        rec.remaining = rec.remaining.saturating_sub(1);
        if !status.is_ok() {
            rec.num_errors += 1;
        }
        let (dispatcher, context) = (rec.dispatcher, rec.context);
        let done = rec.remaining == 0;
        trace!("Engine: {} seq {} status {}", handle, seq, status);
        self.push_request(
            handle,
            dispatcher,
            context,
            RequestEventKind::CmdStatus { seq, status, src },
        );

        if done {
            if let Some(rec) = self.in_flight.remove(&handle) {
                self.push_request(
                    handle,
                    dispatcher,
                    context,
                    RequestEventKind::StatusComplete {
                        num_cmds: rec.commands.len(),
                        num_errors: rec.num_errors,
                    },
                );
            }
        }
    }

    fn process_response(&mut self, seq: u16, rsp_id: u16, elems: Vec<ParamValue>) {
        let Some(&(handle, index)) = self.by_seq.get(&seq) else {
            warn!("Engine: response for unknown seq {} (rsp 0x{:04X})", seq, rsp_id);
            return;
        };
        let Some(rec) = self.in_flight.get(&handle) else {
            return;
        };
        let src = rec.source(index);
        let (dispatcher, context) = (rec.dispatcher, rec.context);
        self.push_request(
            handle,
            dispatcher,
            context,
            RequestEventKind::RspReceived { rsp_id, elems, src },
        );
    }

    fn push_request(
        &mut self,
        handle: RequestHandle,
        dispatcher: Dispatcher,
        context: u32,
        kind: RequestEventKind,
    ) {
        self.events.push_back(EngineEvent::Request(RequestEvent {
            handle,
            dispatcher,
            context,
            kind,
        }));
    }

    /// Assign sequence numbers and frame every command of `req`.
    fn encode_request(
        &self,
        req: &CommandRequest,
    ) -> std::result::Result<(Vec<u16>, Vec<Vec<u8>>), ProtocolError> {
        let mut frames = Vec::with_capacity(req.len());
        let mut seqs = Vec::with_capacity(req.len());
        let mut seq = self.next_seq;
        for cmd in req.commands() {
            seq = self.free_seq(seq, &seqs);
            let body = CommandFrame::new(seq, cmd.cmd_id, cmd.params.clone()).encode();
            frames.push(self.codec.encode_frame(&body)?);
            seqs.push(seq);
            seq = seq.wrapping_add(1);
        }
        Ok((seqs, frames))
    }

    /// First sequence number at or after `seq` not awaiting status.
    fn free_seq(&self, mut seq: u16, reserved: &[u16]) -> u16 {
        for _ in 0..=u16::MAX {
            if !self.by_seq.contains_key(&seq) && !reserved.contains(&seq) {
                break;
            }
            seq = seq.wrapping_add(1);
        }
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use wincs_protocol::{LinkSide, CMD_WSTA, CMD_WSTAC, MSG_KIND_STATUS};

    fn limits() -> EngineLimits {
        EngineLimits {
            max_in_flight: 2,
            max_commands: 4,
            max_extra: 64,
        }
    }

    fn setup() -> (CommandEngine<ChannelTransport>, ChannelTransport) {
        let (host, device) = ChannelTransport::new_pair();
        (CommandEngine::new(host, limits()), device)
    }

    fn device_frame(msg: &DeviceMessage) -> Vec<u8> {
        FrameCodec::with_side(LinkSide::Device)
            .encode_frame(&msg.encode())
            .unwrap()
    }

    fn sent_commands(device: &ChannelTransport) -> Vec<CommandFrame> {
        let mut codec = FrameCodec::with_side(LinkSide::Device);
        while let Some(chunk) = device.try_recv() {
            codec.push(&chunk);
        }
        let mut out = Vec::new();
        while let Some(cmd) = codec.next_command().unwrap() {
            out.push(cmd);
        }
        out
    }

    fn drain(engine: &mut CommandEngine<ChannelTransport>) -> Vec<EngineEvent> {
        std::iter::from_fn(|| engine.next_event()).collect()
    }

    fn submit_two(engine: &mut CommandEngine<ChannelTransport>) -> RequestHandle {
        let mut req = engine
            .begin_request(2, 16, Dispatcher::Application, 7)
            .unwrap();
        req.append_command(CMD_WSTAC, vec![ParamValue::Integer(1), ParamValue::string("net")])
            .unwrap();
        req.append_command(CMD_WSTA, vec![ParamValue::Integer(1)]).unwrap();
        engine.submit(req).unwrap()
    }

    #[test]
    fn test_begin_request_limits() {
        let (mut engine, _device) = setup();
        assert_eq!(
            engine.begin_request(0, 0, Dispatcher::Application, 0).unwrap_err(),
            DriverError::InvalidArg
        );
        assert_eq!(
            engine.begin_request(5, 0, Dispatcher::Application, 0).unwrap_err(),
            DriverError::InvalidArg
        );
        assert_eq!(
            engine.begin_request(1, 65, Dispatcher::Application, 0).unwrap_err(),
            DriverError::InvalidArg
        );
        submit_two(&mut engine);
        submit_two(&mut engine);
        assert_eq!(
            engine.begin_request(1, 0, Dispatcher::Application, 0).unwrap_err(),
            DriverError::RetryRequest
        );
    }

    #[test]
    fn test_status_correlation_and_completion_order() {
        let (mut engine, device) = setup();
        let handle = submit_two(&mut engine);
        let cmds = sent_commands(&device);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].cmd_id, CMD_WSTAC);
        assert_ne!(cmds[0].seq, cmds[1].seq);

        let mut events = drain(&mut engine);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events.remove(0),
            EngineEvent::Request(RequestEvent { kind: RequestEventKind::TxComplete, context: 7, .. })
        ));

        let mut input = device_frame(&DeviceMessage::Response {
            seq: cmds[1].seq,
            rsp_id: CMD_WSTA,
            elems: vec![ParamValue::Integer(3)],
        });
        input.extend(device_frame(&DeviceMessage::Status {
            seq: cmds[1].seq,
            cmd_id: CMD_WSTA,
            status: DeviceStatus::Error,
        }));
        input.extend(device_frame(&DeviceMessage::Status {
            seq: cmds[0].seq,
            cmd_id: CMD_WSTAC,
            status: DeviceStatus::Ok,
        }));
        engine.feed(&input);

        let kinds: Vec<RequestEventKind> = drain(&mut engine)
            .into_iter()
            .map(|e| match e {
                EngineEvent::Request(r) => {
                    assert_eq!(r.handle, handle);
                    r.kind
                }
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(kinds.len(), 4);
        assert!(matches!(&kinds[0], RequestEventKind::RspReceived { src, .. } if src.index == 1));
        assert!(matches!(
            &kinds[1],
            RequestEventKind::CmdStatus { status: DeviceStatus::Error, src, .. } if src.cmd_id == CMD_WSTA
        ));
        assert!(matches!(&kinds[2], RequestEventKind::CmdStatus { status: DeviceStatus::Ok, .. }));
        assert_eq!(
            kinds[3],
            RequestEventKind::StatusComplete {
                num_cmds: 2,
                num_errors: 1
            }
        );
        assert_eq!(engine.in_flight(), 0);
    }

    #[test]
    fn test_unknown_seq_and_garbage_dropped() {
        let (mut engine, _device) = setup();
        let mut input = vec![0x00, 0x13, b'>', 0x01, 0x00, 0xEE];
        input.extend(device_frame(&DeviceMessage::Status {
            seq: 999,
            cmd_id: CMD_WSTA,
            status: DeviceStatus::Ok,
        }));
        engine.feed(&input);
        assert!(drain(&mut engine).is_empty());
    }

    #[test]
    fn test_unsolicited_event_queued() {
        let (mut engine, device) = setup();
        let mut device = device;
        device
            .send(&device_frame(&DeviceMessage::Event {
                aec_id: 0x0105,
                elems: vec![ParamValue::Integer(1)],
            }))
            .unwrap();
        assert!(engine.receive().unwrap() > 0);
        assert_eq!(
            drain(&mut engine),
            vec![EngineEvent::Unsolicited(UnsolicitedEvent {
                aec_id: 0x0105,
                elems: vec![ParamValue::Integer(1)]
            })]
        );
    }

    #[test]
    fn test_discard_completes_with_errors() {
        let (mut engine, _device) = setup();
        let mut req = engine.begin_request(3, 0, Dispatcher::Scan, 0).unwrap();
        req.append_command(CMD_WSTA, vec![]).unwrap();
        let handle = req.handle();
        engine.discard(req);
        let events = drain(&mut engine);
        assert_eq!(events.len(), 1);
        match &events[0] {
            EngineEvent::Request(r) => {
                assert_eq!(r.handle, handle);
                assert_eq!(r.dispatcher, Dispatcher::Scan);
                assert_eq!(
                    r.kind,
                    RequestEventKind::StatusComplete {
                        num_cmds: 1,
                        num_errors: 1
                    }
                );
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_submit_failure_returns_request() {
        let (host, device) = ChannelTransport::new_pair();
        drop(device);
        let mut engine = CommandEngine::new(host, limits());
        let mut req = engine.begin_request(1, 0, Dispatcher::Application, 0).unwrap();
        req.append_command(CMD_WSTA, vec![]).unwrap();
        let err = engine.submit(req).unwrap_err();
        assert!(matches!(err.reason, SubmitFailure::Transport(TransportError::Closed)));
        engine.discard(err.into_request());
        assert_eq!(drain(&mut engine).len(), 1);
        assert_eq!(engine.in_flight(), 0);
    }

    #[test]
    fn test_empty_submit_refused() {
        let (mut engine, _device) = setup();
        let req = engine.begin_request(1, 0, Dispatcher::Application, 0).unwrap();
        let err = engine.submit(req).unwrap_err();
        assert!(matches!(err.reason, SubmitFailure::Empty));
    }

    #[test]
    fn test_fail_all_counts_unacknowledged() {
        let (mut engine, device) = setup();
        submit_two(&mut engine);
        let cmds = sent_commands(&device);
        drain(&mut engine);
        engine.feed(&device_frame(&DeviceMessage::Status {
            seq: cmds[0].seq,
            cmd_id: CMD_WSTAC,
            status: DeviceStatus::Ok,
        }));
        drain(&mut engine);
        engine.fail_all();
        let events = drain(&mut engine);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            EngineEvent::Request(RequestEvent {
                kind: RequestEventKind::StatusComplete { num_cmds: 2, num_errors: 1 },
                ..
            })
        ));

        // Late status for a failed request is ignored.
        engine.feed(&device_frame(&DeviceMessage::Status {
            seq: cmds[1].seq,
            cmd_id: CMD_WSTA,
            status: DeviceStatus::Ok,
        }));
        assert!(drain(&mut engine).is_empty());
    }

    #[test]
    fn test_status_body_kind_constant() {
        let frame = device_frame(&DeviceMessage::Status {
            seq: 1,
            cmd_id: CMD_WSTA,
            status: DeviceStatus::Ok,
        });
        assert_eq!(frame[3], MSG_KIND_STATUS);
    }
}
