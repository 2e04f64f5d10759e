//! Events delivered by the command engine.

use wincs_protocol::{DeviceStatus, ParamValue};

use crate::request::{Dispatcher, RequestHandle};

/// The command within a request that an event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCommand {
    /// Position of the command within its request.
    pub index: usize,
    /// Command id.
    pub cmd_id: u16,
    /// Parameters the command was sent with.
    pub params: Vec<ParamValue>,
}

/// The four kinds of per-request event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEventKind {
    /// The request's frames were handed to the transport.
    TxComplete,

    /// One command was acknowledged by the device.
    CmdStatus {
        /// Sequence number the command was sent with.
        seq: u16,
        /// Device status.
        status: DeviceStatus,
        /// The acknowledged command.
        src: SourceCommand,
    },

    /// One command produced a response.
    RspReceived {
        /// Response id.
        rsp_id: u16,
        /// Response elements.
        elems: Vec<ParamValue>,
        /// The command that produced it.
        src: SourceCommand,
    },

    /// Terminal event: the request is finished and released.
    StatusComplete {
        /// Commands in the request.
        num_cmds: usize,
        /// Commands that failed or were never acknowledged.
        num_errors: usize,
    },
}

/// A per-request event, addressed to the request's dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEvent {
    pub handle: RequestHandle,
    pub dispatcher: Dispatcher,
    pub context: u32,
    pub kind: RequestEventKind,
}

impl RequestEvent {
    /// Whether this is the terminal event of its request.
    pub fn is_complete(&self) -> bool {
        matches!(self.kind, RequestEventKind::StatusComplete { .. })
    }
}

/// An unsolicited device event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsolicitedEvent {
    /// Event id (`AEC_*`).
    pub aec_id: u16,
    /// Event elements.
    pub elems: Vec<ParamValue>,
}

/// Anything the engine hands to the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Request(RequestEvent),
    Unsolicited(UnsolicitedEvent),
}
