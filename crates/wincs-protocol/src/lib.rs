//! WINCS02 Coprocessor Wire Protocol
//!
//! This crate provides the types and codecs a host uses to talk to a WINCS02
//! wireless network coprocessor over a byte-stream transport. Every message is
//! a frame carrying one of four bodies, and every body carries a list of typed
//! parameter elements.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → device): a sequence number, a command id and parameters
//! - **Status** (device → host): the acknowledgement for one command, by sequence number
//! - **Responses** (device → host): zero or more per command, sent before its status
//! - **Events** (device → host): unsolicited, identified by an event id (AEC)
//!
//! # Example
//!
//! ```rust,ignore
//! use wincs_protocol::{CommandFrame, DeviceMessage, FrameCodec, ParamValue, CMD_WSTA};
//!
//! // Build a command
//! let cmd = CommandFrame::new(1, CMD_WSTA, vec![ParamValue::Integer(1)]);
//! let frame = FrameCodec::encode(&cmd.encode());
//!
//! // Parse whatever the device sent back
//! let message = DeviceMessage::decode(&received_body)?;
//! ```

mod constants;
mod error;
mod frame;
mod message;
mod param;
mod types;

pub use constants::*;
pub use error::*;
pub use frame::*;
pub use message::*;
pub use param::*;
pub use types::*;
