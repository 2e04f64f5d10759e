//! Message bodies carried inside frames.
//!
//! ```text
//! Command:  kind | seq(u16) | cmd_id(u16) | n | params...
//! Status:   kind | seq(u16) | cmd_id(u16) | status(u16)
//! Response: kind | seq(u16) | rsp_id(u16) | n | params...
//! Event:    kind | aec_id(u16) | n | params...
//! ```

use bytes::{Buf, BufMut};

use crate::constants::*;
use crate::error::*;
use crate::param::{decode_params, encode_params, ParamValue};

/// A command sent from the host to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    /// Sequence number used to correlate status and responses.
    pub seq: u16,
    /// Command id (`CMD_*`).
    pub cmd_id: u16,
    /// Command parameters.
    pub params: Vec<ParamValue>,
}

impl CommandFrame {
    /// Create a new command frame.
    pub fn new(seq: u16, cmd_id: u16, params: Vec<ParamValue>) -> Self {
        CommandFrame {
            seq,
            cmd_id,
            params,
        }
    }

    /// Encoded size of a command with these parameters.
    pub fn encoded_len(params: &[ParamValue]) -> usize {
        6 + params.iter().map(ParamValue::encoded_len).sum::<usize>()
    }

    /// Encode the command body.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::encoded_len(&self.params));
        buf.push(MSG_KIND_COMMAND);
        buf.put_u16_le(self.seq);
        buf.put_u16_le(self.cmd_id);
        encode_params(&self.params, &mut buf);
        buf
    }

    /// Decode a command body.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < 6 {
            return Err(ProtocolError::FrameTooShort {
                expected: 6,
                actual: data.len(),
            });
        }
        let mut data = data;
        let kind = data.get_u8();
        if kind != MSG_KIND_COMMAND {
            return Err(ProtocolError::UnknownMessageKind(kind));
        }
        let seq = data.get_u16_le();
        let cmd_id = data.get_u16_le();
        let params = decode_params(&mut data)?;
        Ok(CommandFrame {
            seq,
            cmd_id,
            params,
        })
    }
}

/// Messages received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// Acknowledgement of one command.
    Status {
        /// Sequence number of the command.
        seq: u16,
        /// Command id being acknowledged.
        cmd_id: u16,
        /// Device status.
        status: DeviceStatus,
    },

    /// A response produced by one command.
    Response {
        /// Sequence number of the command.
        seq: u16,
        /// Response id, usually the command id.
        rsp_id: u16,
        /// Response elements.
        elems: Vec<ParamValue>,
    },

    /// An unsolicited event.
    Event {
        /// Event id (`AEC_*`).
        aec_id: u16,
        /// Event elements.
        elems: Vec<ParamValue>,
    },
}

impl DeviceMessage {
    /// Decode a device message from a frame body.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.is_empty() {
            return Err(ProtocolError::FrameTooShort {
                expected: 1,
                actual: 0,
            });
        }

        let mut body = &data[1..];
        match data[0] {
            MSG_KIND_STATUS => {
                if body.len() < 6 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 7,
                        actual: data.len(),
                    });
                }
                Ok(DeviceMessage::Status {
                    seq: body.get_u16_le(),
                    cmd_id: body.get_u16_le(),
                    status: DeviceStatus::from(body.get_u16_le()),
                })
            }
            MSG_KIND_RESPONSE => {
                if body.len() < 5 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 6,
                        actual: data.len(),
                    });
                }
                let seq = body.get_u16_le();
                let rsp_id = body.get_u16_le();
                let elems = decode_params(&mut body)?;
                Ok(DeviceMessage::Response { seq, rsp_id, elems })
            }
            MSG_KIND_EVENT => {
                if body.len() < 3 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 4,
                        actual: data.len(),
                    });
                }
                let aec_id = body.get_u16_le();
                let elems = decode_params(&mut body)?;
                Ok(DeviceMessage::Event { aec_id, elems })
            }
            other => Err(ProtocolError::UnknownMessageKind(other)),
        }
    }

    /// Encode a device message body. Used by device-side tooling and tests.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            DeviceMessage::Status {
                seq,
                cmd_id,
                status,
            } => {
                buf.push(MSG_KIND_STATUS);
                buf.put_u16_le(*seq);
                buf.put_u16_le(*cmd_id);
                buf.put_u16_le(u16::from(*status));
            }
            DeviceMessage::Response { seq, rsp_id, elems } => {
                buf.push(MSG_KIND_RESPONSE);
                buf.put_u16_le(*seq);
                buf.put_u16_le(*rsp_id);
                encode_params(elems, &mut buf);
            }
            DeviceMessage::Event { aec_id, elems } => {
                buf.push(MSG_KIND_EVENT);
                buf.put_u16_le(*aec_id);
                encode_params(elems, &mut buf);
            }
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_frame_layout() {
        let cmd = CommandFrame::new(
            0x0102,
            CMD_WSTAC,
            vec![ParamValue::Integer(WSTAC_SSID as i64), ParamValue::string("Net1")],
        );
        let bytes = cmd.encode();
        assert_eq!(bytes[0], MSG_KIND_COMMAND);
        assert_eq!(&bytes[1..3], &[0x02, 0x01]);
        assert_eq!(u16::from_le_bytes([bytes[3], bytes[4]]), CMD_WSTAC);
        assert_eq!(bytes[5], 2);
        assert_eq!(bytes.len(), CommandFrame::encoded_len(&cmd.params));
        assert_eq!(CommandFrame::decode(&bytes).unwrap(), cmd);
    }

    #[test]
    fn test_status_decode() {
        let bytes = [MSG_KIND_STATUS, 7, 0, 0x21, 0x00, 3, 0];
        let msg = DeviceMessage::decode(&bytes).expect("should decode status");
        assert_eq!(
            msg,
            DeviceMessage::Status {
                seq: 7,
                cmd_id: CMD_WSTA,
                status: DeviceStatus::InvalidParameter
            }
        );
    }

    #[test]
    fn test_event_decode_from_encoded() {
        let msg = DeviceMessage::Event {
            aec_id: AEC_WSCNDONE,
            elems: vec![ParamValue::Integer(4)],
        };
        assert_eq!(DeviceMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn test_truncated_and_unknown_messages() {
        assert!(matches!(
            DeviceMessage::decode(&[MSG_KIND_STATUS, 1, 0]),
            Err(ProtocolError::FrameTooShort { .. })
        ));
        assert_eq!(
            DeviceMessage::decode(&[0x55, 0, 0]),
            Err(ProtocolError::UnknownMessageKind(0x55))
        );
        assert!(DeviceMessage::decode(&[]).is_err());
        // A command body is not something the device sends.
        assert_eq!(
            DeviceMessage::decode(&CommandFrame::new(1, CMD_WSTA, vec![]).encode()),
            Err(ProtocolError::UnknownMessageKind(MSG_KIND_COMMAND))
        );
    }
}
