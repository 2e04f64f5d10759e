//! Frame encoding/decoding utilities.
//!
//! Each message travels in a frame made of a direction header byte, a 2-byte
//! length (little-endian) and the message body.
//!
//! ```text
//! +--------+--------+--------+-------------------+
//! | header | len_lo | len_hi | data[0..len]      |
//! +--------+--------+--------+-------------------+
//! ```
//!
//! The host sends frames headed by `'<'` and receives frames headed by `'>'`.

use bytes::{Buf, BufMut, BytesMut};
use log::warn;

use crate::constants::{FRAME_HEADER_DEVICE, FRAME_HEADER_HOST};
use crate::error::ProtocolError;
use crate::message::{CommandFrame, DeviceMessage};

/// Maximum frame size supported.
pub const MAX_FRAMED_SIZE: usize = 2048;

/// Which end of the link a codec sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    /// Host: encodes `'<'` frames, decodes `'>'` frames.
    Host,
    /// Device: encodes `'>'` frames, decodes `'<'` frames.
    Device,
}

impl LinkSide {
    fn tx_header(self) -> u8 {
        match self {
            LinkSide::Host => FRAME_HEADER_HOST,
            LinkSide::Device => FRAME_HEADER_DEVICE,
        }
    }

    fn rx_header(self) -> u8 {
        match self {
            LinkSide::Host => FRAME_HEADER_DEVICE,
            LinkSide::Device => FRAME_HEADER_HOST,
        }
    }
}

/// A codec for reading and writing framed messages.
#[derive(Debug)]
pub struct FrameCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
    side: LinkSide,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Create a host-side frame codec.
    pub fn new() -> Self {
        Self::with_side(LinkSide::Host)
    }

    /// Create a codec for the given end of the link.
    pub fn with_side(side: LinkSide) -> Self {
        FrameCodec {
            buffer: BytesMut::with_capacity(MAX_FRAMED_SIZE),
            side,
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode a complete frame from the buffer.
    ///
    /// Returns `Some(frame_data)` if a complete frame is available,
    /// or `None` if more data is needed.
    pub fn decode(&mut self) -> Option<Vec<u8>> {
        let header = self.side.rx_header();
        loop {
            // Scan for the header byte, discarding any preceding garbage
            while !self.buffer.is_empty() && self.buffer[0] != header {
                self.buffer.advance(1);
            }

            // Need at least 3 bytes: header + 2 bytes length
            if self.buffer.len() < 3 {
                return None;
            }

            let len = u16::from_le_bytes([self.buffer[1], self.buffer[2]]) as usize;
            if len > MAX_FRAMED_SIZE {
                warn!("discarding oversized frame header (len {})", len);
                self.buffer.advance(1);
                continue;
            }

            if self.buffer.len() < 3 + len {
                return None;
            }

            self.buffer.advance(3); // Skip header and length
            return Some(self.buffer.split_to(len).to_vec());
        }
    }

    /// Encode a frame with this side's header and a length prefix.
    pub fn encode_frame(&self, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        if data.len() > MAX_FRAMED_SIZE {
            return Err(ProtocolError::FrameTooLong {
                max: MAX_FRAMED_SIZE,
                actual: data.len(),
            });
        }
        let mut buf = Vec::with_capacity(3 + data.len());
        buf.push(self.side.tx_header());
        buf.put_u16_le(data.len() as u16);
        buf.extend_from_slice(data);
        Ok(buf)
    }

    /// Encode a host → device frame.
    pub fn encode(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        FrameCodec::new().encode_frame(data)
    }

    /// Decode the next complete device message (host side).
    ///
    /// Returns `Ok(None)` when more data is needed. A frame whose body fails
    /// to decode is consumed and reported as an error.
    pub fn next_message(&mut self) -> Result<Option<DeviceMessage>, ProtocolError> {
        match self.decode() {
            Some(frame) => DeviceMessage::decode(&frame).map(Some),
            None => Ok(None),
        }
    }

    /// Decode the next complete command (device side).
    pub fn next_command(&mut self) -> Result<Option<CommandFrame>, ProtocolError> {
        match self.decode() {
            Some(frame) => CommandFrame::decode(&frame).map(Some),
            None => Ok(None),
        }
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamValue;
    use crate::constants::*;

    fn device_codec() -> FrameCodec {
        FrameCodec::with_side(LinkSide::Device)
    }

    #[test]
    fn test_frame_codec_encode_decode() {
        let data = b"Hello, World!";
        let encoded = FrameCodec::encode(data).unwrap();

        // Should be header (1 byte) + length (2 bytes) + data
        assert_eq!(encoded.len(), 3 + data.len());
        assert_eq!(encoded[0], b'<');
        assert_eq!(encoded[1], data.len() as u8);
        assert_eq!(encoded[2], 0);

        // Host frames are read by the device side
        let mut device = device_codec();
        device.push(&encoded);
        assert_eq!(device.decode().expect("should decode frame"), data);

        // and ignored by another host
        let mut host = FrameCodec::new();
        host.push(&encoded);
        assert!(host.decode().is_none());
    }

    #[test]
    fn test_frame_codec_partial() {
        let mut codec = FrameCodec::new();
        let encoded = device_codec().encode_frame(b"Test data").unwrap();

        codec.push(&encoded[..4]);
        assert!(codec.decode().is_none());

        codec.push(&encoded[4..]);
        let decoded = codec.decode().expect("should decode frame");
        assert_eq!(&decoded, b"Test data");
    }

    #[test]
    fn test_frame_codec_multiple_with_garbage() {
        let mut codec = FrameCodec::new();
        let device = device_codec();

        codec.push(&[0x00, 0x13, 0x37]);
        codec.push(&device.encode_frame(b"First").unwrap());
        codec.push(&device.encode_frame(b"Second").unwrap());

        assert_eq!(codec.decode().unwrap(), b"First");
        assert_eq!(codec.decode().unwrap(), b"Second");
        assert!(codec.decode().is_none());
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_oversized_header_resyncs() {
        let mut codec = FrameCodec::new();
        // A '>' followed by an impossible length, then a good frame
        codec.push(&[b'>', 0xFF, 0xFF]);
        codec.push(&device_codec().encode_frame(b"ok").unwrap());
        assert_eq!(codec.decode().unwrap(), b"ok");
    }

    #[test]
    fn test_encode_rejects_oversized_body() {
        let body = vec![0u8; MAX_FRAMED_SIZE + 1];
        assert!(matches!(
            FrameCodec::encode(&body),
            Err(ProtocolError::FrameTooLong { .. })
        ));
    }

    #[test]
    fn test_next_message_and_command() {
        let device = device_codec();
        let mut host = FrameCodec::new();
        let event = DeviceMessage::Event {
            aec_id: AEC_WSTALD,
            elems: vec![ParamValue::Integer(1)],
        };
        host.push(&device.encode_frame(&event.encode()).unwrap());
        assert_eq!(host.next_message().unwrap(), Some(event));
        assert_eq!(host.next_message().unwrap(), None);

        let mut device = device_codec();
        let cmd = CommandFrame::new(3, CMD_WSTA, vec![ParamValue::Integer(0)]);
        device.push(&FrameCodec::encode(&cmd.encode()).unwrap());
        assert_eq!(device.next_command().unwrap(), Some(cmd));
    }
}
