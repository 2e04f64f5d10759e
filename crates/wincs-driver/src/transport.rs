//! Byte transports.
//!
//! The engine writes whole frames with [`Transport::send`] and pulls whatever
//! bytes have arrived with [`Transport::receive`]. Neither call blocks.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::error::TransportError;

/// A non-blocking byte stream to the coprocessor.
pub trait Transport {
    /// Write a complete frame.
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Append any received bytes to `buf`, returning how many were added.
    fn receive(&mut self, buf: &mut Vec<u8>) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).send(frame)
    }

    fn receive(&mut self, buf: &mut Vec<u8>) -> Result<usize, TransportError> {
        (**self).receive(buf)
    }
}

/// One end of an in-process byte link built on crossbeam channels.
///
/// Useful for driving the engine from a reader thread, or for pairing a host
/// with a simulated device.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl ChannelTransport {
    /// Create two connected ends.
    pub fn new_pair() -> (ChannelTransport, ChannelTransport) {
        let (a_tx, b_rx) = crossbeam_channel::unbounded();
        let (b_tx, a_rx) = crossbeam_channel::unbounded();
        (
            ChannelTransport { tx: a_tx, rx: a_rx },
            ChannelTransport { tx: b_tx, rx: b_rx },
        )
    }

    /// Take the next chunk sent by the other end, if any.
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }

    /// Number of chunks waiting.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(frame.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn receive(&mut self, buf: &mut Vec<u8>) -> Result<usize, TransportError> {
        let start = buf.len();
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => buf.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if buf.len() == start {
                        return Err(TransportError::Closed);
                    }
                    break;
                }
            }
        }
        Ok(buf.len() - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_pair_bidirectional() {
        let (mut host, mut device) = ChannelTransport::new_pair();
        host.send(&[1, 2, 3]).expect("send should succeed");
        device.send(&[4]).expect("send should succeed");
        device.send(&[5]).expect("send should succeed");

        assert_eq!(device.try_recv(), Some(vec![1, 2, 3]));
        let mut buf = Vec::new();
        assert_eq!(host.receive(&mut buf).unwrap(), 2);
        assert_eq!(buf, vec![4, 5]);
        assert_eq!(host.receive(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_closed_peer_reported() {
        let (mut host, device) = ChannelTransport::new_pair();
        drop(device);
        assert!(matches!(host.send(&[1]), Err(TransportError::Closed)));
        let mut buf = Vec::new();
        assert!(matches!(host.receive(&mut buf), Err(TransportError::Closed)));
    }
}
