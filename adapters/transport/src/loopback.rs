use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::{SignalingConfig, SyncError, Transport, TransportEvent};

#[derive(Debug)]
enum Frame {
    Open,
    Data(Vec<u8>),
    Close,
}

/// In-process transport whose peer is the other half of [`LoopbackTransport::pair`].
///
/// Frames sent before the peer connects are buffered and delivered once it
/// polls. Dropping one half disconnects the other.
#[derive(Debug)]
pub struct LoopbackTransport {
    outgoing: Sender<Frame>,
    incoming: Receiver<Frame>,
    connected: bool,
    local: Vec<TransportEvent>,
}

impl LoopbackTransport {
    /// Creates two connected halves.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::channel();
        let (right_tx, left_rx) = mpsc::channel();
        (Self::new(left_tx, left_rx), Self::new(right_tx, right_rx))
    }

    fn new(outgoing: Sender<Frame>, incoming: Receiver<Frame>) -> Self {
        Self {
            outgoing,
            incoming,
            connected: false,
            local: Vec::new(),
        }
    }

    /// Closes the link, notifying both halves.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        let _ = self.outgoing.send(Frame::Close);
        self.drop_link();
    }

    fn drop_link(&mut self) {
        self.connected = false;
        self.local.push(TransportEvent::Disconnected);
    }
}

impl Transport for LoopbackTransport {
    fn connect(&mut self, config: &SignalingConfig) -> Result<(), SyncError> {
        config.validate()?;
        if self.connected {
            return Ok(());
        }
        log::debug!("loopback connecting in place of {}", config.server_url());
        self.outgoing.send(Frame::Open).map_err(|_| SyncError::Closed)?;
        self.connected = true;
        self.local.push(TransportEvent::Connected);
        Ok(())
    }

    fn send(&mut self, payload: Vec<u8>) -> Result<(), SyncError> {
        if !self.connected {
            return Err(SyncError::NotConnected);
        }
        if self.outgoing.send(Frame::Data(payload)).is_err() {
            self.drop_link();
            return Err(SyncError::Closed);
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut events = std::mem::take(&mut self.local);
        loop {
            match self.incoming.try_recv() {
                Ok(Frame::Open) => log::debug!("loopback peer opened"),
                Ok(Frame::Data(payload)) => events.push(TransportEvent::DataReceived(payload)),
                Ok(Frame::Close) => {
                    if self.connected {
                        self.connected = false;
                        events.push(TransportEvent::Disconnected);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.connected {
                        self.connected = false;
                        events.push(TransportEvent::Disconnected);
                    }
                    break;
                }
            }
        }
        events
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_flow_between_halves() {
        let (mut left, mut right) = LoopbackTransport::pair();
        let config = SignalingConfig::default();
        left.connect(&config).expect("left connects");
        right.connect(&config).expect("right connects");

        left.send(vec![1, 2, 3]).expect("send succeeds");

        assert_eq!(left.poll(), vec![TransportEvent::Connected]);
        assert_eq!(
            right.poll(),
            vec![
                TransportEvent::Connected,
                TransportEvent::DataReceived(vec![1, 2, 3]),
            ]
        );
    }

    #[test]
    fn sending_before_connect_fails() {
        let (mut left, _right) = LoopbackTransport::pair();
        assert!(matches!(left.send(vec![0]), Err(SyncError::NotConnected)));
    }

    #[test]
    fn dropped_peer_disconnects() {
        let (mut left, right) = LoopbackTransport::pair();
        left.connect(&SignalingConfig::default()).expect("connects");
        drop(right);

        assert!(matches!(left.send(vec![0]), Err(SyncError::Closed)));
        assert_eq!(
            left.poll(),
            vec![TransportEvent::Connected, TransportEvent::Disconnected]
        );
        assert!(!left.is_connected());
    }
}
