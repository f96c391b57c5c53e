#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Peer synchronisation of command batches over a binary transport.
//!
//! Connection establishment happens through a signaling server; once a
//! link is up, [`PeerSync`] ships batches of [`Command`] values as opaque
//! binary payloads. Text frames are not part of the protocol.

mod loopback;

use bastion_core::Command;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use loopback::LoopbackTransport;

const DEFAULT_SIGNALING_URL: &str = "ws://signalserver.herokuapp.com/";
const DEFAULT_STUN_SERVERS: [&str; 5] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun3.l.google.com:19302",
    "stun:stun4.l.google.com:19302",
];
const WIRE_VERSION: u16 = 1;

/// Where peers meet before exchanging data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    server_url: String,
    stun_servers: Vec<String>,
}

impl SignalingConfig {
    /// Creates a configuration from explicit endpoints.
    #[must_use]
    pub fn new(server_url: impl Into<String>, stun_servers: Vec<String>) -> Self {
        Self {
            server_url: server_url.into(),
            stun_servers,
        }
    }

    /// WebSocket URL of the signaling server.
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// STUN servers offered to the peer connection.
    #[must_use]
    pub fn stun_servers(&self) -> &[String] {
        &self.stun_servers
    }

    /// Checks that every endpoint uses the expected scheme.
    pub fn validate(&self) -> Result<(), SyncError> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(SyncError::InvalidEndpoint(self.server_url.clone()));
        }
        if let Some(server) = self
            .stun_servers
            .iter()
            .find(|server| !server.starts_with("stun:"))
        {
            return Err(SyncError::InvalidEndpoint(server.clone()));
        }
        Ok(())
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_SIGNALING_URL,
            DEFAULT_STUN_SERVERS.iter().map(|server| (*server).to_owned()).collect(),
        )
    }
}

/// Errors raised while exchanging command batches.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An endpoint in the signaling configuration is malformed.
    #[error("invalid signaling endpoint `{0}`")]
    InvalidEndpoint(String),
    /// A payload was sent before the link came up.
    #[error("transport is not connected")]
    NotConnected,
    /// The link went away while sending.
    #[error("transport link closed")]
    Closed,
    /// A batch could not be encoded.
    #[error("failed to encode command batch")]
    Encode(#[source] bincode::Error),
    /// A payload could not be decoded.
    #[error("failed to decode command batch")]
    Decode(#[source] bincode::Error),
    /// A payload was produced by an incompatible build.
    #[error("unsupported wire version {found}; expected {expected}")]
    UnsupportedVersion {
        /// Version carried by the payload.
        found: u16,
        /// Version this build speaks.
        expected: u16,
    },
}

/// Notification raised by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The link is up.
    Connected,
    /// The link went down; a failed read or write also ends here.
    Disconnected,
    /// A binary payload arrived.
    DataReceived(Vec<u8>),
}

/// Binary, message-oriented link to a single peer.
pub trait Transport {
    /// Starts connecting through the provided signaling configuration.
    fn connect(&mut self, config: &SignalingConfig) -> Result<(), SyncError>;

    /// Sends one binary payload.
    fn send(&mut self, payload: Vec<u8>) -> Result<(), SyncError>;

    /// Drains notifications raised since the previous call.
    fn poll(&mut self) -> Vec<TransportEvent>;

    /// Reports whether the link is currently up.
    fn is_connected(&self) -> bool;
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u16,
    sequence: u64,
    commands: Vec<Command>,
}

/// Encodes a command batch into a wire payload.
pub fn encode_batch(sequence: u64, commands: &[Command]) -> Result<Vec<u8>, SyncError> {
    bincode::serialize(&Envelope {
        version: WIRE_VERSION,
        sequence,
        commands: commands.to_vec(),
    })
    .map_err(SyncError::Encode)
}

/// Decodes a wire payload into its sequence number and command batch.
pub fn decode_batch(payload: &[u8]) -> Result<(u64, Vec<Command>), SyncError> {
    let envelope: Envelope = bincode::deserialize(payload).map_err(SyncError::Decode)?;
    if envelope.version != WIRE_VERSION {
        return Err(SyncError::UnsupportedVersion {
            found: envelope.version,
            expected: WIRE_VERSION,
        });
    }
    Ok((envelope.sequence, envelope.commands))
}

/// Exchanges command batches with a peer over a [`Transport`].
#[derive(Debug)]
pub struct PeerSync<T> {
    transport: T,
    config: SignalingConfig,
    sent: u64,
    last_received: Option<u64>,
}

impl<T: Transport> PeerSync<T> {
    /// Wraps `transport`, connecting through `config` on [`PeerSync::connect`].
    #[must_use]
    pub fn new(transport: T, config: SignalingConfig) -> Self {
        Self {
            transport,
            config,
            sent: 0,
            last_received: None,
        }
    }

    /// Starts the connection.
    pub fn connect(&mut self) -> Result<(), SyncError> {
        log::info!(
            "connecting through {} with {} stun servers",
            self.config.server_url(),
            self.config.stun_servers().len()
        );
        self.transport.connect(&self.config)
    }

    /// Reports whether the underlying link is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Sends one batch of commands. Empty batches are not sent.
    pub fn send(&mut self, commands: &[Command]) -> Result<(), SyncError> {
        if commands.is_empty() {
            return Ok(());
        }
        let payload = encode_batch(self.sent, commands)?;
        self.transport.send(payload)?;
        self.sent += 1;
        Ok(())
    }

    /// Drains the transport, appending every received command to `out`.
    ///
    /// Payloads that fail to decode are logged and dropped.
    pub fn poll(&mut self, out: &mut Vec<Command>) {
        for event in self.transport.poll() {
            match event {
                TransportEvent::Connected => log::info!("peer link established"),
                TransportEvent::Disconnected => log::warn!("peer link lost"),
                TransportEvent::DataReceived(payload) => match decode_batch(&payload) {
                    Ok((sequence, commands)) => {
                        if let Some(last) = self.last_received {
                            if sequence != last.wrapping_add(1) {
                                log::warn!("peer batch {sequence} follows {last}");
                            }
                        }
                        self.last_received = Some(sequence);
                        out.extend(commands);
                    }
                    Err(error) => log::warn!("dropping peer payload: {error}"),
                },
            }
        }
    }

    /// Read-only access to the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::EntityId;

    #[test]
    fn default_signaling_points_at_public_servers() {
        let config = SignalingConfig::default();
        assert_eq!(config.server_url(), "ws://signalserver.herokuapp.com/");
        assert_eq!(config.stun_servers().len(), 5);
        assert_eq!(config.stun_servers()[0], "stun:stun.l.google.com:19302");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_endpoints_are_rejected() {
        let http = SignalingConfig::new("http://example.com", Vec::new());
        assert!(matches!(http.validate(), Err(SyncError::InvalidEndpoint(_))));

        let turn = SignalingConfig::new("wss://example.com", vec!["turn:relay".to_owned()]);
        assert!(matches!(
            turn.validate(),
            Err(SyncError::InvalidEndpoint(endpoint)) if endpoint == "turn:relay"
        ));
    }

    #[test]
    fn foreign_wire_version_is_refused() {
        let payload = bincode::serialize(&Envelope {
            version: WIRE_VERSION + 1,
            sequence: 0,
            commands: vec![Command::CompleteMission],
        })
        .expect("encodes");

        assert!(matches!(
            decode_batch(&payload),
            Err(SyncError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn batch_survives_the_wire() {
        let commands = vec![
            Command::RemoveTower {
                tower: EntityId::new(3),
            },
            Command::CompleteMission,
        ];
        let payload = encode_batch(9, &commands).expect("encodes");
        assert_eq!(decode_batch(&payload).expect("decodes"), (9, commands));
    }
}
