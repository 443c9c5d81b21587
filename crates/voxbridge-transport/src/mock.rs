//! Recording client for tests and dry runs
//!
//! Nothing goes on the wire; every call is recorded so callers can assert on
//! what the bridge would have sent.

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

use voxbridge_core::{BridgeResult, ChannelId, ClientId, Codec};

use crate::{ClientEvent, ConnectionParams, DisconnectReason, EventSender, VoiceClient};

/// One recorded audio send
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SentAudio {
    Broadcast {
        packet: Bytes,
        codec: Codec,
    },
    Whisper {
        packet: Bytes,
        codec: Codec,
        channels: Vec<ChannelId>,
        clients: Vec<ClientId>,
    },
}

#[derive(Default)]
struct Recorded {
    connects: Vec<ConnectionParams>,
    disconnects: usize,
    sent: Vec<SentAudio>,
}

/// `VoiceClient` that records instead of transmitting
#[derive(Default)]
pub struct RecordingClient {
    recorded: Mutex<Recorded>,
    /// When set, `disconnect` answers with a `Disconnected` event like a server would
    events: Option<EventSender>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: EventSender) -> Self {
        RecordingClient {
            recorded: Mutex::new(Recorded::default()),
            events: Some(events),
        }
    }

    pub fn connects(&self) -> Vec<ConnectionParams> {
        self.recorded.lock().connects.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.recorded.lock().connects.len()
    }

    pub fn disconnect_count(&self) -> usize {
        self.recorded.lock().disconnects
    }

    pub fn sent(&self) -> Vec<SentAudio> {
        self.recorded.lock().sent.clone()
    }

    /// Drain the recorded sends
    pub fn take_sent(&self) -> Vec<SentAudio> {
        std::mem::take(&mut self.recorded.lock().sent)
    }
}

impl VoiceClient for RecordingClient {
    fn connect(&self, params: ConnectionParams) -> BridgeResult<()> {
        trace!(host = %params.hostname, port = params.port, "recording connect");
        self.recorded.lock().connects.push(params);
        Ok(())
    }

    fn disconnect(&self) -> BridgeResult<()> {
        self.recorded.lock().disconnects += 1;
        if let Some(events) = &self.events {
            // Receiver gone means nobody listens for the answer
            let _ = events.send(ClientEvent::Disconnected {
                reason: DisconnectReason::LeftServer,
            });
        }
        Ok(())
    }

    fn send_audio(&self, packet: &[u8], codec: Codec) {
        self.recorded.lock().sent.push(SentAudio::Broadcast {
            packet: Bytes::copy_from_slice(packet),
            codec,
        });
    }

    fn send_audio_whisper(
        &self,
        packet: &[u8],
        codec: Codec,
        channels: &[ChannelId],
        clients: &[ClientId],
    ) {
        self.recorded.lock().sent.push(SentAudio::Whisper {
            packet: Bytes::copy_from_slice(packet),
            codec,
            channels: channels.to_vec(),
            clients: clients.to_vec(),
        });
    }
}
