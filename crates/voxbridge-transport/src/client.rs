//! Protocol client capability

use voxbridge_core::{BridgeResult, ChannelId, ClientId, Codec};

use crate::ConnectionParams;

/// Voice protocol client the bridge drives
///
/// Audio sends are fire-and-forget: failures come back asynchronously as
/// `ClientEvent::Error` on the client's event channel.
pub trait VoiceClient: Send + Sync {
    /// Start connecting; completion is reported through client events
    fn connect(&self, params: ConnectionParams) -> BridgeResult<()>;

    /// Leave the server; a `ClientEvent::Disconnected` follows
    fn disconnect(&self) -> BridgeResult<()>;

    /// Send a packet to the client's current channel
    fn send_audio(&self, packet: &[u8], codec: Codec);

    /// Send a packet to exactly the given channels and clients
    fn send_audio_whisper(
        &self,
        packet: &[u8],
        codec: Codec,
        channels: &[ChannelId],
        clients: &[ClientId],
    );
}
