//! Narrow capability traits exposed by the bridge
//!
//! Callers that only drive playback see `PlayerConnection`; callers that
//! only steer whisper targets see `TargetManager`.

use std::time::Duration;

use voxbridge_core::{BridgeResult, ChannelId, ClientId};

/// Playback control over the current stream
pub trait PlayerConnection: Send + Sync {
    /// Start streaming `url`, replacing any current stream
    fn start(&self, url: &str) -> BridgeResult<()>;

    /// Stop the current stream; stopping an idle player is not an error
    fn stop(&self) -> BridgeResult<()>;

    /// Restart the current source at `position`
    fn seek(&self, position: Duration) -> BridgeResult<()>;

    fn position(&self) -> Duration;

    /// Source length, zero until known
    fn song_length(&self) -> Duration;

    /// Volume on a 0-100 scale
    fn volume(&self) -> i32;

    fn set_volume(&self, percent: i32);

    fn paused(&self) -> bool;

    fn set_paused(&self, paused: bool);

    fn playing(&self) -> bool;

    /// Looping is not supported
    fn repeated(&self) -> bool {
        false
    }

    fn set_repeated(&self, _repeat: bool) {}
}

/// Whisper target control
pub trait TargetManager: Send + Sync {
    /// Playback began on behalf of someone in `invoker_channel`
    fn on_resource_started(&self, invoker_channel: Option<ChannelId>);

    fn on_resource_stopped(&self) {}

    fn subscribe_channel(&self, channel: ChannelId, manual: bool);

    fn unsubscribe_channel(&self, channel: ChannelId, manual: bool);

    fn subscribe_client(&self, client: ClientId);

    fn unsubscribe_client(&self, client: ClientId);

    fn clear_subscriptions(&self);
}
