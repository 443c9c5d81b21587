//! Stream session and the per-tick send step
//!
//! Everything the send loop touches lives in `SessionState` so one lock
//! guards the source, encoder, clock and stall counters as a unit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use voxbridge_core::{BridgeResult, MediaTime};
use voxbridge_time::AudioClock;
use voxbridge_transport::VoiceClient;
use voxbridge_voice::{adjust_volume, volume_from_percent, volume_to_percent, AudioEncoder};

use crate::{PcmSource, RuntimeConfig, StallGovernor, SubscriptionRegistry, SubscriptionSnapshot};

/// What one send step did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No stream is active
    Inactive,
    /// The source had nothing more to give right now
    Starved { packets: usize },
    /// The lookahead window is full
    Paced { packets: usize },
    /// Stall suppression lifted; the rest of the step was skipped
    StallCleared { packets: usize },
    /// The source finished and everything buffered has played out
    Ended { packets: usize },
}

impl TickOutcome {
    pub fn packets(&self) -> usize {
        match *self {
            TickOutcome::Inactive => 0,
            TickOutcome::Starved { packets }
            | TickOutcome::Paced { packets }
            | TickOutcome::StallCleared { packets }
            | TickOutcome::Ended { packets } => packets,
        }
    }
}

/// Source, encoder, clock and stall state of the current stream
pub struct SessionState {
    source: Option<Box<dyn PcmSource>>,
    encoder: Box<dyn AudioEncoder>,
    clock: AudioClock,
    stall: StallGovernor,
    lookahead: MediaTime,
    read_buf: Vec<u8>,
    volume: f32,
    targets: Arc<SubscriptionSnapshot>,
    /// Locator of the current or last stream, kept for seeking
    url: Option<String>,
    /// Seek offset the current stream started at
    start_offset: Duration,
}

impl SessionState {
    pub fn new(encoder: Box<dyn AudioEncoder>, runtime: &RuntimeConfig) -> Self {
        SessionState {
            source: None,
            encoder,
            clock: AudioClock::new(runtime.pcm_format),
            stall: StallGovernor::new(
                runtime.stall_count_interval,
                runtime.stall_no_error_count_max,
            ),
            lookahead: MediaTime::from_duration(runtime.audio_buffer_length),
            read_buf: Vec::new(),
            volume: 1.0,
            targets: Arc::default(),
            url: None,
            start_offset: Duration::ZERO,
        }
    }

    /// Install a freshly spawned source, replacing any current one
    pub fn begin(&mut self, source: Box<dyn PcmSource>, url: &str, start_offset: Duration) {
        self.begin_at(source, url, start_offset, Instant::now());
    }

    pub fn begin_at(
        &mut self,
        source: Box<dyn PcmSource>,
        url: &str,
        start_offset: Duration,
        now: Instant,
    ) {
        self.end();
        self.source = Some(source);
        self.url = Some(url.to_string());
        self.start_offset = start_offset;
        self.encoder.reset();
        self.stall.reset();
        self.clock.reset_at(now);
        self.clock.start_at(now);
        debug!(url, ?start_offset, "stream session started");
    }

    /// Stop and release the source; returns `false` if none was active
    pub fn end(&mut self) -> bool {
        self.clock.stop();
        match self.source.take() {
            Some(mut source) => {
                source.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Freeze or resume playback time without touching the source
    pub fn set_clock_running(&mut self, running: bool) {
        if running {
            self.clock.start();
        } else {
            self.clock.stop();
        }
    }

    /// Playback position within the source
    pub fn position(&self) -> Duration {
        if self.source.is_none() {
            return Duration::ZERO;
        }
        self.start_offset + self.clock.elapsed()
    }

    /// Source length, zero until the transcoder reported it
    pub fn duration(&mut self) -> Duration {
        self.source
            .as_mut()
            .map(|source| source.duration())
            .unwrap_or(Duration::ZERO)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn volume_percent(&self) -> i32 {
        volume_to_percent(self.volume)
    }

    /// Set volume from a 0-100 scale, clamped
    pub fn set_volume_percent(&mut self, percent: i32) {
        self.volume = volume_from_percent(percent.clamp(0, 100));
    }

    pub fn set_bitrate(&mut self, bits_per_second: u32) -> BridgeResult<()> {
        self.encoder.set_bitrate(bits_per_second)
    }

    pub fn bitrate(&self) -> u32 {
        self.encoder.bitrate()
    }

    pub fn stall(&self) -> &StallGovernor {
        &self.stall
    }

    /// The transport reported that no whisper target was reachable
    pub fn trigger_stall(&mut self) {
        if !self.stall.is_stalled() {
            debug!("whisper has no targets, suppressing sends");
        }
        self.stall.trigger();
    }

    pub fn send_tick(
        &mut self,
        registry: &SubscriptionRegistry,
        client: &dyn VoiceClient,
    ) -> TickOutcome {
        self.send_tick_at(registry, client, Instant::now())
    }

    /// One send step: read, pace, encode and transmit until the lookahead
    /// window is full or the source runs dry
    pub fn send_tick_at(
        &mut self,
        registry: &SubscriptionRegistry,
        client: &dyn VoiceClient,
        now: Instant,
    ) -> TickOutcome {
        let Some(source) = self.source.as_mut() else {
            return TickOutcome::Inactive;
        };

        registry.refresh(&mut self.targets);

        let chunk = self.encoder.optimal_packet_size();
        if self.read_buf.len() < chunk {
            self.read_buf.resize(chunk, 0);
        }

        let mut packets = 0;
        let mut ended = false;
        let outcome = loop {
            if self.clock.buffer_length_at(now) >= self.lookahead {
                break TickOutcome::Paced { packets };
            }

            let read = source.read(&mut self.read_buf[..chunk]);
            if read == 0 {
                if source.has_exited()
                    && self.clock.buffer_length_at(now).is_negative()
                    && !self.encoder.has_packet()
                {
                    ended = true;
                    break TickOutcome::Ended { packets };
                }
                break TickOutcome::Starved { packets };
            }

            self.clock.push_bytes(read);

            if self.stall.on_read() {
                debug!("stall cleared, resuming sends next tick");
                break TickOutcome::StallCleared { packets };
            }

            let pcm = &mut self.read_buf[..read];
            adjust_volume(pcm, self.volume);
            if let Err(e) = self.encoder.push_pcm(pcm) {
                warn!(error = %e, "encoder rejected pcm");
                continue;
            }

            let codec = self.encoder.codec();
            while let Some(packet) = self.encoder.next_packet() {
                if self.targets.is_empty() {
                    client.send_audio(&packet, codec);
                } else {
                    client.send_audio_whisper(
                        &packet,
                        codec,
                        &self.targets.channels,
                        &self.targets.clients,
                    );
                }
                packets += 1;
            }
        };

        if ended {
            debug!("stream ended");
            self.end();
        }
        trace!(?outcome, "send tick");
        outcome
    }
}
