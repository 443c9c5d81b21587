//! Bridge configuration
//!
//! `BridgeConfig` is the persisted part, owned by whoever loads and saves
//! it; the bridge only updates fields in memory (generated identity, raised
//! offset, hashed password). `RuntimeConfig` holds the pacing constants.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use voxbridge_core::{BridgeError, BridgeResult};
use voxbridge_time::PcmFormat;

/// Persisted connection and audio settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Address of the voice server
    pub host: String,

    pub port: u16,

    /// Client identity key string. DO NOT MAKE THIS PUBLIC.
    /// Empty means a new identity is generated on connect
    pub identity: String,

    /// Proof-of-work offset for the identity
    pub identity_offset: u64,

    /// Server password, empty for none
    pub server_password: String,

    /// Set when `server_password` already holds the hash
    pub server_password_is_hashed: bool,

    /// Hash a plain password on connect and store the hash back in
    /// `server_password`
    pub server_password_auto_hash: bool,

    /// Path to the transcoder executable
    pub ffmpeg_path: String,

    /// Send bitrate in kbps. 32 ok, 48 good, 64 very good, 92 superb
    pub audio_bitrate: i32,

    /// `<build>|<platform>|<sign>`, empty for the built-in default
    pub client_version: String,

    pub default_nickname: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9987,
            identity: String::new(),
            identity_offset: 0,
            server_password: String::new(),
            server_password_is_hashed: false,
            server_password_auto_hash: false,
            ffmpeg_path: "ffmpeg".to_string(),
            audio_bitrate: 48,
            client_version: String::new(),
            default_nickname: "AudioBot".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from `path`; a missing file yields defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: BridgeConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.host.trim().is_empty() {
            return Err(BridgeError::InvalidConfig("host is empty".to_string()));
        }
        if !is_valid_bitrate(self.audio_bitrate) {
            return Err(BridgeError::InvalidConfig(format!(
                "audio_bitrate {} outside (0, 256) kbps",
                self.audio_bitrate
            )));
        }
        if self.ffmpeg_path.trim().is_empty() {
            return Err(BridgeError::InvalidConfig("ffmpeg_path is empty".to_string()));
        }
        Ok(())
    }
}

/// Bitrates the encoder accepts, in kbps (exclusive bounds)
pub fn is_valid_bitrate(kbps: i32) -> bool {
    kbps > 0 && kbps < 256
}

/// Typed notification that a persisted setting changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    AudioBitrate(i32),
    DefaultNickname(String),
    ClientVersion(String),
}

/// Pacing and stall constants for the send loop
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Period of the send loop
    pub send_interval: Duration,
    /// Audio kept buffered ahead of playback
    pub audio_buffer_length: Duration,
    /// Suppressed reads per quiet stall window
    pub stall_count_interval: u32,
    /// Quiet windows before stall suppression lifts
    pub stall_no_error_count_max: u32,
    /// Transcoder output format
    pub pcm_format: PcmFormat,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            send_interval: Duration::from_millis(5),
            audio_buffer_length: Duration::from_millis(20),
            stall_count_interval: 50,
            stall_no_error_count_max: 2,
            pcm_format: PcmFormat::STEREO_48K,
        }
    }
}
