//! Transcoder subprocess source
//!
//! The transcoder decodes any URL or path to interleaved s16le stereo PCM at
//! 48 kHz on stdout. Its stderr carries human readable metadata, of which
//! only the `Duration:` line is used.
//!
//! Both pipes are drained by reader threads into bounded channels so the
//! send loop never blocks on the pipe: a read returns whatever is already
//! buffered, possibly nothing.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{sync_channel, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace, warn};

use voxbridge_core::{BridgeError, BridgeResult, Timestamp};

/// Stdout chunks kept in flight between the reader thread and the send loop
const PCM_CHANNEL_DEPTH: usize = 64;
const PCM_READ_SIZE: usize = 8192;
const STDERR_CHANNEL_DEPTH: usize = 256;

/// Bytes per interleaved s16le stereo sample frame
const PCM_FRAME_BYTES: usize = 4;

static DURATION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*Duration: (\d+):(\d\d):(\d\d)\.(\d\d)").expect("duration regex is valid")
});

/// Parse a transcoder `Duration: HH:MM:SS.CC` metadata line
pub fn parse_duration_line(line: &str) -> Option<Duration> {
    let caps = DURATION_LINE.captures(line)?;
    let field = |i: usize| caps.get(i)?.as_str().parse::<u64>().ok();

    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;
    let centis = field(4)?;

    let secs = hours * 3600 + minutes * 60 + seconds;
    Some(Duration::from_secs(secs) + Duration::from_millis(centis * 10))
}

/// Transcoder arguments for decoding `url`, optionally starting at `seek`
pub fn transcoder_args(url: &str, seek: Option<Duration>) -> Vec<String> {
    let mut args = Vec::with_capacity(16);
    if let Some(offset) = seek {
        args.push("-ss".to_string());
        args.push(Timestamp(offset).to_string());
    }
    args.extend(
        [
            "-hide_banner",
            "-nostats",
            "-i",
            url,
            "-ac",
            "2",
            "-ar",
            "48000",
            "-f",
            "s16le",
            "-acodec",
            "pcm_s16le",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}

/// Decoded PCM provider driven by the send loop
pub trait PcmSource: Send {
    /// Copy already available PCM into `buf`; 0 means nothing right now
    ///
    /// Only whole sample frames are returned.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// True once the producer finished and every byte has been read
    fn has_exited(&mut self) -> bool;

    /// Total length if known yet, zero otherwise
    fn duration(&mut self) -> Duration;

    /// Terminate the producer and release it
    fn stop(&mut self);
}

/// Transcoder child process with its pipes drained on reader threads
pub struct SubprocessSource {
    child: Option<Child>,
    url: String,
    pcm: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pending_pos: usize,
    pcm_closed: bool,
    stderr: Receiver<String>,
    duration: Option<Duration>,
    exited: bool,
}

impl SubprocessSource {
    /// Spawn `program` decoding `url`
    pub fn spawn(program: &str, url: &str, seek: Option<Duration>) -> BridgeResult<Self> {
        let args = transcoder_args(url, seek);
        debug!(program, url, ?seek, "spawning transcoder");

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                warn!(program, error = %e, "transcoder failed to start");
                BridgeError::Spawn(e.to_string())
            })?;

        match Self::attach(&mut child) {
            Ok((pcm, stderr)) => Ok(SubprocessSource {
                child: Some(child),
                url: url.to_string(),
                pcm,
                pending: Vec::new(),
                pending_pos: 0,
                pcm_closed: false,
                stderr,
                duration: None,
                exited: false,
            }),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(e)
            }
        }
    }

    fn attach(child: &mut Child) -> BridgeResult<(Receiver<Vec<u8>>, Receiver<String>)> {
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Spawn("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BridgeError::Spawn("stderr not captured".to_string()))?;

        let (pcm_tx, pcm_rx) = sync_channel(PCM_CHANNEL_DEPTH);
        thread::Builder::new()
            .name("voxbridge-pcm".to_string())
            .spawn(move || {
                let mut buf = vec![0u8; PCM_READ_SIZE];
                loop {
                    match stdout.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if pcm_tx.send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => {
                            trace!(error = %e, "transcoder stdout closed");
                            break;
                        }
                    }
                }
            })
            .map_err(|e| BridgeError::Spawn(format!("pcm reader thread: {}", e)))?;

        let (line_tx, line_rx) = sync_channel(STDERR_CHANNEL_DEPTH);
        thread::Builder::new()
            .name("voxbridge-stderr".to_string())
            .spawn(move || {
                // Keep draining after the receiver is gone so the child never
                // blocks on a full stderr pipe
                for line in BufReader::new(stderr).lines() {
                    match line {
                        Ok(line) => {
                            let _ = line_tx.try_send(line);
                        }
                        Err(_) => break,
                    }
                }
            })
            .map_err(|e| BridgeError::Spawn(format!("stderr reader thread: {}", e)))?;

        Ok((pcm_rx, line_rx))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// True while the child handle is held
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    fn buffered(&self) -> usize {
        self.pending.len() - self.pending_pos
    }

    /// Pull chunks off the reader channel until `want` bytes are buffered
    fn fill_pending(&mut self, want: usize) {
        if self.pending_pos > 0 {
            self.pending.drain(..self.pending_pos);
            self.pending_pos = 0;
        }
        while self.pending.len() < want {
            match self.pcm.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.pcm_closed = true;
                    break;
                }
            }
        }
    }

    fn child_exited(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(Some(_))),
            None => true,
        }
    }
}

impl PcmSource for SubprocessSource {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        if self.buffered() < buf.len() {
            self.fill_pending(buf.len());
        }

        // Whole sample frames only; a split frame waits for its tail
        let mut n = self.buffered().min(buf.len());
        n -= n % PCM_FRAME_BYTES;
        buf[..n].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
        self.pending_pos += n;
        n
    }

    fn has_exited(&mut self) -> bool {
        if !self.exited {
            // A partial frame left after the pipe closed is never returned
            self.exited = self.pcm_closed
                && self.buffered() < PCM_FRAME_BYTES
                && self.child_exited();
        }
        self.exited
    }

    fn duration(&mut self) -> Duration {
        if self.child.is_none() {
            return Duration::ZERO;
        }
        if let Some(duration) = self.duration {
            return duration;
        }

        while let Ok(line) = self.stderr.try_recv() {
            if let Some(duration) = parse_duration_line(&line) {
                debug!(duration = %Timestamp(duration), "parsed stream duration");
                self.duration = Some(duration);
                break;
            }
        }
        self.duration.unwrap_or(Duration::ZERO)
    }

    fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                trace!(%status, "transcoder already exited, releasing");
            }
            _ => match child.kill() {
                Ok(()) => {}
                // Exited between the check and the kill
                Err(e) if e.kind() == ErrorKind::InvalidInput => {}
                Err(e) => warn!(error = %e, "failed to kill transcoder"),
            },
        }
        if let Err(e) = child.wait() {
            warn!(error = %e, "failed to reap transcoder");
        }
        self.duration = None;
    }
}

impl Drop for SubprocessSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_parse_duration_line() {
        assert_eq!(
            parse_duration_line("  Duration: 00:03:25.50, start: 0.000000, bitrate: 320 kb/s"),
            Some(Duration::from_millis(205_500))
        );
        assert_eq!(
            parse_duration_line("Duration: 12:00:00.01"),
            Some(Duration::from_secs(43_200) + Duration::from_millis(10))
        );
    }

    #[test]
    fn test_parse_duration_rejects_other_lines() {
        assert_eq!(parse_duration_line("Input #0, mp3, from 'song.mp3':"), None);
        assert_eq!(parse_duration_line("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration_line("Stream Duration: 00:00:01.00"), None);
    }

    #[test]
    fn test_transcoder_args() {
        let args = transcoder_args("song.mp3", None);
        assert_eq!(args[0], "-hide_banner");
        assert!(args.windows(2).any(|w| w == ["-i", "song.mp3"]));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));

        let args = transcoder_args("song.mp3", Some(Duration::from_secs(3725)));
        assert_eq!(&args[..2], ["-ss", "01:02:05"]);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let err = SubprocessSource::spawn("/nonexistent/voxbridge-transcoder", "x", None)
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::Spawn(_)));
        assert!(err.to_string().starts_with("Unable to create stream"));
    }

    /// Write an executable shell script standing in for the transcoder
    #[cfg(unix)]
    pub(crate) fn fake_transcoder(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[cfg(unix)]
    #[test]
    fn test_reads_pcm_until_exit() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_transcoder(dir.path(), "printf 'abcdefgh'");
        let mut source = SubprocessSource::spawn(&program, "song.mp3", None).unwrap();

        let mut collected = Vec::new();
        let mut buf = [0u8; 6];
        assert!(wait_for(|| {
            let n = source.read(&mut buf);
            collected.extend_from_slice(&buf[..n]);
            n == 0 && source.has_exited()
        }));
        assert_eq!(collected, b"abcdefgh");
    }

    #[cfg(unix)]
    #[test]
    fn test_split_sample_frame_is_held_back() {
        // Two samples of 1000 (e8 03), the first frame split across writes
        let dir = tempfile::tempdir().unwrap();
        let program = fake_transcoder(
            dir.path(),
            "printf '\\350\\003\\350'\nsleep 0.2\nprintf '\\003\\350\\003\\350\\003\\377'",
        );
        let mut source = SubprocessSource::spawn(&program, "x", None).unwrap();

        let mut reads = Vec::new();
        let mut collected = Vec::new();
        let mut buf = [0u8; 64];
        assert!(wait_for(|| {
            let n = source.read(&mut buf);
            if n > 0 {
                reads.push(n);
                collected.extend_from_slice(&buf[..n]);
            }
            n == 0 && source.has_exited()
        }));

        assert!(reads.iter().all(|n| n % PCM_FRAME_BYTES == 0));
        // The odd trailing byte never forms a frame
        assert_eq!(collected, [0xe8, 0x03, 0xe8, 0x03, 0xe8, 0x03, 0xe8, 0x03]);

        voxbridge_voice::adjust_volume(&mut collected, 0.5);
        let samples: Vec<i16> = collected
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![500; 4]);
    }

    #[test]
    fn test_read_smaller_than_a_frame_returns_nothing() {
        let (tx, rx) = sync_channel(4);
        let (_line_tx, line_rx) = sync_channel::<String>(1);
        tx.send(vec![1, 2, 3, 4, 5, 6]).unwrap();
        let mut source = SubprocessSource {
            child: None,
            url: "x".to_string(),
            pcm: rx,
            pending: Vec::new(),
            pending_pos: 0,
            pcm_closed: false,
            stderr: line_rx,
            duration: None,
            exited: false,
        };

        let mut small = [0u8; 3];
        assert_eq!(source.read(&mut small), 0);

        tx.send(vec![7, 8]).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(source.read(&mut buf), 8);
        assert_eq!(&buf[..8], [1, 2, 3, 4, 5, 6, 7, 8]);

        drop(tx);
        assert_eq!(source.read(&mut buf), 0);
        assert!(source.has_exited());
    }

    #[cfg(unix)]
    #[test]
    fn test_duration_from_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_transcoder(
            dir.path(),
            "echo \"Input #0, mp3, from 'x':\" >&2\n\
             echo '  Duration: 00:03:25.50, start: 0.000000' >&2\n\
             sleep 5",
        );
        let mut source = SubprocessSource::spawn(&program, "x", None).unwrap();

        assert!(wait_for(|| source.duration() == Duration::from_millis(205_500)));
        source.stop();
        assert!(!source.is_running());
        assert_eq!(source.duration(), Duration::ZERO);
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_kills_running_child() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_transcoder(dir.path(), "sleep 30");
        let mut source = SubprocessSource::spawn(&program, "x", None).unwrap();
        assert!(source.is_running());
        assert!(!source.has_exited());

        let started = Instant::now();
        source.stop();
        assert!(!source.is_running());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_releases_exited_child() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_transcoder(dir.path(), "exit 0");
        let mut source = SubprocessSource::spawn(&program, "x", None).unwrap();

        let mut buf = [0u8; 16];
        assert!(wait_for(|| source.read(&mut buf) == 0 && source.has_exited()));
        source.stop();
        source.stop();
        assert!(!source.is_running());
    }
}
