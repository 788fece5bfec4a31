//! Capture source: the byte stream feeding the pump.
//!
//! The engine never talks to the audio server's capture utility directly; it
//! reads fixed-size frames of interleaved little-endian 16-bit PCM through
//! [`CaptureSource`], so tests can feed synthetic PCM without spawning a
//! process.

use crate::error::{Result, RoomlockError};
use std::io::Read;
use std::process::{Child, Command, Stdio};

/// Blocking byte-stream reader of interleaved LE i16 PCM frames.
pub trait CaptureSource: Send {
    /// Reads up to one full frame into `frame`, blocking until data is
    /// available. Returns the number of bytes read; `0` means end of stream
    /// and the pump treats it as a clean end of session.
    fn read_frame(&mut self, frame: &mut [u8]) -> Result<usize>;

    /// Terminates and reaps the underlying transport. Idempotent; also
    /// invoked on drop by implementations that own a process.
    fn shutdown(&mut self);
}

/// Capture subprocess reading from a sink's monitor source via `parec`.
pub struct MonitorCapture {
    child: Child,
}

impl MonitorCapture {
    /// Spawns `parec` against `<sink_name>.monitor` with a 1 ms latency
    /// target at the given rate and channel count, stdout piped.
    pub fn spawn(sink_name: &str, channels: usize, sample_rate: u32) -> Result<Self> {
        let monitor_source = format!("{}.monitor", sink_name);
        let child = Command::new("parec")
            .arg("--latency-msec=1")
            .arg("-d")
            .arg(&monitor_source)
            .arg(format!("--channels={}", channels))
            .arg(format!("--rate={}", sample_rate))
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RoomlockError::Capture(format!("Failed to spawn parec for {}: {}", monitor_source, e))
            })?;

        log::info!(
            "capture started on {} ({} ch, {} Hz)",
            monitor_source,
            channels,
            sample_rate
        );
        Ok(Self { child })
    }
}

impl CaptureSource for MonitorCapture {
    fn read_frame(&mut self, frame: &mut [u8]) -> Result<usize> {
        let Some(stdout) = self.child.stdout.as_mut() else {
            return Ok(0);
        };

        // Fill the whole frame, tolerating short reads from the pipe.
        let mut filled = 0;
        while filled < frame.len() {
            match stdout.read(&mut frame[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn shutdown(&mut self) {
        // kill on an already-dead child just reports InvalidInput; either
        // way wait() reaps it so no zombie survives the session.
        let _ = self.child.kill();
        match self.child.wait() {
            Ok(status) => log::debug!("capture process reaped ({})", status),
            Err(e) => log::warn!("failed to reap capture process: {}", e),
        }
    }
}

impl Drop for MonitorCapture {
    fn drop(&mut self) {
        self.shutdown();
    }
}
