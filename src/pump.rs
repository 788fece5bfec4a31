//! Streaming audio pump.
//!
//! Pulls fixed-size frames of interleaved PCM from the capture source,
//! demultiplexes them per channel and feeds the backend's buffer rings,
//! recovering stalled sources along the way. Runs on its own thread for the
//! lifetime of a session; the only blocking points are the capture read and
//! the backend lock.

use crate::backend::AudioBackend;
use crate::capture::CaptureSource;
use crate::events::SessionEvent;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Runs the pump loop until the stop flag is set or the capture stream ends.
///
/// Per iteration:
/// 1. blocking read of one frame; an empty read is a clean end of session;
/// 2. a frame bit-identical to the previous one is dropped entirely — the
///    capture path pads underruns with repeats of stale silence, and
///    resubmitting them would double up the already-queued audio. Exact
///    whole-frame byte equality is the contract, nothing fuzzier;
/// 3. demultiplex and, per channel, refill **at most one** finished buffer
///    no matter how many are reported processed, bounding latency growth;
/// 4. per channel, reissue play on any source found neither playing nor
///    paused (queue ran dry).
///
/// On exit the capture transport is shut down (terminated and reaped).
pub fn run(
    mut capture: Box<dyn CaptureSource>,
    backend: Arc<Mutex<dyn AudioBackend>>,
    channels: usize,
    frame_bytes: usize,
    stop: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
) {
    let mut frame = vec![0u8; frame_bytes];
    let mut previous: Option<Vec<u8>> = None;

    log::info!(
        "pump running: {} channels, {} bytes per frame",
        channels,
        frame_bytes
    );

    while !stop.load(Ordering::Relaxed) {
        let read = match capture.read_frame(&mut frame) {
            Ok(0) => {
                log::info!("capture stream ended");
                let _ = events.send(SessionEvent::CaptureEnded);
                break;
            }
            Ok(n) => n,
            Err(e) => {
                log::error!("capture read failed: {}", e);
                let _ = events.send(SessionEvent::CaptureEnded);
                break;
            }
        };

        let data = &frame[..read];
        if previous.as_deref() == Some(data) {
            // Duplicate/silence-fill artifact of the capture path; leave the
            // queued audio draining instead of resubmitting it.
            continue;
        }
        previous = Some(data.to_vec());

        let samples: Vec<i16> = data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        let Ok(mut backend) = backend.lock() else {
            log::error!("backend lock poisoned, pump exiting");
            break;
        };

        for channel in 0..channels {
            let channel_samples: Vec<i16> =
                samples.iter().skip(channel).step_by(channels).copied().collect();

            match backend.processed_count(channel) {
                Ok(count) if count >= 1 => {
                    if let Err(e) = backend.refill_one(channel, &channel_samples) {
                        log::warn!("refill failed on channel {}: {}", channel, e);
                    }
                }
                Ok(_) => {}
                Err(e) => log::warn!("processed query failed on channel {}: {}", channel, e),
            }

            // Sometimes a source needs to be restarted after its queue ran dry.
            match backend.source_state(channel) {
                Ok(state) if state.is_stalled() => {
                    log::debug!("channel {} stalled, reissuing play", channel);
                    if let Err(e) = backend.play(channel) {
                        log::warn!("play reissue failed on channel {}: {}", channel, e);
                    } else {
                        let _ = events.send(SessionEvent::StallRecovered { channel });
                    }
                }
                Ok(_) => {}
                Err(e) => log::warn!("state query failed on channel {}: {}", channel, e),
            }
        }
    }

    capture.shutdown();
    log::info!("pump stopped");
}
