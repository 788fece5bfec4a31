//! Audio backend abstraction.
//!
//! The backend owns one playback source per surround channel, each with a
//! fixed ring of queueable sample buffers, and exposes the property surface
//! the spatializer drives (per-source gain/position, listener orientation).
//!
//! Buffer operations (`processed_count`, `refill_one`) belong to the
//! streaming pump; the orientation loop only issues property sets.

mod cpal;

pub use self::cpal::CpalBackend;

use crate::error::Result;
use glam::Vec3;

/// Playback state of a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Playing,
    Paused,
    /// The source's buffer queue ran dry and playback halted; recover by
    /// reissuing [`AudioBackend::play`].
    Stopped,
}

impl SourceState {
    /// A stalled source is one that is neither playing nor paused.
    pub fn is_stalled(&self) -> bool {
        !matches!(self, Self::Playing | Self::Paused)
    }
}

/// A 3D audio device with one queue-fed source per surround channel.
///
/// Implementations pre-create every source with `buffers_number` silent
/// buffers queued, so starting playback never plays from an empty queue.
pub trait AudioBackend: Send {
    /// Number of sources (= surround channels) this backend was opened with.
    fn channels(&self) -> usize;

    /// Sets a source's gain, expected in `[0, 1]`.
    fn set_source_gain(&mut self, source: usize, gain: f32) -> Result<()>;

    /// Places a source in listener space. Positions sit on the unit circle;
    /// only direction matters, distance attenuation is a no-op at distance 1.
    fn set_source_position(&mut self, source: usize, position: Vec3) -> Result<()>;

    /// Sets the listener orientation as a forward/up vector pair in the
    /// backend's convention (Y up, forward along -Z when facing ahead).
    fn set_listener_orientation(&mut self, forward: Vec3, up: Vec3) -> Result<()>;

    /// Number of finished buffers available to be refilled on this source.
    fn processed_count(&mut self, source: usize) -> Result<usize>;

    /// Dequeues exactly one finished buffer, overwrites it with `samples`
    /// and re-enqueues it. Callers must check `processed_count` first.
    fn refill_one(&mut self, source: usize, samples: &[i16]) -> Result<()>;

    /// Current playback state of a source.
    fn source_state(&mut self, source: usize) -> Result<SourceState>;

    /// (Re)starts playback on one source. Used both at session start and as
    /// the stall-recovery path.
    fn play(&mut self, source: usize) -> Result<()>;

    /// Starts playback on every source.
    fn play_all(&mut self) -> Result<()> {
        for source in 0..self.channels() {
            self.play(source)?;
        }
        Ok(())
    }
}
