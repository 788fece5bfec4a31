//! Spatialization engine: speaker placement and listener orientation.
//!
//! Runs at a fixed polling cadence. Every application re-reads the current
//! speaker parameters and orientation and re-issues the full placement for
//! all channels; the calls are cheap and idempotent, so a missed update
//! self-heals on the next tick. Nothing here is delta-based.

use crate::backend::AudioBackend;
use crate::error::Result;
use crate::layout::SurroundLayout;
use crate::speakers::SpeakerChannel;
use glam::{Mat3, Vec3};

/// Position of a speaker at angle `θ` degrees on the unit circle around the
/// listener: `(sin θ, 0, -cos θ)`, forward along -Z. Distance is fixed at 1
/// so the backend's distance model never attenuates; only direction matters.
pub fn speaker_position(angle_degrees: f32) -> Vec3 {
    let angle = angle_degrees.to_radians();
    Vec3::new(angle.sin(), 0.0, -angle.cos())
}

/// Gain for a configured volume percentage, clamped to `[0, 1]`.
pub fn speaker_gain(volume: u8) -> f32 {
    (volume.min(100) as f32) / 100.0
}

/// Converts the effective head orientation (camera convention: Y down,
/// Z into the scene) into the backend's listener axes (Y up, -Z forward).
///
/// Forward = row 2 of the matrix, up = negated row 1. This transform is
/// fixed; altering it inverts left/right or up/down.
pub fn listener_axes(effective: Mat3) -> (Vec3, Vec3) {
    let row = |r: usize| Vec3::new(effective.col(0)[r], effective.col(1)[r], effective.col(2)[r]);
    let forward = row(2);
    let up = -row(1);
    (forward, up)
}

/// Re-issues the listener orientation and the full per-channel placement for
/// `layout` against the backend. `speakers` must be in channel-index order
/// (see [`SurroundLayout::speaker_names`]).
pub fn apply(
    backend: &mut dyn AudioBackend,
    layout: SurroundLayout,
    speakers: &[SpeakerChannel],
    effective: Mat3,
) -> Result<()> {
    let (forward, up) = listener_axes(effective);
    backend.set_listener_orientation(forward, up)?;

    for (channel, speaker) in speakers.iter().take(layout.channels()).enumerate() {
        backend.set_source_gain(channel, speaker_gain(speaker.volume))?;
        backend.set_source_position(channel, speaker_position(speaker.angle as f32))?;
    }
    Ok(())
}
