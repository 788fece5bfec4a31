//! Speaker configuration store.
//!
//! The table is mutated by the UI at any time and read continuously by the
//! engine loops, so all access goes through an `RwLock` and readers take
//! owned snapshots. Multi-field records are never read torn.

use crate::layout::SurroundLayout;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// One named speaker slot in the active surround layout.
///
/// Angle sign convention: negative = left of forward, positive = right.
/// `min_angle`/`max_angle` bound the adjustable range; magnitudes are what
/// the UI slider spans, the sign is fixed per slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerChannel {
    pub name: String,
    /// Volume in percent, 0–100
    pub volume: u8,
    /// Placement angle in signed degrees
    pub angle: i32,
    pub min_angle: i32,
    pub max_angle: i32,
}

impl SpeakerChannel {
    pub fn new(name: &str, volume: u8, angle: i32, min_angle: i32, max_angle: i32) -> Self {
        Self {
            name: name.to_string(),
            volume,
            angle,
            min_angle,
            max_angle,
        }
    }

    /// Whether the slot's angle is adjustable at all (the center speaker
    /// is pinned to 0°).
    pub fn adjustable(&self) -> bool {
        self.min_angle.abs() < self.max_angle.abs()
    }
}

/// Shared, lock-guarded mapping of speaker names to their parameters.
pub struct SpeakerTable {
    channels: RwLock<HashMap<String, SpeakerChannel>>,
    /// When set, edits to a left/right speaker are applied to its mirror
    /// counterpart as well (magnitude copied, sign kept per slot).
    mirroring: AtomicBool,
}

impl SpeakerTable {
    /// Builds a table with the stock parameters for every known speaker slot.
    pub fn with_defaults() -> Self {
        let defaults = [
            SpeakerChannel::new("Front left", 100, -35, -20, -70),
            SpeakerChannel::new("Front right", 100, 35, 20, 70),
            SpeakerChannel::new("Front center", 100, 0, 0, 0),
            SpeakerChannel::new("Rear left", 50, -130, -90, -160),
            SpeakerChannel::new("Rear right", 50, 130, 90, 160),
        ];
        let channels = defaults
            .into_iter()
            .map(|speaker| (speaker.name.clone(), speaker))
            .collect();
        Self {
            channels: RwLock::new(channels),
            mirroring: AtomicBool::new(true),
        }
    }

    pub fn set_mirroring(&self, enabled: bool) {
        self.mirroring.store(enabled, Ordering::Relaxed);
    }

    pub fn mirroring(&self) -> bool {
        self.mirroring.load(Ordering::Relaxed)
    }

    /// Sets a speaker's volume, clamped to 0–100. Mirrors to the left/right
    /// counterpart when mirroring is enabled.
    pub fn set_volume(&self, name: &str, volume: u8) {
        let volume = volume.min(100);
        let mirror = self.mirror_name(name);
        let mut channels = self.channels.write().unwrap();
        if let Some(speaker) = channels.get_mut(name) {
            speaker.volume = volume;
        }
        if let Some(mirror) = mirror {
            if let Some(speaker) = channels.get_mut(&mirror) {
                speaker.volume = volume;
            }
        }
    }

    /// Sets a speaker's angle. The magnitude is clamped into the slot's
    /// [|min|, |max|] range and the slot's sign convention is preserved, so
    /// passing either `30` or `-30` for "Front left" lands on `-30`.
    pub fn set_angle(&self, name: &str, angle: i32) {
        let mirror = self.mirror_name(name);
        let mut channels = self.channels.write().unwrap();
        if let Some(speaker) = channels.get_mut(name) {
            speaker.angle = clamp_angle(speaker, angle);
        }
        if let Some(mirror) = mirror {
            if let Some(speaker) = channels.get_mut(&mirror) {
                speaker.angle = clamp_angle(speaker, angle);
            }
        }
    }

    /// Replaces a slot's volume and angle wholesale (used when restoring
    /// persisted settings; no mirroring, no clamping beyond volume).
    pub fn restore(&self, name: &str, volume: u8, angle: i32) {
        let mut channels = self.channels.write().unwrap();
        if let Some(speaker) = channels.get_mut(name) {
            speaker.volume = volume.min(100);
            speaker.angle = angle;
        }
    }

    pub fn get(&self, name: &str) -> Option<SpeakerChannel> {
        self.channels.read().unwrap().get(name).cloned()
    }

    /// Owned copy of every slot, keyed by name.
    pub fn snapshot(&self) -> HashMap<String, SpeakerChannel> {
        self.channels.read().unwrap().clone()
    }

    /// Owned copies of the slots used by `layout`, in channel-index order.
    /// Slots missing from the table are skipped (cannot happen with the
    /// stock table, which covers every layout).
    pub fn ordered_for(&self, layout: SurroundLayout) -> Vec<SpeakerChannel> {
        let channels = self.channels.read().unwrap();
        layout
            .speaker_names()
            .iter()
            .filter_map(|name| channels.get(*name).cloned())
            .collect()
    }

    fn mirror_name(&self, name: &str) -> Option<String> {
        if !self.mirroring() {
            return None;
        }
        if name.contains("left") {
            Some(name.replace("left", "right"))
        } else if name.contains("right") {
            Some(name.replace("right", "left"))
        } else {
            None
        }
    }
}

fn clamp_angle(speaker: &SpeakerChannel, requested: i32) -> i32 {
    let lo = speaker.min_angle.abs().min(speaker.max_angle.abs());
    let hi = speaker.min_angle.abs().max(speaker.max_angle.abs());
    let magnitude = requested.abs().clamp(lo, hi);
    if speaker.angle < 0 || (speaker.angle == 0 && speaker.min_angle < 0) {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_layout() {
        let table = SpeakerTable::with_defaults();
        for layout in [
            SurroundLayout::Stereo,
            SurroundLayout::Lcr,
            SurroundLayout::LcrRear,
        ] {
            assert_eq!(table.ordered_for(layout).len(), layout.channels());
        }
    }

    #[test]
    fn volume_clamps_to_percent_range() {
        let table = SpeakerTable::with_defaults();
        table.set_mirroring(false);
        table.set_volume("Front left", 200);
        assert_eq!(table.get("Front left").unwrap().volume, 100);
    }

    #[test]
    fn angle_clamps_into_slot_range_keeping_sign() {
        let table = SpeakerTable::with_defaults();
        table.set_mirroring(false);

        table.set_angle("Front left", 30);
        assert_eq!(table.get("Front left").unwrap().angle, -30);

        table.set_angle("Front left", -5);
        assert_eq!(table.get("Front left").unwrap().angle, -20);

        table.set_angle("Front right", 200);
        assert_eq!(table.get("Front right").unwrap().angle, 70);
    }

    #[test]
    fn mirrored_edit_updates_the_counterpart() {
        let table = SpeakerTable::with_defaults();
        table.set_angle("Front left", 40);
        assert_eq!(table.get("Front left").unwrap().angle, -40);
        assert_eq!(table.get("Front right").unwrap().angle, 40);

        table.set_volume("Rear right", 80);
        assert_eq!(table.get("Rear left").unwrap().volume, 80);

        table.set_mirroring(false);
        table.set_volume("Front left", 10);
        assert_eq!(table.get("Front left").unwrap().volume, 10);
        assert_eq!(table.get("Front right").unwrap().volume, 100);
    }

    #[test]
    fn center_speaker_is_pinned() {
        let table = SpeakerTable::with_defaults();
        assert!(!table.get("Front center").unwrap().adjustable());
        table.set_angle("Front center", 45);
        assert_eq!(table.get("Front center").unwrap().angle, 0);
    }
}
