//! Persisted user settings.
//!
//! A [`Settings`] value is the JSON record written to disk between runs:
//! the stream name to intercept, the calibration offset, the selected
//! layout and the per-speaker parameters. `capture_from`/`apply_to` bridge
//! between this serialized shape and the live runtime state.

use crate::config::SessionDesc;
use crate::error::{Result, RoomlockError};
use crate::layout::SurroundLayout;
use crate::orientation::HeadTracker;
use crate::speakers::SpeakerTable;
use glam::Mat3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Persisted parameters of one speaker slot. Bounds are stored alongside
/// the values so the UI can rebuild its sliders without consulting the
/// built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerRecord {
    pub volume: u8,
    pub angle: i32,
    pub min_angle: i32,
    pub max_angle: i32,
}

/// The on-disk settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// `media.name` of the application stream to intercept
    #[serde(rename = "media.name")]
    pub media_name: String,
    /// Calibration offset as a row-major 3x3 matrix
    pub offset_rotation_matrix: [[f32; 3]; 3],
    /// Display name of the selected layout ("Stereo", "LCR", "LCR + Rear")
    pub selected_surround_system: String,
    /// Per-speaker parameters, keyed by slot name
    pub speakers_parameters: BTreeMap<String, SpeakerRecord>,
}

impl Default for Settings {
    fn default() -> Self {
        let desc = SessionDesc::default();
        Self {
            media_name: desc.media_name,
            offset_rotation_matrix: to_rows(Mat3::IDENTITY),
            selected_surround_system: SurroundLayout::default().to_string(),
            speakers_parameters: speaker_records(&SpeakerTable::with_defaults()),
        }
    }
}

impl Settings {
    /// Snapshots the live runtime state into a serializable record.
    pub fn capture_from(
        media_name: &str,
        layout: SurroundLayout,
        speakers: &SpeakerTable,
        tracker: &HeadTracker,
    ) -> Self {
        Self {
            media_name: media_name.to_string(),
            offset_rotation_matrix: to_rows(tracker.offset()),
            selected_surround_system: layout.to_string(),
            speakers_parameters: speaker_records(speakers),
        }
    }

    /// Pushes the record back into the live runtime state and returns the
    /// layout it selects.
    pub fn apply_to(
        &self,
        speakers: &SpeakerTable,
        tracker: &HeadTracker,
    ) -> Result<SurroundLayout> {
        let layout: SurroundLayout = self.selected_surround_system.parse()?;
        tracker.set_offset(from_rows(self.offset_rotation_matrix));
        for (name, record) in &self.speakers_parameters {
            speakers.restore(name, record.volume, record.angle);
        }
        Ok(layout)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| RoomlockError::Configuration(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| RoomlockError::Configuration(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

fn speaker_records(table: &SpeakerTable) -> BTreeMap<String, SpeakerRecord> {
    table
        .snapshot()
        .into_iter()
        .map(|(name, s)| {
            (
                name,
                SpeakerRecord {
                    volume: s.volume,
                    angle: s.angle,
                    min_angle: s.min_angle,
                    max_angle: s.max_angle,
                },
            )
        })
        .collect()
}

fn to_rows(m: Mat3) -> [[f32; 3]; 3] {
    let mut rows = [[0.0f32; 3]; 3];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = m.col(c)[r];
        }
    }
    rows
}

fn from_rows(rows: [[f32; 3]; 3]) -> Mat3 {
    Mat3::from_cols(
        glam::Vec3::new(rows[0][0], rows[1][0], rows[2][0]),
        glam::Vec3::new(rows[0][1], rows[1][1], rows[2][1]),
        glam::Vec3::new(rows[0][2], rows[1][2], rows[2][2]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_record_carries_the_stock_parameters() {
        let settings = Settings::default();
        assert_eq!(settings.media_name, "Playback Stream");
        assert_eq!(settings.selected_surround_system, "LCR");
        assert_eq!(settings.offset_rotation_matrix, to_rows(Mat3::IDENTITY));

        let fl = &settings.speakers_parameters["Front left"];
        assert_eq!((fl.volume, fl.angle, fl.min_angle, fl.max_angle), (100, -35, -20, -70));
        let rr = &settings.speakers_parameters["Rear right"];
        assert_eq!((rr.volume, rr.angle), (50, 130));
    }

    #[test]
    fn json_shape_uses_the_dotted_media_key() {
        let settings = Settings::default();
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["media.name"], "Playback Stream");
        assert!(json["speakers_parameters"]["Front center"].is_object());
        assert_eq!(json["offset_rotation_matrix"][0][0], 1.0);

        let back: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn round_trips_through_the_runtime_state() {
        let speakers = SpeakerTable::with_defaults();
        speakers.set_mirroring(false);
        speakers.set_volume("Front left", 42);
        speakers.set_angle("Front left", -55);
        let tracker = HeadTracker::new(Duration::from_secs(10));
        tracker.set_offset(Mat3::from_rotation_y(0.5));

        let settings =
            Settings::capture_from("Game Stream", SurroundLayout::LcrRear, &speakers, &tracker);

        let restored_speakers = SpeakerTable::with_defaults();
        let restored_tracker = HeadTracker::new(Duration::from_secs(10));
        let layout = settings.apply_to(&restored_speakers, &restored_tracker).unwrap();

        assert_eq!(layout, SurroundLayout::LcrRear);
        let fl = restored_speakers.get("Front left").unwrap();
        assert_eq!((fl.volume, fl.angle), (42, -55));
        let offset = restored_tracker.offset();
        assert!((offset.col(0)[0] - 0.5f32.cos()).abs() < 1e-6);
    }

    #[test]
    fn unknown_layout_name_is_rejected() {
        let mut settings = Settings::default();
        settings.selected_surround_system = "7.1".to_string();
        let speakers = SpeakerTable::with_defaults();
        let tracker = HeadTracker::new(Duration::from_secs(10));
        assert!(settings.apply_to(&speakers, &tracker).is_err());
    }
}
