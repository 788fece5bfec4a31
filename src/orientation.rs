//! Head orientation integration.
//!
//! The tracker itself (camera capture, face landmarks, pose solving) lives
//! outside this crate; it is consumed through [`OrientationSource`] as a bare
//! 3×3 rotation matrix, or `None` when there is no signal. This module owns
//! the raw/offset matrix pair, the recenter debounce and the pure angle
//! extraction helpers.
//!
//! Matrix convention: right-handed, camera space (Y down, Z into the scene).
//! `m(r, c)` below means row `r`, column `c`.

use glam::{Mat3, Vec3};
use std::sync::Mutex;
use std::time::Instant;

/// External supplier of the head pose, polled once per orientation tick.
pub trait OrientationSource: Send + Sync {
    /// Returns the current raw rotation matrix, or `None` when the tracker
    /// has no signal (no face in frame, camera gone).
    fn poll_orientation(&self) -> Option<Mat3>;
}

/// Forward-facing orientation in the tracker's camera convention.
pub fn default_orientation() -> Mat3 {
    Mat3::from_diagonal(Vec3::new(1.0, -1.0, -1.0))
}

struct TrackerState {
    raw: Mat3,
    offset: Mat3,
    lost_since: Option<Instant>,
}

/// Debounced head-orientation state: calibration offset composed with the
/// raw tracked rotation, falling back to [`default_orientation`] after
/// continuous tracking loss exceeds the recenter timeout.
///
/// All reads hand out owned matrices; the inner lock is never exposed.
pub struct HeadTracker {
    state: Mutex<TrackerState>,
    recenter_timeout: std::time::Duration,
}

impl HeadTracker {
    pub fn new(recenter_timeout: std::time::Duration) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                raw: default_orientation(),
                offset: Mat3::IDENTITY,
                lost_since: None,
            }),
            recenter_timeout,
        }
    }

    /// Records one poll result. A good sample replaces the raw matrix and
    /// clears any loss timer; a missed sample only starts the timer, so the
    /// last good matrix keeps being served until the timeout elapses.
    pub fn observe(&self, sample: Option<Mat3>) {
        self.observe_at(sample, Instant::now());
    }

    pub fn observe_at(&self, sample: Option<Mat3>, at: Instant) {
        let mut state = self.state.lock().unwrap();
        match sample {
            Some(raw) => {
                if state.lost_since.take().is_some() {
                    log::debug!("tracking signal recovered");
                }
                state.raw = raw;
            }
            None => {
                if state.lost_since.is_none() {
                    log::debug!("tracking signal lost, starting recenter timer");
                    state.lost_since = Some(at);
                }
            }
        }
    }

    /// Effective orientation: offset ∘ raw, or the default forward-facing
    /// matrix once tracking has been lost for at least the recenter timeout.
    pub fn effective(&self) -> Mat3 {
        self.effective_at(Instant::now())
    }

    pub fn effective_at(&self, at: Instant) -> Mat3 {
        let state = self.state.lock().unwrap();
        if Self::lost_expired(&state, self.recenter_timeout, at) {
            default_orientation()
        } else {
            state.offset * state.raw
        }
    }

    /// Whether the effective orientation has fallen back to the default.
    pub fn recentered(&self) -> bool {
        self.recentered_at(Instant::now())
    }

    pub fn recentered_at(&self, at: Instant) -> bool {
        let state = self.state.lock().unwrap();
        Self::lost_expired(&state, self.recenter_timeout, at)
    }

    fn lost_expired(
        state: &TrackerState,
        timeout: std::time::Duration,
        at: Instant,
    ) -> bool {
        state
            .lost_since
            .is_some_and(|since| at.saturating_duration_since(since) >= timeout)
    }

    /// Captures the current pose as the new calibration zero: the offset
    /// becomes the negated transpose of the current effective matrix, so
    /// that the pose held during calibration maps to facing forward.
    pub fn calibrate(&self) {
        let mut state = self.state.lock().unwrap();
        let current = state.offset * state.raw;
        state.offset = -current.transpose();
        log::info!("orientation calibrated, offset yaw {:.1}°", -yaw_degrees(&state.offset));
    }

    pub fn reset_offset(&self) {
        self.state.lock().unwrap().offset = Mat3::IDENTITY;
    }

    pub fn offset(&self) -> Mat3 {
        self.state.lock().unwrap().offset
    }

    pub fn set_offset(&self, offset: Mat3) {
        self.state.lock().unwrap().offset = offset;
    }

    /// Yaw of the calibration offset, sign-flipped for display (the UI shows
    /// where the camera sits relative to the listener).
    pub fn offset_yaw(&self) -> f32 {
        -yaw_degrees(&self.offset())
    }
}

fn element(m: &Mat3, row: usize, col: usize) -> f32 {
    m.col(col)[row]
}

/// Yaw in degrees, aerospace-sequence extraction.
pub fn yaw_degrees(m: &Mat3) -> f32 {
    let m20 = element(m, 2, 0);
    let m10 = element(m, 1, 0);
    let m00 = element(m, 0, 0);
    (-m20).atan2(m10.hypot(m00)).to_degrees()
}

/// Pitch in degrees.
pub fn pitch_degrees(m: &Mat3) -> f32 {
    let m21 = element(m, 2, 1);
    let m20 = element(m, 2, 0);
    m21.atan2((1.0 - m20 * m20).sqrt()).to_degrees()
}

/// Roll in degrees.
pub fn roll_degrees(m: &Mat3) -> f32 {
    let m10 = element(m, 1, 0);
    let m00 = element(m, 0, 0);
    m10.atan2(m00).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn yaw_rotation(degrees: f32) -> Mat3 {
        // Rotation about the camera's Y (down) axis
        Mat3::from_rotation_y(degrees.to_radians())
    }

    #[test]
    fn identity_has_zero_angles() {
        let m = Mat3::IDENTITY;
        assert_relative_eq!(yaw_degrees(&m), 0.0);
        assert_relative_eq!(pitch_degrees(&m), 0.0);
        assert_relative_eq!(roll_degrees(&m), 0.0);
    }

    #[test]
    fn yaw_extraction_matches_rotation_angle() {
        // from_rotation_y(θ) has m(2,0) = -sin θ, so the extracted yaw is θ
        for angle in [-60.0_f32, -15.0, 10.0, 45.0] {
            let m = yaw_rotation(angle);
            assert_relative_eq!(yaw_degrees(&m), angle, epsilon = 1e-4);
        }
    }

    #[test]
    fn roll_extraction_matches_rotation_angle() {
        let m = Mat3::from_rotation_z(30.0_f32.to_radians());
        assert_relative_eq!(roll_degrees(&m), 30.0, epsilon = 1e-4);
    }

    #[test]
    fn good_sample_replaces_raw_matrix() {
        let tracker = HeadTracker::new(Duration::from_secs(10));
        let pose = yaw_rotation(20.0);
        tracker.observe(Some(pose));
        let effective = tracker.effective();
        assert_relative_eq!(effective.col(0).x, pose.col(0).x, epsilon = 1e-6);
    }

    #[test]
    fn loss_shorter_than_timeout_keeps_last_good_matrix() {
        let timeout = Duration::from_secs(10);
        let tracker = HeadTracker::new(timeout);
        let start = Instant::now();
        let pose = yaw_rotation(20.0);

        tracker.observe_at(Some(pose), start);
        for i in 1..5 {
            tracker.observe_at(None, start + Duration::from_secs(i));
        }

        let just_before = start + timeout - Duration::from_millis(1);
        assert!(!tracker.recentered_at(just_before));
        let effective = tracker.effective_at(just_before);
        assert_relative_eq!(effective.col(0).x, pose.col(0).x, epsilon = 1e-6);
    }

    #[test]
    fn loss_spanning_timeout_falls_back_to_default() {
        let timeout = Duration::from_secs(10);
        let tracker = HeadTracker::new(timeout);
        let start = Instant::now();

        tracker.observe_at(Some(yaw_rotation(20.0)), start);
        tracker.observe_at(None, start + Duration::from_secs(1));

        let after = start + Duration::from_secs(1) + timeout;
        assert!(tracker.recentered_at(after));
        assert_eq!(tracker.effective_at(after), default_orientation());
    }

    #[test]
    fn recovery_clears_the_loss_timer() {
        let timeout = Duration::from_secs(10);
        let tracker = HeadTracker::new(timeout);
        let start = Instant::now();

        tracker.observe_at(None, start);
        tracker.observe_at(Some(yaw_rotation(5.0)), start + Duration::from_secs(9));
        assert!(!tracker.recentered_at(start + Duration::from_secs(30)));
    }

    #[test]
    fn calibration_cancels_the_current_pose() {
        let tracker = HeadTracker::new(Duration::from_secs(10));
        tracker.observe(Some(yaw_rotation(25.0)));
        tracker.calibrate();

        // With the freshly captured offset, the same raw pose should come
        // out near forward-facing (zero yaw) up to the sign flip baked into
        // the calibration transform.
        let effective = tracker.effective();
        assert_relative_eq!(yaw_degrees(&effective).abs(), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn reset_offset_returns_to_identity() {
        let tracker = HeadTracker::new(Duration::from_secs(10));
        tracker.observe(Some(yaw_rotation(25.0)));
        tracker.calibrate();
        tracker.reset_offset();
        assert_eq!(tracker.offset(), Mat3::IDENTITY);
    }
}
