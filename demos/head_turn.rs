//! Dry run of the placement math without any audio hardware: sweeps the
//! head through a yaw arc and prints the listener axes plus where each
//! speaker of the LCR layout sits. Run with `RUST_LOG=debug` to see the
//! tracker's own logging.

use glam::Mat3;
use roomlock::orientation::{self, HeadTracker};
use roomlock::{SpeakerTable, SurroundLayout, spatial};
use std::time::Duration;

fn main() {
    env_logger::init();

    let layout = SurroundLayout::Lcr;
    let speakers = SpeakerTable::with_defaults();
    let tracker = HeadTracker::new(Duration::from_secs(10));

    println!("layout: {} ({} channels)", layout, layout.channels());
    for speaker in speakers.ordered_for(layout) {
        let position = spatial::speaker_position(speaker.angle as f32);
        println!(
            "  {:<13} {:>4}°  gain {:.2}  at ({:+.2}, {:+.2}, {:+.2})",
            speaker.name,
            speaker.angle,
            spatial::speaker_gain(speaker.volume),
            position.x,
            position.y,
            position.z
        );
    }

    for yaw in [-45.0f32, -20.0, 0.0, 20.0, 45.0] {
        let raw = orientation::default_orientation() * Mat3::from_rotation_y(yaw.to_radians());
        tracker.observe(Some(raw));

        let effective = tracker.effective();
        let (forward, up) = spatial::listener_axes(effective);
        println!(
            "head yaw {:>6.1}°  ->  forward ({:+.2}, {:+.2}, {:+.2})  up ({:+.2}, {:+.2}, {:+.2})",
            yaw, forward.x, forward.y, forward.z, up.x, up.y, up.z
        );
    }

    log::info!("sweep finished");
}
