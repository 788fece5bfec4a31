//! # Roomlock
//!
//! A head-tracked virtual surround renderer. Roomlock plays a multi-channel
//! mix through an ordinary stereo headset while keeping the virtual
//! loudspeakers fixed in the room: as the listener turns their head, every
//! speaker is re-spatialized against the inverse head orientation, so the
//! front-left channel stays front-left of the *room*, not of the face.
//!
//! ## Architecture
//!
//! A running [`Session`] owns four cooperating pieces:
//!
//! - **[`AudioServer`]** — the OS audio layer: creates the virtual
//!   multi-channel sink applications render into, redirects streams and
//!   manages sink volumes.
//! - **[`CaptureSource`]** — pulls interleaved PCM frames from the virtual
//!   sink's monitor ([`MonitorCapture`] runs `parec` against it).
//! - **[`AudioBackend`]** — one mono 3D source per surround channel plus a
//!   listener ([`CpalBackend`] mixes them down to the stereo device).
//! - **[`HeadTracker`]** — debounced head orientation fed by an
//!   [`OrientationSource`], with user calibration and a recenter timeout.
//!
//! Two loops run on background threads for the life of the session: the
//! streaming pump (capture → de-interleave → per-source buffer refill, with
//! stall recovery) and the orientation integrator (poll tracker → re-apply
//! speaker placement and listener axes every tick).
//!
//! ## Quick Start
//!
//! ```no_run
//! use roomlock::*;
//! use std::sync::Arc;
//!
//! # fn server() -> Box<dyn AudioServer> { unimplemented!() }
//! # fn camera() -> Arc<dyn OrientationSource> { unimplemented!() }
//! let desc = SessionDesc {
//!     headset_sink: "alsa_output.usb-headset".to_string(),
//!     ..SessionDesc::default()
//! };
//! let speakers = Arc::new(SpeakerTable::with_defaults());
//! let tracker = Arc::new(HeadTracker::new(desc.recenter_timeout));
//!
//! let mut session = Session::start_default(
//!     desc,
//!     SurroundLayout::Lcr,
//!     server(),
//!     speakers.clone(),
//!     tracker.clone(),
//!     camera(),
//! )?;
//!
//! // Face forward, then zero the tracker there.
//! tracker.calibrate();
//!
//! // Nudge a speaker while audio is playing.
//! speakers.set_angle("Front left", -45);
//!
//! for event in session.poll_events() {
//!     println!("{:?}", event);
//! }
//!
//! session.stop();
//! # Ok::<(), RoomlockError>(())
//! ```
//!
//! Changing the layout or the output device means stopping the session and
//! starting a new one; a live session's channel count never changes.

pub mod backend;
pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod layout;
pub mod orientation;
pub mod pump;
pub mod server;
pub mod session;
pub mod settings;
pub mod spatial;
pub mod speakers;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{AudioBackend, CpalBackend, SourceState};
pub use capture::{CaptureSource, MonitorCapture};
pub use config::SessionDesc;
pub use error::{Result, RoomlockError};
pub use events::SessionEvent;
pub use layout::SurroundLayout;
pub use orientation::{HeadTracker, OrientationSource, default_orientation};
pub use server::{AudioServer, ModuleId, NullSinkSpec};
pub use session::{Session, SessionState, SharedBackend};
pub use settings::{Settings, SpeakerRecord};
pub use speakers::{SpeakerChannel, SpeakerTable};
