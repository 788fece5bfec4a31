//! Device session manager.
//!
//! A session owns the virtual sink, the audio backend, the capture transport
//! and the two background loops (streaming pump, orientation integration).
//! Exactly one session is active at a time; changing layout or output device
//! means `stop` then `start`, never mutating a live session's channel count.
//!
//! The start and stop sequences below are hard contracts, not optimizations:
//! skipping a restoration step on stop leaves the OS audio routing pointed at
//! a virtual sink that no longer exists.

use crate::backend::{AudioBackend, CpalBackend};
use crate::capture::{CaptureSource, MonitorCapture};
use crate::config::SessionDesc;
use crate::error::{Result, RoomlockError};
use crate::events::SessionEvent;
use crate::layout::SurroundLayout;
use crate::orientation::{HeadTracker, OrientationSource};
use crate::pump;
use crate::server::{AudioServer, ModuleId, NullSinkSpec};
use crate::spatial;
use crate::speakers::SpeakerTable;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Backend handle shared between the session and its loops.
pub type SharedBackend = Arc<Mutex<dyn AudioBackend>>;

/// Lifecycle of a session against the audio server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// OS default output switched to the physical headset, backend opened
    DeviceBound,
    /// Virtual multi-channel sink loaded
    SinkCreated,
    /// Capture and both loops running
    Streaming,
    TearingDown,
}

/// An active playback session.
pub struct Session {
    desc: SessionDesc,
    layout: SurroundLayout,
    server: Box<dyn AudioServer>,
    backend: Option<SharedBackend>,
    module: Option<ModuleId>,
    initial_headset_volume: f32,
    stop_flag: Arc<AtomicBool>,
    pump_thread: Option<JoinHandle<()>>,
    orientation_thread: Option<JoinHandle<()>>,
    events_sender: Sender<SessionEvent>,
    events_receiver: Receiver<SessionEvent>,
    state: SessionState,
    history: Vec<SessionState>,
    stopped: bool,
}

impl Session {
    /// Starts a session with the built-in cpal backend and a `parec` capture
    /// subprocess on the virtual sink's monitor source.
    pub fn start_default(
        desc: SessionDesc,
        layout: SurroundLayout,
        server: Box<dyn AudioServer>,
        speakers: Arc<SpeakerTable>,
        tracker: Arc<HeadTracker>,
        orientation_source: Arc<dyn OrientationSource>,
    ) -> Result<Self> {
        Self::start(
            desc,
            layout,
            server,
            speakers,
            tracker,
            orientation_source,
            |desc, channels| {
                let backend = CpalBackend::open(
                    desc.sample_rate,
                    channels,
                    desc.buffer_size,
                    desc.buffers_number,
                )?;
                Ok(Arc::new(Mutex::new(backend)) as SharedBackend)
            },
            |desc, channels| {
                let capture = MonitorCapture::spawn(&desc.sink_name, channels, desc.sample_rate)?;
                Ok(Box::new(capture) as Box<dyn CaptureSource>)
            },
        )
    }

    /// Runs the full start sequence. Any failure is fatal to the session:
    /// the error is surfaced to the caller and the partial setup is unwound
    /// so the OS routing is not left half-initialized.
    ///
    /// Sequence: bind the headset as default output → open the backend
    /// against it → load the virtual sink with the layout's channel map →
    /// make the virtual sink the default → redirect the target media stream
    /// straight to the headset → move the headset's volume onto the virtual
    /// sink and force the headset to unity gain → spawn capture and both
    /// loops → start playback.
    #[allow(clippy::too_many_arguments)]
    pub fn start<B, C>(
        desc: SessionDesc,
        layout: SurroundLayout,
        mut server: Box<dyn AudioServer>,
        speakers: Arc<SpeakerTable>,
        tracker: Arc<HeadTracker>,
        orientation_source: Arc<dyn OrientationSource>,
        backend_factory: B,
        capture_factory: C,
    ) -> Result<Self>
    where
        B: FnOnce(&SessionDesc, usize) -> Result<SharedBackend>,
        C: FnOnce(&SessionDesc, usize) -> Result<Box<dyn CaptureSource>>,
    {
        let channels = layout.channels();
        let mut history = vec![SessionState::Idle];

        // The 3D backend picks up whatever the OS default output is, so the
        // headset must be made default before the device is opened.
        server.set_default_sink(&desc.headset_sink)?;
        let backend = backend_factory(&desc, channels)?;
        history.push(SessionState::DeviceBound);
        log::info!("session: device bound to {}", desc.headset_sink);

        let sink_spec = NullSinkSpec {
            sink_name: desc.sink_name.clone(),
            channels,
            channel_map: layout
                .server_channel_map()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rate: desc.sample_rate,
        };
        let module = server.load_null_sink(&sink_spec)?;
        history.push(SessionState::SinkCreated);
        log::info!("session: virtual sink {} loaded", desc.sink_name);

        let routed = (|| -> Result<(Box<dyn CaptureSource>, f32)> {
            server.set_default_sink(&desc.sink_name)?;
            // Route the originating application's stream straight to the
            // headset, or it would loop back through the virtual sink twice.
            server.move_streams_matching(&desc.media_name, &desc.headset_sink)?;

            // The virtual sink becomes the sole volume control point.
            let headset_volume = server.sink_volume(&desc.headset_sink)?;
            server.set_sink_volume(&desc.sink_name, headset_volume)?;
            server.set_sink_volume(&desc.headset_sink, 1.0)?;

            {
                let mut backend = backend.lock().unwrap();
                spatial::apply(
                    &mut *backend,
                    layout,
                    &speakers.ordered_for(layout),
                    tracker.effective(),
                )?;
                backend.play_all()?;
            }

            let capture = capture_factory(&desc, channels)?;
            Ok((capture, headset_volume))
        })();

        let (capture, initial_headset_volume) = match routed {
            Ok(routed) => routed,
            Err(e) => {
                log::warn!("session start failed, unwinding partial setup: {}", e);
                let _ = server.set_default_sink(&desc.headset_sink);
                let _ = server.unload_module(module);
                return Err(e);
            }
        };

        let stop_flag = Arc::new(AtomicBool::new(false));
        let (events_sender, events_receiver) = crossbeam_channel::unbounded();

        let pump_thread = {
            let backend = backend.clone();
            let stop = stop_flag.clone();
            let events = events_sender.clone();
            let frame_bytes = desc.frame_bytes(channels);
            let spawned = std::thread::Builder::new()
                .name("roomlock-pump".to_string())
                .spawn(move || pump::run(capture, backend, channels, frame_bytes, stop, events));
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    let _ = server.set_default_sink(&desc.headset_sink);
                    let _ = server.unload_module(module);
                    return Err(RoomlockError::Session(format!(
                        "Failed to spawn pump thread: {}",
                        e
                    )));
                }
            }
        };

        let orientation_thread = {
            let backend = backend.clone();
            let stop = stop_flag.clone();
            let events = events_sender.clone();
            let tick = desc.orientation_tick;
            let spawned = std::thread::Builder::new()
                .name("roomlock-orientation".to_string())
                .spawn(move || {
                    orientation_loop(
                        orientation_source,
                        tracker,
                        speakers,
                        layout,
                        backend,
                        stop,
                        tick,
                        events,
                    )
                });
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    stop_flag.store(true, Ordering::Relaxed);
                    let _ = pump_thread.join();
                    let _ = server.set_default_sink(&desc.headset_sink);
                    let _ = server.unload_module(module);
                    return Err(RoomlockError::Session(format!(
                        "Failed to spawn orientation thread: {}",
                        e
                    )));
                }
            }
        };

        history.push(SessionState::Streaming);
        log::info!("session streaming: layout {}, {} channels", layout, channels);
        let _ = events_sender.send(SessionEvent::Started);

        Ok(Self {
            desc,
            layout,
            server,
            backend: Some(backend),
            module: Some(module),
            initial_headset_volume,
            stop_flag,
            pump_thread: Some(pump_thread),
            orientation_thread: Some(orientation_thread),
            events_sender,
            events_receiver,
            state: SessionState::Streaming,
            history,
            stopped: false,
        })
    }

    pub fn layout(&self) -> SurroundLayout {
        self.layout
    }

    pub fn desc(&self) -> &SessionDesc {
        &self.desc
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state this session has passed through, in order.
    pub fn state_history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Drains pending session events without blocking.
    pub fn poll_events(&self) -> Vec<SessionEvent> {
        self.events_receiver.try_iter().collect()
    }

    /// Runs the full teardown sequence. Idempotent; every restoration step
    /// is best-effort so a single failure cannot leave the rest undone.
    ///
    /// Ordering is strict: stop flag → join pump → join orientation →
    /// reverse the device setup. Joining first prevents a loop from touching
    /// a handle the teardown is about to release.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.transition(SessionState::TearingDown);

        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.pump_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.orientation_thread.take() {
            let _ = handle.join();
        }

        // Whatever the virtual sink's volume drifted to is the volume the
        // user last chose; carry it back onto the physical device. If the
        // sink can no longer be read, fall back to the volume captured at
        // start so the headset never stays pinned at unity gain.
        let volume = match self.server.sink_volume(&self.desc.sink_name) {
            Ok(volume) => volume,
            Err(e) => {
                log::warn!(
                    "failed to read virtual sink volume, restoring pre-start volume: {}",
                    e
                );
                self.initial_headset_volume
            }
        };
        if let Err(e) = self.server.set_sink_volume(&self.desc.headset_sink, volume) {
            log::warn!("failed to restore headset volume: {}", e);
        }

        if let Err(e) = self.server.set_default_sink(&self.desc.headset_sink) {
            log::warn!("failed to restore default output: {}", e);
        }

        // The capture subprocess was terminated and reaped by the pump on
        // exit. With both loops joined, dropping the session's handle is the
        // last one: sources, buffers and the output stream release here,
        // before the sink module goes away.
        self.backend = None;

        if let Some(module) = self.module.take() {
            if let Err(e) = self.server.unload_module(module) {
                log::warn!("failed to unload virtual sink module: {}", e);
            }
        }

        self.transition(SessionState::Idle);
        let _ = self.events_sender.send(SessionEvent::Stopped);
        log::info!("session stopped");
    }

    fn transition(&mut self, state: SessionState) {
        log::debug!("session state: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.history.push(state);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Orientation integration loop: polls the tracker, updates the debounced
/// orientation state and re-applies the full spatialization each tick,
/// decoupled from the audio frame size.
#[allow(clippy::too_many_arguments)]
fn orientation_loop(
    source: Arc<dyn OrientationSource>,
    tracker: Arc<HeadTracker>,
    speakers: Arc<SpeakerTable>,
    layout: SurroundLayout,
    backend: SharedBackend,
    stop: Arc<AtomicBool>,
    tick: Duration,
    events: Sender<SessionEvent>,
) {
    let mut was_recentered = tracker.recentered();

    while !stop.load(Ordering::Relaxed) {
        tracker.observe(source.poll_orientation());

        let recentered = tracker.recentered();
        if recentered && !was_recentered {
            log::info!("tracking lost beyond timeout, listener recentered");
            let _ = events.send(SessionEvent::TrackingLost);
        } else if !recentered && was_recentered {
            log::info!("tracking recovered");
            let _ = events.send(SessionEvent::TrackingRecovered);
        }
        was_recentered = recentered;

        let effective = tracker.effective();
        let ordered = speakers.ordered_for(layout);
        {
            let mut backend = backend.lock().unwrap();
            if let Err(e) = spatial::apply(&mut *backend, layout, &ordered, effective) {
                log::warn!("spatialization update failed: {}", e);
            }
        }

        std::thread::sleep(tick);
    }
}
