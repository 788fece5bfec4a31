//! Call-recording fakes shared by the unit tests: an audio backend, an audio
//! server, a scripted capture source and a settable orientation source. They
//! let the session's start/stop contracts and the pump's buffer discipline
//! be asserted without a real audio server, device or camera.

use crate::backend::{AudioBackend, SourceState};
use crate::capture::CaptureSource;
use crate::error::{Result, RoomlockError};
use crate::orientation::OrientationSource;
use crate::server::{AudioServer, ModuleId, NullSinkSpec};
use glam::{Mat3, Vec3};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Backend fake recording every property set and buffer operation.
pub(crate) struct MockBackend {
    channels: usize,
    pub gains: Vec<Option<f32>>,
    pub gain_sets: Vec<usize>,
    pub positions: Vec<Option<Vec3>>,
    pub position_sets: Vec<usize>,
    pub listener: Option<(Vec3, Vec3)>,
    pub listener_sets: usize,
    /// Scripted processed-buffer counts; decremented by `refill_one`
    pub processed: Vec<usize>,
    /// Samples handed to `refill_one`, per channel in call order
    pub refills: Vec<Vec<Vec<i16>>>,
    /// Scripted source states; `play` flips a state to `Playing`
    pub states: Vec<SourceState>,
    pub play_calls: Vec<usize>,
}

impl MockBackend {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            gains: vec![None; channels],
            gain_sets: vec![0; channels],
            positions: vec![None; channels],
            position_sets: vec![0; channels],
            listener: None,
            listener_sets: 0,
            processed: vec![0; channels],
            refills: vec![Vec::new(); channels],
            states: vec![SourceState::Playing; channels],
            play_calls: vec![0; channels],
        }
    }

    fn check(&self, source: usize) -> Result<()> {
        if source < self.channels {
            Ok(())
        } else {
            Err(RoomlockError::AudioDevice(format!(
                "source {} out of range",
                source
            )))
        }
    }
}

impl AudioBackend for MockBackend {
    fn channels(&self) -> usize {
        self.channels
    }

    fn set_source_gain(&mut self, source: usize, gain: f32) -> Result<()> {
        self.check(source)?;
        self.gains[source] = Some(gain);
        self.gain_sets[source] += 1;
        Ok(())
    }

    fn set_source_position(&mut self, source: usize, position: Vec3) -> Result<()> {
        self.check(source)?;
        self.positions[source] = Some(position);
        self.position_sets[source] += 1;
        Ok(())
    }

    fn set_listener_orientation(&mut self, forward: Vec3, up: Vec3) -> Result<()> {
        self.listener = Some((forward, up));
        self.listener_sets += 1;
        Ok(())
    }

    fn processed_count(&mut self, source: usize) -> Result<usize> {
        self.check(source)?;
        Ok(self.processed[source])
    }

    fn refill_one(&mut self, source: usize, samples: &[i16]) -> Result<()> {
        self.check(source)?;
        if self.processed[source] == 0 {
            return Err(RoomlockError::AudioDevice(format!(
                "source {}: no processed buffer",
                source
            )));
        }
        self.processed[source] -= 1;
        self.refills[source].push(samples.to_vec());
        Ok(())
    }

    fn source_state(&mut self, source: usize) -> Result<SourceState> {
        self.check(source)?;
        Ok(self.states[source])
    }

    fn play(&mut self, source: usize) -> Result<()> {
        self.check(source)?;
        self.states[source] = SourceState::Playing;
        self.play_calls[source] += 1;
        Ok(())
    }
}

/// Capture fake yielding a fixed frame sequence, then end of stream.
pub(crate) struct ScriptedCapture {
    frames: VecDeque<Vec<u8>>,
    frame_bytes: usize,
    shutdowns: Arc<AtomicUsize>,
}

impl ScriptedCapture {
    pub fn new(channels: usize, samples_per_channel: usize, frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames: frames.into(),
            frame_bytes: channels * samples_per_channel * 2,
            shutdowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    pub fn shutdown_counter(&self) -> Arc<AtomicUsize> {
        self.shutdowns.clone()
    }
}

impl CaptureSource for ScriptedCapture {
    fn read_frame(&mut self, frame: &mut [u8]) -> Result<usize> {
        match self.frames.pop_front() {
            Some(data) => {
                let n = data.len().min(frame.len());
                frame[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::Relaxed);
    }
}

/// Recorded state of the fake audio server, shared with the test through
/// [`MockServer::log`].
#[derive(Default)]
pub(crate) struct ServerLog {
    pub default_sink_history: Vec<String>,
    pub volumes: HashMap<String, f32>,
    pub loaded: Vec<(ModuleId, NullSinkSpec)>,
    pub unloaded: Vec<ModuleId>,
    pub moves: Vec<(String, String)>,
    pub fail_set_default_sink: bool,
    pub fail_load_null_sink: bool,
    pub fail_set_sink_volume: bool,
    pub fail_sink_volume: bool,
    next_module: u32,
}

#[derive(Clone)]
pub(crate) struct MockServer {
    pub log: Arc<Mutex<ServerLog>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(ServerLog::default())),
        }
    }

    pub fn with_volume(self, sink: &str, volume: f32) -> Self {
        self.log
            .lock()
            .unwrap()
            .volumes
            .insert(sink.to_string(), volume);
        self
    }
}

impl AudioServer for MockServer {
    fn set_default_sink(&mut self, sink: &str) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if log.fail_set_default_sink {
            return Err(RoomlockError::AudioServer("set_default_sink refused".into()));
        }
        log.default_sink_history.push(sink.to_string());
        Ok(())
    }

    fn load_null_sink(&mut self, spec: &NullSinkSpec) -> Result<ModuleId> {
        let mut log = self.log.lock().unwrap();
        if log.fail_load_null_sink {
            return Err(RoomlockError::AudioServer("module load refused".into()));
        }
        log.next_module += 1;
        let id = ModuleId(log.next_module);
        log.loaded.push((id, spec.clone()));
        log.volumes.entry(spec.sink_name.clone()).or_insert(1.0);
        Ok(id)
    }

    fn unload_module(&mut self, module: ModuleId) -> Result<()> {
        self.log.lock().unwrap().unloaded.push(module);
        Ok(())
    }

    fn sink_volume(&mut self, sink: &str) -> Result<f32> {
        let log = self.log.lock().unwrap();
        if log.fail_sink_volume {
            return Err(RoomlockError::AudioServer("volume query refused".into()));
        }
        Ok(log.volumes.get(sink).copied().unwrap_or(1.0))
    }

    fn set_sink_volume(&mut self, sink: &str, volume: f32) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if log.fail_set_sink_volume {
            return Err(RoomlockError::AudioServer("volume set refused".into()));
        }
        log.volumes.insert(sink.to_string(), volume);
        Ok(())
    }

    fn move_streams_matching(&mut self, media_name: &str, sink: &str) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .moves
            .push((media_name.to_string(), sink.to_string()));
        Ok(())
    }
}

/// Orientation source returning whatever the test last stored.
pub(crate) struct StaticTracker {
    pose: Mutex<Option<Mat3>>,
}

impl StaticTracker {
    pub fn new(pose: Option<Mat3>) -> Self {
        Self {
            pose: Mutex::new(pose),
        }
    }
}

impl OrientationSource for StaticTracker {
    fn poll_orientation(&self) -> Option<Mat3> {
        *self.pose.lock().unwrap()
    }
}
