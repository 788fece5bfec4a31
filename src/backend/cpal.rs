//! Stereo rendering backend over cpal.
//!
//! Each surround channel gets a source backed by an SPSC sample ring sized
//! `buffers_number * buffer_size`; the ring's slot accounting maps onto the
//! queued → playing → processed → requeue buffer cycle. The control side
//! (pump + spatializer) holds the producers and atomics; the audio callback
//! holds the consumers and mixes all sources into the output with
//! constant-power panning. No locks or allocation in the callback path.

use crate::backend::{AudioBackend, SourceState};
use crate::error::{Result, RoomlockError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use glam::Vec3;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// State shared between the control side and the audio callback for one
/// source. Gains are stored as f32 bit patterns.
struct SourceShared {
    gain: AtomicU32,
    pan_left: AtomicU32,
    pan_right: AtomicU32,
    playing: AtomicBool,
    stalled: AtomicBool,
}

impl SourceShared {
    fn new() -> Self {
        Self {
            gain: AtomicU32::new(1.0f32.to_bits()),
            pan_left: AtomicU32::new(FRAC_1_SQRT_2.to_bits()),
            pan_right: AtomicU32::new(FRAC_1_SQRT_2.to_bits()),
            playing: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
        }
    }
}

const FRAC_1_SQRT_2: f32 = std::f32::consts::FRAC_1_SQRT_2;

fn store_f32(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

struct SourceCtl {
    producer: HeapProd<i16>,
    shared: Arc<SourceShared>,
    position: Vec3,
}

/// Real audio backend rendering every source into a stereo cpal stream.
///
/// cpal streams are not `Send`, and the backend handle has to cross into the
/// pump and orientation threads, so the stream lives on its own thread for
/// the lifetime of the backend.
pub struct CpalBackend {
    sources: Vec<SourceCtl>,
    buffer_size: usize,
    listener_forward: Vec3,
    listener_up: Vec3,
    stop: Arc<AtomicBool>,
    stream_thread: Option<JoinHandle<()>>,
}

impl CpalBackend {
    /// Opens the default output device and creates `channels` sources, each
    /// pre-filled with `buffers_number` silent buffers of `buffer_size`
    /// frames, so the first `play` never runs an empty queue.
    pub fn open(
        sample_rate: u32,
        channels: usize,
        buffer_size: usize,
        buffers_number: usize,
    ) -> Result<Self> {
        let mut sources = Vec::with_capacity(channels);
        let mut consumers = Vec::with_capacity(channels);

        for _ in 0..channels {
            let ring = HeapRb::<i16>::new(buffer_size * buffers_number);
            let (mut producer, consumer) = ring.split();
            // Silent pre-fill: the whole ring starts queued.
            let silence = vec![0i16; buffer_size * buffers_number];
            producer.push_slice(&silence);

            let shared = Arc::new(SourceShared::new());
            consumers.push((consumer, shared.clone()));
            sources.push(SourceCtl {
                producer,
                shared,
                position: Vec3::new(0.0, 0.0, -1.0),
            });
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (ready_sender, ready_receiver) = crossbeam_channel::bounded::<Result<()>>(1);
        let thread_stop = stop.clone();

        let stream_thread = std::thread::Builder::new()
            .name("roomlock-output".to_string())
            .spawn(move || {
                let stream = match open_stream(sample_rate, consumers) {
                    Ok(stream) => {
                        let _ = ready_sender.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_sender.send(Err(e));
                        return;
                    }
                };
                while !thread_stop.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
            })
            .map_err(|e| RoomlockError::AudioDevice(format!("Failed to spawn output thread: {}", e)))?;

        ready_receiver
            .recv()
            .map_err(|_| RoomlockError::AudioDevice("Output thread died during startup".into()))??;

        log::info!(
            "cpal backend open: {} sources, {} frames x {} buffers at {} Hz",
            channels,
            buffer_size,
            buffers_number,
            sample_rate
        );

        Ok(Self {
            sources,
            buffer_size,
            listener_forward: Vec3::new(0.0, 0.0, -1.0),
            listener_up: Vec3::new(0.0, 1.0, 0.0),
            stop,
            stream_thread: Some(stream_thread),
        })
    }

    fn source(&mut self, index: usize) -> Result<&mut SourceCtl> {
        let count = self.sources.len();
        self.sources.get_mut(index).ok_or_else(|| {
            RoomlockError::AudioDevice(format!("Source {} out of range ({} sources)", index, count))
        })
    }

    fn update_pan(&mut self, index: usize) {
        let forward = self.listener_forward;
        let up = self.listener_up;
        if let Some(ctl) = self.sources.get_mut(index) {
            let (left, right) = pan_gains(ctl.position, forward, up);
            store_f32(&ctl.shared.pan_left, left);
            store_f32(&ctl.shared.pan_right, right);
        }
    }
}

impl AudioBackend for CpalBackend {
    fn channels(&self) -> usize {
        self.sources.len()
    }

    fn set_source_gain(&mut self, source: usize, gain: f32) -> Result<()> {
        let ctl = self.source(source)?;
        store_f32(&ctl.shared.gain, gain.clamp(0.0, 1.0));
        Ok(())
    }

    fn set_source_position(&mut self, source: usize, position: Vec3) -> Result<()> {
        self.source(source)?.position = position;
        self.update_pan(source);
        Ok(())
    }

    fn set_listener_orientation(&mut self, forward: Vec3, up: Vec3) -> Result<()> {
        self.listener_forward = forward;
        self.listener_up = up;
        for index in 0..self.sources.len() {
            self.update_pan(index);
        }
        Ok(())
    }

    fn processed_count(&mut self, source: usize) -> Result<usize> {
        let buffer_size = self.buffer_size;
        let ctl = self.source(source)?;
        Ok(ctl.producer.vacant_len() / buffer_size)
    }

    fn refill_one(&mut self, source: usize, samples: &[i16]) -> Result<()> {
        let buffer_size = self.buffer_size;
        let ctl = self.source(source)?;
        if ctl.producer.vacant_len() < samples.len() {
            return Err(RoomlockError::AudioDevice(format!(
                "Source {}: no processed buffer to refill",
                source
            )));
        }
        debug_assert!(samples.len() <= buffer_size);
        ctl.producer.push_slice(samples);
        Ok(())
    }

    fn source_state(&mut self, source: usize) -> Result<SourceState> {
        let ctl = self.source(source)?;
        if ctl.shared.stalled.load(Ordering::Relaxed) || !ctl.shared.playing.load(Ordering::Relaxed)
        {
            Ok(SourceState::Stopped)
        } else {
            Ok(SourceState::Playing)
        }
    }

    fn play(&mut self, source: usize) -> Result<()> {
        let ctl = self.source(source)?;
        ctl.shared.stalled.store(false, Ordering::Relaxed);
        ctl.shared.playing.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.stream_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Constant-power pan gains for a source seen from the listener at the
/// origin. Only the lateral component matters; front/back collapses onto
/// the lateral axis.
pub(crate) fn pan_gains(position: Vec3, forward: Vec3, up: Vec3) -> (f32, f32) {
    let right = forward.cross(up).normalize_or_zero();
    let direction = position.normalize_or_zero();
    let lateral = direction.dot(right).clamp(-1.0, 1.0);
    let left_gain = ((1.0 - lateral) / 2.0).sqrt();
    let right_gain = ((1.0 + lateral) / 2.0).sqrt();
    (left_gain, right_gain)
}

fn open_stream(
    sample_rate: u32,
    consumers: Vec<(HeapCons<i16>, Arc<SourceShared>)>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or_else(|| {
        RoomlockError::AudioDevice("No default output device available".into())
    })?;

    let config = cpal::StreamConfig {
        channels: 2,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let default_config = device.default_output_config().map_err(|e| {
        RoomlockError::AudioDevice(format!("Failed to get default config: {}", e))
    })?;

    let stream = match default_config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, consumers)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, consumers)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, consumers)?,
        _ => {
            return Err(RoomlockError::AudioDevice(
                "Unsupported sample format".into(),
            ));
        }
    };

    stream.play().map_err(|e| {
        RoomlockError::AudioDevice(format!("Failed to start stream: {}", e))
    })?;

    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut consumers: Vec<(HeapCons<i16>, Arc<SourceShared>)>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / 2;
                for frame in 0..frames {
                    let mut left = 0.0f32;
                    let mut right = 0.0f32;
                    for (consumer, shared) in consumers.iter_mut() {
                        if !shared.playing.load(Ordering::Relaxed)
                            || shared.stalled.load(Ordering::Relaxed)
                        {
                            continue;
                        }
                        match consumer.try_pop() {
                            Some(sample) => {
                                let sample =
                                    sample as f32 / 32768.0 * load_f32(&shared.gain);
                                left += sample * load_f32(&shared.pan_left);
                                right += sample * load_f32(&shared.pan_right);
                            }
                            None => {
                                // Queue ran dry: the source halts until the
                                // pump reissues play.
                                shared.stalled.store(true, Ordering::Relaxed);
                            }
                        }
                    }
                    data[frame * 2] = T::from_sample(left);
                    data[frame * 2 + 1] = T::from_sample(right);
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| RoomlockError::AudioDevice(format!("Failed to build stream: {}", e)))?;

    Ok(stream)
}
