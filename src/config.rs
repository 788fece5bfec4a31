use std::time::Duration;

/// Configuration descriptor for an audio session.
///
/// Describes the fixed per-session parameters: PCM format, buffering depth,
/// loop cadences and the names the session uses to find its collaborators on
/// the audio server (the physical headset sink, the media stream to
/// intercept, the virtual sink to create).
#[derive(Debug, Clone)]
pub struct SessionDesc {
    /// Sample rate for capture and playback
    pub sample_rate: u32,
    /// Number of frames per capture read and per backend buffer
    pub buffer_size: usize,
    /// Number of backend buffers queued per source
    pub buffers_number: usize,
    /// Tick interval for the orientation integration loop
    pub orientation_tick: Duration,
    /// Continuous tracking loss before the listener recenters to the default
    /// forward-facing orientation
    pub recenter_timeout: Duration,
    /// Sink name of the physical headset on the audio server
    pub headset_sink: String,
    /// `media.name` of the application stream to redirect around the virtual
    /// sink (so it does not loop back through the renderer twice)
    pub media_name: String,
    /// Name for the virtual multi-channel sink
    pub sink_name: String,
}

impl SessionDesc {
    /// Size in bytes of one interleaved capture frame for `channels` channels
    /// of little-endian 16-bit PCM.
    pub fn frame_bytes(&self, channels: usize) -> usize {
        self.buffer_size * std::mem::size_of::<i16>() * channels
    }
}

impl Default for SessionDesc {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_size: 1024,
            buffers_number: 5,
            orientation_tick: Duration::from_millis(10),
            recenter_timeout: Duration::from_secs(10),
            headset_sink: String::new(),
            media_name: "Playback Stream".to_string(),
            sink_name: "Virtual_Surround".to_string(),
        }
    }
}
