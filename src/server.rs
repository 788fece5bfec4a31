//! Audio server abstraction.
//!
//! OS-level routing (default-sink switching, null-sink modules, sink
//! volumes, stream moves) is modeled as a capability trait so the session
//! manager's start/stop contracts can be asserted against a fake server.

use crate::error::Result;

/// Handle of a loaded server module (the virtual sink).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleId(pub u32);

/// Parameters for creating the virtual multi-channel sink.
#[derive(Debug, Clone, PartialEq)]
pub struct NullSinkSpec {
    pub sink_name: String,
    pub channels: usize,
    /// Channel-map tokens in channel-index order (see
    /// [`SurroundLayout::server_channel_map`](crate::layout::SurroundLayout::server_channel_map))
    pub channel_map: Vec<String>,
    pub rate: u32,
}

/// OS audio-routing capability used by the session manager.
pub trait AudioServer: Send {
    /// Switches the OS default output to the named sink.
    fn set_default_sink(&mut self, sink: &str) -> Result<()>;

    /// Loads a null-sink module and returns its handle.
    fn load_null_sink(&mut self, spec: &NullSinkSpec) -> Result<ModuleId>;

    /// Unloads a previously loaded module.
    fn unload_module(&mut self, module: ModuleId) -> Result<()>;

    /// Flat volume of the named sink, `1.0` = unity gain.
    fn sink_volume(&mut self, sink: &str) -> Result<f32>;

    /// Sets the named sink's volume on all channels.
    fn set_sink_volume(&mut self, sink: &str, volume: f32) -> Result<()>;

    /// Moves every playback stream whose `media.name` matches to the given
    /// sink. Used to route the target application's stream straight to the
    /// headset so it does not loop back through the virtual sink.
    fn move_streams_matching(&mut self, media_name: &str, sink: &str) -> Result<()>;
}
