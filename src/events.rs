//! Session events.

/// Notifications emitted by the session's background loops, drained with
/// [`Session::poll_events`](crate::session::Session::poll_events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session reached the streaming state.
    Started,
    /// The session finished tearing down.
    Stopped,
    /// A source was found stopped with data still flowing and playback was
    /// reissued on it.
    StallRecovered { channel: usize },
    /// The capture stream ended and the pump loop exited.
    CaptureEnded,
    /// Tracking loss exceeded the recenter timeout; the listener snapped
    /// back to the default orientation.
    TrackingLost,
    /// Tracking came back after a recenter.
    TrackingRecovered,
}

impl SessionEvent {
    /// Whether the event signals a recovered fault rather than a normal
    /// lifecycle step.
    pub fn is_recovery(&self) -> bool {
        matches!(
            self,
            Self::StallRecovered { .. } | Self::TrackingRecovered
        )
    }
}
