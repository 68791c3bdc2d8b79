//! Narrow seam over the realtime media SDK.
//!
//! The room session only ever talks to a [`MediaTransport`]: it connects,
//! disconnects, flips local devices, reads the current participant set, and
//! drains the event channel handed back by `connect`.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

#[cfg(test)]
pub(crate) mod fake;

#[cfg(feature = "livekit")]
mod capture;
#[cfg(feature = "livekit")]
pub mod livekit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// What the transport currently knows about one participant.
///
/// `remote` carries the SDK's handle for non-local participants so the renderer
/// can attach their media; it is `None` for the local participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantSnapshot<R> {
    pub identity: String,
    pub name: String,
    pub metadata: Option<String>,
    pub microphone_enabled: bool,
    pub camera_enabled: bool,
    pub remote: Option<R>,
}

impl<R> ParticipantSnapshot<R> {
    pub fn is_enabled(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Audio => self.microphone_enabled,
            TrackKind::Video => self.camera_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent<R> {
    ParticipantConnected(ParticipantSnapshot<R>),
    ParticipantDisconnected { identity: String },
    TrackSubscribed { identity: String, kind: TrackKind },
    TrackUnsubscribed { identity: String, kind: TrackKind },
    TrackMuted { identity: String, kind: TrackKind },
    TrackUnmuted { identity: String, kind: TrackKind },
    MetadataChanged { identity: String },
    Reconnecting,
    Reconnected,
    Disconnected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("handshake rejected: {0}")]
    Rejected(String),

    #[error("transport is not connected")]
    NotConnected,

    #[error("no local {0} track available")]
    NoLocalTrack(TrackKind),

    #[error("{0}")]
    Other(String),
}

pub type EventReceiver<R> = UnboundedReceiver<TransportEvent<R>>;

#[async_trait]
pub trait MediaTransport: Send + Sync + 'static {
    type Remote: Clone + fmt::Debug + Send + Sync + 'static;

    /// Resolves once the server acknowledges the session. Events for that
    /// session arrive on the returned channel, in delivery order.
    async fn connect(
        &self,
        url: &str,
        token: &str,
    ) -> Result<EventReceiver<Self::Remote>, TransportError>;

    /// Tears the session down and releases any local capture devices.
    /// Must be safe to call when nothing is connected.
    async fn disconnect(&self);

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError>;

    async fn set_camera_enabled(&self, enabled: bool) -> Result<(), TransportError>;

    fn local_participant(&self) -> Option<ParticipantSnapshot<Self::Remote>>;

    /// Remote participants in the order the SDK reports them.
    fn remote_participants(&self) -> Vec<ParticipantSnapshot<Self::Remote>>;

    fn participant(&self, identity: &str) -> Option<ParticipantSnapshot<Self::Remote>> {
        if let Some(local) = self.local_participant() {
            if local.identity == identity {
                return Some(local);
            }
        }

        self.remote_participants()
            .into_iter()
            .find(|participant| participant.identity == identity)
    }

    async fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> Result<(), TransportError> {
        match kind {
            TrackKind::Audio => self.set_microphone_enabled(enabled).await,
            TrackKind::Video => self.set_camera_enabled(enabled).await,
        }
    }
}
