//! Error types surfaced by the room session, layout engine and meeting API client.

use std::time::Duration;

use thiserror::Error;

use crate::transport::TrackKind;

/// Connect-time failures. The session never retries on its own; the caller
/// decides whether to fetch fresh credentials and try again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("invalid media session credentials: {0}")]
    InvalidCredentials(String),

    #[error("transport rejected the handshake: {0}")]
    Rejected(String),

    #[error("transport did not acknowledge the connection within {0:?}")]
    Timeout(Duration),

    #[error("connection lost: {0}")]
    Lost(String),
}

/// Failures to enable or disable a local microphone/camera.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("no active media session")]
    NotConnected,

    #[error("failed to switch {kind} track: {reason}")]
    Failed { kind: TrackKind, reason: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// Raised when the layout engine is handed a screen-size value it does not know.
/// This indicates a caller bug, so it is never recovered from internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("unknown screen size class '{0}', expected mobile, tablet or desktop")]
    UnknownScreenSize(String),
}

/// Errors returned by [`MeetingApiClient`](crate::api::MeetingApiClient).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not authenticated. Please log in.")]
    NotAuthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("This meeting has not started yet. Please wait for the host.")]
    MeetingNotStarted,

    #[error("This meeting has already ended.")]
    MeetingEnded,

    #[error("You are not invited to this meeting.")]
    NotInvited,

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("join response carries no media transport credentials")]
    MissingTransport,
}
