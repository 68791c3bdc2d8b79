//! Live meeting room client: media-session lifecycle, participant roster
//! reconciliation and responsive stage layout for AI co-hosted meetings.

pub mod ai_host;
pub mod api;
pub mod config;
pub mod error;
pub mod layout;
pub mod lobby;
pub mod logging;
pub mod model;
pub mod report;
pub mod room_session;
pub mod roster;
pub mod stage;
pub mod transport;
pub mod viewport;

pub use config::Config;
pub use error::{ApiError, ConnectionError, DeviceError, LayoutError};
pub use layout::{LayoutVariant, MeetingLayout, ScreenSize};
pub use model::{Participant, ParticipantKind};
pub use room_session::{
    connect, disconnect, toggle_audio, toggle_video, CallState, ConnectOutcome, ConnectRequest,
    RoomSession, SessionOptions, SessionStatus, SharedRoomSession,
};
pub use transport::{MediaTransport, ParticipantSnapshot, TrackKind, TransportEvent};
