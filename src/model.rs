use log::debug;
use serde::{Deserialize, Serialize};

use crate::transport::{ParticipantSnapshot, TrackKind};

const AVATAR_FALLBACK_BASE: &str = "https://avatar.vercel.sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    Local,
    Remote,
    Synthetic,
}

/// One tile's worth of presentation state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant<R> {
    pub id: String,
    pub name: String,
    pub label: String,
    pub avatar: String,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub kind: ParticipantKind,
    #[serde(skip)]
    pub track: Option<R>,
}

impl<R> Participant<R> {
    pub fn from_snapshot(snapshot: ParticipantSnapshot<R>, kind: ParticipantKind) -> Self {
        let metadata = ParticipantMetadata::parse(snapshot.metadata.as_deref());
        let name = display_name(&metadata, &snapshot.name);
        let avatar = avatar_url(&metadata, &snapshot.identity);
        let label = match kind {
            ParticipantKind::Local => "You".to_string(),
            _ => non_empty(&snapshot.name).unwrap_or("Participant").to_string(),
        };
        let track = match kind {
            ParticipantKind::Local => None,
            _ => snapshot.remote,
        };

        Participant {
            id: snapshot.identity,
            name,
            label,
            avatar,
            audio_enabled: snapshot.microphone_enabled,
            video_enabled: snapshot.camera_enabled,
            kind,
            track,
        }
    }

    pub fn is_local(&self) -> bool {
        self.kind == ParticipantKind::Local
    }

    pub fn is_enabled(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Audio => self.audio_enabled,
            TrackKind::Video => self.video_enabled,
        }
    }

    /// Re-derives the media flags (and the remote handle) from the transport's
    /// current view of this participant.
    pub(crate) fn apply_media_state(&mut self, snapshot: ParticipantSnapshot<R>) {
        self.audio_enabled = snapshot.microphone_enabled;
        self.video_enabled = snapshot.camera_enabled;
        if self.kind == ParticipantKind::Remote {
            self.track = snapshot.remote;
        }
    }

    /// Refreshes only the metadata-driven fields.
    pub(crate) fn apply_metadata(&mut self, snapshot: &ParticipantSnapshot<R>) {
        let metadata = ParticipantMetadata::parse(snapshot.metadata.as_deref());
        self.name = display_name(&metadata, &snapshot.name);
        self.avatar = avatar_url(&metadata, &snapshot.identity);
    }

    pub fn status_line(&self) -> String {
        format!(
            "{} · {}",
            if self.video_enabled { "Camera on" } else { "Camera off" },
            if self.audio_enabled { "Mic active" } else { "Mic muted" }
        )
    }
}

/// The JSON blob participants publish alongside their identity. Untrusted:
/// anything that fails to parse is treated as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantMetadata {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ParticipantMetadata {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
            return Self::default();
        };

        match serde_json::from_str::<ParticipantMetadata>(raw) {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!("Ignoring unparsable participant metadata {:?}: {}", raw, err);
                Self::default()
            }
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn display_name(metadata: &ParticipantMetadata, transport_name: &str) -> String {
    metadata
        .name
        .as_deref()
        .and_then(non_empty)
        .or_else(|| non_empty(transport_name))
        .unwrap_or("Unknown")
        .to_string()
}

fn avatar_url(metadata: &ParticipantMetadata, identity: &str) -> String {
    match metadata.avatar_url.as_deref().and_then(non_empty) {
        Some(url) => url.to_string(),
        None => fallback_avatar(identity),
    }
}

pub(crate) fn fallback_avatar(seed: &str) -> String {
    format!("{}/{}", AVATAR_FALLBACK_BASE, seed)
}
