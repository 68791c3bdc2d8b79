use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use livekit::options::TrackPublishOptions;
use livekit::prelude::{LocalParticipant, LocalTrackPublication, RemoteParticipant};
use livekit::track::{LocalAudioTrack, LocalTrack, LocalVideoTrack, TrackSource};
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::prelude::{AudioSourceOptions, RtcAudioSource};
use livekit::webrtc::video_source::native::NativeVideoSource;
use livekit::webrtc::video_source::{RtcVideoSource, VideoResolution};
use livekit::{Room, RoomEvent, RoomOptions};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use super::capture::{MicrophoneCapture, NUM_CHANNELS, SAMPLE_RATE};
use super::{EventReceiver, MediaTransport, ParticipantSnapshot, TrackKind, TransportError, TransportEvent};

type Snapshot = ParticipantSnapshot<RemoteParticipant>;

const CAMERA_RESOLUTION: VideoResolution = VideoResolution {
    width: 1280,
    height: 720,
};

/// Publishes the local microphone and camera on first enable and unpublishes
/// them on disable, so a disabled device is never held open.
#[derive(Default)]
pub struct LiveKitTransport {
    room: Mutex<Option<Arc<Room>>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    microphone: Mutex<Option<MicrophoneCapture>>,
    camera: Mutex<Option<NativeVideoSource>>,
}

impl LiveKitTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_room(&self) -> Option<Arc<Room>> {
        match self.room.lock() {
            Ok(room) => room.clone(),
            Err(_) => {
                error!("LiveKit room lock poisoned");
                None
            }
        }
    }

    fn replace_room(&self, room: Option<Arc<Room>>) -> Option<Arc<Room>> {
        match self.room.lock() {
            Ok(mut current) => std::mem::replace(&mut *current, room),
            Err(_) => {
                error!("LiveKit room lock poisoned");
                None
            }
        }
    }

    fn replace_forwarder(&self, forwarder: Option<JoinHandle<()>>) {
        if let Ok(mut current) = self.forwarder.lock() {
            if let Some(previous) = std::mem::replace(&mut *current, forwarder) {
                previous.abort();
            }
        }
    }

    /// Source the embedding application pushes camera frames into while the
    /// camera is enabled.
    pub fn camera_source(&self) -> Option<NativeVideoSource> {
        self.camera.lock().ok().and_then(|camera| camera.clone())
    }

    fn release_device(&self, kind: TrackKind) {
        match kind {
            TrackKind::Audio => {
                if let Ok(mut microphone) = self.microphone.lock() {
                    microphone.take();
                }
            }
            TrackKind::Video => {
                if let Ok(mut camera) = self.camera.lock() {
                    camera.take();
                }
            }
        }
    }

    async fn set_local_source(&self, source: TrackSource, enabled: bool) -> Result<(), TransportError> {
        let room = self.current_room().ok_or(TransportError::NotConnected)?;
        let local = room.local_participant();
        let kind = match source {
            TrackSource::Camera => TrackKind::Video,
            _ => TrackKind::Audio,
        };

        let publication = local_publication(&local, source);
        match (source_change(publication.is_some(), enabled), publication) {
            (SourceChange::Unmute, Some(publication)) => {
                publication.unmute();
                Ok(())
            }
            (SourceChange::Unpublish, Some(publication)) => {
                local
                    .unpublish_track(&publication.sid())
                    .await
                    .map_err(|err| TransportError::Other(err.to_string()))?;
                self.release_device(kind);
                info!("Local {} unpublished", kind);
                Ok(())
            }
            (SourceChange::Publish, _) => match kind {
                TrackKind::Audio => self.publish_microphone(&local).await,
                TrackKind::Video => self.publish_camera(&local).await,
            },
            _ => Ok(()),
        }
    }

    async fn publish_microphone(&self, local: &LocalParticipant) -> Result<(), TransportError> {
        let audio_source = NativeAudioSource::new(
            AudioSourceOptions {
                echo_cancellation: true,
                noise_suppression: true,
                auto_gain_control: true,
            },
            SAMPLE_RATE,
            NUM_CHANNELS,
            None,
        );
        let capture = MicrophoneCapture::start(audio_source.clone()).await?;

        let track = LocalAudioTrack::create_audio_track(
            "microphone",
            RtcAudioSource::Native(audio_source),
        );
        let mut options = TrackPublishOptions::default();
        options.source = TrackSource::Microphone;

        local
            .publish_track(LocalTrack::Audio(track), options)
            .await
            .map_err(|err| TransportError::Other(err.to_string()))?;

        if let Ok(mut microphone) = self.microphone.lock() {
            *microphone = Some(capture);
        }
        info!("Local microphone published");
        Ok(())
    }

    async fn publish_camera(&self, local: &LocalParticipant) -> Result<(), TransportError> {
        let video_source = NativeVideoSource::new(CAMERA_RESOLUTION);
        let track = LocalVideoTrack::create_video_track(
            "camera",
            RtcVideoSource::Native(video_source.clone()),
        );
        let mut options = TrackPublishOptions::default();
        options.source = TrackSource::Camera;

        local
            .publish_track(LocalTrack::Video(track), options)
            .await
            .map_err(|err| TransportError::Other(err.to_string()))?;

        if let Ok(mut camera) = self.camera.lock() {
            *camera = Some(video_source);
        }
        info!("Local camera published");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceChange {
    Publish,
    Unmute,
    Unpublish,
    Nothing,
}

fn source_change(published: bool, enabled: bool) -> SourceChange {
    match (published, enabled) {
        (false, true) => SourceChange::Publish,
        (true, true) => SourceChange::Unmute,
        (true, false) => SourceChange::Unpublish,
        (false, false) => SourceChange::Nothing,
    }
}

fn local_publication(local: &LocalParticipant, source: TrackSource) -> Option<LocalTrackPublication> {
    local
        .track_publications()
        .into_values()
        .find(|publication| publication.source() == source)
}

fn track_kind(source: TrackSource) -> Option<TrackKind> {
    match source {
        TrackSource::Microphone => Some(TrackKind::Audio),
        TrackSource::Camera => Some(TrackKind::Video),
        _ => None,
    }
}

/// `(microphone_enabled, camera_enabled)` from `(source, muted)` pairs.
fn media_flags(publications: impl Iterator<Item = (TrackSource, bool)>) -> (bool, bool) {
    publications.fold((false, false), |(mic, cam), (source, muted)| {
        match track_kind(source) {
            Some(TrackKind::Audio) => (mic || !muted, cam),
            Some(TrackKind::Video) => (mic, cam || !muted),
            None => (mic, cam),
        }
    })
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn remote_snapshot(participant: &RemoteParticipant) -> Snapshot {
    let (microphone_enabled, camera_enabled) = media_flags(
        participant
            .track_publications()
            .values()
            .map(|publication| (publication.source(), publication.is_muted())),
    );

    ParticipantSnapshot {
        identity: participant.identity().as_str().to_string(),
        name: participant.name(),
        metadata: non_empty(participant.metadata()),
        microphone_enabled,
        camera_enabled,
        remote: Some(participant.clone()),
    }
}

fn local_snapshot(participant: &LocalParticipant) -> Snapshot {
    let (microphone_enabled, camera_enabled) = media_flags(
        participant
            .track_publications()
            .values()
            .map(|publication| (publication.source(), publication.is_muted())),
    );

    ParticipantSnapshot {
        identity: participant.identity().as_str().to_string(),
        name: participant.name(),
        metadata: non_empty(participant.metadata()),
        microphone_enabled,
        camera_enabled,
        remote: None,
    }
}

fn map_event(event: RoomEvent) -> Option<TransportEvent<RemoteParticipant>> {
    let mapped = match event {
        RoomEvent::ParticipantConnected(participant) => {
            TransportEvent::ParticipantConnected(remote_snapshot(&participant))
        }
        RoomEvent::ParticipantDisconnected(participant) => TransportEvent::ParticipantDisconnected {
            identity: participant.identity().as_str().to_string(),
        },
        RoomEvent::TrackSubscribed {
            publication,
            participant,
            ..
        } => TransportEvent::TrackSubscribed {
            identity: participant.identity().as_str().to_string(),
            kind: track_kind(publication.source())?,
        },
        RoomEvent::TrackUnsubscribed {
            publication,
            participant,
            ..
        } => TransportEvent::TrackUnsubscribed {
            identity: participant.identity().as_str().to_string(),
            kind: track_kind(publication.source())?,
        },
        RoomEvent::TrackMuted {
            participant,
            publication,
        } => TransportEvent::TrackMuted {
            identity: participant.identity().as_str().to_string(),
            kind: track_kind(publication.source())?,
        },
        RoomEvent::TrackUnmuted {
            participant,
            publication,
        } => TransportEvent::TrackUnmuted {
            identity: participant.identity().as_str().to_string(),
            kind: track_kind(publication.source())?,
        },
        RoomEvent::ParticipantMetadataChanged { participant, .. } => {
            TransportEvent::MetadataChanged {
                identity: participant.identity().as_str().to_string(),
            }
        }
        RoomEvent::Reconnecting => TransportEvent::Reconnecting,
        RoomEvent::Reconnected => TransportEvent::Reconnected,
        RoomEvent::Disconnected { reason } => TransportEvent::Disconnected {
            reason: format!("{:?}", reason),
        },
        other => {
            debug!("Unhandled room event: {:?}", other);
            return None;
        }
    };
    Some(mapped)
}

async fn forward_room_events(
    mut room_events: UnboundedReceiver<RoomEvent>,
    tx: mpsc::UnboundedSender<TransportEvent<RemoteParticipant>>,
) {
    while let Some(event) = room_events.recv().await {
        if let Some(event) = map_event(event) {
            if tx.send(event).is_err() {
                debug!("Room session stopped listening; closing forwarder");
                break;
            }
        }
    }
}

#[async_trait]
impl MediaTransport for LiveKitTransport {
    type Remote = RemoteParticipant;

    async fn connect(&self, url: &str, token: &str) -> Result<EventReceiver<RemoteParticipant>, TransportError> {
        let (room, room_events) = Room::connect(url, token, RoomOptions::default())
            .await
            .map_err(|err| TransportError::Rejected(err.to_string()))?;
        info!("Connected to LiveKit room {}", room.name());

        let (tx, rx) = mpsc::unbounded_channel();
        self.replace_forwarder(Some(tokio::spawn(forward_room_events(room_events, tx))));

        if let Some(stale) = self.replace_room(Some(Arc::new(room))) {
            warn!("Replacing a LiveKit room that was never closed");
            if let Err(err) = stale.close().await {
                error!("Failed to close stale LiveKit room: {}", err);
            }
        }

        Ok(rx)
    }

    async fn disconnect(&self) {
        self.replace_forwarder(None);
        self.release_device(TrackKind::Audio);
        self.release_device(TrackKind::Video);

        if let Some(room) = self.replace_room(None) {
            info!("Closing LiveKit room {}", room.name());
            if let Err(err) = room.close().await {
                error!("Failed to close LiveKit room: {}", err);
            }
        }
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        self.set_local_source(TrackSource::Microphone, enabled).await
    }

    async fn set_camera_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        self.set_local_source(TrackSource::Camera, enabled).await
    }

    fn local_participant(&self) -> Option<Snapshot> {
        self.current_room()
            .map(|room| local_snapshot(&room.local_participant()))
    }

    fn remote_participants(&self) -> Vec<Snapshot> {
        let Some(room) = self.current_room() else {
            return vec![];
        };

        let mut remotes: Vec<Snapshot> = room
            .remote_participants()
            .values()
            .map(remote_snapshot)
            .collect();
        // The SDK hands out a map; keep resyncs deterministic.
        remotes.sort_by(|a, b| a.identity.cmp(&b.identity));
        remotes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_enable_publishes_and_disable_unpublishes() {
        assert_eq!(source_change(false, true), SourceChange::Publish);
        assert_eq!(source_change(true, true), SourceChange::Unmute);
        assert_eq!(source_change(true, false), SourceChange::Unpublish);
        assert_eq!(source_change(false, false), SourceChange::Nothing);
    }

    #[test]
    fn flags_follow_unmuted_publications() {
        let publications = vec![
            (TrackSource::Microphone, false),
            (TrackSource::Camera, true),
            (TrackSource::Screenshare, false),
        ];
        assert_eq!(media_flags(publications.into_iter()), (true, false));
        assert_eq!(track_kind(TrackSource::Screenshare), None);
    }
}
