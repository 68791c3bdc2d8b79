use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cohost_room::room_session::{self, ConnectRequest, RoomSession, SessionOptions};
use cohost_room::transport::{EventReceiver, TransportError};
use cohost_room::{
    CallState, ConnectOutcome, LayoutVariant, MediaTransport, ParticipantSnapshot, ScreenSize,
    SessionStatus, TrackKind, TransportEvent,
};
use tokio::sync::mpsc::{self, UnboundedSender};

type Snapshot = ParticipantSnapshot<u32>;

fn person(identity: &str, remote: Option<u32>) -> Snapshot {
    ParticipantSnapshot {
        identity: identity.to_string(),
        name: identity.to_string(),
        metadata: None,
        microphone_enabled: true,
        camera_enabled: false,
        remote,
    }
}

#[derive(Default)]
struct Room {
    connected: bool,
    remotes: Vec<Snapshot>,
    events: Option<UnboundedSender<TransportEvent<u32>>>,
}

#[derive(Default)]
struct ScriptedTransport {
    room: Mutex<Room>,
}

impl ScriptedTransport {
    fn join(&self, identity: &str, handle: u32) {
        let mut room = self.room.lock().unwrap();
        let snapshot = person(identity, Some(handle));
        room.remotes.push(snapshot.clone());
        if let Some(events) = &room.events {
            events.send(TransportEvent::ParticipantConnected(snapshot)).unwrap();
        }
    }

    fn drop_connection(&self) {
        let room = self.room.lock().unwrap();
        if let Some(events) = &room.events {
            events
                .send(TransportEvent::Disconnected {
                    reason: "signal lost".to_string(),
                })
                .unwrap();
        }
    }
}

#[async_trait]
impl MediaTransport for ScriptedTransport {
    type Remote = u32;

    async fn connect(&self, _url: &str, _token: &str) -> Result<EventReceiver<u32>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut room = self.room.lock().unwrap();
        room.connected = true;
        room.events = Some(tx);
        Ok(rx)
    }

    async fn disconnect(&self) {
        let mut room = self.room.lock().unwrap();
        room.connected = false;
        room.events = None;
    }

    async fn set_microphone_enabled(&self, _enabled: bool) -> Result<(), TransportError> {
        Ok(())
    }

    async fn set_camera_enabled(&self, _enabled: bool) -> Result<(), TransportError> {
        Err(TransportError::NoLocalTrack(TrackKind::Video))
    }

    fn local_participant(&self) -> Option<Snapshot> {
        let room = self.room.lock().unwrap();
        room.connected.then(|| person("me", None))
    }

    fn remote_participants(&self) -> Vec<Snapshot> {
        let room = self.room.lock().unwrap();
        if room.connected {
            room.remotes.clone()
        } else {
            vec![]
        }
    }
}

fn request() -> ConnectRequest {
    ConnectRequest {
        url: "wss://media.example.com".to_string(),
        token: "secret".to_string(),
        audio_enabled: true,
        video_enabled: true,
    }
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn roster_drives_stage_through_a_meeting() {
    let transport = Arc::new(ScriptedTransport::default());
    let mut session = RoomSession::new(
        transport.clone(),
        SessionOptions {
            connect_timeout: Duration::from_secs(1),
        },
    );
    session.set_voice_profile(Some("Aurora · Calm"));
    let session = session.shared();

    // Camera failure on join is logged, not fatal.
    let outcome = room_session::connect(&session, request()).await.unwrap();
    assert_eq!(outcome, ConnectOutcome::Connected);

    {
        let guard = session.lock().await;
        assert_eq!(guard.status(), SessionStatus::Connected);
        let plan = guard.stage(ScreenSize::Mobile, 2);
        assert_eq!(plan.layout.variant, LayoutVariant::Single);
        assert_eq!(plan.floating.map(|p| p.label), Some("You".to_string()));
        assert_eq!(plan.main.map(|p| p.label), Some("AI".to_string()));
    }

    transport.join("guest", 7);
    settle().await;

    {
        let guard = session.lock().await;
        let plan = guard.stage(ScreenSize::Mobile, 2);
        assert_eq!(plan.layout.variant, LayoutVariant::Double);
        assert_eq!(
            plan.secondary.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["me", "guest"]
        );
        assert_eq!(plan.secondary[1].track, Some(7));
        assert_eq!(guard.roster_view().len(), 3);
    }

    transport.drop_connection();
    settle().await;

    let guard = session.lock().await;
    assert_eq!(guard.call_state(), CallState::Disconnected);
    assert!(guard.roster_view().iter().all(|p| p.id == "ai"));
    assert!(matches!(guard.status(), SessionStatus::Failed(_)));
}

#[tokio::test]
async fn explicit_disconnect_resets_to_idle() {
    let transport = Arc::new(ScriptedTransport::default());
    let session = RoomSession::new(transport.clone(), SessionOptions::default()).shared();

    room_session::connect(&session, request()).await.unwrap();
    room_session::disconnect(&session).await;
    room_session::disconnect(&session).await;

    let guard = session.lock().await;
    assert_eq!(guard.status(), SessionStatus::Idle);
    assert!(guard.participants().is_empty());
    assert!(!transport.room.lock().unwrap().connected);
}
