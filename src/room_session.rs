//! Live meeting room session: connection lifecycle and roster reconciliation.
//!
//! A [`RoomSession`] sits behind `Arc<tokio::sync::Mutex<_>>`. `connect` hands
//! the transport's event channel to a spawned task that applies each event to
//! the roster while holding the lock, so every roster mutation runs to
//! completion before the next one starts. Media flags are always re-read from
//! the transport instead of toggled from the event payload, which makes
//! duplicated or reordered track events harmless.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::ai_host::{self, VoiceProfile};
use crate::config::Config;
use crate::error::{ConnectionError, DeviceError};
use crate::layout::ScreenSize;
use crate::model::{Participant, ParticipantKind};
use crate::roster::Roster;
use crate::stage::{self, StagePlan};
use crate::transport::{
    EventReceiver, MediaTransport, ParticipantSnapshot, TrackKind, TransportEvent,
};

pub type SharedRoomSession<T> = Arc<Mutex<RoomSession<T>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// What the UI should show about the connection. `Failed` stays visible until
/// the next `connect()` or an explicit `disconnect()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Failed(ConnectionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub connect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        SessionOptions {
            connect_timeout: config.connect_timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    pub token: String,
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

impl ConnectRequest {
    fn validate(&self) -> Result<(), ConnectionError> {
        if self.token.trim().is_empty() {
            return Err(ConnectionError::InvalidCredentials(
                "missing access token".to_string(),
            ));
        }

        let url = self.url.trim();
        if url.is_empty() {
            return Err(ConnectionError::InvalidCredentials(
                "missing media server url".to_string(),
            ));
        }
        if !["ws://", "wss://", "http://", "https://"]
            .iter()
            .any(|scheme| url.starts_with(scheme))
        {
            return Err(ConnectionError::InvalidCredentials(format!(
                "unsupported media server url '{}'",
                url
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// A previous `connect()` is still pending or already succeeded.
    AlreadyActive,
    /// `disconnect()` ran before the transport answered; the answer was discarded.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    Ignored,
    SessionEnded,
}

pub struct RoomSession<T: MediaTransport> {
    transport: Arc<T>,
    options: SessionOptions,
    call_state: CallState,
    roster: Roster<T::Remote>,
    local_identity: Option<String>,
    // Bumped whenever a session ends; late completions compare against it.
    epoch: u64,
    voice_profile: Option<VoiceProfile>,
    last_error: Option<ConnectionError>,
    event_task: Option<JoinHandle<()>>,
    // Held for a whole connect attempt so only one handshake touches the transport.
    connect_lock: Arc<Mutex<()>>,
}

impl<T: MediaTransport> RoomSession<T> {
    pub fn new(transport: Arc<T>, options: SessionOptions) -> Self {
        RoomSession {
            transport,
            options,
            call_state: CallState::Disconnected,
            roster: Roster::new(),
            local_identity: None,
            epoch: 0,
            voice_profile: None,
            last_error: None,
            event_task: None,
            connect_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn shared(self) -> SharedRoomSession<T> {
        Arc::new(Mutex::new(self))
    }

    pub fn call_state(&self) -> CallState {
        self.call_state
    }

    pub fn status(&self) -> SessionStatus {
        match self.call_state {
            CallState::Connecting => SessionStatus::Connecting,
            CallState::Connected => SessionStatus::Connected,
            CallState::Reconnecting => SessionStatus::Reconnecting,
            CallState::Disconnected => match &self.last_error {
                Some(err) => SessionStatus::Failed(err.clone()),
                None => SessionStatus::Idle,
            },
        }
    }

    pub fn local_identity(&self) -> Option<&str> {
        self.local_identity.as_deref()
    }

    pub fn roster(&self) -> &Roster<T::Remote> {
        &self.roster
    }

    /// Authoritative participants, local first.
    pub fn participants(&self) -> Vec<Participant<T::Remote>> {
        self.roster.to_vec()
    }

    /// Participants plus the AI host, as the UI lists them.
    pub fn roster_view(&self) -> Vec<Participant<T::Remote>> {
        ai_host::overlay(&self.roster, self.voice_profile.as_ref())
    }

    /// Takes the meeting's `voiceProfile`; an empty or missing profile removes the AI host.
    pub fn set_voice_profile(&mut self, voice_profile: Option<&str>) {
        self.voice_profile = voice_profile.and_then(VoiceProfile::parse);
    }

    pub fn voice_profile(&self) -> Option<&VoiceProfile> {
        self.voice_profile.as_ref()
    }

    pub fn stage(&self, screen_size: ScreenSize, capacity: usize) -> StagePlan<T::Remote> {
        stage::compose(
            &self.roster.to_vec(),
            self.voice_profile.as_ref(),
            screen_size,
            capacity,
        )
    }

    pub fn apply_event(&mut self, event: TransportEvent<T::Remote>) -> EventOutcome {
        if matches!(
            self.call_state,
            CallState::Disconnected | CallState::Connecting
        ) {
            debug!("Ignoring {:?} while {:?}", event, self.call_state);
            return EventOutcome::Ignored;
        }

        match event {
            TransportEvent::ParticipantConnected(snapshot) => {
                let identity = snapshot.identity.clone();
                let participant = Participant::from_snapshot(snapshot, ParticipantKind::Remote);
                if self.roster.insert(participant) {
                    info!("Participant connected: {}", identity);
                    EventOutcome::Applied
                } else {
                    debug!("Participant {} already in roster", identity);
                    EventOutcome::Ignored
                }
            }

            TransportEvent::ParticipantDisconnected { identity } => {
                if self.local_identity.as_deref() == Some(identity.as_str()) {
                    warn!("Ignoring disconnect event for the local participant");
                    return EventOutcome::Ignored;
                }
                match self.roster.remove(&identity) {
                    Some(_) => {
                        info!("Participant disconnected: {}", identity);
                        EventOutcome::Applied
                    }
                    None => {
                        debug!("Disconnect for unknown participant {}", identity);
                        EventOutcome::Ignored
                    }
                }
            }

            TransportEvent::TrackSubscribed { identity, kind }
            | TransportEvent::TrackUnsubscribed { identity, kind }
            | TransportEvent::TrackMuted { identity, kind }
            | TransportEvent::TrackUnmuted { identity, kind } => {
                debug!("{} track state changed for {}", kind, identity);
                self.refresh_media(&identity)
            }

            TransportEvent::MetadataChanged { identity } => self.refresh_metadata(&identity),

            TransportEvent::Reconnecting => {
                info!("Reconnecting; keeping last known roster");
                self.call_state = CallState::Reconnecting;
                EventOutcome::Applied
            }

            TransportEvent::Reconnected => {
                info!("Reconnected; resyncing roster from transport");
                self.call_state = CallState::Connected;
                self.resync();
                EventOutcome::Applied
            }

            TransportEvent::Disconnected { reason } => {
                warn!("Media session disconnected: {}", reason);
                self.end_session();
                self.last_error = Some(ConnectionError::Lost(reason));
                EventOutcome::SessionEnded
            }
        }
    }

    /// Rebuilds the roster from the transport's participant set, discarding
    /// whatever was applied locally since the last sync.
    fn resync(&mut self) {
        let mut roster = Roster::new();

        match self.transport.local_participant() {
            Some(mut local) => {
                match &self.local_identity {
                    Some(identity) if *identity != local.identity => {
                        warn!(
                            "Transport reports local identity {} but session started as {}",
                            local.identity, identity
                        );
                        local.identity = identity.clone();
                    }
                    Some(_) => {}
                    None => self.local_identity = Some(local.identity.clone()),
                }
                roster.insert(Participant::from_snapshot(local, ParticipantKind::Local));
            }
            None => warn!("Transport has no local participant to sync"),
        }

        for remote in self.transport.remote_participants() {
            let identity = remote.identity.clone();
            if !roster.insert(Participant::from_snapshot(remote, ParticipantKind::Remote)) {
                debug!("Skipping duplicate participant {} during resync", identity);
            }
        }

        self.roster = roster;
    }

    fn source_of_truth(&self, identity: &str) -> Option<ParticipantSnapshot<T::Remote>> {
        if self.local_identity.as_deref() == Some(identity) {
            self.transport.local_participant()
        } else {
            self.transport.participant(identity)
        }
    }

    fn refresh_media(&mut self, identity: &str) -> EventOutcome {
        if !self.roster.contains(identity) {
            debug!("Track event for participant {} not in roster", identity);
            return EventOutcome::Ignored;
        }
        let Some(snapshot) = self.source_of_truth(identity) else {
            debug!("Transport no longer knows participant {}", identity);
            return EventOutcome::Ignored;
        };

        match self.roster.get_mut(identity) {
            Some(participant) => {
                participant.apply_media_state(snapshot);
                EventOutcome::Applied
            }
            None => EventOutcome::Ignored,
        }
    }

    fn refresh_metadata(&mut self, identity: &str) -> EventOutcome {
        let Some(snapshot) = self.source_of_truth(identity) else {
            debug!("Metadata change for unknown participant {}", identity);
            return EventOutcome::Ignored;
        };

        match self.roster.get_mut(identity) {
            Some(participant) => {
                participant.apply_metadata(&snapshot);
                EventOutcome::Applied
            }
            None => EventOutcome::Ignored,
        }
    }

    fn end_session(&mut self) {
        self.call_state = CallState::Disconnected;
        self.roster.clear();
        self.local_identity = None;
        self.epoch += 1;
        // Detach rather than abort: this may run on the event task itself.
        self.event_task.take();
    }
}

/// Connects the session and starts draining transport events.
///
/// The session lock is not held while waiting on the transport, so a
/// `disconnect()` can land in the middle; the late result is then discarded
/// and anything it acquired is torn down again. Attempts are serialized: a
/// newer `connect()` waits until a superseded one has finished its teardown.
pub async fn connect<T: MediaTransport>(
    session: &SharedRoomSession<T>,
    request: ConnectRequest,
) -> Result<ConnectOutcome, ConnectionError> {
    let (transport, epoch, timeout, connect_lock) = {
        let mut guard = session.lock().await;

        if guard.call_state != CallState::Disconnected {
            info!("connect() ignored, session is {:?}", guard.call_state);
            return Ok(ConnectOutcome::AlreadyActive);
        }
        if let Err(err) = request.validate() {
            error!("Refusing to connect: {}", err);
            guard.last_error = Some(err.clone());
            return Err(err);
        }

        guard.call_state = CallState::Connecting;
        guard.epoch += 1;
        guard.last_error = None;
        (
            guard.transport.clone(),
            guard.epoch,
            guard.options.connect_timeout,
            guard.connect_lock.clone(),
        )
    };

    let _in_flight = connect_lock.lock_owned().await;
    if session.lock().await.epoch != epoch {
        info!("Connect attempt cancelled before the handshake started");
        return Ok(ConnectOutcome::Superseded);
    }

    info!("Connecting to media session at {}", request.url);

    let attempt = match tokio::time::timeout(
        timeout,
        transport.connect(&request.url, &request.token),
    )
    .await
    {
        Ok(Ok(events)) => Ok(events),
        Ok(Err(err)) => Err(ConnectionError::Rejected(err.to_string())),
        Err(_) => Err(ConnectionError::Timeout(timeout)),
    };

    let events = {
        let mut guard = session.lock().await;

        if guard.epoch != epoch {
            drop(guard);
            info!("Connect attempt finished after disconnect; discarding it");
            // Attempts are serialized, so the transport still holds this attempt's session.
            if attempt.is_ok() {
                transport.disconnect().await;
            }
            return Ok(ConnectOutcome::Superseded);
        }

        match attempt {
            Ok(events) => {
                guard.call_state = CallState::Connected;
                guard.resync();
                events
            }
            Err(err) => {
                error!("Failed to connect to media session: {}", err);
                guard.call_state = CallState::Disconnected;
                guard.last_error = Some(err.clone());
                drop(guard);
                transport.disconnect().await;
                return Err(err);
            }
        }
    };

    enable_initial_devices(session, epoch, transport.as_ref(), &request).await;

    let mut guard = session.lock().await;
    if guard.epoch != epoch {
        drop(guard);
        // An enable may have completed after disconnect() released the devices.
        info!("Session ended while enabling local devices; releasing them");
        transport.disconnect().await;
        return Ok(ConnectOutcome::Superseded);
    }

    guard.resync();
    guard.event_task = Some(tokio::spawn(handle_room_events(
        session.clone(),
        epoch,
        events,
    )));

    info!(
        "Connected to media session with {} participant(s)",
        guard.roster.len()
    );
    Ok(ConnectOutcome::Connected)
}

async fn enable_initial_devices<T: MediaTransport>(
    session: &SharedRoomSession<T>,
    epoch: u64,
    transport: &T,
    request: &ConnectRequest,
) {
    let wanted = [
        (TrackKind::Audio, request.audio_enabled),
        (TrackKind::Video, request.video_enabled),
    ];

    for (kind, enabled) in wanted {
        if !enabled {
            continue;
        }
        if session.lock().await.epoch != epoch {
            debug!("Session ended before enabling local {}", kind);
            return;
        }
        // The session stays up without the device; the flags reflect reality.
        if let Err(err) = transport.set_track_enabled(kind, true).await {
            warn!("Could not enable local {} on join: {}", kind, err);
        }
    }
}

/// Caller-initiated teardown. Safe to call repeatedly and while `connect()`
/// is still pending.
pub async fn disconnect<T: MediaTransport>(session: &SharedRoomSession<T>) {
    let (transport, was_active, event_task) = {
        let mut guard = session.lock().await;
        let was_active = guard.call_state != CallState::Disconnected;
        let event_task = guard.event_task.take();
        guard.end_session();
        guard.last_error = None;
        (guard.transport.clone(), was_active, event_task)
    };

    if let Some(event_task) = event_task {
        event_task.abort();
    }

    if was_active {
        info!("Disconnecting from media session");
        transport.disconnect().await;
    } else {
        debug!("disconnect() on an idle session");
    }
}

pub async fn toggle_audio<T: MediaTransport>(
    session: &SharedRoomSession<T>,
) -> Result<bool, DeviceError> {
    toggle_track(session, TrackKind::Audio).await
}

pub async fn toggle_video<T: MediaTransport>(
    session: &SharedRoomSession<T>,
) -> Result<bool, DeviceError> {
    toggle_track(session, TrackKind::Video).await
}

/// Flips a local capability, then re-reads it through the same path remote
/// track events use. Returns the resulting enabled flag.
async fn toggle_track<T: MediaTransport>(
    session: &SharedRoomSession<T>,
    kind: TrackKind,
) -> Result<bool, DeviceError> {
    let (transport, epoch, identity, target) = {
        let guard = session.lock().await;
        if guard.call_state != CallState::Connected {
            return Err(DeviceError::NotConnected);
        }
        let identity = guard
            .local_identity
            .clone()
            .ok_or(DeviceError::NotConnected)?;
        let current = guard
            .transport
            .local_participant()
            .map(|local| local.is_enabled(kind))
            .or_else(|| guard.roster.get(&identity).map(|p| p.is_enabled(kind)))
            .unwrap_or(false);
        (guard.transport.clone(), guard.epoch, identity, !current)
    };

    if let Err(err) = transport.set_track_enabled(kind, target).await {
        warn!("Failed to switch local {} to {}: {}", kind, target, err);
        return Err(DeviceError::Failed {
            kind,
            reason: err.to_string(),
        });
    }

    let mut guard = session.lock().await;
    if guard.epoch != epoch {
        debug!("Session ended while switching local {}", kind);
        return Ok(target);
    }

    guard.refresh_media(&identity);
    Ok(guard
        .roster
        .get(&identity)
        .map(|local| local.is_enabled(kind))
        .unwrap_or(target))
}

async fn handle_room_events<T: MediaTransport>(
    session: SharedRoomSession<T>,
    epoch: u64,
    events: EventReceiver<T::Remote>,
) {
    let mut events = UnboundedReceiverStream::new(events);

    loop {
        let (event, stream_closed) = match events.next().await {
            Some(event) => (event, false),
            None => (
                TransportEvent::Disconnected {
                    reason: "transport event stream closed".to_string(),
                },
                true,
            ),
        };

        let mut guard = session.lock().await;
        if guard.epoch != epoch {
            debug!("Dropping event for a session that already ended");
            return;
        }

        if guard.apply_event(event) == EventOutcome::SessionEnded || stream_closed {
            let transport = guard.transport.clone();
            drop(guard);
            // Releases local capture devices held by the transport.
            transport.disconnect().await;
            return;
        }
    }
}
