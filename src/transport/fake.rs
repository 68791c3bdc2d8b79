//! Scripted in-memory transport used by the session tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::Notify;

use super::{
    EventReceiver, MediaTransport, ParticipantSnapshot, TrackKind, TransportError, TransportEvent,
};

pub(crate) type FakeSnapshot = ParticipantSnapshot<String>;

pub(crate) fn snapshot(identity: &str, name: &str) -> FakeSnapshot {
    ParticipantSnapshot {
        identity: identity.to_string(),
        name: name.to_string(),
        metadata: None,
        microphone_enabled: true,
        camera_enabled: true,
        remote: Some(format!("handle-{identity}")),
    }
}

struct FakeState {
    connected: bool,
    local: FakeSnapshot,
    remotes: Vec<FakeSnapshot>,
    events: Option<UnboundedSender<TransportEvent<String>>>,
    connect_failure: Option<TransportError>,
    device_failure: Option<TransportError>,
    gate: Option<Arc<Notify>>,
    device_gate: Option<Arc<Notify>>,
    hang: bool,
    connect_calls: usize,
    disconnect_calls: usize,
    device_calls: Vec<(TrackKind, bool)>,
}

pub(crate) struct FakeTransport {
    state: Mutex<FakeState>,
}

impl FakeTransport {
    pub(crate) fn new(local_identity: &str, local_name: &str) -> Self {
        let mut local = snapshot(local_identity, local_name);
        local.microphone_enabled = false;
        local.camera_enabled = false;
        local.remote = None;

        FakeTransport {
            state: Mutex::new(FakeState {
                connected: false,
                local,
                remotes: vec![],
                events: None,
                connect_failure: None,
                device_failure: None,
                gate: None,
                device_gate: None,
                hang: false,
                connect_calls: 0,
                disconnect_calls: 0,
                device_calls: vec![],
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake transport state poisoned")
    }

    /// Remote already present in the room before we connect.
    pub(crate) fn with_remote(self, remote: FakeSnapshot) -> Self {
        self.lock().remotes.push(remote);
        self
    }

    pub(crate) fn fail_next_connect(&self, error: TransportError) {
        self.lock().connect_failure = Some(error);
    }

    pub(crate) fn fail_devices(&self, error: Option<TransportError>) {
        self.lock().device_failure = error;
    }

    /// Connect never acknowledges.
    pub(crate) fn hang_connect(&self) {
        self.lock().hang = true;
    }

    /// Connect waits until the returned gate is notified.
    pub(crate) fn gate_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().gate = Some(gate.clone());
        gate
    }

    /// The next device switch is accepted but only takes effect once the
    /// returned gate is notified, like a slow capture device.
    pub(crate) fn gate_devices(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().device_gate = Some(gate.clone());
        gate
    }

    /// Whether the local capture device is currently open, connected or not.
    pub(crate) fn device_live(&self, kind: TrackKind) -> bool {
        let state = self.lock();
        match kind {
            TrackKind::Audio => state.local.microphone_enabled,
            TrackKind::Video => state.local.camera_enabled,
        }
    }

    pub(crate) fn emit(&self, event: TransportEvent<String>) {
        if let Some(events) = &self.lock().events {
            let _ = events.send(event);
        }
    }

    pub(crate) fn join(&self, remote: FakeSnapshot) {
        self.lock().remotes.push(remote.clone());
        self.emit(TransportEvent::ParticipantConnected(remote));
    }

    pub(crate) fn leave(&self, identity: &str) {
        self.drop_remote_silently(identity);
        self.emit(TransportEvent::ParticipantDisconnected {
            identity: identity.to_string(),
        });
    }

    /// Removes a remote without telling anyone, as if the event was lost.
    pub(crate) fn drop_remote_silently(&self, identity: &str) {
        self.lock().remotes.retain(|remote| remote.identity != identity);
    }

    /// Flips the source-of-truth flag without emitting anything.
    pub(crate) fn set_remote_track(&self, identity: &str, kind: TrackKind, enabled: bool) {
        let mut state = self.lock();
        if let Some(remote) = state.remotes.iter_mut().find(|r| r.identity == identity) {
            match kind {
                TrackKind::Audio => remote.microphone_enabled = enabled,
                TrackKind::Video => remote.camera_enabled = enabled,
            }
        }
    }

    pub(crate) fn set_remote_metadata(&self, identity: &str, metadata: &str) {
        let mut state = self.lock();
        if let Some(remote) = state.remotes.iter_mut().find(|r| r.identity == identity) {
            remote.metadata = Some(metadata.to_string());
        }
    }

    pub(crate) fn set_local_identity(&self, identity: &str) {
        self.lock().local.identity = identity.to_string();
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub(crate) fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    pub(crate) fn disconnect_calls(&self) -> usize {
        self.lock().disconnect_calls
    }

    pub(crate) fn device_calls(&self) -> Vec<(TrackKind, bool)> {
        self.lock().device_calls.clone()
    }

    async fn set_local_device(&self, kind: TrackKind, enabled: bool) -> Result<(), TransportError> {
        let gate = {
            let mut state = self.lock();
            state.device_calls.push((kind, enabled));

            if let Some(error) = state.device_failure.clone() {
                return Err(error);
            }
            if !state.connected {
                return Err(TransportError::NotConnected);
            }
            state.device_gate.take()
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.lock();
        match kind {
            TrackKind::Audio => state.local.microphone_enabled = enabled,
            TrackKind::Video => state.local.camera_enabled = enabled,
        }
        Ok(())
    }
}

#[async_trait]
impl MediaTransport for FakeTransport {
    type Remote = String;

    async fn connect(&self, _url: &str, _token: &str) -> Result<EventReceiver<String>, TransportError> {
        let (gate, hang) = {
            let mut state = self.lock();
            state.connect_calls += 1;
            (state.gate.take(), state.hang)
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.lock();
        if let Some(error) = state.connect_failure.take() {
            return Err(error);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.events = Some(tx);
        state.connected = true;
        Ok(rx)
    }

    async fn disconnect(&self) {
        let mut state = self.lock();
        state.disconnect_calls += 1;
        state.connected = false;
        state.events = None;
        state.local.microphone_enabled = false;
        state.local.camera_enabled = false;
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        self.set_local_device(TrackKind::Audio, enabled).await
    }

    async fn set_camera_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        self.set_local_device(TrackKind::Video, enabled).await
    }

    fn local_participant(&self) -> Option<FakeSnapshot> {
        let state = self.lock();
        state.connected.then(|| state.local.clone())
    }

    fn remote_participants(&self) -> Vec<FakeSnapshot> {
        let state = self.lock();
        if state.connected {
            state.remotes.clone()
        } else {
            vec![]
        }
    }
}
