//! Pre-join lobby: device permissions, preview streams and join preferences.

use async_trait::async_trait;
use log::{error, info};

use crate::error::DeviceError;
use crate::room_session::ConnectRequest;
use crate::transport::TrackKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
}

pub const PREVIEW_VIDEO: VideoConstraints = VideoConstraints {
    width: 1280,
    height: 720,
};

/// A live capture from a local device. Stopping releases the device.
pub trait LocalStream: Send {
    fn kind(&self) -> TrackKind;
    fn stop(&mut self);
}

#[async_trait]
pub trait DeviceAccess: Send + Sync {
    type Stream: LocalStream;

    async fn open_microphone(&self) -> Result<Self::Stream, DeviceError>;

    async fn open_camera(&self, constraints: VideoConstraints) -> Result<Self::Stream, DeviceError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaPermissions {
    pub microphone: bool,
    pub camera: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPreferences {
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

impl Default for JoinPreferences {
    fn default() -> Self {
        JoinPreferences {
            audio_enabled: true,
            video_enabled: true,
        }
    }
}

pub struct Lobby<D: DeviceAccess> {
    devices: D,
    permissions: MediaPermissions,
    preferences: JoinPreferences,
    microphone: Option<D::Stream>,
    camera: Option<D::Stream>,
}

impl<D: DeviceAccess> Lobby<D> {
    pub fn new(devices: D) -> Self {
        Lobby {
            devices,
            permissions: MediaPermissions::default(),
            preferences: JoinPreferences::default(),
            microphone: None,
            camera: None,
        }
    }

    pub fn permissions(&self) -> MediaPermissions {
        self.permissions
    }

    pub fn preferences(&self) -> JoinPreferences {
        self.preferences
    }

    pub fn set_join_with_microphone(&mut self, enabled: bool) {
        self.preferences.audio_enabled = enabled;
    }

    pub fn set_join_with_camera(&mut self, enabled: bool) {
        self.preferences.video_enabled = enabled;
    }

    pub fn microphone_stream(&self) -> Option<&D::Stream> {
        self.microphone.as_ref()
    }

    pub fn camera_stream(&self) -> Option<&D::Stream> {
        self.camera.as_ref()
    }

    /// Requests the microphone, then the camera. A failure stops there;
    /// whatever was granted before it stays granted.
    pub async fn check_permissions(&mut self) -> Result<(), DeviceError> {
        self.request_microphone().await?;
        self.request_camera().await
    }

    pub async fn request_microphone(&mut self) -> Result<(), DeviceError> {
        if let Some(mut previous) = self.microphone.take() {
            previous.stop();
        }

        match self.devices.open_microphone().await {
            Ok(stream) => {
                info!("Microphone access granted");
                self.permissions.microphone = true;
                self.microphone = Some(stream);
                Ok(())
            }
            Err(err) => {
                error!("Microphone permission denied: {}", err);
                Err(err)
            }
        }
    }

    pub async fn request_camera(&mut self) -> Result<(), DeviceError> {
        if let Some(mut previous) = self.camera.take() {
            previous.stop();
        }

        match self.devices.open_camera(PREVIEW_VIDEO).await {
            Ok(stream) => {
                info!("Camera access granted");
                self.permissions.camera = true;
                self.camera = Some(stream);
                Ok(())
            }
            Err(err) => {
                error!("Camera permission denied: {}", err);
                Err(err)
            }
        }
    }

    /// Stops any preview streams. Permissions are remembered.
    pub fn cleanup(&mut self) {
        for mut stream in [self.microphone.take(), self.camera.take()]
            .into_iter()
            .flatten()
        {
            stream.stop();
        }
    }

    pub fn connect_request(&self, url: &str, token: &str) -> ConnectRequest {
        ConnectRequest {
            url: url.to_string(),
            token: token.to_string(),
            audio_enabled: self.preferences.audio_enabled,
            video_enabled: self.preferences.video_enabled,
        }
    }
}

impl<D: DeviceAccess> Drop for Lobby<D> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
