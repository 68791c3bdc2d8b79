//! REST client for the meeting backend: fetch a meeting, start it, join it.

use log::{debug, info};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ApiError;

const API_PREFIX: &str = "/api/v1";
const SCHEDULED: &str = "scheduled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: String,
    pub duration_minutes: u32,
    /// `"<AI name> · <mood>"`; empty when the meeting has no AI host.
    #[serde(default)]
    pub voice_profile: String,
    pub status: String,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub host_user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitedParticipant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDetail {
    pub summary: MeetingSummary,
    #[serde(default)]
    pub agenda: Vec<AgendaItem>,
    #[serde(default)]
    pub participants: Vec<InvitedParticipant>,
    #[serde(default)]
    pub notes: String,
}

impl MeetingDetail {
    /// A host opening a meeting that is still scheduled has to start it before joining.
    pub fn needs_start(&self, user_id: &str) -> bool {
        self.summary.status == SCHEDULED
            && self.summary.host_user_id.as_deref() == Some(user_id)
    }

    pub fn voice_profile(&self) -> Option<&str> {
        Some(self.summary.voice_profile.as_str()).filter(|profile| !profile.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct MeetingEnvelope {
    meeting: MeetingDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnCredentials {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingJoinResponse {
    pub meeting_id: String,
    pub participant_id: String,
    pub web_rtc_token: String,
    pub ai_realtime_token: String,
    pub voice_synth_token: String,
    pub expires_at: String,
    pub turn_credentials: TurnCredentials,
    #[serde(default)]
    pub livekit_token: Option<String>,
    #[serde(default)]
    pub livekit_url: Option<String>,
}

impl MeetingJoinResponse {
    /// The `(url, token)` pair to hand to the media transport. The server's
    /// own media URL wins over `fallback_url`.
    pub fn transport_credentials(
        &self,
        fallback_url: Option<&str>,
    ) -> Result<(String, String), ApiError> {
        let url = non_empty(self.livekit_url.as_deref())
            .or_else(|| non_empty(fallback_url))
            .ok_or(ApiError::MissingTransport)?;
        let token = non_empty(self.livekit_token.as_deref())
            .or_else(|| non_empty(Some(self.web_rtc_token.as_str())))
            .ok_or(ApiError::MissingTransport)?;

        Ok((url.to_string(), token.to_string()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Maps a failed response to an [`ApiError`], recognising the backend's
/// meeting-state messages.
pub fn error_from_response(status: u16, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| body.trim().to_string());
    let lowered = message.to_lowercase();

    if status == 401 {
        ApiError::NotAuthenticated
    } else if lowered.contains("not started") {
        ApiError::MeetingNotStarted
    } else if lowered.contains("ended") {
        ApiError::MeetingEnded
    } else if lowered.contains("not invited") {
        ApiError::NotInvited
    } else if status == 404 {
        ApiError::NotFound(message)
    } else {
        ApiError::Server { status, message }
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_response(status.as_u16(), &body))
}

async fn parse_status_only(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_response(status.as_u16(), &body))
}

#[derive(Debug, Clone)]
pub struct MeetingApiClient {
    base_url: String,
    access_token: Option<String>,
    http: Client,
}

impl MeetingApiClient {
    /// `backend_url` is the server root, e.g. `http://localhost:8080`.
    pub fn new(backend_url: &str, access_token: Option<String>) -> Self {
        Self {
            base_url: format!("{}{}", backend_url.trim_end_matches('/'), API_PREFIX),
            access_token,
            http: Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.backend_url, config.access_token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_access_token(&mut self, token: String) {
        self.access_token = Some(token);
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.apply_auth(self.http.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.apply_auth(self.http.post(self.url(path)))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Calls `GET /meetings/{meeting_id}`.
    pub async fn get_meeting(&self, meeting_id: &str) -> Result<MeetingDetail, ApiError> {
        let response = self.get(&format!("/meetings/{meeting_id}")).send().await?;
        let envelope: MeetingEnvelope = parse_response(response).await?;
        Ok(envelope.meeting)
    }

    /// Calls `POST /meetings/{meeting_id}/start`.
    pub async fn start_meeting(&self, meeting_id: &str) -> Result<(), ApiError> {
        let response = self
            .post(&format!("/meetings/{meeting_id}/start"))
            .send()
            .await?;
        parse_status_only(response).await
    }

    /// Calls `POST /meetings/{meeting_id}/join`.
    pub async fn join_meeting(&self, meeting_id: &str) -> Result<MeetingJoinResponse, ApiError> {
        let response = self
            .post(&format!("/meetings/{meeting_id}/join"))
            .send()
            .await?;
        parse_response(response).await
    }

    /// Fetches the meeting, starts it when `user_id` hosts a scheduled
    /// meeting, then joins.
    pub async fn prepare_join(
        &self,
        meeting_id: &str,
        user_id: &str,
    ) -> Result<(MeetingDetail, MeetingJoinResponse), ApiError> {
        let detail = self.get_meeting(meeting_id).await?;

        if detail.needs_start(user_id) {
            info!("Starting scheduled meeting {} as host", meeting_id);
            self.start_meeting(meeting_id).await?;
        }

        let joined = self.join_meeting(meeting_id).await?;
        debug!(
            "Joined meeting {} as participant {}, tokens expire at {}",
            joined.meeting_id, joined.participant_id, joined.expires_at
        );
        Ok((detail, joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOIN_JSON: &str = r#"{
        "meetingId": "m-1",
        "participantId": "p-9",
        "webRtcToken": "webrtc-token",
        "aiRealtimeToken": "ai-token",
        "voiceSynthToken": "voice-token",
        "expiresAt": "2025-01-01T10:00:00Z",
        "turnCredentials": { "url": "turn:turn.example.com", "username": "u", "password": "p" },
        "livekitToken": "lk-token",
        "livekitUrl": "wss://lk.example.com"
    }"#;

    const MEETING_JSON: &str = r#"{
        "meeting": {
            "summary": {
                "id": "m-1",
                "title": "Weekly sync",
                "description": "",
                "startTime": "2025-01-01T10:00:00Z",
                "durationMinutes": 30,
                "voiceProfile": "Aurora · Calm",
                "status": "scheduled",
                "hostUserId": "host-1"
            },
            "agenda": [{ "id": "a1", "title": "Intro", "durationMinutes": 5 }]
        }
    }"#;

    fn meeting() -> MeetingDetail {
        serde_json::from_str::<MeetingEnvelope>(MEETING_JSON)
            .unwrap()
            .meeting
    }

    #[test]
    fn base_url_gets_api_prefix() {
        let client = MeetingApiClient::new("http://localhost:8080/", None);
        assert_eq!(client.base_url(), "http://localhost:8080/api/v1");
    }

    #[test]
    fn parses_meeting_detail() {
        let detail = meeting();
        assert_eq!(detail.summary.title, "Weekly sync");
        assert_eq!(detail.summary.duration_minutes, 30);
        assert_eq!(detail.agenda.len(), 1);
        assert!(detail.participants.is_empty());
        assert_eq!(detail.voice_profile(), Some("Aurora · Calm"));
    }

    #[test]
    fn only_the_host_starts_a_scheduled_meeting() {
        let mut detail = meeting();
        assert!(detail.needs_start("host-1"));
        assert!(!detail.needs_start("guest-2"));

        detail.summary.status = "live".to_string();
        assert!(!detail.needs_start("host-1"));
    }

    #[test]
    fn transport_credentials_prefer_server_values() {
        let mut joined: MeetingJoinResponse = serde_json::from_str(JOIN_JSON).unwrap();
        assert_eq!(
            joined.transport_credentials(Some("wss://fallback")).unwrap(),
            ("wss://lk.example.com".to_string(), "lk-token".to_string())
        );

        joined.livekit_url = None;
        joined.livekit_token = None;
        assert_eq!(
            joined.transport_credentials(Some("wss://fallback")).unwrap(),
            ("wss://fallback".to_string(), "webrtc-token".to_string())
        );

        assert!(matches!(
            joined.transport_credentials(None),
            Err(ApiError::MissingTransport)
        ));
    }

    #[test]
    fn classifies_backend_messages() {
        assert!(matches!(
            error_from_response(400, r#"{"message":"Meeting has not started"}"#),
            ApiError::MeetingNotStarted
        ));
        assert!(matches!(
            error_from_response(409, r#"{"message":"meeting ended"}"#),
            ApiError::MeetingEnded
        ));
        assert!(matches!(
            error_from_response(403, r#"{"message":"User is not invited"}"#),
            ApiError::NotInvited
        ));
        assert!(matches!(
            error_from_response(401, "whatever"),
            ApiError::NotAuthenticated
        ));
        assert!(matches!(
            error_from_response(404, r#"{"message":"meeting not found"}"#),
            ApiError::NotFound(message) if message == "meeting not found"
        ));
        assert!(matches!(
            error_from_response(500, "boom"),
            ApiError::Server { status: 500, message } if message == "boom"
        ));
    }
}
