//! The AI co-host tile. It never comes from the media transport: it is layered
//! onto the roster view whenever the meeting has a voice profile configured.

use crate::model::{fallback_avatar, Participant, ParticipantKind};
use crate::roster::Roster;

/// Reserved identity of the synthetic participant.
pub const AI_IDENTITY: &str = "ai";

const AI_LABEL: &str = "AI";

/// A meeting's `voiceProfile`, written as `"<AI name> · <mood>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceProfile {
    pub name: String,
    pub mood: Option<String>,
}

impl VoiceProfile {
    /// Returns `None` for an empty profile, which means "no AI host".
    pub fn parse(raw: &str) -> Option<VoiceProfile> {
        let mut parts = raw.splitn(2, '·').map(str::trim);

        let name = parts.next().filter(|name| !name.is_empty())?;
        let mood = parts
            .next()
            .filter(|mood| !mood.is_empty())
            .map(str::to_string);

        Some(VoiceProfile {
            name: name.to_string(),
            mood,
        })
    }

    pub fn participant<R>(&self) -> Participant<R> {
        Participant {
            id: AI_IDENTITY.to_string(),
            name: self.name.clone(),
            label: AI_LABEL.to_string(),
            avatar: fallback_avatar(&self.name.to_lowercase()),
            audio_enabled: true,
            video_enabled: false,
            kind: ParticipantKind::Synthetic,
            track: None,
        }
    }
}

/// The roster as consumers see it: authoritative entries in order, followed
/// by the AI host when a profile is set and nothing already claims its identity.
pub fn overlay<R: Clone>(roster: &Roster<R>, profile: Option<&VoiceProfile>) -> Vec<Participant<R>> {
    let mut view = roster.to_vec();

    if let Some(profile) = profile {
        if !roster.contains(AI_IDENTITY) {
            view.push(profile.participant());
        }
    }

    view
}
