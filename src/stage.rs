use crate::ai_host::VoiceProfile;
use crate::layout::{
    self, LayoutVariant, MeetingLayout, ScreenSize, MAX_STAGE_PARTICIPANTS, MIN_STAGE_PARTICIPANTS,
};
use crate::model::Participant;

/// Everything the renderer needs for one frame of the stage.
#[derive(Debug, Clone)]
pub struct StagePlan<R> {
    pub layout: MeetingLayout,
    /// Occupant of the main tile: the AI host when one is configured.
    pub main: Option<Participant<R>>,
    pub secondary: Vec<Participant<R>>,
    pub floating: Option<Participant<R>>,
}

/// Lays out the first `capacity` roster entries around the main tile.
/// `capacity` is held to the range the layout engine can place.
///
/// The AI host is never counted toward the layout's participant count; it
/// always occupies the main tile.
pub fn compose<R: Clone>(
    roster: &[Participant<R>],
    voice_profile: Option<&VoiceProfile>,
    screen_size: ScreenSize,
    capacity: usize,
) -> StagePlan<R> {
    let capacity = capacity.clamp(MIN_STAGE_PARTICIPANTS, MAX_STAGE_PARTICIPANTS);
    let active: Vec<Participant<R>> = roster.iter().take(capacity).cloned().collect();
    let layout = layout::compute(active.len() as i64, screen_size);

    let (secondary, floating) = match layout.variant {
        LayoutVariant::Double => (active, None),
        LayoutVariant::Single => (vec![], active.into_iter().next()),
    };

    StagePlan {
        layout,
        main: voice_profile.map(VoiceProfile::participant),
        secondary,
        floating,
    }
}
