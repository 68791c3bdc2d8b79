use prettytable::{row, Table};

use crate::model::Participant;
use crate::stage::StagePlan;

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

pub fn roster_table<R>(participants: &[Participant<R>]) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Identity", "Name", "Label", "Mic", "Camera"]);

    for participant in participants {
        table.add_row(row![
            participant.id,
            participant.name,
            participant.label,
            on_off(participant.audio_enabled),
            on_off(participant.video_enabled),
        ]);
    }

    table
}

/// One-line summary of who sits where on the stage.
pub fn stage_summary<R>(plan: &StagePlan<R>) -> String {
    let ids = |participants: &[Participant<R>]| {
        participants
            .iter()
            .map(|p| p.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "{:?} layout: main [{}], secondary [{}], floating [{}]",
        plan.layout.variant,
        plan.main.as_ref().map(|p| p.id.as_str()).unwrap_or("-"),
        ids(&plan.secondary),
        plan.floating.as_ref().map(|p| p.id.as_str()).unwrap_or("-"),
    )
}
