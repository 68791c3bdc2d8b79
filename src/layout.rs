//! Stage layout selection.
//!
//! Maps (participant count, screen-size class) onto the class strings the
//! renderer applies to the stage container and its tiles. Pure: no state,
//! no I/O, same output for the same input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

const BASE_TILE_CLASS: &str = "relative overflow-hidden rounded-2xl border border-slate-200/70 bg-slate-100 shadow-[0_0_60px_rgba(14,165,233,0.08)] dark:border-slate-900/60 dark:bg-slate-900/60";

/// The primary stage shows at most one human tile beside the AI stage tile.
pub const MIN_STAGE_PARTICIPANTS: usize = 1;
pub const MAX_STAGE_PARTICIPANTS: usize = 2;

/// Without a viewport to measure, the widest layout is assumed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenSize {
    Mobile,
    Tablet,
    #[default]
    Desktop,
}

impl ScreenSize {
    pub const TABLET_MIN_WIDTH: u32 = 768;
    pub const DESKTOP_MIN_WIDTH: u32 = 1024;

    pub fn from_width(width: u32) -> ScreenSize {
        if width < Self::TABLET_MIN_WIDTH {
            ScreenSize::Mobile
        } else if width < Self::DESKTOP_MIN_WIDTH {
            ScreenSize::Tablet
        } else {
            ScreenSize::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenSize::Mobile => "mobile",
            ScreenSize::Tablet => "tablet",
            ScreenSize::Desktop => "desktop",
        }
    }
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScreenSize {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile" => Ok(ScreenSize::Mobile),
            "tablet" => Ok(ScreenSize::Tablet),
            "desktop" => Ok(ScreenSize::Desktop),
            other => Err(LayoutError::UnknownScreenSize(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutVariant {
    Single,
    Double,
}

/// The tile group that accompanies the main tile. Which one exists is decided
/// by the variant alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Companion {
    #[serde(rename_all = "camelCase")]
    Secondary {
        secondary_container_class: String,
        secondary_tile_class: String,
    },
    #[serde(rename_all = "camelCase")]
    FloatingSelf {
        floating_self_wrapper_class: String,
        floating_self_tile_class: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingLayout {
    pub variant: LayoutVariant,
    pub container_class: String,
    pub main_tile_wrapper_class: String,
    pub main_tile_class: String,
    #[serde(flatten)]
    pub companion: Companion,
}

impl MeetingLayout {
    pub fn secondary_container_class(&self) -> Option<&str> {
        match &self.companion {
            Companion::Secondary {
                secondary_container_class,
                ..
            } => Some(secondary_container_class),
            Companion::FloatingSelf { .. } => None,
        }
    }

    pub fn secondary_tile_class(&self) -> Option<&str> {
        match &self.companion {
            Companion::Secondary {
                secondary_tile_class,
                ..
            } => Some(secondary_tile_class),
            Companion::FloatingSelf { .. } => None,
        }
    }

    pub fn floating_self_wrapper_class(&self) -> Option<&str> {
        match &self.companion {
            Companion::FloatingSelf {
                floating_self_wrapper_class,
                ..
            } => Some(floating_self_wrapper_class),
            Companion::Secondary { .. } => None,
        }
    }

    pub fn floating_self_tile_class(&self) -> Option<&str> {
        match &self.companion {
            Companion::FloatingSelf {
                floating_self_tile_class,
                ..
            } => Some(floating_self_tile_class),
            Companion::Secondary { .. } => None,
        }
    }
}

pub fn clamp_participant_count(participant_count: i64) -> usize {
    participant_count.clamp(MIN_STAGE_PARTICIPANTS as i64, MAX_STAGE_PARTICIPANTS as i64) as usize
}

pub fn compute(participant_count: i64, screen_size: ScreenSize) -> MeetingLayout {
    match clamp_participant_count(participant_count) {
        1 => single_layout(screen_size),
        _ => double_layout(screen_size),
    }
}

/// Entry point for callers holding the screen size as text, e.g. from a
/// serialized UI state. Unknown values are rejected rather than guessed.
pub fn compute_for(participant_count: i64, screen_size: &str) -> Result<MeetingLayout, LayoutError> {
    Ok(compute(participant_count, screen_size.parse()?))
}

fn single_layout(screen_size: ScreenSize) -> MeetingLayout {
    let is_desktop = screen_size == ScreenSize::Desktop;

    let main_tile_sizing = match screen_size {
        ScreenSize::Desktop => "aspect-video lg:min-h-[440px]",
        ScreenSize::Tablet => "min-h-[62vh]",
        ScreenSize::Mobile => "min-h-[75vh]",
    };

    // The wrapper lets pointer events fall through to the main tile; the tile
    // itself takes them back for its own area.
    let floating_self_wrapper_class = if is_desktop {
        "pointer-events-none absolute bottom-8 right-8 w-56"
    } else {
        "pointer-events-none absolute bottom-4 right-4 w-40"
    };

    MeetingLayout {
        variant: LayoutVariant::Single,
        container_class: "relative flex h-full w-full items-center justify-center".to_string(),
        main_tile_wrapper_class: if is_desktop {
            "w-[70vw] max-w-4xl".to_string()
        } else {
            "w-full max-w-4xl".to_string()
        },
        main_tile_class: format!("{BASE_TILE_CLASS} w-full {main_tile_sizing}"),
        companion: Companion::FloatingSelf {
            floating_self_wrapper_class: floating_self_wrapper_class.to_string(),
            floating_self_tile_class: format!(
                "{BASE_TILE_CLASS} pointer-events-auto aspect-video w-full"
            ),
        },
    }
}

// The `lg:` breakpoint is the same 1024px that separates tablet from desktop,
// so the container flips from a column stack to a row split exactly there.
fn double_layout(_screen_size: ScreenSize) -> MeetingLayout {
    MeetingLayout {
        variant: LayoutVariant::Double,
        container_class:
            "flex h-full w-full flex-col gap-4 lg:max-w-6xl lg:flex-row lg:items-stretch lg:gap-8"
                .to_string(),
        main_tile_wrapper_class: "w-full lg:flex-[0.65] lg:min-w-0 lg:max-w-[960px]".to_string(),
        main_tile_class: format!("{BASE_TILE_CLASS} w-full min-h-[62vh] lg:min-h-full"),
        companion: Companion::Secondary {
            secondary_container_class: "grid grid-cols-2 gap-3 lg:flex lg:flex-[0.35] lg:min-w-0 lg:flex-col lg:justify-between lg:gap-4".to_string(),
            secondary_tile_class: format!(
                "{BASE_TILE_CLASS} w-full aspect-[4/3] md:aspect-[16/9] lg:flex-1 lg:min-h-[100px]!"
            ),
        },
    }
}
