//! S0: tell the persona model what time it is.

use chrono::Timelike;
use murasame_core::{History, Turn};

/// Coarse time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPeriod {
    Dawn,
    Morning,
    Afternoon,
    Evening,
}

impl DayPeriod {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..5 => Self::Dawn,
            5..12 => Self::Morning,
            12..18 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Dawn => "凌晨",
            Self::Morning => "早上",
            Self::Afternoon => "下午",
            Self::Evening => "晚上",
        }
    }
}

pub fn time_annotation(hour: u32, minute: u32) -> String {
    format!(
        "现在是{}{hour}点{minute}分",
        DayPeriod::from_hour(hour).label()
    )
}

/// The dialogue as sent to the generator: `dialogue` plus a system turn
/// with the time. The copy is request-scoped and never committed.
pub fn annotate(dialogue: &History, now: &impl Timelike) -> History {
    let mut annotated = dialogue.clone();
    annotated.push(Turn::system(time_annotation(now.hour(), now.minute())));
    annotated
}
