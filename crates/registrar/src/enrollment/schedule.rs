use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::domain::{Section, SectionId};

/// Weekly meeting slot. Construction guarantees `start < end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMeeting")]
pub struct Meeting {
    day: Weekday,
    start: NaiveTime,
    end: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("meeting on {day} must end after it starts ({start} >= {end})")]
    EmptyInterval {
        day: Weekday,
        start: NaiveTime,
        end: NaiveTime,
    },
}

#[derive(Deserialize)]
struct RawMeeting {
    day: Weekday,
    start: NaiveTime,
    end: NaiveTime,
    #[serde(default)]
    location: Option<String>,
}

impl TryFrom<RawMeeting> for Meeting {
    type Error = ScheduleError;

    fn try_from(raw: RawMeeting) -> Result<Self, Self::Error> {
        let meeting = Meeting::new(raw.day, raw.start, raw.end)?;
        Ok(match raw.location {
            Some(location) => meeting.at(location),
            None => meeting,
        })
    }
}

impl Meeting {
    pub fn new(day: Weekday, start: NaiveTime, end: NaiveTime) -> Result<Self, ScheduleError> {
        if start >= end {
            return Err(ScheduleError::EmptyInterval { day, start, end });
        }

        Ok(Self {
            day,
            start,
            end,
            location: None,
        })
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn day(&self) -> Weekday {
        self.day
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Half-open overlap on the same weekday; touching endpoints do not clash.
    pub fn overlaps(&self, other: &Meeting) -> bool {
        self.day == other.day && other.start < self.end && self.start < other.end
    }
}

/// True when any candidate slot overlaps any existing slot.
pub fn conflicts(candidate: &[Meeting], existing: &[Meeting]) -> bool {
    candidate
        .iter()
        .any(|slot| existing.iter().any(|taken| slot.overlaps(taken)))
}

/// Identifiers of the existing sections whose meetings clash with the candidate.
pub fn conflicting_sections<'a, I>(candidate: &Section, existing: I) -> Vec<SectionId>
where
    I: IntoIterator<Item = &'a Section>,
{
    let mut clashes: Vec<SectionId> = existing
        .into_iter()
        .filter(|section| section.id != candidate.id)
        .filter(|section| conflicts(&candidate.meetings, &section.meetings))
        .map(|section| section.id.clone())
        .collect();
    clashes.sort();
    clashes.dedup();
    clashes
}
