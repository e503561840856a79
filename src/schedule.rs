//! Schedule normalization.
//!
//! A class meets at an ordered list of atomic (day, time-range) instances. The
//! collapsed day/time descriptors built here name variables and key the
//! conflict slots; the meeting list itself answers overlap questions.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::data::{ClassId, CourseClass};

/// Rendered in place of a day or time for classes without a schedule.
pub const UNSCHEDULED: &str = "UNSCHEDULED";

/// Upstream spelling of the unscheduled sentinel.
const UPSTREAM_UNSCHEDULED: &str = "NÃO DEFINIDO";

/// One weekly meeting instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Meeting {
    pub day: String,
    pub time: String,
}

impl Meeting {
    pub fn new(day: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            time: time.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ScheduleDescriptor {
    meetings: Vec<Meeting>,
}

impl ScheduleDescriptor {
    pub fn new(meetings: impl IntoIterator<Item = Meeting>) -> Self {
        Self {
            meetings: meetings.into_iter().collect(),
        }
    }

    pub fn unscheduled() -> Self {
        Self::default()
    }

    /// Parses the compound descriptors used by the spreadsheet export, e.g.
    /// `("SEG,QUA", "13:00-15:00,08:00-10:00")`. Tokens pair up positionally; a
    /// shorter side repeats its last token.
    pub fn from_compound(day: &str, time: &str) -> Self {
        let days = tokens(day).collect_vec();
        let times = tokens(time).collect_vec();
        if days.is_empty() || times.is_empty() {
            return Self::unscheduled();
        }

        let count = days.len().max(times.len());
        let meetings = (0..count).map(|i| {
            let day = days[i.min(days.len() - 1)];
            let time = times[i.min(times.len() - 1)];
            Meeting::new(day, time)
        });
        Self::new(meetings)
    }

    pub fn meetings(&self) -> &[Meeting] {
        &self.meetings
    }

    pub fn is_scheduled(&self) -> bool {
        !self.meetings.is_empty()
    }

    /// Distinct days in first-seen order.
    pub fn days(&self) -> Vec<&str> {
        self.meetings.iter().map(|m| m.day.as_str()).unique().collect()
    }

    /// Distinct time ranges in first-seen order.
    pub fn times(&self) -> Vec<&str> {
        self.meetings.iter().map(|m| m.time.as_str()).unique().collect()
    }

    pub fn day_descriptor(&self) -> String {
        collapse(self.days())
    }

    pub fn time_descriptor(&self) -> String {
        collapse(self.times())
    }

    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            day: self.day_descriptor(),
            time: self.time_descriptor(),
        }
    }

    pub fn occurs_on(&self, day: &str) -> bool {
        self.meetings.iter().any(|m| m.day == day)
    }

    pub fn occurs_at(&self, time: &str) -> bool {
        self.meetings.iter().any(|m| m.time == time)
    }

    pub fn contains_meeting(&self, meeting: &Meeting) -> bool {
        self.meetings.contains(meeting)
    }

    /// True when both schedules share at least one meeting instance.
    pub fn overlaps(&self, other: &ScheduleDescriptor) -> bool {
        self.meetings.iter().any(|m| other.contains_meeting(m))
    }
}

fn tokens(descriptor: &str) -> impl Iterator<Item = &str> {
    descriptor
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != UNSCHEDULED && *t != UPSTREAM_UNSCHEDULED)
}

fn collapse(atoms: Vec<&str>) -> String {
    if atoms.is_empty() {
        UNSCHEDULED.to_string()
    } else {
        atoms.join(",")
    }
}

/// Whether `atom` is one of the comma-separated tokens of `descriptor`.
/// The unscheduled sentinel never matches.
pub fn descriptor_contains(descriptor: &str, atom: &str) -> bool {
    tokens(descriptor).any(|token| token == atom)
}

/// Collapsed (day, time) descriptor pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub day: String,
    pub time: String,
}

impl SlotKey {
    pub fn occurs_on(&self, day: &str) -> bool {
        descriptor_contains(&self.day, day)
    }

    pub fn occurs_at(&self, time: &str) -> bool {
        descriptor_contains(&self.time, time)
    }

    /// A meeting instance falls inside this slot when its day and its time are
    /// both tokens of the slot's descriptors.
    pub fn covers(&self, meeting: &Meeting) -> bool {
        self.occurs_on(&meeting.day) && self.occurs_at(&meeting.time)
    }
}

/// Distinct slots observed across scheduled classes.
pub fn possible_schedules<'a>(classes: impl IntoIterator<Item = &'a CourseClass>) -> BTreeSet<SlotKey> {
    classes
        .into_iter()
        .filter(|class| class.schedule.is_scheduled())
        .map(|class| class.schedule.slot_key())
        .collect()
}

pub fn classes_on_day(classes: &BTreeMap<ClassId, CourseClass>, day: &str) -> BTreeSet<ClassId> {
    classes
        .values()
        .filter(|class| class.schedule.occurs_on(day))
        .map(|class| class.id.clone())
        .collect()
}

pub fn classes_at_time(classes: &BTreeMap<ClassId, CourseClass>, time: &str) -> BTreeSet<ClassId> {
    classes
        .values()
        .filter(|class| class.schedule.occurs_at(time))
        .map(|class| class.id.clone())
        .collect()
}
