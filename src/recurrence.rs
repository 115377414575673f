//! User-authored weekly events and their expansion into calendar occurrences.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveTime};
use eios_parser::{parse_time, Event};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const DEFAULT_EVENT_TYPE: &str = "custom";
const DEFAULT_COLOR: &str = "#8b5cf6";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    pub max_slots_per_day: usize,
    /// Reject two slots of one day whose time ranges intersect.
    pub reject_overlaps: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            max_slots_per_day: 5,
            reject_overlaps: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSlot", into = "RawSlot")]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Serialize, Deserialize)]
struct RawSlot {
    start: String,
    end: String,
}

impl TryFrom<RawSlot> for TimeSlot {
    type Error = Error;

    fn try_from(raw: RawSlot) -> Result<Self> {
        let time = |value: &str| {
            parse_time(value)
                .ok_or_else(|| Error::Validation(format!("`{value}` is not a HH:MM time")))
        };

        Ok(Self {
            start: time(&raw.start)?,
            end: time(&raw.end)?,
        })
    }
}

impl From<TimeSlot> for RawSlot {
    fn from(slot: TimeSlot) -> Self {
        Self {
            start: slot.start.format("%H:%M").to_string(),
            end: slot.end.format("%H:%M").to_string(),
        }
    }
}

/// Time slots keyed by ISO weekday, 1 being Monday.
///
/// Serialized as `{"2": [{"start": "10:00", "end": "11:00"}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<TimeSlot>>",
    into = "BTreeMap<String, Vec<TimeSlot>>"
)]
pub struct RecurrenceRule {
    days: BTreeMap<u32, Vec<TimeSlot>>,
}

impl RecurrenceRule {
    pub fn new(days: BTreeMap<u32, Vec<TimeSlot>>) -> Result<Self> {
        if days.is_empty() {
            return Err(Error::Validation("at least one weekday is required".into()));
        }

        for (weekday, slots) in &days {
            if !(1..=7).contains(weekday) {
                return Err(Error::Validation(format!(
                    "weekday {weekday} is outside 1-7"
                )));
            }

            if slots.is_empty() {
                return Err(Error::Validation(format!(
                    "weekday {weekday} has no time slots"
                )));
            }
        }

        Ok(Self { days })
    }

    #[must_use]
    pub fn slots(&self, iso_weekday: u32) -> &[TimeSlot] {
        self.days.get(&iso_weekday).map_or(&[], Vec::as_slice)
    }

    pub fn weekdays(&self) -> impl Iterator<Item = u32> + '_ {
        self.days.keys().copied()
    }

    /// Checks the limits that depend on configuration.
    pub fn validate(&self, options: &ValidationOptions) -> Result<()> {
        for (weekday, slots) in &self.days {
            if slots.len() > options.max_slots_per_day {
                return Err(Error::Validation(format!(
                    "weekday {weekday} has {} slots, at most {} allowed",
                    slots.len(),
                    options.max_slots_per_day
                )));
            }

            if let Some(slot) = slots.iter().find(|slot| slot.end <= slot.start) {
                return Err(Error::Validation(format!(
                    "slot {}-{} on weekday {weekday} does not end after it starts",
                    slot.start.format("%H:%M"),
                    slot.end.format("%H:%M")
                )));
            }

            if options.reject_overlaps {
                let mut sorted = slots.clone();
                sorted.sort_by_key(|slot| slot.start);
                if sorted.windows(2).any(|pair| pair[0].overlaps(&pair[1])) {
                    return Err(Error::Validation(format!(
                        "weekday {weekday} has overlapping slots"
                    )));
                }
            }
        }

        Ok(())
    }
}

impl TryFrom<BTreeMap<String, Vec<TimeSlot>>> for RecurrenceRule {
    type Error = Error;

    fn try_from(raw: BTreeMap<String, Vec<TimeSlot>>) -> Result<Self> {
        let days = raw
            .into_iter()
            .map(|(key, slots)| {
                key.trim()
                    .parse::<u32>()
                    .map(|weekday| (weekday, slots))
                    .map_err(|_| Error::Validation(format!("`{key}` is not a weekday number")))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Self::new(days)
    }
}

impl From<RecurrenceRule> for BTreeMap<String, Vec<TimeSlot>> {
    fn from(rule: RecurrenceRule) -> Self {
        rule.days
            .into_iter()
            .map(|(weekday, slots)| (weekday.to_string(), slots))
            .collect()
    }
}

/// A weekly class the user added on top of the portal schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEvent {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub teacher: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub recurrence_rule: RecurrenceRule,
}

fn default_event_type() -> String {
    DEFAULT_EVENT_TYPE.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl CustomEvent {
    #[must_use]
    pub fn new<S: Into<String>>(id: i64, title: S, recurrence_rule: RecurrenceRule) -> Self {
        Self {
            id,
            title: title.into(),
            teacher: None,
            room: None,
            address: None,
            description: None,
            event_type: default_event_type(),
            color: default_color(),
            recurrence_rule,
        }
    }

    pub fn validate(&self, options: &ValidationOptions) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation(format!("event {} has no title", self.id)));
        }

        if !is_hex_color(&self.color) {
            return Err(Error::Validation(format!(
                "`{}` is not a #RRGGBB colour",
                self.color
            )));
        }

        self.recurrence_rule.validate(options)
    }

    fn occurrence(&self, date: NaiveDate, slot: &TimeSlot) -> Event {
        let mut event = Event::new(self.title.as_str(), date, slot.start, slot.end);
        event.teacher = self.teacher.clone().unwrap_or_default();
        event.room = self.room.clone().unwrap_or_default();
        event.address = self.address.clone().unwrap_or_default();
        event.event_type = self.event_type.to_uppercase();
        event.is_custom = true;
        event.custom_event_id = Some(self.id);
        event.color = Some(self.color.clone());
        event
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Occurrences of `events` on each of `dates`. Dates without any occurrence
/// are left out of the map.
#[must_use]
pub fn expand<I>(events: &[CustomEvent], dates: I) -> BTreeMap<NaiveDate, Vec<Event>>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut expanded = BTreeMap::<NaiveDate, Vec<Event>>::new();

    for date in dates {
        let weekday = date.weekday().number_from_monday();

        for event in events {
            for slot in event.recurrence_rule.slots(weekday) {
                expanded
                    .entry(date)
                    .or_default()
                    .push(event.occurrence(date, slot));
            }
        }
    }

    expanded
}

/// Fetched events followed by custom ones, ordered by start time. Events
/// starting at the same time keep that order.
#[must_use]
pub fn merge(fetched: Vec<Event>, custom: Vec<Event>) -> Vec<Event> {
    let mut merged = fetched;
    merged.extend(custom);
    merged.sort_by_key(|event| event.start_time);
    merged
}

/// The custom occurrence on `date` that starts at `start`, if any.
#[must_use]
pub fn find_occurrence(events: &[CustomEvent], date: NaiveDate, start: NaiveTime) -> Option<Event> {
    let weekday = date.weekday().number_from_monday();

    events.iter().find_map(|event| {
        event
            .recurrence_rule
            .slots(weekday)
            .iter()
            .find(|slot| slot.start == start)
            .map(|slot| event.occurrence(date, slot))
    })
}
