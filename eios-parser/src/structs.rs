use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveTime};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const MONTH_NAMES: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// One of the three renderings the scheduler widget can be switched into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ViewKind {
    Timeline,
    Day,
    Week,
}

impl ViewKind {
    /// Maps the integer tag the widget writes after each appointment id.
    #[must_use]
    pub fn from_discriminator(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Week),
            1 => Some(Self::Timeline),
            2 => Some(Self::Day),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeline => "Timeline",
            Self::Day => "Day",
            Self::Week => "Week",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    pub course_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub teacher: String,
    #[cfg_attr(feature = "serde", serde(with = "hh_mm"))]
    pub start_time: NaiveTime,
    #[cfg_attr(feature = "serde", serde(with = "hh_mm"))]
    pub end_time: NaiveTime,
    #[cfg_attr(feature = "serde", serde(default))]
    pub event_type: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub room: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub address: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub group: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub meeting_link: String,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub start_date: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_custom: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub custom_event_id: Option<i64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub color: Option<String>,
}

impl Event {
    /// Builds an event with every optional text field left empty.
    #[must_use]
    pub fn new<S: Into<String>>(
        course_name: S,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            course_name: course_name.into(),
            teacher: String::new(),
            start_time,
            end_time,
            event_type: String::new(),
            room: String::new(),
            address: String::new(),
            group: String::new(),
            meeting_link: String::new(),
            day: date.day(),
            month: date.month(),
            year: date.year(),
            start_date: format_date(date),
            is_custom: false,
            custom_event_id: None,
            color: None,
        }
    }

    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    #[must_use]
    pub fn is_on(&self, date: NaiveDate) -> bool {
        self.day == date.day() && self.month == date.month() && self.year == date.year()
    }
}

/// Human readable Russian date, e.g. `4 июня 2024`.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.day(),
        MONTH_NAMES[date.month0() as usize],
        date.year()
    )
}

/// Parses `H:MM` or `HH:MM`.
#[must_use]
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let (hour, minute) = raw.trim().split_once(':')?;

    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return None;
    }

    if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
}

#[cfg(feature = "serde")]
mod hh_mm {
    use chrono::{NaiveTime, Timelike};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted_time = format!("{:02}:{:02}", time.hour(), time.minute());
        serializer.serialize_str(&formatted_time)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw)
            .ok_or_else(|| de::Error::custom(format!("expected HH:MM, got `{raw}`")))
    }
}
