//! Class schedules scraped from the EIOS portal's scheduler widget, merged
//! with user-defined weekly events and cached per account.

pub mod cache;
mod error;
pub mod navigation;
pub mod portal;
pub mod recurrence;
pub mod service;
pub mod store;

pub use eios_parser::{Event, ViewKind};
pub use error::{Error, Result};
pub use service::{ScheduleService, SubjectKey, WeekSchedule};
