macro_rules! regex {
    ($pattern:expr) => {{
        static REGEX: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pattern).unwrap());
        &REGEX
    }};
}

mod callback;
mod details;
mod error;
mod form;
mod parser;
mod reader;
mod structs;

#[cfg(feature = "ics")]
mod ics;

pub use callback::{callback_fields, has_empty_marker, visible_day, visible_days};
pub use details::normalize_event_type;
pub use error::{RecordError, SyntaxError};
pub use form::{hidden_fields, plan_id};
pub use parser::parse_events;
pub use structs::{format_date, parse_time, Event, ViewKind};

#[cfg(feature = "ics")]
pub use ics::to_ics;
