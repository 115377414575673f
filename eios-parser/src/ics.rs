use ics::{
    properties::{Categories, Description, DtEnd, DtStart, Location, Summary, TzName},
    ICalendar, Standard, TimeZone,
};

use crate::Event;

/// Renders events into one calendar named `name`, in Moscow time.
#[must_use]
pub fn to_ics<'a, I>(name: &'a str, events: I) -> ICalendar<'a>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut msk_standard = Standard::new("19700101T000000", "+0300", "+0300");
    msk_standard.push(TzName::new("MSK"));

    let mut icalendar = ICalendar::new("2.0", name);
    icalendar.add_timezone(TimeZone::standard("Europe/Moscow", msk_standard));

    for event in events {
        icalendar.add_event(event.to_ics());
    }

    icalendar
}

impl Event {
    #[must_use]
    pub fn to_ics(&self) -> ics::Event<'_> {
        let date = format!("{:04}{:02}{:02}", self.year, self.month, self.day);
        let start = format!("{date}T{}00", self.start_time.format("%H%M"));
        let end = format!("{date}T{}00", self.end_time.format("%H%M"));

        let id = format!("{}_{}", start, self.course_name.replace(' ', "-"));

        let mut ics_event = ics::Event::new(id, start.clone());

        ics_event.push(DtStart::new(start));
        ics_event.push(DtEnd::new(end));
        ics_event.push(Summary::new(self.course_name.as_str()));

        if !self.event_type.is_empty() {
            ics_event.push(Categories::new(self.event_type.as_str()));
        }

        let location = [self.room.as_str(), self.address.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        if !location.is_empty() {
            ics_event.push(Location::new(location));
        }

        let description = [
            self.teacher.as_str(),
            self.group.as_str(),
            self.meeting_link.as_str(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("; ");

        if !description.is_empty() {
            ics_event.push(Description::new(description));
        }

        ics_event
    }
}
