use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::details::{parse_details, split_meeting_link, split_week_title, teacher};
use crate::error::RecordError;
use crate::reader::{unescape_layer, Reader, Value};
use crate::structs::{parse_time, Event};
use crate::ViewKind;

const APPOINTMENTS_CALL: &str = "CreateAppointmentsViewInfos(";

/// Parses every appointment of a scheduler response.
///
/// Records that cannot be read are logged and skipped, so the result holds
/// whatever did parse. A response without the appointment call, or with an
/// empty array, yields no events.
#[must_use]
pub fn parse_events<S: AsRef<str>>(body: S, expected: ViewKind) -> Vec<Event> {
    let Some(records) = read_records(body.as_ref()) else {
        debug!(view = %expected, "response carries no appointment call");
        return Vec::new();
    };

    let total = records.len();
    let events = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            match record.and_then(|record| parse_record(&record, expected)) {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!(view = %expected, index, error = %err, "skipping appointment record");
                    None
                }
            }
        })
        .collect::<Vec<_>>();

    debug!(view = %expected, total, parsed = events.len(), "parsed appointments");
    events
}

fn read_records(body: &str) -> Option<Vec<Result<Value, RecordError>>> {
    let mut found = false;

    for (index, _) in body.match_indices(APPOINTMENTS_CALL) {
        found = true;
        let rest = &body[index + APPOINTMENTS_CALL.len()..];

        // a mention that is not the call itself, e.g. `function CreateAppointmentsViewInfos(a)`
        if !rest.trim_start().starts_with('[') {
            continue;
        }

        let source = if is_escaped(rest) {
            unescape_layer(rest)
        } else {
            rest.to_string()
        };

        return match Reader::new(&source).value() {
            Ok(Value::Array(records)) => Some(records.into_iter().map(Ok).collect()),
            Ok(_) => Some(Vec::new()),
            Err(err) => {
                warn!(error = %err, "appointment array is malformed, splitting on record markers");
                let end = source.rfind("])").map_or(source.len(), |index| index + 1);
                Some(split_on_markers(&source[..end]))
            }
        };
    }

    if found {
        warn!("appointment call argument is not an array");
        return Some(Vec::new());
    }
    None
}

/// The payload is escaped when its first quote is preceded by a backslash.
fn is_escaped(source: &str) -> bool {
    source
        .find('\'')
        .is_some_and(|index| source[..index].ends_with('\\'))
}

/// Cuts the text at every `['<n>_<n>'` record opening and reads each piece on
/// its own, so one broken record cannot swallow its neighbours.
fn split_on_markers(source: &str) -> Vec<Result<Value, RecordError>> {
    let starts = regex!(r"\[\s*'\d+_\d+'")
        .find_iter(source)
        .map(|marker| marker.start())
        .collect::<Vec<_>>();

    starts
        .iter()
        .enumerate()
        .map(|(index, &start)| {
            let end = starts.get(index + 1).copied().unwrap_or(source.len());
            Reader::new(&source[start..end])
                .value()
                .map_err(RecordError::from)
        })
        .collect()
}

fn parse_record(record: &Value, expected: ViewKind) -> Result<Event, RecordError> {
    let fields = record.as_array().ok_or(RecordError::NotAnArray)?;

    fields
        .first()
        .and_then(Value::as_str)
        .filter(|id| regex!(r"^\d+_\d+$").is_match(id))
        .ok_or(RecordError::MissingId)?;

    let discriminator = fields
        .get(1)
        .and_then(Value::as_int)
        .ok_or(RecordError::MissingField("view discriminator"))?;

    let kind = ViewKind::from_discriminator(discriminator)
        .ok_or(RecordError::UnknownKind(discriminator))?;

    if kind != expected {
        debug!(expected = %expected, actual = %kind, "record discriminator overrides view");
    }

    let info = fields
        .get(2)
        .and_then(Value::as_array)
        .ok_or(RecordError::MissingField("subject"))?;

    let text = |index: usize, name: &'static str| {
        info.get(index)
            .and_then(Value::as_str)
            .ok_or(RecordError::MissingField(name))
    };

    let title = text(0, "title")?;
    let start_raw = text(1, "start time")?;
    let end_raw = text(2, "end time")?;

    let start = parse_time(start_raw).ok_or_else(|| RecordError::MalformedTime(start_raw.into()))?;
    let end = parse_time(end_raw).ok_or_else(|| RecordError::MalformedTime(end_raw.into()))?;

    if start >= end {
        return Err(RecordError::InvertedRange {
            start: start_raw.into(),
            end: end_raw.into(),
        });
    }

    let date = record_date(&fields[3..])?;
    let mut event = Event::new(title.trim(), date, start, end);

    match kind {
        ViewKind::Timeline => {}
        ViewKind::Day => fill_day(&mut event, title),
        ViewKind::Week => fill_week(&mut event, title)?,
    }

    Ok(event)
}

/// First `new Date(y, m0, d)` found at the head of a trailing array.
fn record_date(rest: &[Value]) -> Result<NaiveDate, RecordError> {
    let parts = rest
        .iter()
        .filter_map(Value::as_array)
        .find_map(|items| match items.first() {
            Some(Value::Date(parts)) if parts.len() >= 3 => Some(parts),
            _ => None,
        })
        .ok_or(RecordError::MissingField("date"))?;

    let (year, month0, day) = (parts[0], parts[1], parts[2]);

    i32::try_from(year)
        .ok()
        .zip(month0.checked_add(1).and_then(|month| u32::try_from(month).ok()))
        .zip(u32::try_from(day).ok())
        .and_then(|((year, month), day)| NaiveDate::from_ymd_opt(year, month, day))
        .ok_or(RecordError::InvalidDate(year, month0, day))
}

/// Day records are `title \r\n -details \r\n (пр: teacher) \r\n groups [link]`.
fn fill_day(event: &mut Event, title: &str) {
    let parts = title.lines().map(str::trim).collect::<Vec<_>>();

    if let Some(course) = parts.first() {
        event.course_name = (*course).to_string();
    }

    if let Some(details) = parts.get(1) {
        let details = parse_details(details);
        event.event_type = details.event_type;
        event.room = details.room;
        event.address = details.address;
    }

    if let Some(name) = parts.get(2).and_then(|line| teacher(line)) {
        event.teacher = name;
    }

    if let Some(groups) = parts.get(3) {
        let (group, link) = split_meeting_link(groups);
        event.group = group;
        event.meeting_link = link;
    }
}

/// Week records are `course-type ауд.room (address)` on one line.
fn fill_week(event: &mut Event, title: &str) -> Result<(), RecordError> {
    let (course, rest) =
        split_week_title(title).ok_or_else(|| RecordError::MissingSeparator(title.into()))?;

    let details = parse_details(rest);
    event.course_name = course.to_string();
    event.event_type = details.event_type;
    event.room = details.room;
    event.address = details.address;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn wrap(array: &str) -> String {
        format!("0|'result':'<script>ASPx.{APPOINTMENTS_CALL}{array});</script>'")
    }

    #[test]
    fn parses_escaped_day_view() {
        let body = wrap(concat!(
            r"[[\'101_0\',2,[\'Практическая грамматика\\r\\n- Практическое занятие ауд.626 (Комсомольский пр-кт, д.6)",
            r"\\r\\n(пр: Петрова Е.В.)\\r\\nБ-1-21 https://linguanet.mts-link.ru/j/555/777\',\'9:00\',\'10:20\',null],",
            r"[new Date(2024,5,4),new Date(2024,5,4)]]]",
        ));

        let events = parse_events(&body, ViewKind::Day);
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.course_name, "Практическая грамматика");
        assert_eq!(event.event_type, "ПРАКТ. ЗАНЯТИЕ");
        assert_eq!(event.room, "626");
        assert_eq!(event.address, "Комсомольский пр-кт, д.6");
        assert_eq!(event.teacher, "Петрова Е.В.");
        assert_eq!(event.group, "Б-1-21");
        assert_eq!(event.meeting_link, "https://linguanet.mts-link.ru/j/555/777");
        assert_eq!(event.start_time, time(9, 0));
        assert_eq!(event.end_time, time(10, 20));
        assert_eq!((event.day, event.month, event.year), (4, 6, 2024));
        assert_eq!(event.start_date, "4 июня 2024");
    }

    #[test]
    fn parses_plain_week_view() {
        let body = format!(
            "{APPOINTMENTS_CALL}[['7_1',0,['Англо-американская литература-Лекция ауд.1 (Остоженка, д.38)','10:50','12:10'],[new Date(2024,11,31)]],\
             ['8_1',0,['История-Семинар Дистанционное занятие','13:00','14:20'],[new Date(2025,0,1)]]])"
        );

        let events = parse_events(&body, ViewKind::Week);
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].course_name, "Англо-американская литература");
        assert_eq!(events[0].event_type, "ЛЕКЦИЯ");
        assert_eq!(events[0].room, "1");
        assert_eq!(events[0].address, "Остоженка, д.38");
        assert_eq!((events[0].day, events[0].month, events[0].year), (31, 12, 2024));

        assert_eq!(events[1].event_type, "СЕМИНАР");
        assert_eq!(events[1].address, "Онлайн");
        assert_eq!((events[1].day, events[1].month, events[1].year), (1, 1, 2025));
    }

    #[test]
    fn timeline_keeps_bare_title() {
        let body = format!(
            "{APPOINTMENTS_CALL}[['3_0',1,['Фонетика','8:00','9:20'],[new Date(2024,8,2)]]])"
        );

        let events = parse_events(&body, ViewKind::Timeline);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].course_name, "Фонетика");
        assert_eq!(events[0].start_time, time(8, 0));
        assert!(events[0].teacher.is_empty());
        assert!(events[0].event_type.is_empty());
    }

    #[test]
    fn discriminator_overrides_expected_view() {
        let body = format!(
            "{APPOINTMENTS_CALL}[['3_0',0,['Фонетика-Лекция ауд.5 (Остоженка)','8:00','9:20'],[new Date(2024,8,2)]]])"
        );

        let events = parse_events(&body, ViewKind::Day);
        assert_eq!(events[0].course_name, "Фонетика");
        assert_eq!(events[0].room, "5");
    }

    #[test]
    fn empty_array_is_no_classes() {
        assert!(parse_events(format!("{APPOINTMENTS_CALL}[])"), ViewKind::Day).is_empty());
        assert!(parse_events(wrap("[]"), ViewKind::Week).is_empty());
        assert!(parse_events("<html>no scheduler</html>", ViewKind::Week).is_empty());
    }

    #[test]
    fn skips_one_bad_record_among_good_ones() {
        let body = format!(
            "{APPOINTMENTS_CALL}[\
             ['1_0',1,['A','8:00','9:20'],[new Date(2024,8,2)]],\
             ['2_0',1,['B','9:30','bad'],[new Date(2024,8,2)]],\
             ['3_0',1,['C','10:50','12:10'],[new Date(2024,8,2)]],\
             ['4_0',1,['D','12:40','14:00'],[new Date(2024,9223372036854775807,2)]]])"
        );

        let events = parse_events(&body, ViewKind::Timeline);
        let titles = events.iter().map(|e| e.course_name.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, ["A", "C"]);
    }

    #[test]
    fn skips_mentions_before_the_call() {
        let body = format!(
            "function {APPOINTMENTS_CALL}infos) {{ return infos; }}\
             {APPOINTMENTS_CALL}[['1_0',1,['A','8:00','9:20'],[new Date(2024,8,2)]]])"
        );

        let events = parse_events(&body, ViewKind::Timeline);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].course_name, "A");
    }

    #[test]
    fn recovers_from_unbalanced_record() {
        let body = format!(
            "{APPOINTMENTS_CALL}[\
             ['1_0',1,['A','8:00','9:20'],[new Date(2024,8,2)]],\
             ['2_0',1,['B','9:30','10:40'],[new Date(2024,8,2)],\
             ['3_0',1,['C','10:50','12:10'],[new Date(2024,8,2)]],\
             ['4_0',1,['D','12:40','14:00'],[new Date(2024,8,2)]]])"
        );

        let events = parse_events(&body, ViewKind::Timeline);
        let titles = events.iter().map(|e| e.course_name.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, ["A", "C", "D"]);
    }

    #[test]
    fn brackets_in_titles_do_not_split_records() {
        let body = format!(
            "{APPOINTMENTS_CALL}[['1_0',1,['Seminar [A], part 2_3','8:00','9:20'],[new Date(2024,8,2)]]])"
        );

        let events = parse_events(&body, ViewKind::Timeline);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].course_name, "Seminar [A], part 2_3");
    }

    #[test]
    fn inverted_range_is_skipped() {
        let body = format!(
            "{APPOINTMENTS_CALL}[['1_0',1,['A','10:00','9:00'],[new Date(2024,8,2)]]])"
        );

        assert!(parse_events(&body, ViewKind::Timeline).is_empty());
    }
}
