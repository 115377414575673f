//! Protocol state the scheduler reports alongside its rendering.

use chrono::NaiveDate;

const EMPTY_MARKERS: [&str; 2] = [
    "CreateAppointmentsViewInfos([])",
    "CreateAppointments([])",
];

/// Days the widget says it is currently showing, in the order reported.
///
/// The value is written as `D/M/YYYY`; several days are comma-separated.
#[must_use]
pub fn visible_days(body: &str) -> Vec<NaiveDate> {
    let Some(captures) = regex!(r"\\?'visibleDays\\?'\s*:\s*\\?'([^'\\]*)\\?'").captures(body) else {
        return Vec::new();
    };

    captures[1]
        .split([',', ';', ' '])
        .filter_map(|raw| {
            let mut parts = raw.trim().split('/');
            let day = parts.next()?.parse().ok()?;
            let month = parts.next()?.parse().ok()?;
            let year = parts.next()?.parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
        .collect()
}

#[must_use]
pub fn visible_day(body: &str) -> Option<NaiveDate> {
    visible_days(body).into_iter().next()
}

/// True when the widget explicitly rendered an empty appointment list.
#[must_use]
pub fn has_empty_marker(body: &str) -> bool {
    EMPTY_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Hidden fields (`'__NAME':'value'`) a callback response hands back for the next postback.
#[must_use]
pub fn callback_fields(body: &str) -> Vec<(String, String)> {
    regex!(r"'(__[A-Z]+)'\s*:\s*'([^']*)'")
        .captures_iter(body)
        .map(|captures| (captures[1].to_string(), captures[2].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_single_visible_day() {
        let body = "...,'visibleDays':'4/6/2024','x':1";
        assert_eq!(visible_day(body), NaiveDate::from_ymd_opt(2024, 6, 4));
    }

    #[test]
    fn reads_escaped_week_of_visible_days() {
        let body = r"\'visibleDays\':\'3/6/2024,4/6/2024,5/6/2024\'";
        let days = visible_days(body);
        assert_eq!(days.len(), 3);
        assert_eq!(days[2], NaiveDate::from_ymd_opt(2024, 6, 5).unwrap());
    }

    #[test]
    fn missing_visible_days() {
        assert!(visible_days("nothing here").is_empty());
        assert_eq!(visible_day("'visibleDays':'garbage'"), None);
    }

    #[test]
    fn detects_empty_markers() {
        assert!(has_empty_marker("a;CreateAppointmentsViewInfos([]);b"));
        assert!(has_empty_marker("CreateAppointments([])"));
        assert!(!has_empty_marker("CreateAppointmentsViewInfos([['1_0']])"));
    }

    #[test]
    fn collects_refreshed_state() {
        let body = "{'__VIEWSTATE':'abc/+=','__EVENTVALIDATION':'xyz','other':'no'}";
        assert_eq!(
            callback_fields(body),
            vec![
                ("__VIEWSTATE".to_string(), "abc/+=".to_string()),
                ("__EVENTVALIDATION".to_string(), "xyz".to_string()),
            ]
        );
    }
}
