//! Free-text fields packed into an appointment's subject line.

const ONLINE_ADDRESS: &str = "Онлайн";

const KEYWORDS: &str = "лекция|практическое занятие|семинар|лабораторная работа|консультация";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Details {
    pub event_type: String,
    pub room: String,
    pub address: String,
}

/// Collapses the portal's event categories into short upper-case labels.
#[must_use]
pub fn normalize_event_type(raw: &str) -> String {
    let lower = raw.to_lowercase();

    let label = if lower.contains("лекц") {
        "ЛЕКЦИЯ"
    } else if lower.contains("практ") {
        "ПРАКТ. ЗАНЯТИЕ"
    } else if lower.contains("семинар") {
        "СЕМИНАР"
    } else if lower.contains("лаб") {
        "ЛАБ. РАБОТА"
    } else if lower.contains("консультац") {
        "КОНСУЛЬТАЦИЯ"
    } else {
        return raw.trim().to_uppercase();
    };

    label.to_string()
}

/// Reads `<type> ауд.<room> (<address>)`, or `<type> Дистанционное занятие`.
pub(crate) fn parse_details(text: &str) -> Details {
    let text = text.trim().trim_start_matches('-').trim();
    let mut details = Details::default();

    if let Some(online) = regex!(r"(?i)^(.*?)\s*дистанционн").captures(text) {
        details.address = ONLINE_ADDRESS.to_string();
        let kind = online[1].trim();
        if !kind.is_empty() {
            details.event_type = normalize_event_type(kind);
        }
        return details;
    }

    let rest = match regex!(&format!("(?i){KEYWORDS}")).find(text) {
        Some(keyword) => {
            details.event_type = normalize_event_type(keyword.as_str());
            format!("{}{}", &text[..keyword.start()], &text[keyword.end()..])
        }
        None => text.to_string(),
    };
    let rest = rest.trim();

    if let Some(room) = regex!(r"ауд\.?\s*(\d[\w/-]*)").captures(rest) {
        details.room = room[1].to_string();
    } else if let Some(before) = regex!(r"^([^(]+)\(").captures(rest) {
        details.room = before[1]
            .trim()
            .trim_start_matches("ауд.")
            .trim()
            .to_string();
    }

    if let Some(address) = regex!(r"\(([^)]+)\)").captures(rest) {
        details.address = address[1].trim().to_string();
    }

    details
}

/// Teacher name from a `(пр: NAME)` marker.
pub(crate) fn teacher(text: &str) -> Option<String> {
    regex!(r"\(пр:\s*([^)]+)\)")
        .captures(text)
        .map(|captures| captures[1].trim().to_string())
}

/// Splits the trailing Day-view segment into `(group, meeting link)`.
pub(crate) fn split_meeting_link(text: &str) -> (String, String) {
    let (link, rest) = match regex!(r"https://(?:linguanet|my)\.mts-link\.ru/j/[^\s\\]+").find(text) {
        Some(link) => (
            link.as_str().to_string(),
            format!("{}{}", &text[..link.start()], &text[link.end()..]),
        ),
        None => (String::new(), text.to_string()),
    };

    let group = regex!(r"\s+")
        .replace_all(&rest, " ")
        .trim_matches(|c| c == ',' || c == ' ')
        .to_string();

    (group, link)
}

/// Splits a Week-view subject `<course>-<details>` at the hyphen that opens the
/// detail part, falling back to the first hyphen.
pub(crate) fn split_week_title(title: &str) -> Option<(&str, &str)> {
    let split_at = regex!(&format!(r"(?i)-\s*(?:{KEYWORDS}|[^\s-]*\s*дистанционн)"))
        .find(title)
        .map(|separator| separator.start())
        .or_else(|| title.find('-'))?;

    Some((title[..split_at].trim(), title[split_at + 1..].trim()))
}
