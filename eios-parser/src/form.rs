use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

macro_rules! selector {
    ($query:expr) => {{
        static SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse($query).unwrap());
        &SELECTOR
    }};
}

/// Every `<input type="hidden">` of the page as `name → value`.
#[must_use]
pub fn hidden_fields<S: AsRef<str>>(html: S) -> BTreeMap<String, String> {
    let html = Html::parse_document(html.as_ref());

    html.select(selector!("input[name]"))
        .filter(|input| {
            input
                .value()
                .attr("type")
                .is_some_and(|kind| kind.eq_ignore_ascii_case("hidden"))
        })
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// The `base_plan_ids` value behind the profile page's schedule link.
#[must_use]
pub fn plan_id<S: AsRef<str>>(html: S) -> Option<String> {
    let html = Html::parse_document(html.as_ref());

    html.select(selector!("a[href]"))
        .filter(|anchor| {
            anchor
                .text()
                .collect::<String>()
                .to_lowercase()
                .contains("расписание")
        })
        .find_map(|anchor| {
            let href = anchor.value().attr("href")?;
            regex!(r"base_plan_ids=(\d+)")
                .captures(href)
                .map(|captures| captures[1].to_string())
        })
}
