//! The four schedule queries, answered from the cache or the portal.

use std::collections::BTreeMap;
use std::iter;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use eios_parser::{Event, ViewKind};
use tracing::debug;

use crate::cache::Cache;
use crate::navigation::{fetch_day, fetch_timeline, fetch_week};
use crate::portal::{Credentials, Portal};
use crate::recurrence::{expand, find_occurrence, merge};
use crate::store::RuleStore;
use crate::{Error, Result};

/// Events of a week view, keyed by every day the portal reported as part of it.
pub type WeekSchedule = BTreeMap<NaiveDate, Vec<Event>>;

/// Identifies one cached answer. Never carries the account's secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectKey {
    pub account: String,
    pub view: ViewKind,
    pub date: NaiveDate,
}

impl SubjectKey {
    fn new(account: &str, view: ViewKind, date: NaiveDate) -> Self {
        Self {
            account: account.to_string(),
            view,
            date,
        }
    }
}

/// What the portal returned for a subject, before custom events are added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Events(Vec<Event>),
    Week(WeekSchedule),
}

impl Payload {
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        match self {
            Self::Events(events) => events.clone(),
            Self::Week(week) => week.values().flatten().cloned().collect(),
        }
    }

    #[must_use]
    pub fn week(&self) -> WeekSchedule {
        match self {
            Self::Week(week) => week.clone(),
            Self::Events(events) => group_by_date(events.iter().cloned(), iter::empty()),
        }
    }
}

fn group_by_date<I, D>(events: I, days: D) -> WeekSchedule
where
    I: IntoIterator<Item = Event>,
    D: IntoIterator<Item = NaiveDate>,
{
    let mut week = days
        .into_iter()
        .map(|day| (day, Vec::new()))
        .collect::<WeekSchedule>();

    for event in events {
        if let Some(date) = event.date() {
            week.entry(date).or_default().push(event);
        }
    }

    week
}

pub struct ScheduleService {
    portal: Arc<dyn Portal>,
    rules: Arc<dyn RuleStore>,
    cache: Arc<Cache<SubjectKey, Payload>>,
}

impl ScheduleService {
    pub fn new(
        portal: Arc<dyn Portal>,
        rules: Arc<dyn RuleStore>,
        cache: Arc<Cache<SubjectKey, Payload>>,
    ) -> Self {
        Self {
            portal,
            rules,
            cache,
        }
    }

    /// Portal events of `date` as the timeline view lists them.
    pub async fn day(
        &self,
        credentials: &Credentials,
        date: NaiveDate,
        force_refresh: bool,
    ) -> Result<Vec<Event>> {
        let key = SubjectKey::new(&credentials.account, ViewKind::Timeline, date);

        let payload = self
            .cache
            .get_or_fetch(key, force_refresh, move || async move {
                let conversation = self.portal.open(credentials).await?;
                Ok::<_, Error>(Payload::Events(
                    fetch_timeline(&*conversation, date).await?,
                ))
            })
            .await?;

        Ok(payload.events())
    }

    /// The week view containing `start`, with custom events added to each of
    /// its days.
    pub async fn week(
        &self,
        credentials: &Credentials,
        start: NaiveDate,
        force_refresh: bool,
    ) -> Result<WeekSchedule> {
        let key = SubjectKey::new(&credentials.account, ViewKind::Week, start);

        let payload = self
            .cache
            .get_or_fetch(key, force_refresh, move || async move {
                let conversation = self.portal.open(credentials).await?;
                let fetched = fetch_week(&*conversation, start).await?;
                Ok::<_, Error>(Payload::Week(group_by_date(
                    fetched.events,
                    fetched.visible_days,
                )))
            })
            .await?;

        let custom_events = self.rules.custom_events(&credentials.account).await?;
        let week = payload.week();
        let mut custom = expand(&custom_events, week.keys().copied());
        debug!(
            account = %credentials.account,
            %start,
            custom_days = custom.len(),
            "merging custom events into week"
        );

        Ok(week
            .into_iter()
            .map(|(date, events)| {
                let extra = custom.remove(&date).unwrap_or_default();
                (date, merge(events, extra))
            })
            .collect())
    }

    /// Day view of `date`, with full details, plus that day's custom events.
    pub async fn day_detail(
        &self,
        credentials: &Credentials,
        date: NaiveDate,
        force_refresh: bool,
    ) -> Result<Vec<Event>> {
        let key = SubjectKey::new(&credentials.account, ViewKind::Day, date);

        let payload = self
            .cache
            .get_or_fetch(key, force_refresh, move || async move {
                let conversation = self.portal.open(credentials).await?;
                Ok::<_, Error>(Payload::Events(fetch_day(&*conversation, date).await?))
            })
            .await?;

        let custom_events = self.rules.custom_events(&credentials.account).await?;
        let custom = expand(&custom_events, [date])
            .remove(&date)
            .unwrap_or_default();

        Ok(merge(payload.events(), custom))
    }

    /// The event of `date` starting exactly at `start`. Custom events win
    /// over portal events at the same time.
    pub async fn event_detail(
        &self,
        credentials: &Credentials,
        date: NaiveDate,
        start: NaiveTime,
        force_refresh: bool,
    ) -> Result<Event> {
        let custom_events = self.rules.custom_events(&credentials.account).await?;
        if let Some(event) = find_occurrence(&custom_events, date, start) {
            return Ok(event);
        }

        self.day_detail(credentials, date, force_refresh)
            .await?
            .into_iter()
            .find(|event| event.start_time == start)
            .ok_or(Error::NotFound { date, start })
    }

    /// Forgets everything cached for `account`.
    pub async fn invalidate(&self, account: &str) -> usize {
        let removed = self
            .cache
            .invalidate_where(|key| key.account == account)
            .await;
        debug!(account, removed, "invalidated cached schedules");
        removed
    }

    pub async fn clear(&self) {
        self.cache.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(day: NaiveDate, start: u32) -> Event {
        Event::new(
            "Предмет",
            day,
            NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(start + 1, 0, 0).unwrap(),
        )
    }

    #[test]
    fn week_keeps_reported_days_without_events() {
        let week = group_by_date(
            [event(date(2024, 6, 4), 9)],
            [date(2024, 6, 3), date(2024, 6, 4), date(2024, 6, 5)],
        );

        assert_eq!(week.len(), 3);
        assert!(week[&date(2024, 6, 3)].is_empty());
        assert_eq!(week[&date(2024, 6, 4)].len(), 1);
    }

    #[test]
    fn week_includes_event_days_missing_from_report() {
        let week = group_by_date([event(date(2024, 6, 8), 9)], iter::empty());
        assert_eq!(week.keys().copied().collect::<Vec<_>>(), [date(2024, 6, 8)]);
    }

    #[test]
    fn payload_views_are_total() {
        let events = vec![event(date(2024, 6, 4), 9), event(date(2024, 6, 5), 11)];
        let listed = Payload::Events(events.clone());
        assert_eq!(listed.week().len(), 2);

        let grouped = Payload::Week(group_by_date(events.clone(), iter::empty()));
        assert_eq!(grouped.events(), events);
    }
}
