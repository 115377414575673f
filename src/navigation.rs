//! Moving the scheduler widget to the day or week a query asks for.

use chrono::{Days, NaiveDate};
use eios_parser::{has_empty_marker, parse_events, visible_day, visible_days, Event, ViewKind};
use tracing::{debug, warn};

use crate::portal::{Conversation, Directive, Reply};
use crate::Result;

/// How to get from the day the widget shows to the day a query wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    StepForward,
    JumpTo(NaiveDate),
}

impl Navigation {
    /// An unknown `displayed` day always means a jump.
    #[must_use]
    pub fn plan(displayed: Option<NaiveDate>, target: NaiveDate) -> Self {
        match displayed {
            Some(displayed) if displayed == target => Self::Stay,
            Some(displayed) if displayed.checked_add_days(Days::new(1)) == Some(target) => {
                Self::StepForward
            }
            _ => Self::JumpTo(target),
        }
    }

    #[must_use]
    pub fn directive(self) -> Option<Directive> {
        match self {
            Self::Stay => None,
            Self::StepForward => Some(Directive::StepForward),
            Self::JumpTo(date) => Some(Directive::JumpToDate(date, ViewKind::Day)),
        }
    }
}

/// Events of a week view together with the days the widget reported showing.
#[derive(Debug, Clone, Default)]
pub struct WeekFetch {
    pub events: Vec<Event>,
    pub visible_days: Vec<NaiveDate>,
}

/// Day view of `target`, falling back to a filtered week view when the day
/// view comes back explicitly empty.
pub async fn fetch_day(conversation: &dyn Conversation, target: NaiveDate) -> Result<Vec<Event>> {
    let switched = conversation
        .send(conversation.initial_state(), &Directive::SetView(ViewKind::Day))
        .await?;

    let navigation = Navigation::plan(visible_day(&switched.body), target);
    debug!(?navigation, %target, "planned day navigation");

    let reply = match navigation.directive() {
        Some(directive) => conversation.send(&switched.state, &directive).await?,
        None => switched,
    };

    match visible_day(&reply.body) {
        Some(shown) if shown != target => {
            warn!(%target, %shown, "widget shows another day than requested");
        }
        None => warn!(%target, "day view reported no visible day"),
        _ => {}
    }

    let events = parse_events(&reply.body, ViewKind::Day);
    if !events.is_empty() || !has_empty_marker(&reply.body) {
        return Ok(events);
    }

    warn!(%target, "day view came back empty, reading the week view instead");
    week_fallback(conversation, &reply, target).await
}

async fn week_fallback(
    conversation: &dyn Conversation,
    previous: &Reply,
    target: NaiveDate,
) -> Result<Vec<Event>> {
    let reply = conversation
        .send(&previous.state, &Directive::JumpToDate(target, ViewKind::Week))
        .await?;

    Ok(parse_events(&reply.body, ViewKind::Week)
        .into_iter()
        .filter(|event| event.is_on(target))
        .collect())
}

/// Week view of the week containing `start`.
pub async fn fetch_week(conversation: &dyn Conversation, start: NaiveDate) -> Result<WeekFetch> {
    let reply = conversation
        .send(
            conversation.initial_state(),
            &Directive::JumpToDate(start, ViewKind::Week),
        )
        .await?;

    Ok(WeekFetch {
        events: parse_events(&reply.body, ViewKind::Week),
        visible_days: visible_days(&reply.body),
    })
}

/// Timeline view, restricted to the events of `date`.
pub async fn fetch_timeline(conversation: &dyn Conversation, date: NaiveDate) -> Result<Vec<Event>> {
    let reply = conversation
        .send(
            conversation.initial_state(),
            &Directive::SetView(ViewKind::Timeline),
        )
        .await?;

    Ok(parse_events(&reply.body, ViewKind::Timeline)
        .into_iter()
        .filter(|event| event.is_on(date))
        .collect())
}
