use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveTime};
use eios_parser::ViewKind;

/// Control the postbacks are addressed to.
pub const CALLBACK_ID: &str = "ctl00$PlaceHolderMain$_scheduler_ASPxScheduler";

const CALLBACK_ID_FIELD: &str = "__CALLBACKID";
const CALLBACK_PARAM_FIELD: &str = "__CALLBACKPARAM";

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// A navigation command understood by the scheduler widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    SetView(ViewKind),
    JumpToDate(NaiveDate, ViewKind),
    StepForward,
}

impl Directive {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetView(_) => "SAVT",
            Self::JumpToDate(_, ViewKind::Day) => "MOREBTN",
            Self::JumpToDate(..) => "GOTODATEFORM",
            Self::StepForward => "FORWARD",
        }
    }

    /// The `__CALLBACKPARAM` value, with day boundaries taken in the portal's
    /// local time (`utc_offset_secs` east of UTC).
    #[must_use]
    pub fn callback_param(&self, utc_offset_secs: i32) -> String {
        match *self {
            Self::SetView(kind) => format!("c0:SAVT|{kind}"),
            Self::StepForward => "c0:FORWARD|".to_string(),
            Self::JumpToDate(date, ViewKind::Day) => {
                let start = local_midnight_ms(date, utc_offset_secs);
                format!("c0:MOREBTN|{},{start},{DAY_MS},null", start + DAY_MS)
            }
            Self::JumpToDate(date, kind) => format!(
                r#"c0:GOTODATEFORM|{{"newDate":new Date({},{},{}),"newViewType":"{kind}"}}"#,
                date.year(),
                date.month0(),
                date.day()
            ),
        }
    }
}

fn local_midnight_ms(date: NaiveDate, utc_offset_secs: i32) -> i64 {
    let midnight = date.and_time(NaiveTime::default()).and_utc();
    midnight.timestamp_millis() - i64::from(utc_offset_secs) * 1000
}

/// The hidden-field map threaded through a conversation.
///
/// Updates never touch the receiver: each step derives a new state.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FormState {
    fields: BTreeMap<String, String>,
}

impl FormState {
    #[must_use]
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    #[must_use]
    pub fn with<K: Into<String>, V: Into<String>>(&self, name: K, value: V) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(name.into(), value.into());
        Self { fields }
    }

    /// A copy with `updates` overwriting fields of the same name.
    #[must_use]
    pub fn merged<I>(&self, updates: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut fields = self.fields.clone();
        fields.extend(updates);
        Self { fields }
    }

    /// The form body posted for `directive`.
    #[must_use]
    pub fn for_directive(&self, directive: &Directive, utc_offset_secs: i32) -> Self {
        self.with(CALLBACK_ID_FIELD, CALLBACK_ID).with(
            CALLBACK_PARAM_FIELD,
            directive.callback_param(utc_offset_secs),
        )
    }
}

impl fmt::Debug for FormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // values include the opaque view state; keep it out of logs
        f.debug_set().entries(self.fields.keys()).finish()
    }
}

/// Raw body of a postback and the state to carry into the next one.
#[derive(Debug, Clone)]
pub struct Reply {
    pub body: String,
    pub state: FormState,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSK: i32 = 3 * 60 * 60;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn view_switches() {
        assert_eq!(
            Directive::SetView(ViewKind::Timeline).callback_param(MSK),
            "c0:SAVT|Timeline"
        );
        assert_eq!(Directive::SetView(ViewKind::Day).callback_param(MSK), "c0:SAVT|Day");
        assert_eq!(Directive::SetView(ViewKind::Week).callback_param(MSK), "c0:SAVT|Week");
        assert_eq!(Directive::StepForward.callback_param(MSK), "c0:FORWARD|");
    }

    #[test]
    fn day_jump_uses_local_midnight_timestamps() {
        assert_eq!(
            Directive::JumpToDate(date(2024, 6, 4), ViewKind::Day).callback_param(MSK),
            "c0:MOREBTN|1717534800000,1717448400000,86400000,null"
        );
    }

    #[test]
    fn week_jump_uses_zero_based_month() {
        assert_eq!(
            Directive::JumpToDate(date(2024, 1, 15), ViewKind::Week).callback_param(MSK),
            r#"c0:GOTODATEFORM|{"newDate":new Date(2024,0,15),"newViewType":"Week"}"#
        );
    }

    #[test]
    fn state_updates_are_functional() {
        let initial = FormState::new(BTreeMap::from([
            ("__VIEWSTATE".to_string(), "old".to_string()),
            ("__EVENTTARGET".to_string(), String::new()),
        ]));

        let next = initial.merged([("__VIEWSTATE".to_string(), "new".to_string())]);
        assert_eq!(initial.get("__VIEWSTATE"), Some("old"));
        assert_eq!(next.get("__VIEWSTATE"), Some("new"));
        assert_eq!(next.len(), 2);

        let form = next.for_directive(&Directive::StepForward, MSK);
        assert_eq!(form.get("__CALLBACKID"), Some(CALLBACK_ID));
        assert_eq!(form.get("__CALLBACKPARAM"), Some("c0:FORWARD|"));
        assert_eq!(next.get("__CALLBACKPARAM"), None);
    }

    #[test]
    fn debug_hides_values() {
        let state = FormState::new(BTreeMap::from([(
            "__VIEWSTATE".to_string(),
            "secret-token".to_string(),
        )]));
        assert!(!format!("{state:?}").contains("secret-token"));
    }
}
