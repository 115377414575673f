//! The conversation with the EIOS scheduler page.
//!
//! A [`Portal`] opens one short-lived [`Conversation`] per query: a GET of the
//! host page that yields the hidden form state, followed by postbacks that
//! each carry the state returned by the step before.

mod protocol;
mod session;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

pub use protocol::{Directive, FormState, Reply, CALLBACK_ID};
pub use session::{discover_plan_id, HttpPortal, PlanDirectory, PortalSession};

pub const DEFAULT_ORIGIN: &str = "https://eios.linguanet.ru";

const PAGES_PATH: &str = "/_layouts/sinc/ia/v1.0/pages";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Moscow time, in which the widget counts its day boundaries.
const PORTAL_UTC_OFFSET_SECS: i32 = 3 * 60 * 60;

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub origin: String,
    pub timeout: Duration,
    /// Offset of the portal's local time from UTC, in seconds.
    pub utc_offset_secs: i32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            timeout: Duration::from_secs(30),
            utc_offset_secs: PORTAL_UTC_OFFSET_SECS,
        }
    }
}

impl PortalConfig {
    #[must_use]
    pub fn schedule_url(&self, plan_id: &str) -> String {
        format!(
            "{}{PAGES_PATH}/MySchedule.aspx?base_plan_ids={plan_id}",
            self.origin.trim_end_matches('/')
        )
    }

    #[must_use]
    pub fn profile_url(&self) -> String {
        format!(
            "{}{PAGES_PATH}/MyStudentProfile.aspx",
            self.origin.trim_end_matches('/')
        )
    }
}

/// Who the portal is asked about: the account, its password and the
/// portal-side study plan whose schedule is shown.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub account: String,
    pub secret: String,
    pub plan_id: String,
}

impl Credentials {
    pub fn new<A, S, P>(account: A, secret: S, plan_id: P) -> Self
    where
        A: Into<String>,
        S: Into<String>,
        P: Into<String>,
    {
        Self {
            account: account.into(),
            secret: secret.into(),
            plan_id: plan_id.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("secret", &"<redacted>")
            .field("plan_id", &self.plan_id)
            .finish()
    }
}

#[async_trait]
pub trait Portal: Send + Sync {
    /// Fetches the host page and captures its hidden state.
    async fn open(&self, credentials: &Credentials) -> Result<Box<dyn Conversation>>;
}

#[async_trait]
pub trait Conversation: Send + Sync {
    /// Hidden fields of the host page; the first directive starts from here.
    fn initial_state(&self) -> &FormState;

    /// Posts one directive on top of `state`. The reply's state is what the
    /// next directive has to carry.
    async fn send(&self, state: &FormState, directive: &Directive) -> Result<Reply>;
}
