use std::sync::Arc;

use async_trait::async_trait;
use eios_parser::{callback_fields, hidden_fields, plan_id};
use reqwest::cookie::Jar;
use reqwest::header::REFERER;
use reqwest::{Client, Response};
use tracing::{debug, info};

use super::{Conversation, Credentials, Directive, FormState, Portal, PortalConfig, Reply, USER_AGENT};
use crate::cache::Cache;
use crate::{Error, Result};

const VIEW_STATE: &str = "__VIEWSTATE";

/// Cookies the portal expects from a browser that has visited it before.
const PORTAL_COOKIES: [&str; 2] = [
    "WSS_FullScreenMode=false",
    "PHPSESSID=1qm42fdkq88k0eqkqnmq7vomrj",
];

/// Opens real HTTP conversations with the portal.
#[derive(Debug, Clone, Default)]
pub struct HttpPortal {
    config: PortalConfig,
}

impl HttpPortal {
    #[must_use]
    pub fn new(config: PortalConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Portal for HttpPortal {
    async fn open(&self, credentials: &Credentials) -> Result<Box<dyn Conversation>> {
        Ok(Box::new(PortalSession::open(&self.config, credentials).await?))
    }
}

/// One authenticated visit of the schedule page.
pub struct PortalSession {
    client: Client,
    url: String,
    account: String,
    secret: String,
    utc_offset_secs: i32,
    initial: FormState,
}

impl PortalSession {
    pub async fn open(config: &PortalConfig, credentials: &Credentials) -> Result<Self> {
        let url = config.schedule_url(&credentials.plan_id);
        let jar = Arc::new(Jar::default());
        let client = build_client(config, Arc::clone(&jar))?;

        debug!(account = %credentials.account, "fetching schedule page");
        let response = client
            .get(&url)
            .basic_auth(&credentials.account, Some(&credentials.secret))
            .send()
            .await
            .and_then(Response::error_for_status)?;

        let page_url = response.url().clone();
        let html = response.text().await?;

        for cookie in PORTAL_COOKIES {
            jar.add_cookie_str(cookie, &page_url);
        }

        let fields = hidden_fields(&html);
        if fields.get(VIEW_STATE).map_or(true, String::is_empty) {
            return Err(Error::StateExtraction(VIEW_STATE));
        }

        info!(account = %credentials.account, fields = fields.len(), "portal session opened");

        Ok(Self {
            client,
            url,
            account: credentials.account.clone(),
            secret: credentials.secret.clone(),
            utc_offset_secs: config.utc_offset_secs,
            initial: FormState::new(fields),
        })
    }
}

#[async_trait]
impl Conversation for PortalSession {
    fn initial_state(&self) -> &FormState {
        &self.initial
    }

    async fn send(&self, state: &FormState, directive: &Directive) -> Result<Reply> {
        let form = state.for_directive(directive, self.utc_offset_secs);

        let body = self
            .client
            .post(&self.url)
            .basic_auth(&self.account, Some(&self.secret))
            .header(REFERER, &self.url)
            .header("X-Requested-With", "XMLHttpRequest")
            .form(form.fields())
            .send()
            .await
            .and_then(Response::error_for_status)?
            .text()
            .await?;

        let refreshed = callback_fields(&body);
        info!(
            account = %self.account,
            directive = directive.name(),
            bytes = body.len(),
            refreshed = refreshed.len(),
            "directive answered"
        );

        Ok(Reply {
            state: state.merged(refreshed),
            body,
        })
    }
}

/// Looks up the study plan id behind the profile page's schedule link.
pub async fn discover_plan_id(config: &PortalConfig, account: &str, secret: &str) -> Result<String> {
    let client = build_client(config, Arc::new(Jar::default()))?;

    let html = client
        .get(config.profile_url())
        .basic_auth(account, Some(secret))
        .send()
        .await
        .and_then(Response::error_for_status)?
        .text()
        .await?;

    let plan = plan_id(&html).ok_or(Error::PlanNotFound)?;
    info!(account, plan = %plan, "discovered study plan");
    Ok(plan)
}

/// Plan ids found on profile pages, remembered per account.
pub struct PlanDirectory {
    config: PortalConfig,
    known: Arc<Cache<String, String>>,
}

impl PlanDirectory {
    #[must_use]
    pub fn new(config: PortalConfig, known: Arc<Cache<String, String>>) -> Self {
        Self { config, known }
    }

    /// The account's plan id, read from its profile page on first use.
    pub async fn plan_id(&self, account: &str, secret: &str) -> Result<String> {
        let plan = self
            .known
            .get_or_fetch(account.to_string(), false, || {
                discover_plan_id(&self.config, account, secret)
            })
            .await?;

        Ok(plan.as_ref().clone())
    }

    pub async fn forget(&self, account: &str) -> usize {
        self.known.invalidate_where(|known| known == account).await
    }
}

fn build_client(config: &PortalConfig, jar: Arc<Jar>) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout)
        .cookie_provider(jar)
        .build()?)
}
