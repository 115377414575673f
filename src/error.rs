use chrono::{NaiveDate, NaiveTime};
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("portal page carries no `{0}` hidden field")]
    StateExtraction(&'static str),

    #[error("portal responded with {status}")]
    Upstream { status: StatusCode },

    #[error("portal did not answer in time")]
    UpstreamTimeout,

    #[error("portal request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("no event on {date} starting at {}", start.format("%H:%M"))]
    NotFound { date: NaiveDate, start: NaiveTime },

    #[error("invalid custom event: {0}")]
    Validation(String),

    #[error("profile page has no schedule link")]
    PlanNotFound,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::UpstreamTimeout;
        }

        match err.status() {
            Some(status) => Self::Upstream { status },
            None => Self::Transport(err),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
