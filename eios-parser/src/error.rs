use thiserror::Error;

/// The embedded array literal could not be read at byte `position`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at byte {position}")]
pub struct SyntaxError {
    pub position: usize,
    pub message: &'static str,
}

/// Why a single appointment record was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is not readable: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("record is not an array")]
    NotAnArray,

    #[error("record has no composite id")]
    MissingId,

    #[error("unknown view discriminator {0}")]
    UnknownKind(i64),

    #[error("record has no {0} field")]
    MissingField(&'static str),

    #[error("malformed time `{0}`")]
    MalformedTime(String),

    #[error("invalid date {0}-{1}-{2} (month is zero-based)")]
    InvalidDate(i64, i64, i64),

    #[error("end {end} is not after start {start}")]
    InvertedRange { start: String, end: String },

    #[error("week title `{0}` has no detail separator")]
    MissingSeparator(String),
}
