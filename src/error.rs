use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("source is empty")]
    EmptySource,

    #[error("could not decode source as {format}: {reason}")]
    SourceUnreadable { format: String, reason: String },

    #[error("no time column found (looked for {expected}; table has: {headers})")]
    NoTimeColumn { expected: String, headers: String },

    #[error("no usable rows ({dropped} rows had an unparseable date)")]
    NoUsableRows { dropped: usize },

    #[error("no data for this selection: {selection}")]
    EmptyFilterResult { selection: String },

    #[error("invalid alias file: {0}")]
    AliasFile(String),

    #[error("unknown canonical field: {0}")]
    UnknownCanonicalField(String),
}

impl From<serde_json::Error> for SurveyError {
    fn from(err: serde_json::Error) -> Self {
        SurveyError::AliasFile(err.to_string())
    }
}
