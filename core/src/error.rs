use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the day-tracking aggregator and the recipe catalog.
///
/// `NotFound`, `Conflict` and `Invalid` are caller mistakes (4xx at the API
/// boundary). `Storage` and `Corrupt` are server-side failures and are never
/// retried here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} '{id}' does not belong to the day {date}")]
    Conflict {
        entity: &'static str,
        id: Uuid,
        date: NaiveDate,
    },

    #[error("{0}")]
    Invalid(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// True for errors caused by the request rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Conflict { .. } | Self::Invalid(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
