use crate::model::EntityKind;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("scores[{index}]: {message}")]
    InvalidScore { index: usize, message: String },

    #[error("{} not found", .kind.label())]
    NotFound { kind: EntityKind },

    #[error("{} already exists for this combination", .kind.label())]
    Conflict { kind: EntityKind },

    #[error("settings: {0}")]
    Settings(anyhow::Error),

    #[error("{source}")]
    Db {
        code: &'static str,
        table: Option<&'static str>,
        #[source]
        source: rusqlite::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: EntityKind) -> Self {
        Self::NotFound { kind }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidScore { .. } => "bad_params",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Settings(_) => "db_query_failed",
            Self::Db { code, .. } => *code,
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation(_) | Self::Settings(_) => None,
            Self::InvalidScore { index, .. } => Some(json!({ "index": index })),
            Self::NotFound { kind } | Self::Conflict { kind } => {
                Some(json!({ "kind": kind.label() }))
            }
            Self::Db { table, .. } => table.map(|t| json!({ "table": t })),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Db {
            code: "db_query_failed",
            table: None,
            source,
        }
    }
}

pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Maps a failed write on `kind`'s table, turning unique violations into conflicts.
pub fn write_err(
    code: &'static str,
    kind: EntityKind,
) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| {
        if is_unique_violation(&source) {
            StoreError::Conflict { kind }
        } else {
            StoreError::Db {
                code,
                table: Some(kind.table()),
                source,
            }
        }
    }
}
