#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("config: {0}")]
    Config(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("table `{0}` does not exist")]
    TableAbsent(String),

    #[error("unknown event type `{0}`")]
    InvalidEventType(String),

    #[cfg(any(feature = "pg", feature = "sqlite"))]
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),

    #[error("serde_json `{0}`")]
    SerdeJson(#[from] serde_json::Error),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_table_absent(&self) -> bool {
        matches!(self, StoreError::TableAbsent(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
