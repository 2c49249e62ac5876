use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LeagueError {
    /// Malformed input. Nothing was changed.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A referenced match or player does not exist. Nothing was changed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The stored history contradicts itself. The replay was aborted and the
    /// data needs manual inspection.
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String)
}

impl LeagueError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LeagueError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        LeagueError::NotFound(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        LeagueError::DataIntegrity(msg.into())
    }
}

pub type LeagueResult<T> = Result<T, LeagueError>;
