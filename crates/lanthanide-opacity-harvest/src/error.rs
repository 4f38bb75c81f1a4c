//! Error taxonomy for harvest attempts.

use lanthanide_opacity::OpacityError;

/// All errors that can occur while harvesting.
///
/// The first six variants describe a single failed attempt at one grid
/// point. `Storage` and `Io` come from persisting results and end the run.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Coercion error: row {row}, column '{column}': cannot convert '{text}' to a number")]
    Coercion {
        row: usize,
        column: String,
        text: String,
    },

    #[error("Invalid grid point: {0}")]
    InvalidGridPoint(String),

    #[error("Storage error: {0}")]
    Storage(#[from] OpacityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Whether another attempt at the same grid point could succeed.
    ///
    /// Transport failures, timeouts, 5xx, 408, 429, and malformed or
    /// non-numeric tables are retryable. Other 4xx statuses and invalid
    /// grid points are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            HarvestError::Transport(_)
            | HarvestError::Timeout(_)
            | HarvestError::Parse(_)
            | HarvestError::Coercion { .. } => true,
            HarvestError::Status(code) => *code >= 500 || *code == 408 || *code == 429,
            HarvestError::InvalidGridPoint(_)
            | HarvestError::Storage(_)
            | HarvestError::Io(_) => false,
        }
    }

    /// Whether this error belongs to a single attempt rather than the run.
    pub fn is_attempt_failure(&self) -> bool {
        !matches!(self, HarvestError::Storage(_) | HarvestError::Io(_))
    }
}

impl From<reqwest::Error> for HarvestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HarvestError::Timeout(e.to_string())
        } else if let Some(status) = e.status() {
            HarvestError::Status(status.as_u16())
        } else {
            HarvestError::Transport(e.to_string())
        }
    }
}

pub type HarvestResult<T> = Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(HarvestError::Transport("refused".into()).is_retryable());
        assert!(HarvestError::Timeout("15s".into()).is_retryable());
        assert!(HarvestError::Parse("no table".into()).is_retryable());
        assert!(HarvestError::Coercion {
            row: 0,
            column: "a".into(),
            text: "x".into()
        }
        .is_retryable());
        assert!(HarvestError::Status(500).is_retryable());
        assert!(HarvestError::Status(503).is_retryable());
        assert!(HarvestError::Status(429).is_retryable());
        assert!(HarvestError::Status(408).is_retryable());

        assert!(!HarvestError::Status(400).is_retryable());
        assert!(!HarvestError::Status(404).is_retryable());
        assert!(!HarvestError::InvalidGridPoint("Z=0".into()).is_retryable());
        assert!(!HarvestError::Storage(OpacityError::Snapshot("bad".into())).is_retryable());
    }

    #[test]
    fn test_attempt_failure_split() {
        assert!(HarvestError::Status(404).is_attempt_failure());
        assert!(HarvestError::Parse("x".into()).is_attempt_failure());
        assert!(!HarvestError::Storage(OpacityError::Snapshot("bad".into())).is_attempt_failure());
        assert!(!HarvestError::Io(std::io::Error::other("disk full")).is_attempt_failure());
    }

    #[test]
    fn test_coercion_message_names_cell() {
        let e = HarvestError::Coercion {
            row: 2,
            column: "total_opac".into(),
            text: "n/a".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("row 2"));
        assert!(msg.contains("total_opac"));
        assert!(msg.contains("n/a"));
    }
}
