use thiserror::Error;

use crate::models::ReportStatus;

#[derive(Error, Debug)]
pub enum ShopfloorError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Report {id} is {status}; cannot {action}")]
    Locked {
        id: String,
        status: ReportStatus,
        action: &'static str,
    },

    #[error("Table API error: {0}")]
    Transport(String),

    #[error("Import file error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl From<rusqlite::Error> for ShopfloorError {
    fn from(e: rusqlite::Error) -> Self {
        ShopfloorError::Transport(format!("local store: {e}"))
    }
}

impl From<serde_json::Error> for ShopfloorError {
    fn from(e: serde_json::Error) -> Self {
        ShopfloorError::Transport(format!("malformed row: {e}"))
    }
}

#[cfg(feature = "remote")]
impl From<reqwest::Error> for ShopfloorError {
    fn from(e: reqwest::Error) -> Self {
        ShopfloorError::Transport(format!("HTTP: {e}"))
    }
}

impl ShopfloorError {
    /// Recoverable errors the user can fix and retry; everything else is plumbing.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Locked { .. } | Self::Parse(_) | Self::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ShopfloorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_lists_every_field() {
        let e = ShopfloorError::Validation(vec![
            "stage is required".to_string(),
            "quantity is required".to_string(),
        ]);
        assert_eq!(
            e.to_string(),
            "Validation failed: stage is required; quantity is required"
        );
        assert!(e.is_user_facing());
    }

    #[test]
    fn test_locked_message() {
        let e = ShopfloorError::Locked {
            id: "BC007".to_string(),
            status: ReportStatus::Approved,
            action: "delete",
        };
        assert_eq!(e.to_string(), "Report BC007 is Approved; cannot delete");
    }

    #[test]
    fn test_sqlite_errors_become_transport() {
        let e: ShopfloorError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(e, ShopfloorError::Transport(_)));
        assert!(!e.is_user_facing());
    }
}
