use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HerdError {
    /// The key-value slot or the image directory could not be accessed.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A transient image reference could not be read at persist time.
    #[error("Image source unreadable: {}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Restore incomplete: {failed} of {total} record(s) failed")]
    PartialRestoreFailure { failed: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl HerdError {
    /// Whether the UI should offer the user a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HerdError::StorageUnavailable(_) | HerdError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, HerdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_are_retryable() {
        assert!(HerdError::StorageUnavailable("disk full".into()).is_retryable());
        assert!(!HerdError::NotFound("abc".into()).is_retryable());
        assert!(!HerdError::CorruptSnapshot("no records".into()).is_retryable());
    }

    #[test]
    fn partial_restore_message_has_counts() {
        let err = HerdError::PartialRestoreFailure {
            failed: 2,
            total: 5,
        };
        assert_eq!(err.to_string(), "Restore incomplete: 2 of 5 record(s) failed");
    }
}
