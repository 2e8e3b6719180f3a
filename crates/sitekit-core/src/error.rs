//! Error types for Sitekit

/// Sitekit error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    #[error("Invalid filename format: {0}")]
    InvalidFilenameFormat(String),

    #[error("Invalid retention expression: {0}")]
    InvalidRetention(String),

    #[error("Database error: {message}")]
    Database {
        /// Native error code reported by the database driver, when available
        code: Option<String>,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Sitekit
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn db<S: Into<String>>(msg: S) -> Self {
        Error::Database {
            code: None,
            message: msg.into(),
        }
    }

    pub fn db_with_code<C: Into<String>, S: Into<String>>(code: C, msg: S) -> Self {
        Error::Database {
            code: Some(code.into()),
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidDateFormat("Y-m-d-h".to_string());
        assert_eq!(err.to_string(), "Invalid date format: Y-m-d-h");

        let err = Error::db_with_code("1", "no such table: users");
        assert_eq!(err.to_string(), "Database error: no such table: users");
        assert!(matches!(err, Error::Database { code: Some(_), .. }));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
