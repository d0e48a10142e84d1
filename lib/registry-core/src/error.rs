use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Classify a non-success HTTP status returned by the backend
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            400 | 422 => RegistryError::Validation(body),
            404 => RegistryError::NotFound(body),
            409 => RegistryError::Conflict(body),
            500..=599 => RegistryError::Unavailable(format!("status {}: {}", status, body)),
            _ => RegistryError::Rejected { status, body },
        }
    }

    /// Whether retrying later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RegistryError::Unavailable(_))
    }

    /// User-facing notification for this failure
    pub fn notification(&self) -> Notification {
        let (level, title) = match self {
            RegistryError::Validation(_) => (NotificationLevel::Warning, "Invalid input"),
            RegistryError::Conflict(_) => (NotificationLevel::Warning, "Already exists"),
            RegistryError::NotFound(_) => (NotificationLevel::Warning, "Not found"),
            RegistryError::Unavailable(_) => (NotificationLevel::Error, "Gateway unavailable"),
            RegistryError::Rejected { .. } => (NotificationLevel::Error, "Request rejected"),
            RegistryError::InvalidConfiguration(_) => {
                (NotificationLevel::Error, "Configuration error")
            }
            RegistryError::Io(_) => (NotificationLevel::Error, "File error"),
        };

        Notification {
            level,
            title: title.to_string(),
            message: self.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A message for the operator, one per failed or completed action
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }
}
