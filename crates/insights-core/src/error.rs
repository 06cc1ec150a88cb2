use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The document store rejected a versioned write because the document moved on.
    #[error("Version conflict: {0}")]
    Conflict(String),

    #[error("Upstream call failed: {0}")]
    Upstream(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation failed: {0}")]
    Internal(String),
}

impl Error {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::BadRequest(_) => 400,
            Self::Conflict(_) => 409,
            Self::Upstream(_) => 502,
            Self::InvalidConfig(_) | Self::Internal(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Upstream, configuration and internal failures: logged in full, shown generically.
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Message safe to hand back to a caller. Client-facing errors keep their
    /// text; everything else collapses to a generic line.
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound(m) | Self::BadRequest(m) | Self::Conflict(m) => m.clone(),
            Self::Upstream(_) => "A downstream service failed to process the request.".to_string(),
            Self::InvalidConfig(_) | Self::Internal(_) => "Internal server error.".to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("serialization: {e}"))
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
