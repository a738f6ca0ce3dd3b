use crate::store::StoreError;

/// Response category of a [`ClinicError`].
///
/// Transport layers map this to a status code; the core never deals in status codes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Auth,
    Forbidden,
    NotFound,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),

    #[error("record store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to hash password: {0}")]
    PasswordHash(String),
    #[error("failed to issue token: {0}")]
    TokenIssue(jsonwebtoken::errors::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClinicError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// The response category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Store(_)
            | Self::PasswordHash(_)
            | Self::TokenIssue(_)
            | Self::InvalidConfig(_) => ErrorKind::Internal,
        }
    }
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_display_their_message_verbatim() {
        let err = ClinicError::conflict("Email already registered");
        assert_eq!(err.to_string(), "Email already registered");
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn store_failures_are_internal() {
        let err = ClinicError::from(StoreError::Poisoned);
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
