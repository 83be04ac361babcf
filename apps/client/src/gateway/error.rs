use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid email address")]
    InvalidEmail,

    #[error("password must be at least 6 characters")]
    WeakPassword,

    #[error("email address is already in use")]
    EmailAlreadyInUse,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("sign-in provider unavailable")]
    ProviderUnavailable,

    #[error("not signed in")]
    NotSignedIn,

    #[error("backend unavailable")]
    Unavailable,

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("malformed document: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidEmail
                | GatewayError::WeakPassword
                | GatewayError::EmailAlreadyInUse
                | GatewayError::InvalidCredentials
                | GatewayError::ProviderUnavailable
                | GatewayError::NotSignedIn
        )
    }
}
