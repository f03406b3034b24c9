//! Cloud adapter error types.

use std::time::Duration;

use hublink_domain::error::HubError;

/// Errors of the cloud relay.
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    /// `connect` was called while a session is open.
    #[error("cloud already connected")]
    AlreadyConnected,

    /// An operation needs a session and there is none.
    #[error("cloud not connected")]
    NotConnected,

    /// Establishing the broker session failed.
    #[error("unable to connect to the cloud broker")]
    Connect(#[from] ConnectError),

    /// The rumqttc client rejected a request.
    #[error("MQTT client error")]
    Client(#[from] rumqttc::ClientError),

    /// Reading or writing the credential files failed.
    #[error("credential storage error")]
    Credentials(#[from] CredentialError),

    /// An inbound message is not valid JSON.
    #[error("failed to parse cloud message")]
    PayloadParse(#[source] serde_json::Error),

    /// An inbound message lacks a required field.
    #[error("cloud message has no {0}")]
    InvalidMessage(&'static str),

    /// No handler is registered under this name.
    #[error("no handler named {0:?}")]
    UnknownHandler(String),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] HubError),
}

/// Why the broker session could not be established.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// A certificate or key file could not be read.
    #[error("unable to read {path}")]
    ReadCredential {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Network or TLS failure while talking to the broker.
    #[error("broker connection failed")]
    Connection(#[source] rumqttc::ConnectionError),

    /// The broker answered the connect request with a refusal.
    #[error("broker refused the connection: {0:?}")]
    Refused(rumqttc::ConnectReturnCode),

    /// No answer from the broker within the configured delay.
    #[error("no answer from the broker after {0:?}")]
    Timeout(Duration),
}

/// Failure of the credential store.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential file access failed")]
    Io(#[from] std::io::Error),

    #[error("invalid user info file")]
    Format(#[from] serde_json::Error),
}

/// Errors of the account API.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication failed: {0}")]
    Unauthenticated(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("user not confirmed: {0}")]
    UserNotConfirmed(String),

    #[error("code expired: {0}")]
    ExpiredCode(String),

    #[error("invalid code: {0}")]
    InvalidCode(String),

    #[error("password change required")]
    PasswordChangeRequired,

    #[error("unexpected account error: {0}")]
    Unknown(String),

    /// The HTTP request itself failed.
    #[error("account API request failed")]
    Http(#[from] reqwest::Error),

    /// The account API answered with an unexpected body.
    #[error("invalid account API response")]
    Payload(#[source] serde_json::Error),

    /// The certificate could not be stored.
    #[error("unable to store credentials")]
    Credentials(#[from] CredentialError),
}

impl AuthError {
    /// Map an identity provider error code (e.g. `NotAuthorizedException`).
    #[must_use]
    pub fn from_aws(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "UserNotFoundException" => Self::UserNotFound(message),
            "NotAuthorizedException" => Self::Unauthenticated(message),
            "ExpiredCodeException" => Self::ExpiredCode(message),
            "UserNotConfirmedException" => Self::UserNotConfirmed(message),
            "PasswordResetRequiredException" => Self::PasswordChangeRequired,
            "CodeMismatchException" => Self::InvalidCode(message),
            _ => Self::Unknown(message),
        }
    }
}

impl CloudError {
    /// Convert into a [`HubError`] for propagation across port boundaries.
    #[must_use]
    pub fn into_domain(self) -> HubError {
        match self {
            Self::Domain(err) => err,
            other => HubError::Integration(Box::new(other)),
        }
    }
}

impl From<CloudError> for HubError {
    fn from(err: CloudError) -> Self {
        err.into_domain()
    }
}

impl From<AuthError> for HubError {
    fn from(err: AuthError) -> Self {
        HubError::Integration(Box::new(err))
    }
}
