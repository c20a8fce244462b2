//! Error Types
//!
//! One error type per pipeline stage. Configuration, authentication,
//! enumeration and publication errors end a run; fetch errors only skip the
//! affected (workspace, cluster) pair.

use std::path::PathBuf;

use crate::sync::RunPhase;

/// Why an HTTP request could not produce a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request exceeded its timeout
    Timeout,
    /// DNS resolution or TCP/TLS connect failed
    Connect,
    /// Reading the response body failed
    Body,
    /// Anything else reported by the HTTP stack
    Other,
}

/// Connection, DNS, timeout or body-read failure, independent of HTTP status
#[derive(Debug, thiserror::Error)]
#[error("{kind:?} error for {url}: {source}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub url: String,
    #[source]
    pub source: reqwest::Error,
}

impl TransportError {
    pub(crate) fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let kind = if source.is_timeout() {
            TransportErrorKind::Timeout
        } else if source.is_connect() {
            TransportErrorKind::Connect
        } else if source.is_body() || source.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };

        Self {
            kind,
            url: url.into(),
            source,
        }
    }
}

/// Startup configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A secret file is missing or unreadable
    #[error("Failed to read secret file {path}: {source}")]
    SecretUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A secret file exists but holds no value
    #[error("Secret file {0} is empty")]
    SecretEmpty(PathBuf),

    /// The tuning file could not be read
    #[error("Failed to read config file {path}: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tuning file is not valid TOML for this schema
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Token exchange errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Token endpoint answered with status {0}")]
    BadStatus(u16),

    #[error("Token response could not be decoded: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

/// Workspace listing errors
#[derive(Debug, thiserror::Error)]
pub enum EnumError {
    #[error("Workspace listing request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Workspace listing answered with status {0}")]
    BadStatus(u16),

    #[error("Workspace listing could not be decoded: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

/// Per-pair quota retrieval errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Quota request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Quota endpoint answered with status {0}")]
    BadStatus(u16),

    #[error("Quota response could not be decoded: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

impl FetchError {
    /// Short label used for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::BadStatus(_) => "status",
            FetchError::MalformedResponse(_) => "decode",
        }
    }
}

/// Failure writing to the message bus
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Error reported by the Kafka client or broker
    #[error("Kafka error: {0}")]
    Kafka(#[from] rskafka::client::error::Error),

    /// The bus is temporarily unable to take the message
    #[error("{0}")]
    Unavailable(String),

    /// The bus refused the message and will keep refusing it
    #[error("{0}")]
    Rejected(String),
}

impl SinkError {
    /// Whether writing the same message again can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::Kafka(e) => kafka_error_is_retryable(e),
            SinkError::Unavailable(_) => true,
            SinkError::Rejected(_) => false,
        }
    }
}

fn kafka_error_is_retryable(error: &rskafka::client::error::Error) -> bool {
    use rskafka::client::error::{Error, ProtocolError};

    match error {
        Error::ServerError { protocol_error, .. } => !matches!(
            protocol_error,
            ProtocolError::MessageTooLarge
                | ProtocolError::RecordListTooLarge
                | ProtocolError::CorruptMessage
                | ProtocolError::InvalidTopicException
                | ProtocolError::UnknownTopicOrPartition
                | ProtocolError::TopicAuthorizationFailed
                | ProtocolError::ClusterAuthorizationFailed
        ),
        Error::InvalidResponse(_) => false,
        _ => true,
    }
}

/// Event publication errors
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The event could not be serialized
    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Every write attempt failed
    #[error("Failed to write event after {attempts} attempts: {source}")]
    Write {
        attempts: usize,
        #[source]
        source: SinkError,
    },
}

/// Errors that end a synchronization run
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Workspace enumeration failed: {0}")]
    Enumerate(#[from] EnumError),

    #[error("Publishing quota for {workspace}/{cluster} failed: {source}")]
    Publish {
        workspace: String,
        cluster: String,
        #[source]
        source: PublishError,
    },

    /// Raised after a full drain when strict mode is on
    #[error("{0} workspace/cluster pairs were skipped")]
    PairsSkipped(usize),
}

impl SyncError {
    /// Phase the run was in when the error ended it
    pub fn phase(&self) -> RunPhase {
        match self {
            SyncError::Auth(_) => RunPhase::Unauthenticated,
            SyncError::Enumerate(_) => RunPhase::Authenticated,
            SyncError::Publish { .. } => RunPhase::Draining,
            SyncError::PairsSkipped(_) => RunPhase::Finished,
        }
    }
}
