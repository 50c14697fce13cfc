// ── Core error types ──
//
// User-facing errors from pawtrack-core. Consumers never match on HTTP
// status codes or websocket failures directly; the
// `From<pawtrack_api::Error>` impl folds transport-layer errors into the
// transport / fetch / authorization taxonomy.

use thiserror::Error;

/// Unified error type for the core crate.
///
/// `Clone` so a single fetch failure can be shared by every consumer of
/// a cached query.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Authorization ────────────────────────────────────────────────
    /// The backend rejected the bearer credential (HTTP 401).
    #[error("Unauthorized -- session is no longer valid")]
    Unauthorized,

    /// A request was attempted after the session was invalidated.
    #[error("Session invalidated: {reason}")]
    SessionInvalid { reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Pet not found: {pet}")]
    PetNotFound { pet: String },

    #[error("Not found: {entity_type} {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Rejected by server: {message}")]
    Rejected { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for the authorization class: never retried, always
    /// forwarded to the session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::SessionInvalid { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PetNotFound { .. } | Self::NotFound { .. })
    }

    /// `true` for push/REST transport failures (as opposed to the server
    /// answering with an error).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Timeout { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pawtrack_api::Error> for CoreError {
    fn from(err: pawtrack_api::Error) -> Self {
        use pawtrack_api::Error as ApiError;

        match err {
            ApiError::Unauthorized => CoreError::Unauthorized,
            ApiError::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_ms: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ApiError::Api {
                status: 404,
                message,
            } => CoreError::NotFound {
                entity_type: "resource".into(),
                identifier: message,
            },
            ApiError::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            ApiError::PushConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push channel: {reason}"),
            },
            ApiError::HandshakeTimeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            ApiError::PushRejected(message) => CoreError::Rejected { message },
            ApiError::Protocol(msg) => CoreError::Internal(format!("push protocol: {msg}")),
            ApiError::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_unauthorized_and_not_found() {
        let err = CoreError::from(pawtrack_api::Error::Unauthorized);
        assert!(err.is_unauthorized());

        let err = CoreError::from(pawtrack_api::Error::Api {
            status: 404,
            message: "pet P9".into(),
        });
        assert!(err.is_not_found());

        let err = CoreError::from(pawtrack_api::Error::HandshakeTimeout { timeout_ms: 5000 });
        assert!(matches!(err, CoreError::Timeout { timeout_ms: 5000 }));
        assert!(err.is_transport());
    }
}
