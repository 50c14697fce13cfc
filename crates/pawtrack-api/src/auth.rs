// Bearer credential seam.
//
// The REST client never owns the credential. It asks a `BearerSource`
// for the current token on every request, so whoever owns the session
// (core's `SessionContext`) can swap or revoke it without rebuilding
// the client.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

/// Supplies the bearer token attached to authenticated requests.
pub trait BearerSource: Send + Sync {
    /// The token to send, or `None` to send the request unauthenticated.
    fn bearer_token(&self) -> Option<SecretString>;
}

/// A fixed token. Handy for tests and one-shot tools.
#[derive(Debug, Clone)]
pub struct StaticToken(pub SecretString);

impl BearerSource for StaticToken {
    fn bearer_token(&self) -> Option<SecretString> {
        Some(self.0.clone())
    }
}

impl<T: BearerSource + ?Sized> BearerSource for Arc<T> {
    fn bearer_token(&self) -> Option<SecretString> {
        (**self).bearer_token()
    }
}

/// Format an `Authorization` header value.
pub(crate) fn header_value(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}
