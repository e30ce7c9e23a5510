//! Read-only access to the session's bearer token.
//!
//! The token is owned by whatever signs the user in (the auth context). The
//! data layer never stores it: every request asks its provider for the
//! current token at call time, so a sign-out takes effect for the very next
//! request.

use std::sync::{Arc, RwLock};

use secrecy::{ExposeSecret, SecretString};

pub trait CredentialsProvider: Send + Sync {
    /// The current bearer token, or `None` when no session is active.
    fn bearer_token(&self) -> Option<SecretString>;
}

/// Session slot shared between the auth context (writer) and the data layer
/// (reader). Clones share the same slot.
#[derive(Clone, Default)]
pub struct SessionCredentials {
    token: Arc<RwLock<Option<SecretString>>>,
}

impl SessionCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, token: SecretString) {
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(token);
        tracing::debug!("session token set");
    }

    /// Forget the token on logout, expiry or an auth error.
    pub fn sign_out(&self) {
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
        tracing::debug!("session token cleared");
    }

    pub fn is_signed_in(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl CredentialsProvider for SessionCredentials {
    fn bearer_token(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|t| SecretString::from(t.expose_secret().to_owned()))
    }
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("signed_in", &self.is_signed_in())
            .finish()
    }
}

/// A fixed token, for service accounts and tooling.
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

impl CredentialsProvider for StaticToken {
    fn bearer_token(&self) -> Option<SecretString> {
        Some(SecretString::from(self.0.expose_secret().to_owned()))
    }
}

/// No session at all. Authenticated calls made through it are skipped.
pub struct Anonymous;

impl CredentialsProvider for Anonymous {
    fn bearer_token(&self) -> Option<SecretString> {
        None
    }
}
