//! CredentialStore port - Read-only access to the bearer credential.

use secrecy::Secret;

use crate::domain::topic::ObserverIdentity;

/// Synchronous, read-only view of the signed-in user's credentials.
pub trait CredentialStore: Send + Sync {
    /// The bearer token, if signed in.
    fn access_token(&self) -> Option<Secret<String>>;

    /// Who is observing, used for presence and own-change suppression.
    fn current_observer(&self) -> Option<ObserverIdentity>;
}
