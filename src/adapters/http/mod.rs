//! HTTP adapters for the REST collaborators.
//!
//! - [`presence`] - Presence mark/unmark/list endpoint
//! - [`mutation`] - Version-carrying workflow transitions

pub mod mutation;
pub mod presence;

pub use mutation::HttpMutationGateway;
pub use presence::HttpPresenceApi;

use secrecy::ExposeSecret;

use crate::ports::CredentialStore;

/// Attaches the bearer credential, when there is one.
fn authorize(
    request: reqwest::RequestBuilder,
    credentials: &dyn CredentialStore,
) -> reqwest::RequestBuilder {
    match credentials.access_token() {
        Some(token) => request.bearer_auth(token.expose_secret()),
        None => request,
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
