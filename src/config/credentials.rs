//! Static credentials for hosts without a session store

use serde::Deserialize;

/// Bearer token and observer identity supplied through configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}
