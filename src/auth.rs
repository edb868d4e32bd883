use std::collections::HashMap;

use codec::crypto::{generate_password, Password};
use service::CredentialStore;

/// Long-term credentials loaded once from the config file at startup.
pub struct StaticCredentials {
    realm: String,
    users: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new(realm: String, users: HashMap<String, String>) -> Self {
        Self { realm, users }
    }
}

impl CredentialStore for StaticCredentials {
    fn password(&self, username: &str, realm: &str) -> Option<Password> {
        if realm != self.realm {
            return None;
        }

        let secret = self.users.get(username)?;
        Some(generate_password(username, secret, realm))
    }
}
