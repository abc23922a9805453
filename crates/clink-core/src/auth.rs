//! Chat user authorization.

use std::collections::HashSet;

/// Who may trigger sounds.
///
/// Names are stored lowercased; every comparison is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationConfig {
    owner: String,
    allowed_users: HashSet<String>,
}

impl AuthorizationConfig {
    /// Create a config for the channel owner and an optional allow-list.
    ///
    /// An empty allow-list lets everyone play sounds.
    pub fn new<I, S>(owner: impl AsRef<str>, allowed_users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            owner: owner.as_ref().to_lowercase(),
            allowed_users: allowed_users
                .into_iter()
                .map(|user| user.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Get the owner identity (lowercased).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns true if no allow-list is configured.
    pub fn allows_everyone(&self) -> bool {
        self.allowed_users.is_empty()
    }

    /// Decide whether `username` may trigger playback.
    pub fn is_authorized(&self, username: &str) -> bool {
        let user = username.to_lowercase();

        if user == self.owner {
            return true;
        }

        if self.allowed_users.is_empty() {
            return true;
        }

        self.allowed_users.contains(&user)
    }
}
