//! Credential record for the local store.

use serde::{Deserialize, Serialize};

/// A user credential triple. Username is the natural key; email is optional
/// and the local store is its system of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

impl Credential {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email,
        }
    }
}
