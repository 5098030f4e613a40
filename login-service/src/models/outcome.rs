//! Normalized result of an upstream identity operation.

use serde::{Deserialize, Serialize};

/// Outcome of a single call to the upstream identity provider. The client
/// never raises transport or parse failures past its boundary; they arrive
/// here as a failed outcome instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthOutcome {
    pub succeeded: bool,
    pub message: String,
    /// Opaque to this service; forwarded or logged in masked form only.
    pub token: Option<String>,
}

impl AuthOutcome {
    pub fn success(message: impl Into<String>, token: Option<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
            token,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
            token: None,
        }
    }

    /// Masked token for log output.
    pub fn token_display(&self) -> &'static str {
        if self.token.is_some() { "***" } else { "none" }
    }
}

impl std::fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AuthOutcome {{ succeeded: {}, message: '{}', token: {} }}",
            self.succeeded,
            self.message,
            self.token_display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_never_leaks_the_token() {
        let outcome = AuthOutcome::success("ok", Some("secret-token".to_string()));
        let rendered = outcome.to_string();
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("***"));
    }
}
