//! Client for the upstream identity provider.
//!
//! Every call is bounded by the configured timeout and makes exactly one
//! attempt. Transport and parse failures never escape this module; callers
//! always receive a normalized [`AuthOutcome`].

use crate::config::UpstreamConfig;
use crate::models::{AuthOutcome, Credential};
use crate::services::metrics::record_upstream_request;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::time::Duration;
use tracing::debug;

/// Identifier sent in the `service` payload field and the User-Agent header.
const SERVICE_TAG: &str = env!("CARGO_PKG_NAME");

/// Remote authority for identity operations. The engine talks to this trait
/// so tests can substitute a scripted provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> AuthOutcome;
    async fn register(&self, credential: &Credential) -> AuthOutcome;
    async fn verify(&self, username: &str) -> bool;
    async fn update_password(&self, username: &str, new_password: &str) -> AuthOutcome;
}

#[derive(Serialize)]
struct LoginPayload<'a> {
    username: &'a str,
    password: &'a str,
    service: &'a str,
}

#[derive(Serialize)]
struct RegisterPayload<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    service: &'a str,
}

#[derive(Serialize)]
struct PasswordUpdatePayload<'a> {
    username: &'a str,
    password: &'a str,
}

/// Wire shape of provider responses, shared by every operation and by error
/// bodies. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct UpstreamResponse {
    success: Option<bool>,
    status: Option<String>,
    message: Option<String>,
    token: Option<String>,
}

impl UpstreamResponse {
    fn indicates_success(&self) -> bool {
        self.success == Some(true) || self.status.as_deref() == Some("success")
    }
}

/// HTTP client for the upstream identity provider.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Create a new client. Connect and read timeouts are both bound by the
    /// configured `timeout_ms`.
    pub fn new(config: UpstreamConfig) -> Result<Self, AppError> {
        let timeout = Duration::from_millis(config.timeout_ms);

        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(format!("{}/{}", SERVICE_TAG, env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send a request and normalize whatever happens into an [`AuthOutcome`].
    async fn dispatch(&self, operation: &'static str, request: RequestBuilder) -> AuthOutcome {
        let request = request.bearer_auth(self.config.api_key.expose_secret());

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                record_upstream_request(operation, "transport_error");
                return AuthOutcome::failure(describe_transport_error(&e));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                record_upstream_request(operation, "transport_error");
                return AuthOutcome::failure(describe_transport_error(&e));
            }
        };

        if self.config.log_responses {
            debug!(operation, status = %status, body = %body, "Upstream response");
        }

        let outcome = parse_outcome(status, &body);
        record_upstream_request(operation, if outcome.succeeded { "ok" } else { "failed" });
        outcome
    }
}

#[async_trait]
impl IdentityProvider for UpstreamClient {
    async fn authenticate(&self, username: &str, password: &str) -> AuthOutcome {
        if self.config.log_requests {
            debug!(username, "POST /auth/login to upstream");
        }

        let payload = LoginPayload {
            username,
            password,
            service: SERVICE_TAG,
        };

        self.dispatch(
            "login",
            self.client.post(self.url("/auth/login")).json(&payload),
        )
        .await
    }

    async fn register(&self, credential: &Credential) -> AuthOutcome {
        if self.config.log_requests {
            debug!(username = %credential.username, "POST /auth/register to upstream");
        }

        let payload = RegisterPayload {
            username: &credential.username,
            password: &credential.password,
            email: credential.email.as_deref(),
            service: SERVICE_TAG,
        };

        self.dispatch(
            "register",
            self.client.post(self.url("/auth/register")).json(&payload),
        )
        .await
    }

    async fn verify(&self, username: &str) -> bool {
        if self.config.log_requests {
            debug!(username, "GET /auth/verify to upstream");
        }

        let path = format!("/auth/verify/{}", urlencoding::encode(username));
        self.dispatch("verify", self.client.get(self.url(&path)))
            .await
            .succeeded
    }

    async fn update_password(&self, username: &str, new_password: &str) -> AuthOutcome {
        if self.config.log_requests {
            debug!(username, "PUT /auth/update-password to upstream");
        }

        let payload = PasswordUpdatePayload {
            username,
            password: new_password,
        };

        self.dispatch(
            "update_password",
            self.client
                .put(self.url("/auth/update-password"))
                .json(&payload),
        )
        .await
    }
}

/// Judge a response body. Success requires an explicit indicator in the
/// structured body; a 2xx status alone is not enough.
fn parse_outcome(status: StatusCode, body: &str) -> AuthOutcome {
    match serde_json::from_str::<UpstreamResponse>(body) {
        Ok(parsed) => AuthOutcome {
            succeeded: parsed.indicates_success(),
            message: parsed
                .message
                .unwrap_or_else(|| format!("upstream responded with {}", status)),
            token: parsed.token,
        },
        Err(e) if status.is_success() => AuthOutcome::failure(format!("parse error: {}", e)),
        Err(_) => AuthOutcome::failure(format!("upstream error: {}", status)),
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        format!("request failed: {}", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_flag_is_honored() {
        let outcome = parse_outcome(
            StatusCode::OK,
            r#"{"success":true,"message":"welcome","token":"abc"}"#,
        );
        assert!(outcome.succeeded);
        assert_eq!(outcome.message, "welcome");
        assert_eq!(outcome.token.as_deref(), Some("abc"));
    }

    #[test]
    fn status_string_is_an_equivalent_indicator() {
        let outcome = parse_outcome(StatusCode::OK, r#"{"status":"success"}"#);
        assert!(outcome.succeeded);
    }

    #[test]
    fn two_hundred_without_indicator_is_a_failure() {
        let outcome = parse_outcome(StatusCode::OK, r#"{"message":"pending"}"#);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.message, "pending");
    }

    #[test]
    fn escaped_characters_in_tokens_survive_parsing() {
        let outcome = parse_outcome(
            StatusCode::OK,
            r#"{"success":true,"token":"ab\"c\\d","message":"ok"}"#,
        );
        assert_eq!(outcome.token.as_deref(), Some(r#"ab"c\d"#));
    }

    #[test]
    fn field_order_does_not_matter() {
        let outcome = parse_outcome(
            StatusCode::OK,
            r#"{"token":"t1","success":true,"message":"m"}"#,
        );
        assert!(outcome.succeeded);
        assert_eq!(outcome.token.as_deref(), Some("t1"));
    }

    #[test]
    fn error_body_message_is_extracted() {
        let outcome = parse_outcome(
            StatusCode::UNAUTHORIZED,
            r#"{"success":false,"message":"bad credentials"}"#,
        );
        assert!(!outcome.succeeded);
        assert_eq!(outcome.message, "bad credentials");
    }

    #[test]
    fn unparseable_error_body_reports_the_status() {
        let outcome = parse_outcome(StatusCode::BAD_GATEWAY, "<html>nope</html>");
        assert!(!outcome.succeeded);
        assert!(outcome.message.contains("502"));
    }

    #[test]
    fn unparseable_success_body_is_a_parse_failure() {
        let outcome = parse_outcome(StatusCode::OK, "not json");
        assert!(!outcome.succeeded);
        assert!(outcome.message.starts_with("parse error"));
    }
}
