//! Reconciliation engine for the four identity operations.
//!
//! The local store is the durable source of truth for writes; the upstream
//! provider is best-effort. Reads treat either authority as sufficient, with
//! upstream preferred on conflict. After a divergent login the engine fires
//! at most one one-way sync side effect, chosen by [`resolve_login`].

use crate::config::UpstreamConfig;
use crate::models::{AuthOutcome, Credential};
use crate::services::database::CredentialStore;
use crate::services::error::ServiceError;
use crate::services::metrics::{record_login, record_sync};
use crate::services::policy::{resolve_login, SyncDirection};
use crate::services::upstream::IdentityProvider;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    upstream: Arc<dyn IdentityProvider>,
    config: UpstreamConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        upstream: Arc<dyn IdentityProvider>,
        config: UpstreamConfig,
    ) -> Self {
        Self {
            store,
            upstream,
            config,
        }
    }

    /// Authenticate against both authorities and reconcile the results.
    ///
    /// A local store error is not fatal here: the attempt degrades to a local
    /// mismatch and the upstream path is still consulted.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<bool, ServiceError> {
        let local_ok = match self.store.authenticate(username, password).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "Local credential check failed; treating as mismatch");
                false
            }
        };

        if !self.config.enabled {
            record_login(if local_ok { "local" } else { "none" });
            return Ok(local_ok);
        }

        let outcome = self.upstream.authenticate(username, password).await;
        let decision = resolve_login(local_ok, &outcome, &self.config);

        match decision.sync {
            SyncDirection::ToLocal => self.record_upstream_login(username, &outcome),
            SyncDirection::ToUpstream => self.push_credentials_upstream(username, password).await,
            SyncDirection::None => {}
        }

        record_login(match (decision.granted, outcome.succeeded) {
            (true, true) => "upstream",
            (true, false) => "local",
            (false, _) => "none",
        });

        Ok(decision.granted)
    }

    /// Register locally, then best-effort upstream. A local failure aborts
    /// the whole operation before the provider is contacted; an upstream
    /// failure is logged and swallowed.
    #[instrument(skip(self, credential), fields(username = %credential.username))]
    pub async fn register(&self, credential: &Credential) -> Result<(), ServiceError> {
        self.store.register(credential).await?;

        if self.config.enabled {
            let outcome = self.upstream.register(credential).await;
            if !outcome.succeeded {
                warn!(
                    message = %outcome.message,
                    "Upstream registration failed; local registration stands"
                );
            }
        }

        Ok(())
    }

    /// True when the user exists in the local store OR, with the provider
    /// enabled, upstream. The upstream check is skipped once local existence
    /// settles the answer.
    #[instrument(skip(self), fields(username = %username))]
    pub async fn verify(&self, username: &str) -> Result<bool, ServiceError> {
        let local_exists = match self.store.exists(username).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(error = %e, "Local existence check failed; treating as absent");
                false
            }
        };

        if local_exists || !self.config.enabled {
            return Ok(local_exists);
        }

        Ok(self.upstream.verify(username).await)
    }

    /// Update the password locally (fatal on failure, including an unknown
    /// user), then best-effort upstream.
    #[instrument(skip(self, new_password), fields(username = %username))]
    pub async fn update_password(
        &self,
        username: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        self.store.update_password(username, new_password).await?;

        if self.config.enabled {
            let outcome = self.upstream.update_password(username, new_password).await;
            if !outcome.succeeded {
                warn!(
                    message = %outcome.message,
                    "Upstream password update failed; local update stands"
                );
            }
        }

        Ok(())
    }

    /// Local half of the sync: note the upstream-granted authentication.
    /// Tokens stay opaque and masked.
    fn record_upstream_login(&self, username: &str, outcome: &AuthOutcome) {
        info!(
            username,
            token = outcome.token_display(),
            "Upstream authentication recorded locally"
        );
        record_sync("to_local", "ok");
    }

    /// Upstream half of the sync: a register-style push of the credentials
    /// the local authority accepted, carrying the stored email.
    async fn push_credentials_upstream(&self, username: &str, password: &str) {
        let email = match self.store.email_of(username).await {
            Ok(email) => email,
            Err(e) => {
                warn!(error = %e, "Could not load stored email; skipping upstream push");
                record_sync("to_upstream", "failed");
                return;
            }
        };

        let credential = Credential::new(username, password, email);
        let outcome = self.upstream.register(&credential).await;

        if outcome.succeeded {
            info!("Credentials pushed to upstream provider");
            record_sync("to_upstream", "ok");
        } else {
            warn!(message = %outcome.message, "Upstream push failed");
            record_sync("to_upstream", "failed");
        }
    }
}
