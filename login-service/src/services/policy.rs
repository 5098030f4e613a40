//! Divergence policy for dual-authority logins.
//!
//! The decision is a pure function of the two authority results and the
//! static configuration; no I/O happens here.

use crate::config::UpstreamConfig;
use crate::models::AuthOutcome;

/// Which way state must flow after a divergent login, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Both authorities agreed, or syncing is off.
    None,
    /// Upstream granted; record the authentication locally.
    ToLocal,
    /// Local granted while upstream did not; push the credentials upstream.
    ToUpstream,
}

/// Result of applying the divergence policy to one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginDecision {
    pub granted: bool,
    pub sync: SyncDirection,
}

/// Decide a login when the upstream provider is enabled.
///
/// Upstream success takes precedence over the local result. Local success
/// only grants when `fallback_to_local` allows it. At most one sync
/// direction is ever chosen, toward whichever authority disagreed.
pub fn resolve_login(
    local_ok: bool,
    upstream: &AuthOutcome,
    config: &UpstreamConfig,
) -> LoginDecision {
    if upstream.succeeded {
        return LoginDecision {
            granted: true,
            sync: if config.sync_on_auth {
                SyncDirection::ToLocal
            } else {
                SyncDirection::None
            },
        };
    }

    if local_ok && config.fallback_to_local {
        return LoginDecision {
            granted: true,
            sync: if config.sync_on_auth {
                SyncDirection::ToUpstream
            } else {
                SyncDirection::None
            },
        };
    }

    LoginDecision {
        granted: false,
        sync: SyncDirection::None,
    }
}
