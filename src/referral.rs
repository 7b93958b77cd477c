//! Referral identity and the at-most-once credit.
//!
//! Every profile carries a durable random referral code, generated on first
//! run and never regenerated. When the app is opened through someone else's
//! referral link, the inbound code is held as *pending* for this session;
//! after the referred user's first compression-path success, one credit
//! call fires and the profile is durably marked consumed.
//!
//! The consumed marker is written after the credit request completes,
//! success or not: at-most-once, best-effort. A lost credit is accepted;
//! a doubled one is not.

use crate::error::DocfitError;
use crate::identity::IdentityStore;
use crate::remote::ReferralService;
use tracing::{debug, info, warn};
use uuid::Uuid;

const KEY_CODE: &str = "referral_code";
const KEY_CONSUMED: &str = "referral_consumed";

/// Durable referral identity plus the session's pending inbound code.
pub struct ReferralTracker {
    store: Box<dyn IdentityStore>,
    code: String,
    pending: Option<String>,
}

impl ReferralTracker {
    /// Load (or initialise) the referral identity from `store`.
    ///
    /// `inbound` is the referral parameter from the initial navigation, if
    /// any. It becomes pending only when this profile has never consumed a
    /// referral; referring an already-credited profile is a no-op.
    pub fn load(
        mut store: Box<dyn IdentityStore>,
        inbound: Option<&str>,
    ) -> Result<Self, DocfitError> {
        let code = match store.get(KEY_CODE) {
            Some(existing) => existing,
            None => {
                let fresh = Uuid::new_v4().to_string();
                store.set(KEY_CODE, &fresh)?;
                info!(code = %fresh, "referral identity generated");
                fresh
            }
        };

        let pending = if store.exists(KEY_CONSUMED) {
            None
        } else {
            inbound
                .map(str::trim)
                .filter(|c| !c.is_empty() && *c != code)
                .map(str::to_string)
        };
        if let Some(ref p) = pending {
            debug!(code = %p, "inbound referral pending");
        }

        Ok(Self { store, code, pending })
    }

    /// This profile's own durable referral code — also the identity sent on
    /// quota lookups.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Is an unconsumed inbound referral waiting for the first conversion?
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether this profile has ever been credited against a referral.
    pub fn consumed(&self) -> bool {
        self.store.exists(KEY_CONSUMED)
    }

    /// Fire the one-shot referral credit if a pending code exists.
    ///
    /// Called by the orchestrator after a compression-path success only.
    /// The pending code is taken eagerly and the consumed marker written
    /// regardless of the call's outcome; a failed credit is logged and
    /// never retried.
    pub async fn credit_if_pending(&mut self, service: &dyn ReferralService) {
        let Some(code) = self.pending.take() else {
            return;
        };
        if self.store.exists(KEY_CONSUMED) {
            return;
        }

        if let Err(e) = service.credit(&code).await {
            warn!(code = %code, error = %e, "referral credit failed (not retried)");
        } else {
            info!(code = %code, "referral credited");
        }
        if let Err(e) = self.store.set(KEY_CONSUMED, "1") {
            warn!(error = %e, "could not persist referral-consumed marker");
        }
    }
}
