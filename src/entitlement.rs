//! The entitlement ledger: who is allowed to convert, and on whose tab.
//!
//! Two sources of entitlement exist and they are tracked differently:
//!
//! * `free_remaining` is a **mirror** of server truth. The client never
//!   decrements it — after a free conversion the orchestrator re-fetches it
//!   from the quota source. A rapid double-attempt can therefore race a
//!   stale mirror; the server enforces the limit authoritatively and the
//!   client treats its copy as a soft display value.
//! * `paid_balance` is **client-owned** once granted: it decrements exactly
//!   once per successfully completed paid conversion.
//!
//! The admission check happens at the moment of each attempt, never cached
//! at render time.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Opaque token proving a successful payment, attached as a bearer header
/// to subsequent conversion requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCredential(pub String);

impl AccessCredential {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Tab-session entitlement state.
#[derive(Debug, Default)]
pub struct EntitlementLedger {
    free_remaining: u32,
    paid_balance: u32,
    credential: Option<AccessCredential>,
}

impl EntitlementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// May a conversion be attempted right now?
    ///
    /// True iff a free slot remains (per the last known server mirror) or a
    /// paid balance exists.
    pub fn may_attempt(&self) -> bool {
        self.free_remaining > 0 || self.paid_balance > 0
    }

    /// Remaining free conversions as last mirrored from the server.
    pub fn free_remaining(&self) -> u32 {
        self.free_remaining
    }

    /// Remaining paid documents on the current plan.
    pub fn paid_balance(&self) -> u32 {
        self.paid_balance
    }

    /// Paid-access credential, when a plan purchase has been verified.
    pub fn credential(&self) -> Option<&AccessCredential> {
        self.credential.as_ref()
    }

    /// Overwrite the free-quota mirror with a freshly fetched server value.
    pub fn set_free_remaining(&mut self, remaining: u32) {
        debug!(remaining, "free quota mirror updated");
        self.free_remaining = remaining;
    }

    /// Consume one paid document.
    ///
    /// No-op at zero balance: the attempt that got here was admitted on the
    /// free path, and free usage is settled server-side.
    pub fn record_paid_conversion(&mut self) {
        if self.paid_balance == 0 {
            debug!("paid debit skipped: balance already zero");
            return;
        }
        self.paid_balance -= 1;
        info!(paid_balance = self.paid_balance, "paid conversion recorded");
    }

    /// Apply a verified plan purchase.
    ///
    /// Overwrite semantics: the balance is set to the plan's face value,
    /// not added to any remainder. Buying a second plan mid-way resets the
    /// counter to the new plan's allotment (per-plan allotment, not top-up).
    pub fn grant(&mut self, plan_id: &str, amount: u32, credential: AccessCredential) {
        info!(plan = plan_id, docs = amount, "entitlement granted");
        self.paid_balance = amount;
        self.credential = Some(credential);
    }
}
