//! Error types for the docfit library.
//!
//! The taxonomy separates *states* from *errors*: running out of
//! entitlement is not an error at all — the orchestrator transitions to
//! [`FlowState::Blocked`](crate::orchestrator::FlowState) and the host shows
//! the paywall. Everything here is a failure that some call site caught and
//! degraded into an enumerable outcome; nothing in this crate panics on a
//! network problem.
//!
//! Propagation policy: collaborator failures are caught where they happen.
//! The orchestrator folds them into a terminal state and keeps the last
//! error around for display; the payment flow returns them to the caller
//! because the paywall stays interactive either way.

use thiserror::Error;

/// All errors surfaced by the docfit library.
#[derive(Debug, Error)]
pub enum DocfitError {
    // ── Conversion errors ─────────────────────────────────────────────────
    /// The conversion endpoint answered HTTP 402: entitlement exhausted
    /// server-side. The orchestrator converts this into the paywall, never
    /// into an error banner.
    #[error("Payment required: free conversions are used up and no paid balance remains")]
    PaymentRequired,

    /// The compression call failed for any reason other than 402 (network
    /// error, non-2xx status, unreadable body). Retryable by re-invoking
    /// the attempt; no entitlement was consumed.
    #[error("Conversion failed: {reason}\nCheck your connection and try again.")]
    ConversionFailed { reason: String },

    // ── Quota errors ──────────────────────────────────────────────────────
    /// The free-quota source could not be reached or returned garbage.
    /// Non-fatal: the ledger keeps its last known mirror value.
    #[error("Could not refresh free quota: {reason}")]
    QuotaUnavailable { reason: String },

    // ── Payment errors ────────────────────────────────────────────────────
    /// Order creation failed, or the payment widget is not ready yet.
    /// The user stays where they are and may retry the purchase.
    #[error("Payment could not be started: {reason}\nPlease try again.")]
    PaymentInitFailed { reason: String },

    /// The external checkout widget reported a failure (not a cancellation).
    #[error("Checkout failed: {reason}")]
    CheckoutFailed { reason: String },

    /// The verification endpoint answered `success=false`: the order was
    /// not paid. No entitlement is granted and the paywall remains open.
    #[error("Payment verification failed: the order was not confirmed as paid")]
    PaymentVerificationFailed,

    // ── Referral errors ───────────────────────────────────────────────────
    /// The referral credit call failed. Best-effort only: logged and
    /// swallowed by the orchestrator, never shown to the user.
    #[error("Referral credit failed: {reason}")]
    ReferralCreditFailed { reason: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The durable identity store could not be read or written.
    #[error("Identity store failed: {reason}")]
    StoreFailed { reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DocfitError {
    /// True for failures the user can meaningfully retry by repeating the
    /// same action (the crate itself never retries anything).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DocfitError::ConversionFailed { .. }
                | DocfitError::QuotaUnavailable { .. }
                | DocfitError::PaymentInitFailed { .. }
                | DocfitError::CheckoutFailed { .. }
        )
    }
}
