//! The payment round-trip: order → checkout → verify → grant.
//!
//! The external checkout widget is callback-shaped in the browser; here it
//! is modelled as a suspend-until-settled operation returning a
//! discriminated [`CheckoutOutcome`], so the whole flow reads top-to-bottom
//! and tests drive it synchronously.
//!
//! Coupling with the rest of the client is deliberately narrow: a
//! successful verification calls [`EntitlementLedger::grant`] and nothing
//! else; a cancelled or failed checkout leaves every piece of state exactly
//! where it was (the user remains on the paywall).

use crate::entitlement::{AccessCredential, EntitlementLedger};
use crate::error::DocfitError;
use crate::remote::{CheckoutWidget, PaymentGateway};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

// ── Plans ────────────────────────────────────────────────────────────────

/// The two purchasable plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// ₹15 — next 6 documents.
    Student,
    /// ₹49 — 50 documents.
    Cafe,
}

impl Plan {
    /// Wire identifier used by the order and verify endpoints.
    pub fn id(&self) -> &'static str {
        match self {
            Plan::Student => "student",
            Plan::Cafe => "cafe",
        }
    }

    /// Price in rupees, for display.
    pub fn price_inr(&self) -> u32 {
        match self {
            Plan::Student => 15,
            Plan::Cafe => 49,
        }
    }

    /// The plan's document allotment.
    ///
    /// The verify endpoint reports the authoritative number; this value is
    /// the fallback when the response omits it.
    pub fn docs_allowed(&self) -> u32 {
        match self {
            Plan::Student => 6,
            Plan::Cafe => 50,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Plan::Student),
            "cafe" => Ok(Plan::Cafe),
            other => Err(format!("unknown plan '{other}' (expected 'student' or 'cafe')")),
        }
    }
}

// ── Round-trip value types ───────────────────────────────────────────────

/// A created order, ready to hand to the checkout widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub payment_session_id: String,
}

/// Terminal outcome reported by the external checkout widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// The widget closed after a payment interaction. `has_payment_details`
    /// is the widget's presence flag; without it no verification is
    /// attempted (the widget settled without an actual payment).
    Completed { has_payment_details: bool },
    /// The user dismissed the widget.
    Cancelled,
    /// The widget itself failed.
    Failed { reason: String },
}

/// Result of the server-side verification call.
#[derive(Debug, Clone)]
pub struct Verification {
    pub success: bool,
    pub credential: Option<AccessCredential>,
    pub docs_allowed: Option<u32>,
}

/// What a completed purchase attempt amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// Verified and granted: the ledger now carries `docs` paid documents.
    Granted { docs: u32 },
    /// The user backed out (or the widget settled without payment details).
    /// Nothing changed.
    Cancelled,
}

// ── Flow ─────────────────────────────────────────────────────────────────

/// Drives one plan purchase end to end.
pub struct PaymentFlow {
    gateway: Arc<dyn PaymentGateway>,
    widget: Arc<dyn CheckoutWidget>,
}

impl PaymentFlow {
    pub fn new(gateway: Arc<dyn PaymentGateway>, widget: Arc<dyn CheckoutWidget>) -> Self {
        Self { gateway, widget }
    }

    /// Run order creation, checkout, and verification for `plan`.
    ///
    /// On verified success the grant is applied to `ledger` before
    /// returning. Errors are non-fatal to the rest of the client: the
    /// caller surfaces them and the user may retry the purchase.
    ///
    /// # Errors
    /// - [`DocfitError::PaymentInitFailed`] — order creation failed
    /// - [`DocfitError::CheckoutFailed`] — the widget reported a failure
    /// - [`DocfitError::PaymentVerificationFailed`] — the order was not paid
    pub async fn purchase(
        &self,
        plan: Plan,
        ledger: &mut EntitlementLedger,
    ) -> Result<PurchaseOutcome, DocfitError> {
        info!(plan = %plan, "starting purchase");
        let order = self.gateway.create_order(plan).await?;

        match self.widget.checkout(&order.payment_session_id).await {
            CheckoutOutcome::Completed {
                has_payment_details: true,
            } => {}
            CheckoutOutcome::Completed {
                has_payment_details: false,
            } => {
                // Settled without payment details: nothing to verify.
                info!(order = %order.order_id, "checkout settled without payment details");
                return Ok(PurchaseOutcome::Cancelled);
            }
            CheckoutOutcome::Cancelled => {
                info!(order = %order.order_id, "checkout cancelled by user");
                return Ok(PurchaseOutcome::Cancelled);
            }
            CheckoutOutcome::Failed { reason } => {
                warn!(order = %order.order_id, reason = %reason, "checkout failed");
                return Err(DocfitError::CheckoutFailed { reason });
            }
        }

        let verification = self.gateway.verify(&order.order_id, plan).await?;
        if !verification.success {
            warn!(order = %order.order_id, "verification declined");
            return Err(DocfitError::PaymentVerificationFailed);
        }

        // The backend may omit the credential; the literal access token it
        // historically accepted is the fallback.
        let credential = verification
            .credential
            .unwrap_or_else(|| AccessCredential("paid".to_string()));
        let docs = verification.docs_allowed.unwrap_or_else(|| plan.docs_allowed());
        ledger.grant(plan.id(), docs, credential);
        Ok(PurchaseOutcome::Granted { docs })
    }
}
