//! The conversion state machine.
//!
//! One attempt walks `Idle → Selected → Attempting → {Done, Blocked,
//! Failed}`; every terminal state can go back to `Selected` (new file or
//! retry) or to `Idle` (full reset). The machine owns the entitlement
//! ledger and the referral tracker, and talks to every collaborator
//! through the trait seams in [`crate::remote`].
//!
//! Ordering guarantees (single-threaded, cooperative): within one
//! [`Orchestrator::attempt_convert`] the admission check strictly precedes
//! any network call — a blocked attempt issues none. The free-quota mirror
//! is refreshed after successes, never before admission, so two rapid
//! attempts can race a stale mirror; the server enforces the limit
//! authoritatively.
//! In-flight calls are never cancelled: re-selecting a document or file
//! simply discards interest in the previous result (last state wins).

use crate::catalog::DocumentKind;
use crate::entitlement::EntitlementLedger;
use crate::error::DocfitError;
use crate::payment::{PaymentFlow, Plan, PurchaseOutcome};
use crate::referral::ReferralTracker;
use crate::remote::{CompressionService, QuotaSource, ReferralService};
use crate::upload::{ConversionResult, UploadAttempt, UploadFile};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the conversion flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    /// Nothing selected.
    #[default]
    Idle,
    /// A document kind (and possibly a file) is selected.
    Selected,
    /// A conversion attempt is in flight.
    Attempting,
    /// The last attempt produced a result.
    Done,
    /// Entitlement is exhausted — the paywall is showing.
    Blocked,
    /// The last attempt failed; a retry is possible.
    Failed,
}

/// The client-side conversion/entitlement orchestrator.
pub struct Orchestrator {
    quota: Arc<dyn QuotaSource>,
    compressor: Arc<dyn CompressionService>,
    referral_service: Arc<dyn ReferralService>,
    payment: PaymentFlow,

    ledger: EntitlementLedger,
    referral: ReferralTracker,

    state: FlowState,
    selected: Option<&'static DocumentKind>,
    attempt: Option<UploadAttempt>,
    result: Option<ConversionResult>,
    last_error: Option<DocfitError>,
    /// Kinds successfully converted this session. UI affordance only —
    /// never consulted for admission.
    completed: HashSet<&'static str>,
}

impl Orchestrator {
    pub fn new(
        quota: Arc<dyn QuotaSource>,
        compressor: Arc<dyn CompressionService>,
        referral_service: Arc<dyn ReferralService>,
        payment: PaymentFlow,
        referral: ReferralTracker,
    ) -> Self {
        Self {
            quota,
            compressor,
            referral_service,
            payment,
            ledger: EntitlementLedger::new(),
            referral,
            state: FlowState::Idle,
            selected: None,
            attempt: None,
            result: None,
            last_error: None,
            completed: HashSet::new(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn selected(&self) -> Option<&'static DocumentKind> {
        self.selected
    }

    pub fn result(&self) -> Option<&ConversionResult> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&DocfitError> {
        self.last_error.as_ref()
    }

    /// True while the paywall should be showing.
    pub fn paywall_open(&self) -> bool {
        self.state == FlowState::Blocked
    }

    /// Was this kind successfully converted during this session?
    pub fn is_completed(&self, kind_id: &str) -> bool {
        self.completed.contains(kind_id)
    }

    pub fn ledger(&self) -> &EntitlementLedger {
        &self.ledger
    }

    pub fn referral(&self) -> &ReferralTracker {
        &self.referral
    }

    // ── Transitions ──────────────────────────────────────────────────────

    /// Select a document kind. Any prior file, result, and error are
    /// cleared; the machine lands in `Selected` from anywhere.
    pub fn select_document(&mut self, kind: &'static DocumentKind) {
        debug!(kind = kind.id, "document selected");
        self.selected = Some(kind);
        self.attempt = None;
        self.result = None;
        self.last_error = None;
        self.state = FlowState::Selected;
    }

    /// Store a candidate file for the selected kind.
    ///
    /// Entitlement and size are *not* evaluated here — both are decided at
    /// the moment of the attempt. Without a selected kind this is a no-op.
    pub fn select_file(&mut self, file: UploadFile) {
        let Some(kind) = self.selected else {
            debug!("file ignored: no document kind selected");
            return;
        };
        debug!(kind = kind.id, bytes = file.byte_len(), "file selected");
        self.attempt = Some(UploadAttempt::new(kind, file));
        self.result = None;
        self.last_error = None;
        self.state = FlowState::Selected;
    }

    /// Run one conversion attempt. No-op unless a kind and file are set.
    ///
    /// Returns the state the machine landed in. Failures never escape as
    /// `Err`: they are folded into `Blocked`/`Failed` with the cause
    /// available via [`Orchestrator::last_error`].
    pub async fn attempt_convert(&mut self) -> FlowState {
        let (kind, within_ceiling, in_len) = match (self.selected, self.attempt.as_ref()) {
            (Some(k), Some(a)) => (k, a.within_ceiling(), a.file.byte_len()),
            _ => {
                debug!("attempt ignored: kind or file missing");
                return self.state;
            }
        };
        self.result = None;
        self.last_error = None;

        // ── Admission: checked now, not at render time ───────────────────
        if !self.ledger.may_attempt() {
            info!(kind = kind.id, "attempt blocked: no entitlement");
            self.state = FlowState::Blocked;
            return self.state;
        }
        self.state = FlowState::Attempting;

        // ── Already small: bypass, consuming nothing ─────────────────────
        if within_ceiling {
            let bytes = self
                .attempt
                .as_ref()
                .map(|a| a.file.bytes.clone())
                .unwrap_or_default();
            let filename = self
                .attempt
                .as_ref()
                .map(|a| a.file.name.clone())
                .unwrap_or_default();
            self.result = Some(ConversionResult {
                byte_len: bytes.len() as u64,
                bytes,
                compressed: false,
                filename,
            });
            self.completed.insert(kind.id);
            self.state = FlowState::Done;
            info!(
                target: "docfit::analytics",
                kind = kind.id,
                compressed = false,
                "conversion_complete"
            );
            // Display-only refresh: nothing was consumed, so the mirror is
            // not expected to change.
            if let Err(e) = self.refresh_quota().await {
                warn!(error = %e, "free-quota refresh failed after bypass");
            }
            return self.state;
        }

        // ── Compression round-trip ───────────────────────────────────────
        // Whether this attempt runs on the paid tab is fixed before the
        // call; the credential rides along whenever one exists.
        let used_paid = self.ledger.paid_balance() > 0;
        let credential = self.ledger.credential().cloned();
        let outcome = match self.attempt.as_ref() {
            Some(a) => {
                self.compressor
                    .compress(kind.media, &a.file, credential.as_ref())
                    .await
            }
            None => return self.state,
        };

        match outcome {
            Ok(bytes) => {
                info!(
                    kind = kind.id,
                    in_bytes = in_len,
                    out_bytes = bytes.len(),
                    paid = used_paid,
                    "conversion succeeded"
                );
                self.result = Some(ConversionResult {
                    byte_len: bytes.len() as u64,
                    bytes,
                    compressed: true,
                    filename: kind.media.output_filename().to_string(),
                });
                self.completed.insert(kind.id);
                self.state = FlowState::Done;

                if used_paid {
                    self.ledger.record_paid_conversion();
                } else if let Err(e) = self.refresh_quota().await {
                    // Stale mirror is acceptable; the server still enforces.
                    warn!(error = %e, "free-quota refresh failed after conversion");
                }

                info!(
                    target: "docfit::analytics",
                    kind = kind.id,
                    compressed = true,
                    "conversion_complete"
                );

                self.referral
                    .credit_if_pending(self.referral_service.as_ref())
                    .await;
            }
            Err(DocfitError::PaymentRequired) => {
                info!(kind = kind.id, "server demanded payment mid-conversion");
                self.state = FlowState::Blocked;
            }
            Err(e) => {
                warn!(kind = kind.id, error = %e, "conversion failed");
                self.last_error = Some(e);
                self.state = FlowState::Failed;
            }
        }
        self.state
    }

    /// Full reset: back to `Idle` with kind, file, result, and error
    /// cleared. The session's completion markers and entitlement survive.
    pub fn reset(&mut self) {
        debug!("flow reset");
        self.selected = None;
        self.attempt = None;
        self.result = None;
        self.last_error = None;
        self.state = FlowState::Idle;
    }

    // ── Collaborator-driven updates ──────────────────────────────────────

    /// Re-fetch the free-quota mirror from the quota source.
    ///
    /// Invoked by the host at startup and by the orchestrator after each
    /// free-path success. On failure the ledger keeps its last value.
    pub async fn refresh_quota(&mut self) -> Result<u32, DocfitError> {
        let remaining = self.quota.remaining(self.referral.code()).await?;
        self.ledger.set_free_remaining(remaining);
        Ok(remaining)
    }

    /// Drive a plan purchase. On a verified grant the paywall clears:
    /// `Blocked` returns to `Selected` when a kind is still selected, else
    /// to `Idle`.
    pub async fn purchase(&mut self, plan: Plan) -> Result<PurchaseOutcome, DocfitError> {
        let outcome = self.payment.purchase(plan, &mut self.ledger).await?;
        if matches!(outcome, PurchaseOutcome::Granted { .. }) && self.state == FlowState::Blocked {
            self.state = if self.selected.is_some() {
                FlowState::Selected
            } else {
                FlowState::Idle
            };
        }
        Ok(outcome)
    }
}
