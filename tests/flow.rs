//! Integration tests for the conversion/entitlement flow.
//!
//! The orchestrator is driven end to end against in-memory fakes for every
//! collaborator, so each test controls quota, compression outcomes, and
//! payment verdicts precisely and asserts what was (and was not) called.

use async_trait::async_trait;
use docfit::{
    find_kind, AccessCredential, CheckoutOutcome, CheckoutWidget, CompressionService,
    DocfitError, DocumentKind, FlowState, MediaClass, MemoryIdentityStore, Orchestrator, Order,
    PaymentFlow, PaymentGateway, Plan, PurchaseOutcome, QuotaSource, ReferralService,
    ReferralTracker, UploadFile, Verification,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeQuota {
    remaining: Mutex<u32>,
    calls: AtomicU32,
}

impl FakeQuota {
    fn with(remaining: u32) -> Arc<Self> {
        Arc::new(Self {
            remaining: Mutex::new(remaining),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuotaSource for FakeQuota {
    async fn remaining(&self, _identity: &str) -> Result<u32, DocfitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.remaining.lock().unwrap())
    }
}

/// What the fake compressor should do on the next call.
#[derive(Clone)]
enum Compression {
    Succeed,
    PaymentRequired,
    Fail,
}

struct FakeCompressor {
    behavior: Mutex<Compression>,
    calls: AtomicU32,
    last_credential: Mutex<Option<String>>,
}

impl FakeCompressor {
    fn with(behavior: Compression) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            calls: AtomicU32::new(0),
            last_credential: Mutex::new(None),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn set(&self, behavior: Compression) {
        *self.behavior.lock().unwrap() = behavior;
    }
}

#[async_trait]
impl CompressionService for FakeCompressor {
    async fn compress(
        &self,
        _media: MediaClass,
        file: &UploadFile,
        credential: Option<&AccessCredential>,
    ) -> Result<Vec<u8>, DocfitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_credential.lock().unwrap() = credential.map(|c| c.as_str().to_string());
        match self.behavior.lock().unwrap().clone() {
            // "Compressed" output: first half of the input.
            Compression::Succeed => Ok(file.bytes[..file.bytes.len() / 2].to_vec()),
            Compression::PaymentRequired => Err(DocfitError::PaymentRequired),
            Compression::Fail => Err(DocfitError::ConversionFailed {
                reason: "HTTP 500".into(),
            }),
        }
    }
}

struct FakeGateway {
    verify_success: bool,
    verify_calls: AtomicU32,
}

impl FakeGateway {
    fn with(verify_success: bool) -> Arc<Self> {
        Arc::new(Self {
            verify_success,
            verify_calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, plan: Plan) -> Result<Order, DocfitError> {
        Ok(Order {
            order_id: format!("order_{}", plan.id()),
            payment_session_id: "session_1".into(),
        })
    }

    async fn verify(&self, _order_id: &str, plan: Plan) -> Result<Verification, DocfitError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.verify_success {
            Ok(Verification {
                success: true,
                credential: Some(AccessCredential("cred-xyz".into())),
                docs_allowed: Some(plan.docs_allowed()),
            })
        } else {
            Ok(Verification {
                success: false,
                credential: None,
                docs_allowed: None,
            })
        }
    }
}

struct BrokenGateway;

#[async_trait]
impl PaymentGateway for BrokenGateway {
    async fn create_order(&self, _plan: Plan) -> Result<Order, DocfitError> {
        Err(DocfitError::PaymentInitFailed {
            reason: "SDK still loading".into(),
        })
    }

    async fn verify(&self, _order_id: &str, _plan: Plan) -> Result<Verification, DocfitError> {
        unreachable!("verify must not be called when order creation failed");
    }
}

struct FakeWidget {
    outcome: CheckoutOutcome,
}

#[async_trait]
impl CheckoutWidget for FakeWidget {
    async fn checkout(&self, _payment_session_id: &str) -> CheckoutOutcome {
        self.outcome.clone()
    }
}

#[derive(Default)]
struct FakeReferral {
    calls: AtomicU32,
}

#[async_trait]
impl ReferralService for FakeReferral {
    async fn credit(&self, _code: &str) -> Result<(), DocfitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

struct Rig {
    quota: Arc<FakeQuota>,
    compressor: Arc<FakeCompressor>,
    referral: Arc<FakeReferral>,
    flow: Orchestrator,
}

fn rig(remaining: u32, compression: Compression) -> Rig {
    rig_with_payment(remaining, compression, true, checkout_completed())
}

fn checkout_completed() -> CheckoutOutcome {
    CheckoutOutcome::Completed {
        has_payment_details: true,
    }
}

fn rig_with_payment(
    remaining: u32,
    compression: Compression,
    verify_success: bool,
    checkout: CheckoutOutcome,
) -> Rig {
    rig_with_referral(remaining, compression, verify_success, checkout, None)
}

fn rig_with_referral(
    remaining: u32,
    compression: Compression,
    verify_success: bool,
    checkout: CheckoutOutcome,
    inbound: Option<&str>,
) -> Rig {
    let quota = FakeQuota::with(remaining);
    let compressor = FakeCompressor::with(compression);
    let referral_service = Arc::new(FakeReferral::default());
    let tracker = ReferralTracker::load(Box::new(MemoryIdentityStore::new()), inbound).unwrap();
    let payment = PaymentFlow::new(
        FakeGateway::with(verify_success),
        Arc::new(FakeWidget { outcome: checkout }),
    );
    let flow = Orchestrator::new(
        quota.clone(),
        compressor.clone(),
        referral_service.clone(),
        payment,
        tracker,
    );
    Rig {
        quota,
        compressor,
        referral: referral_service,
        flow,
    }
}

fn pdf_kind() -> &'static DocumentKind {
    find_kind("pdf1").expect("catalog has pdf1")
}

fn photo_kind() -> &'static DocumentKind {
    find_kind("photo").expect("catalog has photo")
}

/// An oversized PDF file (400 KiB > 300 KiB ceiling).
fn big_pdf() -> UploadFile {
    UploadFile::new("doc.pdf", vec![0u8; 400 * 1024], "application/pdf")
}

/// A 40 KiB image, under the 50 KiB ceiling.
fn small_photo() -> UploadFile {
    UploadFile::new("photo.jpg", vec![0u8; 40 * 1024], "image/jpeg")
}

// ── Already-small bypass ─────────────────────────────────────────────────

#[tokio::test]
async fn small_file_bypasses_compression_and_consumes_nothing() {
    let mut r = rig(2, Compression::Succeed);
    r.flow.refresh_quota().await.unwrap();
    let quota_calls_before = r.quota.calls();

    r.flow.select_document(photo_kind());
    r.flow.select_file(small_photo());
    let state = r.flow.attempt_convert().await;

    assert_eq!(state, FlowState::Done);
    let result = r.flow.result().unwrap();
    assert!(!result.compressed);
    assert_eq!(result.byte_len, 40 * 1024);
    assert_eq!(result.bytes.len(), 40 * 1024, "bytes pass through unchanged");

    assert_eq!(r.compressor.calls(), 0, "no conversion HTTP call");
    assert_eq!(
        r.quota.calls(),
        quota_calls_before + 1,
        "display-only refresh is issued"
    );
    assert_eq!(r.flow.ledger().free_remaining(), 2, "free mirror unchanged");
    assert_eq!(r.flow.ledger().paid_balance(), 0);
    assert!(r.flow.is_completed("photo"));
}

#[tokio::test]
async fn file_exactly_at_ceiling_is_within_limits() {
    let mut r = rig(1, Compression::Succeed);
    r.flow.refresh_quota().await.unwrap();

    r.flow.select_document(photo_kind());
    r.flow
        .select_file(UploadFile::new("p.jpg", vec![0u8; 50 * 1024], "image/jpeg"));
    let state = r.flow.attempt_convert().await;

    assert_eq!(state, FlowState::Done);
    assert!(!r.flow.result().unwrap().compressed);
    assert_eq!(r.compressor.calls(), 0);
}

// ── Admission ────────────────────────────────────────────────────────────

#[tokio::test]
async fn exhausted_entitlement_blocks_without_network() {
    let mut r = rig(0, Compression::Succeed);
    // freeRemaining = 0, paidBalance = 0, oversized PDF.
    r.flow.refresh_quota().await.unwrap();

    r.flow.select_document(pdf_kind());
    r.flow.select_file(big_pdf());
    let state = r.flow.attempt_convert().await;

    assert_eq!(state, FlowState::Blocked);
    assert!(r.flow.paywall_open());
    assert_eq!(r.compressor.calls(), 0, "blocked attempt issues no HTTP call");
    assert!(r.flow.result().is_none());
}

#[tokio::test]
async fn attempt_without_file_is_noop() {
    let mut r = rig(2, Compression::Succeed);
    r.flow.select_document(pdf_kind());
    let state = r.flow.attempt_convert().await;
    assert_eq!(state, FlowState::Selected);
    assert_eq!(r.compressor.calls(), 0);
}

// ── Free path ────────────────────────────────────────────────────────────

#[tokio::test]
async fn free_conversion_compresses_and_refreshes_quota() {
    let mut r = rig(2, Compression::Succeed);
    r.flow.refresh_quota().await.unwrap();
    assert_eq!(r.quota.calls(), 1);

    r.flow.select_document(pdf_kind());
    r.flow.select_file(big_pdf());
    let state = r.flow.attempt_convert().await;

    assert_eq!(state, FlowState::Done);
    let result = r.flow.result().unwrap();
    assert!(result.compressed);
    assert_eq!(result.byte_len, 200 * 1024, "fake halves the input");
    assert_eq!(result.filename, "compressed.pdf");

    assert_eq!(r.quota.calls(), 2, "free success triggers a quota refresh");
    assert_eq!(r.flow.ledger().paid_balance(), 0, "paid untouched on free path");
    // No credential existed, so none was attached.
    assert!(r.compressor.last_credential.lock().unwrap().is_none());
}

// ── Paid path ────────────────────────────────────────────────────────────

#[tokio::test]
async fn paid_conversion_debits_one_and_attaches_credential() {
    let mut r = rig(0, Compression::Succeed);
    r.flow.refresh_quota().await.unwrap();

    // Purchase the student plan: 6 documents.
    let outcome = r.flow.purchase(Plan::Student).await.unwrap();
    assert_eq!(outcome, PurchaseOutcome::Granted { docs: 6 });
    assert_eq!(r.flow.ledger().paid_balance(), 6);
    let quota_calls_before = r.quota.calls();

    r.flow.select_document(pdf_kind());
    r.flow.select_file(big_pdf());
    let state = r.flow.attempt_convert().await;

    assert_eq!(state, FlowState::Done);
    assert!(r.flow.result().unwrap().compressed);
    assert_eq!(r.flow.ledger().paid_balance(), 5, "exactly one unit debited");
    assert_eq!(
        r.quota.calls(),
        quota_calls_before,
        "paid path does not refresh the free quota"
    );
    assert_eq!(
        r.compressor.last_credential.lock().unwrap().as_deref(),
        Some("cred-xyz"),
        "bearer credential attached on paid attempts"
    );
}

// ── Mid-conversion 402 ───────────────────────────────────────────────────

#[tokio::test]
async fn http_402_blocks_and_leaves_balances_unchanged() {
    let mut r = rig(1, Compression::PaymentRequired);
    r.flow.refresh_quota().await.unwrap();

    r.flow.select_document(pdf_kind());
    r.flow.select_file(big_pdf());
    let state = r.flow.attempt_convert().await;

    assert_eq!(state, FlowState::Blocked);
    assert!(r.flow.result().is_none(), "partial result discarded");
    assert_eq!(r.flow.ledger().free_remaining(), 1);
    assert_eq!(r.flow.ledger().paid_balance(), 0);
}

// ── Failure and retry ────────────────────────────────────────────────────

#[tokio::test]
async fn conversion_failure_debits_nothing_and_retry_works() {
    let mut r = rig(2, Compression::Fail);
    r.flow.refresh_quota().await.unwrap();
    let quota_calls_before = r.quota.calls();

    r.flow.select_document(pdf_kind());
    r.flow.select_file(big_pdf());
    let state = r.flow.attempt_convert().await;

    assert_eq!(state, FlowState::Failed);
    assert!(matches!(
        r.flow.last_error(),
        Some(DocfitError::ConversionFailed { .. })
    ));
    assert_eq!(r.quota.calls(), quota_calls_before, "no refresh on failure");
    assert_eq!(r.flow.ledger().paid_balance(), 0);

    // User-initiated retry after the server recovers.
    r.compressor.set(Compression::Succeed);
    let state = r.flow.attempt_convert().await;
    assert_eq!(state, FlowState::Done);
    assert!(r.flow.last_error().is_none());
}

// ── Payment round-trip ───────────────────────────────────────────────────

#[tokio::test]
async fn grant_is_overwrite_not_additive() {
    let mut r = rig(0, Compression::Succeed);
    r.flow.purchase(Plan::Student).await.unwrap();
    r.flow.purchase(Plan::Student).await.unwrap();
    assert_eq!(r.flow.ledger().paid_balance(), 6, "second grant resets, not 12");
}

#[tokio::test]
async fn verification_failure_grants_nothing_and_keeps_paywall() {
    let mut r = rig_with_payment(0, Compression::Succeed, false, checkout_completed());
    r.flow.refresh_quota().await.unwrap();

    // Land on the paywall first.
    r.flow.select_document(pdf_kind());
    r.flow.select_file(big_pdf());
    assert_eq!(r.flow.attempt_convert().await, FlowState::Blocked);

    let err = r.flow.purchase(Plan::Student).await.unwrap_err();
    assert!(matches!(err, DocfitError::PaymentVerificationFailed));
    assert!(r.flow.paywall_open(), "paywall stays open");
    assert_eq!(r.flow.ledger().paid_balance(), 0);
}

#[tokio::test]
async fn checkout_cancellation_changes_nothing() {
    let mut r = rig_with_payment(0, Compression::Succeed, true, CheckoutOutcome::Cancelled);
    r.flow.select_document(pdf_kind());
    r.flow.select_file(big_pdf());
    assert_eq!(r.flow.attempt_convert().await, FlowState::Blocked);

    let outcome = r.flow.purchase(Plan::Cafe).await.unwrap();
    assert_eq!(outcome, PurchaseOutcome::Cancelled);
    assert!(r.flow.paywall_open());
    assert_eq!(r.flow.ledger().paid_balance(), 0);
}

#[tokio::test]
async fn checkout_without_payment_details_is_a_cancellation() {
    let mut r = rig_with_payment(
        0,
        Compression::Succeed,
        true,
        CheckoutOutcome::Completed {
            has_payment_details: false,
        },
    );
    let outcome = r.flow.purchase(Plan::Student).await.unwrap();
    assert_eq!(outcome, PurchaseOutcome::Cancelled);
    assert_eq!(r.flow.ledger().paid_balance(), 0);
}

#[tokio::test]
async fn payment_init_failure_is_surfaced_and_retryable() {
    let tracker = ReferralTracker::load(Box::new(MemoryIdentityStore::new()), None).unwrap();
    let payment = PaymentFlow::new(
        Arc::new(BrokenGateway),
        Arc::new(FakeWidget {
            outcome: checkout_completed(),
        }),
    );
    let mut flow = Orchestrator::new(
        FakeQuota::with(0),
        FakeCompressor::with(Compression::Succeed),
        Arc::new(FakeReferral::default()),
        payment,
        tracker,
    );

    let err = flow.purchase(Plan::Student).await.unwrap_err();
    assert!(matches!(err, DocfitError::PaymentInitFailed { .. }));
    assert!(err.is_retryable());
    assert_eq!(flow.ledger().paid_balance(), 0);
}

#[tokio::test]
async fn purchase_clears_paywall_back_to_selected() {
    let mut r = rig(0, Compression::Succeed);
    r.flow.refresh_quota().await.unwrap();
    r.flow.select_document(pdf_kind());
    r.flow.select_file(big_pdf());
    assert_eq!(r.flow.attempt_convert().await, FlowState::Blocked);

    r.flow.purchase(Plan::Student).await.unwrap();
    assert_eq!(r.flow.state(), FlowState::Selected, "paywall cleared");

    // The retained file converts on the paid tab.
    assert_eq!(r.flow.attempt_convert().await, FlowState::Done);
    assert_eq!(r.flow.ledger().paid_balance(), 5);
}

// ── Referral ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn referral_credit_fires_once_across_conversions() {
    let mut r = rig_with_referral(
        5,
        Compression::Succeed,
        true,
        checkout_completed(),
        Some("inviter-code"),
    );
    r.flow.refresh_quota().await.unwrap();

    r.flow.select_document(pdf_kind());
    r.flow.select_file(big_pdf());
    assert_eq!(r.flow.attempt_convert().await, FlowState::Done);
    assert_eq!(r.referral.calls.load(Ordering::SeqCst), 1);

    // A second successful conversion must not credit again.
    r.flow.select_file(big_pdf());
    assert_eq!(r.flow.attempt_convert().await, FlowState::Done);
    assert_eq!(r.referral.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn referral_not_credited_on_bypass_path() {
    let mut r = rig_with_referral(
        5,
        Compression::Succeed,
        true,
        checkout_completed(),
        Some("inviter-code"),
    );
    r.flow.refresh_quota().await.unwrap();

    r.flow.select_document(photo_kind());
    r.flow.select_file(small_photo());
    assert_eq!(r.flow.attempt_convert().await, FlowState::Done);
    assert_eq!(
        r.referral.calls.load(Ordering::SeqCst),
        0,
        "bypass path never credits"
    );
    assert!(r.flow.referral().has_pending(), "pending code survives");
}

// ── State machine housekeeping ───────────────────────────────────────────

#[tokio::test]
async fn reselect_clears_previous_result() {
    let mut r = rig(5, Compression::Succeed);
    r.flow.refresh_quota().await.unwrap();

    r.flow.select_document(pdf_kind());
    r.flow.select_file(big_pdf());
    r.flow.attempt_convert().await;
    assert!(r.flow.result().is_some());

    r.flow.select_document(photo_kind());
    assert_eq!(r.flow.state(), FlowState::Selected);
    assert!(r.flow.result().is_none());
    assert!(r.flow.last_error().is_none());
}

#[tokio::test]
async fn reset_returns_to_idle_but_keeps_entitlement() {
    let mut r = rig(0, Compression::Succeed);
    r.flow.purchase(Plan::Cafe).await.unwrap();

    r.flow.select_document(pdf_kind());
    r.flow.select_file(big_pdf());
    r.flow.attempt_convert().await;

    r.flow.reset();
    assert_eq!(r.flow.state(), FlowState::Idle);
    assert!(r.flow.selected().is_none());
    assert!(r.flow.result().is_none());
    assert_eq!(r.flow.ledger().paid_balance(), 49, "entitlement survives reset");
    assert!(r.flow.is_completed("pdf1"), "completion markers survive reset");
}
