//! # docfit
//!
//! Client-side conversion and entitlement orchestrator for portal document
//! resizing.
//!
//! Government portals reject uploads above a fixed byte budget (300 KiB
//! for PDFs, 50 KiB for photos and signatures). docfit is the client half
//! of a service that resizes documents to fit: it decides per attempt
//! whether a conversion is allowed, whether compression is even needed,
//! how the free quota and paid balance are debited, and how a payment
//! round-trip turns into usable entitlement. The actual compression runs
//! server-side; every collaborator sits behind a trait seam.
//!
//! ## Flow Overview
//!
//! ```text
//! select kind ─ select file ─ attempt
//!                                │
//!                ┌── no entitlement ──→ Blocked (paywall)
//!                ├── already ≤ ceiling → Done   (nothing consumed)
//!                └── compress via server
//!                        ├─ 402  → Blocked
//!                        ├─ ok   → Done (debit paid | refresh free,
//!                        │               one-shot referral credit)
//!                        └─ else → Failed (retryable, nothing debited)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docfit::{
//!     find_kind, MemoryIdentityStore, Orchestrator, PaymentFlow, PortalApi,
//!     PortalConfig, ReferralTracker, UploadFile,
//! };
//! use std::sync::Arc;
//!
//! # use docfit::{CheckoutOutcome, CheckoutWidget};
//! # struct NoWidget;
//! # #[async_trait::async_trait]
//! # impl CheckoutWidget for NoWidget {
//! #     async fn checkout(&self, _s: &str) -> CheckoutOutcome { CheckoutOutcome::Cancelled }
//! # }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PortalConfig::default();
//!     let api = Arc::new(PortalApi::new(&config)?);
//!     let referral = ReferralTracker::load(Box::new(MemoryIdentityStore::new()), None)?;
//!     let payment = PaymentFlow::new(api.clone(), Arc::new(NoWidget));
//!
//!     let mut flow = Orchestrator::new(api.clone(), api.clone(), api, payment, referral);
//!     flow.refresh_quota().await.ok();
//!
//!     let kind = find_kind("pdf1").unwrap();
//!     flow.select_document(kind);
//!     flow.select_file(UploadFile::new(
//!         "admit.pdf",
//!         std::fs::read("admit.pdf")?,
//!         "application/pdf",
//!     ));
//!     flow.attempt_convert().await;
//!     if let Some(result) = flow.result() {
//!         std::fs::write(&result.filename, &result.bytes)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docfit` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod payment;
pub mod referral;
pub mod remote;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use catalog::{decide, find_kind, DocumentKind, Locale, MediaClass, SizeDecision, CATALOG};
pub use config::{PortalConfig, PortalConfigBuilder};
pub use entitlement::{AccessCredential, EntitlementLedger};
pub use error::DocfitError;
pub use identity::{FsIdentityStore, IdentityStore, MemoryIdentityStore};
pub use orchestrator::{FlowState, Orchestrator};
pub use payment::{CheckoutOutcome, Order, PaymentFlow, Plan, PurchaseOutcome, Verification};
pub use referral::ReferralTracker;
pub use remote::{
    CheckoutWidget, CompressionService, PaymentGateway, PortalApi, QuotaSource, ReferralService,
};
pub use upload::{ConversionResult, UploadAttempt, UploadFile};
