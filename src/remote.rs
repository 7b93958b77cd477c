//! Collaborator seams and the production HTTP client.
//!
//! Every network dependency of the orchestrator sits behind a small async
//! trait so tests can drive the state machine with in-memory fakes and
//! hosts can substitute their own transport. [`PortalApi`] is the real
//! implementation over `reqwest`, speaking the portal backend's wire
//! contracts:
//!
//! * `GET  /check-limit?identity=<code>`   → `{ remaining }`
//! * `POST /convert/{pdf|photo|signature}` → artifact bytes | 402 | error
//! * `POST /payment/create-order?plan=<id>`→ `{ order_id, payment_session_id }`
//! * `POST /payment/verify`                → `{ success, credential?, docs_allowed? }`
//! * `POST /referral/credit?code=<code>`   → acknowledgement only
//!
//! `PortalApi` deliberately does not implement [`CheckoutWidget`]: checkout
//! is an external UI owned by the payment provider, so the host injects it.

use crate::catalog::MediaClass;
use crate::config::PortalConfig;
use crate::entitlement::AccessCredential;
use crate::error::DocfitError;
use crate::payment::{CheckoutOutcome, Order, Plan, Verification};
use crate::upload::UploadFile;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

// ── Trait seams ──────────────────────────────────────────────────────────

/// Read-only source of the server-tracked free-conversion count.
#[async_trait]
pub trait QuotaSource: Send + Sync {
    /// Remaining free conversions for the given client identity.
    async fn remaining(&self, identity: &str) -> Result<u32, DocfitError>;
}

/// The server-side compression collaborator.
#[async_trait]
pub trait CompressionService: Send + Sync {
    /// Compress `file` down to the ceiling of its media class.
    ///
    /// Returns the converted artifact bytes. A 402 from the server maps to
    /// [`DocfitError::PaymentRequired`]; every other failure maps to
    /// [`DocfitError::ConversionFailed`].
    async fn compress(
        &self,
        media: MediaClass,
        file: &UploadFile,
        credential: Option<&AccessCredential>,
    ) -> Result<Vec<u8>, DocfitError>;
}

/// Order creation and server-side payment verification.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, plan: Plan) -> Result<Order, DocfitError>;
    async fn verify(&self, order_id: &str, plan: Plan) -> Result<Verification, DocfitError>;
}

/// The external checkout UI, modelled as suspend-until-settled.
///
/// Infallible at the type level: every terminal outcome (including "the
/// widget blew up") is a [`CheckoutOutcome`] variant, so the payment flow
/// stays an enumerable state machine.
#[async_trait]
pub trait CheckoutWidget: Send + Sync {
    async fn checkout(&self, payment_session_id: &str) -> CheckoutOutcome;
}

/// Fire-and-forget referral credit.
#[async_trait]
pub trait ReferralService: Send + Sync {
    async fn credit(&self, code: &str) -> Result<(), DocfitError>;
}

// ── Wire DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct QuotaResponse {
    remaining: u32,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    order_id: String,
    payment_session_id: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(default)]
    credential: Option<String>,
    #[serde(default)]
    docs_allowed: Option<u32>,
}

// ── Production client ────────────────────────────────────────────────────

/// reqwest-backed implementation of all portal collaborators.
pub struct PortalApi {
    /// Client for small JSON calls.
    http: reqwest::Client,
    /// Client for the conversion round-trip, with a much larger timeout.
    convert_http: reqwest::Client,
    base_url: String,
}

impl PortalApi {
    /// Build a client from the given configuration.
    pub fn new(config: &PortalConfig) -> Result<Self, DocfitError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| DocfitError::InvalidConfig(format!("HTTP client: {e}")))?;
        let convert_http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.convert_timeout_secs))
            .build()
            .map_err(|e| DocfitError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            convert_http,
            base_url: config.base_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl QuotaSource for PortalApi {
    async fn remaining(&self, identity: &str) -> Result<u32, DocfitError> {
        let resp = self
            .http
            .get(self.url("check-limit"))
            .query(&[("identity", identity)])
            .send()
            .await
            .map_err(|e| DocfitError::QuotaUnavailable { reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(DocfitError::QuotaUnavailable {
                reason: format!("HTTP {}", resp.status()),
            });
        }

        let quota: QuotaResponse = resp
            .json()
            .await
            .map_err(|e| DocfitError::QuotaUnavailable { reason: e.to_string() })?;
        debug!(remaining = quota.remaining, "quota fetched");
        Ok(quota.remaining)
    }
}

#[async_trait]
impl CompressionService for PortalApi {
    async fn compress(
        &self,
        media: MediaClass,
        file: &UploadFile,
        credential: Option<&AccessCredential>,
    ) -> Result<Vec<u8>, DocfitError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| DocfitError::ConversionFailed {
                reason: format!("invalid MIME type '{}': {e}", file.mime),
            })?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut req = self
            .convert_http
            .post(self.url(&format!("convert/{}", media.endpoint_segment())))
            .multipart(form);
        if let Some(cred) = credential {
            req = req.bearer_auth(cred.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| DocfitError::ConversionFailed { reason: e.to_string() })?;

        let status = resp.status();
        if status == reqwest::StatusCode::PAYMENT_REQUIRED {
            return Err(DocfitError::PaymentRequired);
        }
        if !status.is_success() {
            return Err(DocfitError::ConversionFailed {
                reason: format!("HTTP {status}"),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| DocfitError::ConversionFailed { reason: e.to_string() })?;
        debug!(media = %media, out_bytes = bytes.len(), "conversion artifact received");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PaymentGateway for PortalApi {
    async fn create_order(&self, plan: Plan) -> Result<Order, DocfitError> {
        let resp = self
            .http
            .post(self.url("payment/create-order"))
            .query(&[("plan", plan.id())])
            .send()
            .await
            .map_err(|e| DocfitError::PaymentInitFailed { reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(DocfitError::PaymentInitFailed {
                reason: format!("HTTP {}", resp.status()),
            });
        }

        let order: OrderResponse = resp
            .json()
            .await
            .map_err(|e| DocfitError::PaymentInitFailed { reason: e.to_string() })?;
        Ok(Order {
            order_id: order.order_id,
            payment_session_id: order.payment_session_id,
        })
    }

    async fn verify(&self, order_id: &str, plan: Plan) -> Result<Verification, DocfitError> {
        let resp = self
            .http
            .post(self.url("payment/verify"))
            .json(&serde_json::json!({ "order_id": order_id, "plan": plan.id() }))
            .send()
            .await
            .map_err(|e| DocfitError::PaymentInitFailed { reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(DocfitError::PaymentInitFailed {
                reason: format!("HTTP {}", resp.status()),
            });
        }

        let v: VerifyResponse = resp
            .json()
            .await
            .map_err(|e| DocfitError::PaymentInitFailed { reason: e.to_string() })?;
        Ok(Verification {
            success: v.success,
            credential: v.credential.map(AccessCredential),
            docs_allowed: v.docs_allowed,
        })
    }
}

#[async_trait]
impl ReferralService for PortalApi {
    async fn credit(&self, code: &str) -> Result<(), DocfitError> {
        let resp = self
            .http
            .post(self.url("referral/credit"))
            .query(&[("code", code)])
            .send()
            .await
            .map_err(|e| DocfitError::ReferralCreditFailed { reason: e.to_string() })?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "referral credit rejected");
            return Err(DocfitError::ReferralCreditFailed {
                reason: format!("HTTP {}", resp.status()),
            });
        }
        Ok(())
    }
}
