//! The document catalog and the size policy.
//!
//! The portal accepts a fixed set of personal documents, each belonging to
//! one of three media classes. The class alone decides the byte ceiling the
//! portal enforces: 300 KiB for PDFs, 50 KiB for photos and signatures.
//! Everything here is static data plus pure decisions — no I/O, no failure
//! modes.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 300 KiB — the portal's ceiling for PDF documents.
pub const PDF_CEILING_BYTES: u64 = 300 * 1024;

/// 50 KiB — the portal's ceiling for photo and signature images.
pub const IMAGE_CEILING_BYTES: u64 = 50 * 1024;

// ── Media class ──────────────────────────────────────────────────────────

/// The three kinds of upload the portal distinguishes.
///
/// The media class selects the conversion endpoint, the byte ceiling, and
/// the output format the server produces (JPEG for photos, PNG for
/// signatures so transparency survives).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    Pdf,
    Photo,
    Signature,
}

impl MediaClass {
    /// Maximum permitted output size in bytes for this class.
    pub fn ceiling_bytes(&self) -> u64 {
        match self {
            MediaClass::Pdf => PDF_CEILING_BYTES,
            MediaClass::Photo | MediaClass::Signature => IMAGE_CEILING_BYTES,
        }
    }

    /// Path segment on the conversion endpoint: `convert/{segment}`.
    pub fn endpoint_segment(&self) -> &'static str {
        match self {
            MediaClass::Pdf => "pdf",
            MediaClass::Photo => "photo",
            MediaClass::Signature => "signature",
        }
    }

    /// Filename the server attaches to the converted artifact.
    pub fn output_filename(&self) -> &'static str {
        match self {
            MediaClass::Pdf => "compressed.pdf",
            MediaClass::Photo => "compressed.jpg",
            MediaClass::Signature => "compressed.png",
        }
    }

    /// MIME type of the converted artifact.
    pub fn output_mime(&self) -> &'static str {
        match self {
            MediaClass::Pdf => "application/pdf",
            MediaClass::Photo => "image/jpeg",
            MediaClass::Signature => "image/png",
        }
    }
}

impl fmt::Display for MediaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint_segment())
    }
}

// ── Size policy ──────────────────────────────────────────────────────────

/// Outcome of the size policy for one candidate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeDecision {
    /// Whether a compression round-trip is needed at all.
    pub required: bool,
    /// The ceiling that was applied, in bytes.
    pub ceiling: u64,
}

/// Decide whether a file of `byte_len` bytes needs compression for the
/// given media class.
///
/// Strict comparison: a file exactly at the ceiling is already within
/// limits and is passed through untouched (and without consuming any
/// entitlement — see the orchestrator).
pub fn decide(media: MediaClass, byte_len: u64) -> SizeDecision {
    let ceiling = media.ceiling_bytes();
    SizeDecision {
        required: byte_len > ceiling,
        ceiling,
    }
}

// ── Document catalog ─────────────────────────────────────────────────────

/// Display languages the portal serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Bn,
    Hi,
}

/// Display labels for one catalog entry, one per supported locale.
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    pub en: &'static str,
    pub bn: &'static str,
    pub hi: &'static str,
}

impl Labels {
    pub fn get(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => self.en,
            Locale::Bn => self.bn,
            Locale::Hi => self.hi,
        }
    }
}

/// One immutable entry of the portal's document catalog.
///
/// Static data: loaded once, never mutated. The `id` is the stable key
/// used in completion markers and the CLI.
#[derive(Debug, Clone, Copy)]
pub struct DocumentKind {
    pub id: &'static str,
    pub labels: Labels,
    pub media: MediaClass,
}

impl DocumentKind {
    /// Ceiling for this document, derived from its media class.
    pub fn ceiling_bytes(&self) -> u64 {
        self.media.ceiling_bytes()
    }

    /// Display label in the given locale.
    pub fn label(&self, locale: Locale) -> &'static str {
        self.labels.get(locale)
    }
}

/// The portal's eight document kinds.
pub static CATALOG: Lazy<Vec<DocumentKind>> = Lazy::new(|| {
    vec![
        DocumentKind {
            id: "pdf1",
            labels: Labels {
                en: "Madhyamik Admit Card",
                bn: "মাধ্যমিক অ্যাডমিট কার্ড",
                hi: "एडमिट कार्ड",
            },
            media: MediaClass::Pdf,
        },
        DocumentKind {
            id: "pdf2",
            labels: Labels {
                en: "Marksheet",
                bn: "মার্কশিট",
                hi: "मार्कशीट",
            },
            media: MediaClass::Pdf,
        },
        DocumentKind {
            id: "pdf3",
            labels: Labels {
                en: "Aadhaar Card",
                bn: "আধার কার্ড",
                hi: "आधार कार्ड",
            },
            media: MediaClass::Pdf,
        },
        DocumentKind {
            id: "pdf4",
            labels: Labels {
                en: "Voter Card",
                bn: "ভোটার কার্ড",
                hi: "वोटर कार्ड",
            },
            media: MediaClass::Pdf,
        },
        DocumentKind {
            id: "pdf5",
            labels: Labels {
                en: "Bank Passbook",
                bn: "ব্যাংক পাসবুক",
                hi: "बैंक पासबुक",
            },
            media: MediaClass::Pdf,
        },
        DocumentKind {
            id: "pdf6",
            labels: Labels {
                en: "Caste Certificate",
                bn: "জাতি শংসাপত্র",
                hi: "जाति प्रमाण पत्र",
            },
            media: MediaClass::Pdf,
        },
        DocumentKind {
            id: "photo",
            labels: Labels {
                en: "Passport Photo",
                bn: "পাসপোর্ট ছবি",
                hi: "पासपोर्ट फोटो",
            },
            media: MediaClass::Photo,
        },
        DocumentKind {
            id: "sig",
            labels: Labels {
                en: "Signature",
                bn: "স্বাক্ষর",
                hi: "हस्ताक्षर",
            },
            media: MediaClass::Signature,
        },
    ]
});

/// Look up a catalog entry by its stable id.
pub fn find_kind(id: &str) -> Option<&'static DocumentKind> {
    CATALOG.iter().find(|k| k.id == id)
}
