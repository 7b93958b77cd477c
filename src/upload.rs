//! Upload and result value types.

use crate::catalog::{self, DocumentKind, SizeDecision};
use serde::{Deserialize, Serialize};

/// A raw file the user picked: bytes plus the metadata the browser (or CLI)
/// declared for it.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Original filename, used for the multipart part and for display.
    pub name: String,
    /// Raw content.
    pub bytes: Vec<u8>,
    /// Declared MIME type, forwarded verbatim to the server.
    pub mime: String,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes,
            mime: mime.into(),
        }
    }

    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A candidate conversion: the selected kind paired with a picked file.
///
/// Created on file selection, discarded on re-selection or reset. The size
/// decision is derived once here so the orchestrator never re-evaluates it
/// against a different kind.
#[derive(Debug, Clone)]
pub struct UploadAttempt {
    pub file: UploadFile,
    pub decision: SizeDecision,
}

impl UploadAttempt {
    pub fn new(kind: &DocumentKind, file: UploadFile) -> Self {
        let decision = catalog::decide(kind.media, file.byte_len());
        Self { file, decision }
    }

    /// True when the file is already at or under the ceiling and no
    /// compression round-trip is needed.
    pub fn within_ceiling(&self) -> bool {
        !self.decision.required
    }
}

/// The artifact of a finished conversion, held in memory for download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Output bytes — the server's artifact, or the untouched original on
    /// the already-small bypass path.
    pub bytes: Vec<u8>,
    /// Output size in bytes.
    pub byte_len: u64,
    /// Whether compression was actually invoked.
    pub compressed: bool,
    /// Suggested download filename.
    pub filename: String,
}
