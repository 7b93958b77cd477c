//! Client configuration.
//!
//! All tunables live in one [`PortalConfig`] built through its builder, so
//! hosts set only what they care about and the rest keeps documented
//! defaults.

use crate::error::DocfitError;

/// Configuration for the portal HTTP client.
///
/// # Example
/// ```rust
/// use docfit::PortalConfig;
///
/// let config = PortalConfig::builder()
///     .base_url("https://api.yuvasathi.in")
///     .convert_timeout_secs(180)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Base URL of the portal backend. Default: `http://127.0.0.1:8000`.
    pub base_url: String,

    /// Timeout for small JSON calls (quota, order, verify, referral) in
    /// seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Timeout for the conversion round-trip in seconds. Default: 120.
    ///
    /// Uploads carry the full document and the server recompresses it in
    /// multiple quality passes, so this is deliberately much larger than
    /// the JSON timeout.
    pub convert_timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_timeout_secs: 30,
            convert_timeout_secs: 120,
        }
    }
}

impl PortalConfig {
    /// Create a new builder for `PortalConfig`.
    pub fn builder() -> PortalConfigBuilder {
        PortalConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PortalConfig`].
#[derive(Debug)]
pub struct PortalConfigBuilder {
    config: PortalConfig,
}

impl PortalConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        // Stored without a trailing slash so endpoint paths join cleanly.
        self.config.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn convert_timeout_secs(mut self, secs: u64) -> Self {
        self.config.convert_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PortalConfig, DocfitError> {
        let c = &self.config;
        if c.base_url.is_empty() {
            return Err(DocfitError::InvalidConfig("base_url must not be empty".into()));
        }
        if !c.base_url.starts_with("http://") && !c.base_url.starts_with("https://") {
            return Err(DocfitError::InvalidConfig(format!(
                "base_url must be an HTTP/HTTPS URL, got '{}'",
                c.base_url
            )));
        }
        if c.api_timeout_secs == 0 || c.convert_timeout_secs == 0 {
            return Err(DocfitError::InvalidConfig("timeouts must be ≥ 1 second".into()));
        }
        Ok(self.config)
    }
}
