//! MCP Protocol Version Support
//!
//! ## Version History
//! - **2024-11-05**: First protocol revision, HTTP+SSE transport
//! - **2025-03-26**: Introduced Streamable HTTP
//! - **2025-06-18**: Structured `_meta` fields on results

use serde::{Deserialize, Serialize};

/// Supported MCP protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum McpVersion {
    #[serde(rename = "2024-11-05")]
    V2024_11_05,
    #[serde(rename = "2025-03-26")]
    V2025_03_26,
    #[serde(rename = "2025-06-18")]
    V2025_06_18,
}

impl McpVersion {
    /// The latest protocol version implemented by this crate
    pub const LATEST: McpVersion = McpVersion::V2025_06_18;

    /// All versions the server accepts, oldest first
    pub const SUPPORTED: [McpVersion; 3] = [
        McpVersion::V2024_11_05,
        McpVersion::V2025_03_26,
        McpVersion::V2025_06_18,
    ];

    /// Parse a version string like "2024-11-05"
    pub fn parse(s: &str) -> Option<Self> {
        Self::SUPPORTED.into_iter().find(|v| v.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            McpVersion::V2024_11_05 => "2024-11-05",
            McpVersion::V2025_03_26 => "2025-03-26",
            McpVersion::V2025_06_18 => "2025-06-18",
        }
    }

    /// Pick the version to answer `initialize` with.
    ///
    /// A supported client version is echoed back; anything else (including
    /// no version at all) gets [`McpVersion::LATEST`].
    pub fn negotiate(requested: Option<&str>) -> Self {
        requested.and_then(Self::parse).unwrap_or(Self::LATEST)
    }

    /// Returns whether this version supports streamable HTTP
    pub fn supports_streamable_http(&self) -> bool {
        matches!(self, McpVersion::V2025_03_26 | McpVersion::V2025_06_18)
    }
}

impl std::fmt::Display for McpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for McpVersion {
    type Err = crate::McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::McpError::VersionMismatch {
            expected: Self::LATEST.as_str().to_string(),
            actual: s.to_string(),
        })
    }
}

impl Default for McpVersion {
    fn default() -> Self {
        Self::LATEST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!(McpVersion::parse("2024-11-05"), Some(McpVersion::V2024_11_05));
        assert_eq!(McpVersion::parse("2025-06-18"), Some(McpVersion::V2025_06_18));
        assert_eq!(McpVersion::parse("1999-01-01"), None);
        assert!("garbage".parse::<McpVersion>().is_err());
    }

    #[test]
    fn test_negotiation() {
        assert_eq!(
            McpVersion::negotiate(Some("2025-03-26")),
            McpVersion::V2025_03_26
        );
        assert_eq!(McpVersion::negotiate(Some("2030-01-01")), McpVersion::LATEST);
        assert_eq!(McpVersion::negotiate(None), McpVersion::LATEST);
    }

    #[test]
    fn test_streamable_http_support() {
        assert!(!McpVersion::V2024_11_05.supports_streamable_http());
        assert!(McpVersion::V2025_06_18.supports_streamable_http());
    }
}
