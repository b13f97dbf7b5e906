//! Shared request/domain types.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Fixed-size derivation styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStyle {
    Thumbnail,
    Preview,
}

impl FromStr for ConversionStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "thumbnail" => Ok(ConversionStyle::Thumbnail),
            "preview" => Ok(ConversionStyle::Preview),
            _ => Err(anyhow::anyhow!("Invalid conversion style: {}", s)),
        }
    }
}

impl Display for ConversionStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ConversionStyle::Thumbnail => write!(f, "thumbnail"),
            ConversionStyle::Preview => write!(f, "preview"),
        }
    }
}

/// Options attached to a file retrieval.
///
/// `format` and `style` select a derived (converted) asset; `start`/`end`
/// are an inclusive byte range and apply only to plain retrieval, never to
/// derivation.
#[derive(Debug, Clone, Default)]
pub struct ConversionOptions {
    pub format: Option<String>,
    pub style: Option<ConversionStyle>,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ConversionOptions {
    /// True when the request asks for a derived asset rather than the
    /// primary object.
    pub fn wants_conversion(&self) -> bool {
        self.format.is_some() || self.style.is_some()
    }
}
