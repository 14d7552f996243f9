//! Extraction kinds and the engine flags that select them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The extraction operation requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionKind {
    /// Plain text content.
    Text,
    /// XHTML rendering of the content.
    Html,
    /// Field name to value mapping reported by the engine.
    Metadata,
    /// Content type, projected from the metadata response.
    Mimetype,
}

/// Serialization dialect of metadata responses.
///
/// Older engine generations only print `key: value` lines; newer ones can
/// emit a JSON object when asked with `-j`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataDialect {
    #[default]
    Json,
    Legacy,
}

impl ExtractionKind {
    /// Command-line flags selecting this kind on the engine.
    pub fn flags(self, dialect: MetadataDialect) -> &'static [&'static str] {
        match (self, dialect) {
            (Self::Text, _) => &["-t"],
            (Self::Html, _) => &["-h"],
            (Self::Metadata | Self::Mimetype, MetadataDialect::Json) => &["-m", "-j"],
            (Self::Metadata | Self::Mimetype, MetadataDialect::Legacy) => &["-m"],
        }
    }

    /// Whether a server started for `self` answers requests of `other`.
    ///
    /// Metadata and mimetype share one wire request.
    pub fn same_wire_request(self, other: Self) -> bool {
        self.flags(MetadataDialect::Json) == other.flags(MetadataDialect::Json)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Html => "html",
            Self::Metadata => "metadata",
            Self::Mimetype => "mimetype",
        }
    }
}

impl fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "html" => Ok(Self::Html),
            "metadata" => Ok(Self::Metadata),
            "mimetype" => Ok(Self::Mimetype),
            other => Err(format!("unknown extraction kind: {other}")),
        }
    }
}
