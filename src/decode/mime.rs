//! Content type lookup in the static MIME registry.

use mime_guess::mime::Mime;
use serde::Serialize;

/// A registered content type and the file extensions it is known by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MimeType {
    pub content_type: String,
    pub extensions: Vec<String>,
}

impl MimeType {
    /// Look up a content type, ignoring parameters such as `charset`.
    ///
    /// Returns `None` for types the registry does not know.
    pub fn lookup(content_type: &str) -> Option<Self> {
        let essence = content_type
            .parse::<Mime>()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|_| content_type.trim().to_lowercase());

        let extensions = mime_guess::get_mime_extensions_str(&essence)?;
        Some(Self {
            content_type: essence,
            extensions: extensions.iter().map(|e| (*e).to_string()).collect(),
        })
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}
