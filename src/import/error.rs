//! Error types for import operations.

use thiserror::Error;

/// Fatal import errors.
///
/// Only input the importer cannot read at all is fatal; anything recoverable
/// is reported as a warning through `ImportReport` and processing continues.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The bytes could not be decoded to text.
    #[error("Encoding error: {0}")]
    Decode(String),

    /// XML parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// The document parsed, but its root is not an XMI root.
    #[error("Not an XMI document: root element is <{root}>")]
    NotXmi { root: String },

    /// IO error while reading input.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// Create an encoding error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create an XML error.
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    /// Create a wrong-root error.
    pub fn not_xmi(root: impl Into<String>) -> Self {
        Self::NotXmi { root: root.into() }
    }
}
