//! Error types for the PDF core.
//!
//! This module defines all error kinds that can occur while parsing PDF
//! files, CMaps, and font programs, plus the non-fatal [`Warning`] record
//! that lenient parsing accumulates instead of failing.

/// Result type alias for PDF core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by the PDF core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No `%PDF-` header within the first 1024 bytes (strict mode only)
    #[error("PDF header not found in the first 1024 bytes")]
    HeaderMissing,

    /// Unrecognized byte sequence where a token is required
    #[error("Malformed token at byte {offset}: {reason}")]
    MalformedToken {
        /// Byte offset where the token was expected
        offset: usize,
        /// What was found instead
        reason: String,
    },

    /// Xref table, trailer, or stream length is wrong
    #[error("Structural corruption: {0}")]
    Structural(String),

    /// A reference whose xref entry does not lead to `N G obj`
    #[error("Unresolved reference: {0} {1} R")]
    UnresolvedReference(u32, u16),

    /// Invalid operator or malformed range in a CMap stream
    #[error("CMap syntax error: {0}")]
    CMapSyntax(String),

    /// Type 1 font program is damaged beyond recovery
    #[error("Damaged font: {0}")]
    DamagedFont(String),

    /// An /Encrypt dictionary is present but no decryptor is registered
    #[error("Document is encrypted and no decryptor is registered")]
    UnsupportedEncryption,

    /// Object has wrong type for the requested operation
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Font embedding or font program error
    #[error("Font error: {0}")]
    Font(String),

    /// SVG path syntax error
    #[error("SVG path error at byte {offset}: {reason}")]
    SvgPath {
        /// Byte offset into the path string
        offset: usize,
        /// Reason for the failure
        reason: &'static str,
    },

    /// IO error (file-loading convenience path only)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A non-fatal condition recorded during lenient parsing.
///
/// Leaf parsers push warnings instead of failing when lenient mode is
/// enabled; the document collects them into a per-document list the caller
/// can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Byte offset where the condition was observed
    pub offset: usize,
    /// Human-readable description
    pub message: String,
}

impl Warning {
    /// Create a new warning.
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "warning at byte {}: {}", self.offset, self.message)
    }
}
