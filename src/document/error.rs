//! Engine error types
//!
//! One error enum for every stage of a fill session: loading, parsing,
//! extraction, rendering and synthesis.

use thiserror::Error;

/// Unified fill-engine error type
#[derive(Debug, Error)]
pub enum FillError {
    /// Template could not be fetched or was rejected by the loader
    #[error("Load error: {0}")]
    Load(String),

    /// Bytes are not a PDF
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Transport-level failure (network, status, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Failed to parse the template
    #[error("Parse error: {0}")]
    Parse(String),

    /// Failed to render a page
    #[error("Render error: {0}")]
    Render(String),

    /// Field or choice extraction failed
    #[error("Extraction error: {0}")]
    Extract(String),

    /// Output document could not be produced
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Page index out of range
    #[error("Page not found: index {0}")]
    PageNotFound(usize),

    /// Drawing surface never became available
    #[error("Drawing surface unavailable after {attempts} attempts")]
    SurfaceUnavailable { attempts: u32 },

    /// Timeout error
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(String),

    /// MuPDF error
    #[error("MuPDF error: {0}")]
    Engine(String),

    /// lopdf error
    #[error("PDF object error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for engine operations
pub type FillResult<T> = std::result::Result<T, FillError>;

impl From<mupdf::Error> for FillError {
    fn from(err: mupdf::Error) -> Self {
        FillError::Engine(err.to_string())
    }
}
