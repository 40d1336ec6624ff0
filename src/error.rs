//! Error types for the font embedding engine.
//!
//! The variants follow the classic interpreter error taxonomy so that callers
//! can decide how far a failure propagates:
//!
//! - [`Error::VmError`]: allocation failure, fatal to the current operation.
//! - [`Error::InvalidAccess`] / [`Error::Undefined`]: per-glyph failures, the
//!   caller falls back to rendering that glyph as a bitmap.
//! - [`Error::RangeCheck`]: per-font failure, the resource is dropped.
//! - [`Error::Unregistered`]: internal invariant violated.

/// Result type alias for font engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while copying, encoding or writing fonts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Allocation failed; no partial state was published.
    #[error("VMerror: allocation failed ({0})")]
    VmError(String),

    /// Glyph or encoding identity conflict.
    #[error("invalidaccess: {0}")]
    InvalidAccess(String),

    /// Glyph absent from the source font (or from the destination when probing).
    #[error("undefined: {0}")]
    Undefined(String),

    /// Unsupported font type or malformed index.
    #[error("rangecheck: {0}")]
    RangeCheck(String),

    /// Internal invariant violated. Always an implementation defect.
    #[error("unregistered: {0}")]
    Unregistered(String),

    /// Font refused under a strict compliance profile.
    #[error("invalidfont: {0}")]
    InvalidFont(String),

    /// Font file could not be parsed
    #[error("Font error: {0}")]
    Font(String),

    /// OCR engine failure
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures confined to one glyph.
    ///
    /// The show path refuses the glyph and lets the caller rasterise it.
    pub fn is_glyph_recoverable(&self) -> bool {
        matches!(self, Error::InvalidAccess(_) | Error::Undefined(_))
    }

    /// True for failures confined to one font: the resource is dropped and
    /// the document continues without embedding it.
    pub fn is_font_fatal(&self) -> bool {
        matches!(self, Error::RangeCheck(_) | Error::Font(_))
    }

    /// True for failures that must propagate to the top-level call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::VmError(_) | Error::Unregistered(_) | Error::InvalidFont(_) | Error::Io(_)
        )
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(err: std::collections::TryReserveError) -> Self {
        Error::VmError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Allocate a vector of `len` copies of `value`, reporting failure as
/// [`Error::VmError`] instead of aborting.
pub(crate) fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, value);
    Ok(v)
}

/// Grow `v` to `len` elements, filling with `value`. Never shrinks.
pub(crate) fn try_grow<T: Clone>(v: &mut Vec<T>, len: usize, value: T) -> Result<()> {
    if len <= v.len() {
        return Ok(());
    }
    v.try_reserve_exact(len - v.len())?;
    v.resize(len, value);
    Ok(())
}
