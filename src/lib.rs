// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Fontwrite
//!
//! Font resource management for a PDF output device: glyph copying,
//! subsetting, embedding and text layout as text is shown.
//!
//! ## Core Features
//!
//! - **Glyph Copy Engine**: copy-once snapshots of live interpreter fonts,
//!   with identity checks, composite pieces and CID maps
//! - **Subsetting**: MaxSubsetPct rule, compliance overrides, deterministic
//!   `XXXXXX+` prefixes, licensing gate and standard-font substitution
//! - **Encodings and Widths**: simple-font Differences and Widths, CID `W`/`DW`
//!   and vertical `W2`/`DW2` tables
//! - **ToUnicode**: font decoding, `uniXXXX` names and OCR fallback
//! - **Text Layout**: `TJ` corrections and explicit repositioning so glyphs
//!   land where the interpreter placed them
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_fontwrite::config::FontEmbedConfig;
//! use pdf_fontwrite::writer::{FontManager, MemoryObjectWriter, TextRun};
//!
//! let mut fonts = FontManager::new(FontEmbedConfig::default());
//! let shown = fonts.show_text(&TextRun::new(font, b"Hello".to_vec(), 12.0))?;
//! let content = shown.content_bytes()?;
//!
//! let mut out = MemoryObjectWriter::new();
//! let written = fonts.finalize_and_write_all(&mut out)?;
//! ```
//!
//! ## Logging
//!
//! Diagnostics go through the `log` facade. Warnings are emitted for fonts
//! refused for licensing reasons, subsets substituted for complete copies,
//! OCR failures and dropped resources. Hosts install a logger such as
//! `env_logger`.

// Error handling
pub mod error;

// Configuration
pub mod config;

// PDF object model
pub mod object;

// Fonts and the glyph copy engine
pub mod fonts;

// Font resources and serialisation
pub mod writer;

pub use config::{ComplianceProfile, FontEmbedConfig, MissingGlyphPolicy, UseOcr};
pub use error::{Error, Result};
pub use object::{Object, ObjectRef};
pub use writer::{FontManager, ShowResult, TextRun, WrittenFonts};
