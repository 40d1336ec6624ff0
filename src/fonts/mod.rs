//! Live fonts and the glyph copy engine.
//!
//! This module provides the interface every interpreter font implements
//! ([`AbstractFont`]), the in-memory and TrueType implementations, and the
//! machinery that snapshots fonts and copies glyphs out of them as they are
//! shown.

pub mod abstract_font;
pub mod base_font;
pub mod encoding;
pub mod font_copy;
pub mod font_subsetter;
pub mod glyph;
pub mod memory_font;
pub mod standard_fonts;
pub mod truetype_parser;

pub use abstract_font::{count_glyphs, glyph_advance_1000, AbstractFont, GlyphIter};
pub use base_font::{BaseFont, SubsetDecision};
pub use encoding::BaseEncoding;
pub use font_copy::{CopiedFont, CopiedGlyph, CopyGlyphOptions, CopyOutcome};
pub use font_subsetter::{
    decide_subset, embed_status, has_subset_prefix, make_subset_prefix, should_subset,
    strip_subset_prefix, EmbedStatus,
};
pub use glyph::{
    BBox, CidSystemInfo, FontFlags, FontId, FontInfo, FontType, Glyph, GlyphBitmap, GlyphInfo,
    GlyphInfoFlags, Matrix, WMode,
};
pub use memory_font::{MemoryFont, MemoryFontBuilder, MemoryGlyph};
pub use standard_fonts::{find_standard_font, StandardFont, StandardFontTable};
pub use truetype_parser::{TrueTypeError, TrueTypeFont};
