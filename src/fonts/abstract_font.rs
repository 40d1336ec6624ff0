//! The live-font capability consumed by the embedding engine.
//!
//! A live font is whatever the interpreter holds: a parsed font file, a
//! synthesised in-memory font, a user-defined Type 3 font. The engine only
//! ever talks to it through [`AbstractFont`], and never keeps a reference to
//! it beyond the call; everything it needs later is copied into a
//! [`CopiedFont`](crate::fonts::font_copy::CopiedFont).

use crate::error::Result;
use crate::fonts::glyph::{
    FontId, FontInfo, FontType, Glyph, GlyphBitmap, GlyphInfo, GlyphInfoFlags, Matrix, WMode,
};
use bytes::Bytes;
use std::sync::Arc;

/// Interpreter-side font as seen by the embedding engine.
pub trait AbstractFont: Send + Sync + std::fmt::Debug {
    /// Stable identity of this font.
    fn font_id(&self) -> FontId;

    /// Font technology.
    fn font_type(&self) -> FontType;

    /// Font name as known to the interpreter, possibly with a subset prefix.
    fn font_name(&self) -> &str;

    /// Glyph space to text space.
    fn font_matrix(&self) -> Matrix;

    /// Writing mode.
    fn wmode(&self) -> WMode {
        WMode::Horizontal
    }

    /// Next glyph of the font.
    ///
    /// `cursor` starts at 0. When the font is exhausted this returns `None`
    /// and resets the cursor to 0, so enumeration can be restarted.
    fn enumerate_glyph(&self, cursor: &mut usize) -> Option<Glyph>;

    /// PostScript name of a glyph.
    fn glyph_name(&self, glyph: &Glyph) -> Option<String>;

    /// Metrics of a glyph in glyph space.
    fn glyph_info(&self, glyph: &Glyph, flags: GlyphInfoFlags) -> Result<GlyphInfo>;

    /// Glyph program bytes; two glyphs are identical iff these are equal.
    ///
    /// Fails with `Undefined` if the glyph is absent.
    fn glyph_outline(&self, glyph: &Glyph) -> Result<Bytes>;

    /// Pieces of a composite glyph, copied along with it.
    fn glyph_components(&self, _glyph: &Glyph) -> Vec<Glyph> {
        Vec::new()
    }

    /// Glyph selected by a character code.
    fn encode_char(&self, code: u32) -> Option<Glyph>;

    /// Unicode (UTF-16 units) the font itself knows for a glyph.
    fn decode_glyph(&self, glyph: &Glyph, code: u32) -> Option<Vec<u16>>;

    /// Font-level metadata.
    fn font_info(&self) -> FontInfo;

    /// Glyph index for a CID (CIDFontType2 only).
    fn cid_to_gid(&self, _cid: u32) -> Option<u32> {
        None
    }

    /// Vertical alternate of a glyph index from the substitution table.
    fn substitute_vertical(&self, _gid: u32) -> Option<u32> {
        None
    }

    /// Original font program bytes, if the interpreter kept them.
    fn font_file(&self) -> Option<Bytes> {
        None
    }

    /// Descendant CID font of a composite font.
    fn descendant(&self) -> Option<Arc<dyn AbstractFont>> {
        None
    }

    /// CMap name of a composite font.
    fn cmap_name(&self) -> Option<String> {
        None
    }

    /// Rasterise a glyph at `size` text-space units and `resolution` dpi.
    fn render_glyph(
        &self,
        _glyph: &Glyph,
        _size: f64,
        _resolution: (u32, u32),
    ) -> Option<GlyphBitmap> {
        None
    }
}

/// Iterator over every glyph of a font, driven by `enumerate_glyph`.
pub struct GlyphIter<'a> {
    font: &'a dyn AbstractFont,
    cursor: usize,
    done: bool,
}

impl<'a> GlyphIter<'a> {
    /// Start a fresh enumeration.
    pub fn new(font: &'a dyn AbstractFont) -> Self {
        Self {
            font,
            cursor: 0,
            done: false,
        }
    }
}

impl Iterator for GlyphIter<'_> {
    type Item = Glyph;

    fn next(&mut self) -> Option<Glyph> {
        if self.done {
            return None;
        }
        let glyph = self.font.enumerate_glyph(&mut self.cursor);
        if glyph.is_none() {
            self.done = true;
        }
        glyph
    }
}

/// Count the glyphs of a font by enumeration.
pub fn count_glyphs(font: &dyn AbstractFont) -> usize {
    GlyphIter::new(font).count()
}

/// Advance of a glyph in 1000-unit text space.
///
/// Type 3 widths stay in glyph space. TrueType-flavored widths are rounded
/// to the nearest unit since the design grid does not divide 1000 evenly.
pub fn glyph_advance_1000(font_type: FontType, matrix: &Matrix, w: (f64, f64)) -> (f64, f64) {
    if font_type == FontType::Type3 {
        return w;
    }
    let (x, y) = matrix.transform_vector(w.0, w.1);
    let (x, y) = (x * 1000.0, y * 1000.0);
    if font_type.is_truetype_flavored() {
        (round_grid_width(x), round_grid_width(y))
    } else {
        (x, y)
    }
}

/// `floor(w + 0.5)`, the rounding applied to TrueType-grid widths.
pub fn round_grid_width(w: f64) -> f64 {
    (w + 0.5).floor()
}
