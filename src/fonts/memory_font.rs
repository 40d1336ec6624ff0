//! In-memory live font.
//!
//! Interpreters that synthesise fonts (user-defined fonts, fonts rebuilt
//! from charstrings) populate a [`MemoryFont`] through [`MemoryFontBuilder`]
//! and hand it to the engine as an `Arc<dyn AbstractFont>`.

use crate::error::{Error, Result};
use crate::fonts::abstract_font::AbstractFont;
use crate::fonts::encoding::BaseEncoding;
use crate::fonts::glyph::{
    BBox, CidSystemInfo, FontFlags, FontId, FontInfo, FontType, Glyph, GlyphBitmap, GlyphInfo,
    GlyphInfoFlags, Matrix, WMode,
};
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_FONT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique font id.
pub fn next_font_id() -> FontId {
    FontId(NEXT_FONT_ID.fetch_add(1, Ordering::Relaxed))
}

/// One glyph of a [`MemoryFont`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryGlyph {
    pub glyph: Glyph,
    pub name: Option<String>,
    pub outline: Bytes,
    pub width: (f64, f64),
    pub width1: Option<(f64, f64)>,
    pub v: Option<(f64, f64)>,
    pub bbox: BBox,
    pub components: Vec<Glyph>,
    pub unicode: Option<Vec<u16>>,
    pub bitmap: Option<GlyphBitmap>,
}

impl MemoryGlyph {
    /// A glyph with the given identity and horizontal advance.
    pub fn new(glyph: Glyph, width: f64) -> Self {
        let name = match &glyph {
            Glyph::Name(n) => Some(n.clone()),
            _ => None,
        };
        let outline = Bytes::from(format!("{}:{}", glyph, width));
        Self {
            glyph,
            name,
            outline,
            width: (width, 0.0),
            width1: None,
            v: None,
            bbox: BBox::new(0.0, 0.0, width, 700.0),
            components: Vec::new(),
            unicode: None,
            bitmap: None,
        }
    }

    /// Named glyph.
    pub fn named(name: &str, width: f64) -> Self {
        Self::new(Glyph::name(name), width)
    }

    /// Set the glyph program bytes.
    pub fn outline(mut self, data: impl Into<Bytes>) -> Self {
        self.outline = data.into();
        self
    }

    /// Set the PostScript name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Set the Unicode value the font reports for this glyph.
    pub fn unicode(mut self, text: &str) -> Self {
        self.unicode = Some(text.encode_utf16().collect());
        self
    }

    /// Set vertical metrics.
    pub fn vertical(mut self, width1: (f64, f64), v: (f64, f64)) -> Self {
        self.width1 = Some(width1);
        self.v = Some(v);
        self
    }

    /// Set the bounding box.
    pub fn bbox(mut self, bbox: BBox) -> Self {
        self.bbox = bbox;
        self
    }

    /// Set composite pieces.
    pub fn components(mut self, pieces: Vec<Glyph>) -> Self {
        self.components = pieces;
        self
    }

    /// Set the raster used for OCR.
    pub fn bitmap(mut self, bitmap: GlyphBitmap) -> Self {
        self.bitmap = Some(bitmap);
        self
    }
}

/// An interpreter-populated font held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryFont {
    id: FontId,
    font_type: FontType,
    name: String,
    matrix: Matrix,
    wmode: WMode,
    glyphs: IndexMap<Glyph, MemoryGlyph>,
    encoding: HashMap<u32, Glyph>,
    cid_to_gid: HashMap<u32, u32>,
    vertical: HashMap<u32, u32>,
    info: FontInfo,
    font_file: Option<Bytes>,
    descendant: Option<Arc<dyn AbstractFont>>,
    cmap_name: Option<String>,
}

impl MemoryFont {
    /// Start building a font.
    pub fn builder(name: &str, font_type: FontType) -> MemoryFontBuilder {
        MemoryFontBuilder::new(name, font_type)
    }

    /// Glyph record, if present.
    pub fn glyph(&self, glyph: &Glyph) -> Option<&MemoryGlyph> {
        self.glyphs.get(glyph)
    }

    /// Number of glyphs.
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// True if the font has no glyphs.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    fn lookup(&self, glyph: &Glyph) -> Result<&MemoryGlyph> {
        self.glyphs
            .get(glyph)
            .ok_or_else(|| Error::Undefined(format!("{} not in font {}", glyph, self.name)))
    }
}

impl AbstractFont for MemoryFont {
    fn font_id(&self) -> FontId {
        self.id
    }

    fn font_type(&self) -> FontType {
        self.font_type
    }

    fn font_name(&self) -> &str {
        &self.name
    }

    fn font_matrix(&self) -> Matrix {
        self.matrix
    }

    fn wmode(&self) -> WMode {
        self.wmode
    }

    fn enumerate_glyph(&self, cursor: &mut usize) -> Option<Glyph> {
        match self.glyphs.get_index(*cursor) {
            Some((g, _)) => {
                *cursor += 1;
                Some(g.clone())
            },
            None => {
                *cursor = 0;
                None
            },
        }
    }

    fn glyph_name(&self, glyph: &Glyph) -> Option<String> {
        self.glyphs.get(glyph).and_then(|g| g.name.clone())
    }

    fn glyph_info(&self, glyph: &Glyph, flags: GlyphInfoFlags) -> Result<GlyphInfo> {
        let g = self.lookup(glyph)?;
        let mut info = GlyphInfo::default();
        if flags.contains(GlyphInfoFlags::WIDTH0) {
            info.width = Some(g.width);
        }
        if flags.contains(GlyphInfoFlags::WIDTH1) {
            info.width1 = g.width1;
        }
        if flags.contains(GlyphInfoFlags::VVECTOR) {
            info.v = g.v;
        }
        if flags.contains(GlyphInfoFlags::BBOX) {
            info.bbox = Some(g.bbox);
        }
        Ok(info)
    }

    fn glyph_outline(&self, glyph: &Glyph) -> Result<Bytes> {
        Ok(self.lookup(glyph)?.outline.clone())
    }

    fn glyph_components(&self, glyph: &Glyph) -> Vec<Glyph> {
        self.glyphs
            .get(glyph)
            .map(|g| g.components.clone())
            .unwrap_or_default()
    }

    fn encode_char(&self, code: u32) -> Option<Glyph> {
        if let Some(g) = self.encoding.get(&code) {
            return Some(g.clone());
        }
        match self.font_type {
            FontType::Composite | FontType::CidType0 | FontType::CidType2 => Some(Glyph::Cid(code)),
            _ => None,
        }
    }

    fn decode_glyph(&self, glyph: &Glyph, _code: u32) -> Option<Vec<u16>> {
        if let Some(u) = self.glyphs.get(glyph).and_then(|g| g.unicode.clone()) {
            return Some(u);
        }
        // CIDFontType2 glyph records live under their glyph index.
        if let Glyph::Cid(cid) = glyph {
            let gid = self.cid_to_gid(*cid)?;
            return self.glyphs.get(&Glyph::Index(gid)).and_then(|g| g.unicode.clone());
        }
        None
    }

    fn font_info(&self) -> FontInfo {
        self.info.clone()
    }

    fn cid_to_gid(&self, cid: u32) -> Option<u32> {
        match self.font_type {
            FontType::CidType2 => Some(self.cid_to_gid.get(&cid).copied().unwrap_or(cid)),
            _ => None,
        }
    }

    fn substitute_vertical(&self, gid: u32) -> Option<u32> {
        self.vertical.get(&gid).copied()
    }

    fn font_file(&self) -> Option<Bytes> {
        self.font_file.clone()
    }

    fn descendant(&self) -> Option<Arc<dyn AbstractFont>> {
        self.descendant.clone()
    }

    fn cmap_name(&self) -> Option<String> {
        self.cmap_name.clone()
    }

    fn render_glyph(&self, glyph: &Glyph, _size: f64, _resolution: (u32, u32)) -> Option<GlyphBitmap> {
        self.glyphs.get(glyph).and_then(|g| g.bitmap.clone())
    }
}

/// Builder for [`MemoryFont`].
#[derive(Debug)]
pub struct MemoryFontBuilder {
    font: MemoryFont,
    info_set: bool,
}

impl MemoryFontBuilder {
    /// New font. The matrix defaults to the 1000-unit design grid, or 2048 for
    /// TrueType-flavored fonts.
    pub fn new(name: &str, font_type: FontType) -> Self {
        let upem = if font_type.is_truetype_flavored() { 2048.0 } else { 1000.0 };
        Self {
            font: MemoryFont {
                id: next_font_id(),
                font_type,
                name: name.to_string(),
                matrix: Matrix::scale(1.0 / upem, 1.0 / upem),
                wmode: WMode::Horizontal,
                glyphs: IndexMap::new(),
                encoding: HashMap::new(),
                cid_to_gid: HashMap::new(),
                vertical: HashMap::new(),
                info: FontInfo {
                    flags: FontFlags::NONSYMBOLIC,
                    ..Default::default()
                },
                font_file: None,
                descendant: None,
                cmap_name: None,
            },
            info_set: false,
        }
    }

    /// Reuse an explicit id (a redefinition of the same font keeps its id).
    pub fn with_id(mut self, id: FontId) -> Self {
        self.font.id = id;
        self
    }

    /// Design grid size; sets the font matrix to `1/upem`.
    pub fn units_per_em(mut self, upem: f64) -> Self {
        self.font.matrix = Matrix::scale(1.0 / upem, 1.0 / upem);
        self
    }

    /// Explicit font matrix.
    pub fn matrix(mut self, matrix: Matrix) -> Self {
        self.font.matrix = matrix;
        self
    }

    /// Writing mode.
    pub fn wmode(mut self, wmode: WMode) -> Self {
        self.font.wmode = wmode;
        self
    }

    /// Add a glyph.
    pub fn glyph(mut self, glyph: MemoryGlyph) -> Self {
        self.font.glyphs.insert(glyph.glyph.clone(), glyph);
        self
    }

    /// Add a named glyph and encode it at `code`.
    pub fn encoded(mut self, code: u8, glyph: MemoryGlyph) -> Self {
        self.font.encoding.insert(code as u32, glyph.glyph.clone());
        self.glyph(glyph)
    }

    /// Map `code` to an existing glyph.
    pub fn encode(mut self, code: u32, glyph: Glyph) -> Self {
        self.font.encoding.insert(code, glyph);
        self
    }

    /// Encode every present glyph at the code `encoding` assigns its name.
    pub fn with_base_encoding(mut self, encoding: BaseEncoding) -> Self {
        for code in 0..256u32 {
            if let Some(name) = encoding.glyph_name(code) {
                let glyph = Glyph::name(name);
                if self.font.glyphs.contains_key(&glyph) {
                    self.font.encoding.insert(code, glyph);
                }
            }
        }
        self.font.info.base_encoding = Some(encoding);
        self
    }

    /// Map a CID to a glyph index (CIDFontType2).
    pub fn map_cid(mut self, cid: u32, gid: u32) -> Self {
        self.font.cid_to_gid.insert(cid, gid);
        self
    }

    /// Register a vertical alternate glyph.
    pub fn vertical_substitution(mut self, gid: u32, vertical_gid: u32) -> Self {
        self.font.vertical.insert(gid, vertical_gid);
        self
    }

    /// Font-level metadata. Glyph counts left at 0 are filled in by `build`.
    pub fn info(mut self, info: FontInfo) -> Self {
        self.font.info = info;
        self.info_set = true;
        self
    }

    /// OS/2 `fsType` bits.
    pub fn fs_type(mut self, fs_type: u16) -> Self {
        self.font.info.fs_type = Some(fs_type);
        self
    }

    /// Font descriptor flags.
    pub fn flags(mut self, flags: FontFlags) -> Self {
        self.font.info.flags = flags;
        self
    }

    /// Claimed CID count.
    pub fn cid_count(mut self, count: u32) -> Self {
        self.font.info.cid_count = count;
        self
    }

    /// Original program bytes.
    pub fn font_file(mut self, data: impl Into<Bytes>) -> Self {
        self.font.font_file = Some(data.into());
        self
    }

    /// Make this a composite font over `descendant`.
    pub fn descendant(mut self, descendant: Arc<dyn AbstractFont>, cmap_name: &str) -> Self {
        self.font.descendant = Some(descendant);
        self.font.cmap_name = Some(cmap_name.to_string());
        self
    }

    /// Finish the font.
    pub fn build(mut self) -> MemoryFont {
        let font = &mut self.font;
        if font.info.num_glyphs == 0 {
            font.info.num_glyphs = font.glyphs.len() as u32;
        }
        if font.font_type.is_cid() {
            if font.info.cid_count == 0 {
                let max_cid = font
                    .glyphs
                    .keys()
                    .filter_map(|g| match g {
                        Glyph::Cid(c) => Some(*c),
                        _ => None,
                    })
                    .chain(font.cid_to_gid.keys().copied())
                    .max();
                font.info.cid_count = max_cid.map_or(0, |c| c + 1);
            }
            if font.info.cid_system_info.is_none() {
                font.info.cid_system_info = Some(CidSystemInfo::default());
            }
        }
        if !self.info_set && font.info.bbox.is_empty() {
            let matrix = font.matrix;
            let bbox = font
                .glyphs
                .values()
                .fold(BBox::default(), |acc, g| acc.union(&g.bbox));
            let scaled = if font.font_type == FontType::Type3 {
                bbox
            } else {
                bbox.transform(&Matrix {
                    a: matrix.a * 1000.0,
                    b: matrix.b * 1000.0,
                    c: matrix.c * 1000.0,
                    d: matrix.d * 1000.0,
                    e: 0.0,
                    f: 0.0,
                })
            };
            font.info.bbox = scaled;
            font.info.ascent = scaled.ury;
            font.info.descent = scaled.lly;
            font.info.cap_height = scaled.ury;
            font.info.stem_v = 80.0;
        }
        self.font
    }
}
