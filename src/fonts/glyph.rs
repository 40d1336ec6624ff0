//! Glyph identities, font classification and metric records shared by the
//! live-font interface and the copy engine.

use crate::fonts::encoding::BaseEncoding;
use bitflags::bitflags;
use std::fmt;

/// Immutable identity of a live font.
///
/// Two live fonts with the same id are the same font for the lifetime of the
/// document; a redefined font gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub u64);

impl fmt::Display for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "font#{}", self.0)
    }
}

/// Font technology, a closed set matched explicitly throughout the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontType {
    /// Type 1 (charstring) font
    Type1,
    /// Type 2 / CFF font
    Type2,
    /// TrueType font
    TrueType,
    /// CID-keyed CFF font (CIDFontType0)
    CidType0,
    /// CID-keyed TrueType font (CIDFontType2)
    CidType2,
    /// User-defined (Type 3) font
    Type3,
    /// Composite (Type 0) font wrapping one CID font
    Composite,
}

impl FontType {
    /// CID-keyed descendant font types.
    pub fn is_cid(self) -> bool {
        matches!(self, FontType::CidType0 | FontType::CidType2)
    }

    /// Single-byte encoded font types, including Type 3.
    pub fn is_simple(self) -> bool {
        matches!(
            self,
            FontType::Type1 | FontType::Type2 | FontType::TrueType | FontType::Type3
        )
    }

    /// Fonts designed on a TrueType grid, whose widths are rounded.
    pub fn is_truetype_flavored(self) -> bool {
        matches!(self, FontType::TrueType | FontType::CidType2)
    }

    /// `/Subtype` of the font dictionary written for this type.
    pub fn pdf_subtype(self) -> &'static str {
        match self {
            FontType::Type1 | FontType::Type2 => "Type1",
            FontType::TrueType => "TrueType",
            FontType::CidType0 => "CIDFontType0",
            FontType::CidType2 => "CIDFontType2",
            FontType::Type3 => "Type3",
            FontType::Composite => "Type0",
        }
    }
}

/// Writing mode of a font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WMode {
    /// Horizontal writing (WMode 0)
    #[default]
    Horizontal,
    /// Vertical writing (WMode 1)
    Vertical,
}

/// 2D affine matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    /// Identity matrix.
    pub fn identity() -> Self {
        Self::scale(1.0, 1.0)
    }

    /// Pure scaling matrix.
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Same matrix with the translation dropped.
    pub fn without_translation(self) -> Self {
        Self {
            e: 0.0,
            f: 0.0,
            ..self
        }
    }

    /// Transform a distance vector (translation ignored).
    pub fn transform_vector(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.a + y * self.c, x * self.b + y * self.d)
    }

    /// Transform a point.
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let (tx, ty) = self.transform_vector(x, y);
        (tx + self.e, ty + self.f)
    }

    /// Components in PDF array order.
    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

/// Identity of one glyph inside one font.
///
/// Type 1/CFF fonts address glyphs by name, CID fonts by CID, TrueType by
/// glyph index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Glyph {
    /// Named glyph
    Name(String),
    /// Character identifier in a CID font
    Cid(u32),
    /// Glyph index in a TrueType font
    Index(u32),
}

impl Glyph {
    /// Convenience constructor for named glyphs.
    pub fn name(name: impl Into<String>) -> Self {
        Glyph::Name(name.into())
    }

    /// The `.notdef` glyph.
    pub fn notdef() -> Self {
        Glyph::Name(".notdef".to_string())
    }

    /// True for `.notdef` by name, or index/CID 0.
    pub fn is_notdef(&self) -> bool {
        match self {
            Glyph::Name(n) => n == ".notdef",
            Glyph::Cid(c) => *c == 0,
            Glyph::Index(i) => *i == 0,
        }
    }

    /// Numeric id of CID/index glyphs.
    pub fn number(&self) -> Option<u32> {
        match self {
            Glyph::Name(_) => None,
            Glyph::Cid(n) | Glyph::Index(n) => Some(*n),
        }
    }
}

impl fmt::Display for Glyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Glyph::Name(n) => write!(f, "/{}", n),
            Glyph::Cid(c) => write!(f, "CID {}", c),
            Glyph::Index(i) => write!(f, "GID {}", i),
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl BBox {
    /// Create a box from its corners.
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self { llx, lly, urx, ury }
    }

    /// True for a degenerate box.
    pub fn is_empty(&self) -> bool {
        self.urx <= self.llx || self.ury <= self.lly
    }

    /// Smallest box containing both. Empty boxes are ignored.
    pub fn union(&self, other: &BBox) -> BBox {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        BBox {
            llx: self.llx.min(other.llx),
            lly: self.lly.min(other.lly),
            urx: self.urx.max(other.urx),
            ury: self.ury.max(other.ury),
        }
    }

    /// Box mapped through `m`, re-normalised.
    pub fn transform(&self, m: &Matrix) -> BBox {
        let pts = [
            m.transform_point(self.llx, self.lly),
            m.transform_point(self.llx, self.ury),
            m.transform_point(self.urx, self.lly),
            m.transform_point(self.urx, self.ury),
        ];
        let mut out = BBox::new(pts[0].0, pts[0].1, pts[0].0, pts[0].1);
        for (x, y) in &pts[1..] {
            out.llx = out.llx.min(*x);
            out.lly = out.lly.min(*y);
            out.urx = out.urx.max(*x);
            out.ury = out.ury.max(*y);
        }
        out
    }
}

bitflags! {
    /// Which fields of [`GlyphInfo`] to compute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GlyphInfoFlags: u8 {
        /// Horizontal advance
        const WIDTH0 = 1 << 0;
        /// Vertical advance
        const WIDTH1 = 1 << 1;
        /// Vertical origin displacement
        const VVECTOR = 1 << 2;
        /// Glyph bounding box
        const BBOX = 1 << 3;
    }
}

/// Glyph metrics in glyph space. Fields are filled per requested flag.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlyphInfo {
    pub width: Option<(f64, f64)>,
    pub width1: Option<(f64, f64)>,
    pub v: Option<(f64, f64)>,
    pub bbox: Option<BBox>,
}

bitflags! {
    /// FontDescriptor `/Flags` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FontFlags: u32 {
        const FIXED_PITCH = 1 << 0;
        const SERIF = 1 << 1;
        const SYMBOLIC = 1 << 2;
        const SCRIPT = 1 << 3;
        const NONSYMBOLIC = 1 << 5;
        const ITALIC = 1 << 6;
        const ALL_CAP = 1 << 16;
        const SMALL_CAP = 1 << 17;
        const FORCE_BOLD = 1 << 18;
    }
}

/// `/CIDSystemInfo` of a CID font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidSystemInfo {
    pub registry: String,
    pub ordering: String,
    pub supplement: i32,
}

impl Default for CidSystemInfo {
    fn default() -> Self {
        Self {
            registry: "Adobe".to_string(),
            ordering: "Identity".to_string(),
            supplement: 0,
        }
    }
}

/// Font-level metadata captured when a font is first used.
///
/// Metrics are in 1000-unit text space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontInfo {
    /// OS/2 `fsType` embedding-rights bits, if the font carries them.
    pub fs_type: Option<u16>,
    pub bbox: BBox,
    pub ascent: f64,
    pub descent: f64,
    pub cap_height: f64,
    pub italic_angle: f64,
    pub stem_v: f64,
    pub flags: FontFlags,
    /// Number of glyphs in the font program; 0 if unknown.
    pub num_glyphs: u32,
    /// Number of CIDs for CID fonts; 0 if unknown.
    pub cid_count: u32,
    pub cid_system_info: Option<CidSystemInfo>,
    /// Standard encoding the font's built-in encoding is closest to.
    pub base_encoding: Option<BaseEncoding>,
}

impl FontInfo {
    /// True if the symbolic flag is set.
    pub fn is_symbolic(&self) -> bool {
        self.flags.contains(FontFlags::SYMBOLIC)
    }
}

/// A 1-bit-per-pixel glyph raster used for OCR.
///
/// Rows run top to bottom, MSB first. `left`/`bottom` give the offset of the
/// raster's lower-left corner from the glyph origin, in pixels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub left: i32,
    pub bottom: i32,
    pub data: Vec<u8>,
}

impl GlyphBitmap {
    /// Pixel at `(x, y)`, row 0 at the top.
    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let byte = self.data.get(y as usize * self.stride + (x / 8) as usize);
        byte.is_some_and(|b| b & (0x80 >> (x & 7)) != 0)
    }

    /// True if no pixel is set.
    pub fn is_blank(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.iter().all(|&b| b == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_type_classes() {
        assert!(FontType::CidType2.is_cid());
        assert!(FontType::CidType2.is_truetype_flavored());
        assert!(FontType::Type3.is_simple());
        assert!(!FontType::Composite.is_simple());
        assert_eq!(FontType::Type2.pdf_subtype(), "Type1");
        assert_eq!(FontType::Composite.pdf_subtype(), "Type0");
    }

    #[test]
    fn test_matrix_transform() {
        let m = Matrix::scale(0.001, 0.001);
        let (x, y) = m.transform_vector(500.0, 0.0);
        assert!((x - 0.5).abs() < 1e-12);
        assert_eq!(y, 0.0);
        let t = Matrix { e: 5.0, f: 7.0, ..m }.without_translation();
        assert_eq!(t.e, 0.0);
        assert_eq!(t.f, 0.0);
    }

    #[test]
    fn test_glyph_notdef() {
        assert!(Glyph::notdef().is_notdef());
        assert!(Glyph::Index(0).is_notdef());
        assert!(!Glyph::name("A").is_notdef());
        assert_eq!(Glyph::Cid(7).number(), Some(7));
    }

    #[test]
    fn test_bbox_union_ignores_empty() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(-5.0, 2.0, 3.0, 20.0);
        assert_eq!(a.union(&b), BBox::new(-5.0, 0.0, 10.0, 20.0));
        assert_eq!(BBox::default().union(&a), a);
    }

    #[test]
    fn test_bitmap_pixel() {
        let bmp = GlyphBitmap {
            width: 9,
            height: 1,
            stride: 2,
            left: 0,
            bottom: 0,
            data: vec![0x80, 0x80],
        };
        assert!(bmp.pixel(0, 0));
        assert!(!bmp.pixel(1, 0));
        assert!(bmp.pixel(8, 0));
        assert!(!bmp.is_blank());
    }
}
