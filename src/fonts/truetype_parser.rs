//! TrueType/OpenType live font backed by `ttf-parser`.
//!
//! The font owns its sfnt bytes so it can be shared as
//! `Arc<dyn AbstractFont>`; the `ttf_parser::Face` is re-borrowed from them
//! on demand. Glyph outlines are serialised into a byte stream that serves as
//! the glyph's identity for the copy engine.

use std::collections::HashMap;
use std::io;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use bytes::Bytes;
use ttf_parser::{Face, GlyphId, OutlineBuilder, Tag};

use crate::error::{Error, Result};
use crate::fonts::abstract_font::AbstractFont;
use crate::fonts::glyph::{
    BBox, FontFlags, FontId, FontInfo, FontType, Glyph, GlyphInfo, GlyphInfoFlags, Matrix,
};
use crate::fonts::memory_font::next_font_id;

/// Error types for TrueType font parsing.
#[derive(Debug, thiserror::Error)]
pub enum TrueTypeError {
    /// Failed to parse font file
    #[error("Failed to parse font file: {0}")]
    ParseError(String),

    /// Font file is empty or invalid
    #[error("Font file is empty or invalid")]
    EmptyFont,

    /// Required table is missing
    #[error("Required font table is missing: {0}")]
    MissingTable(String),

    /// IO error during font operations
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<TrueTypeError> for Error {
    fn from(err: TrueTypeError) -> Self {
        Error::Font(err.to_string())
    }
}

/// Result type for TrueType operations.
pub type TrueTypeResult<T> = std::result::Result<T, TrueTypeError>;

/// A TrueType font program usable as a live font.
#[derive(Debug)]
pub struct TrueTypeFont {
    id: FontId,
    data: Bytes,
    name: String,
    units_per_em: u16,
    num_glyphs: u16,
    /// Lowest Unicode code point mapped to each glyph.
    glyph_to_unicode: HashMap<u16, u32>,
    /// Font uses a (3,0) symbol cmap.
    symbolic_cmap: bool,
    info: FontInfo,
}

impl TrueTypeFont {
    /// Parse a TrueType/OpenType font from raw data.
    pub fn parse(data: impl Into<Bytes>) -> TrueTypeResult<Self> {
        let data: Bytes = data.into();
        if data.is_empty() {
            return Err(TrueTypeError::EmptyFont);
        }

        let face = Face::parse(&data, 0).map_err(|e| TrueTypeError::ParseError(e.to_string()))?;
        let units_per_em = face.units_per_em();
        if units_per_em == 0 {
            return Err(TrueTypeError::MissingTable("head".to_string()));
        }
        let num_glyphs = face.number_of_glyphs();

        let name = postscript_name(&face).unwrap_or_else(|| "Unknown".to_string());
        let (glyph_to_unicode, symbolic_cmap) = build_reverse_cmap(&face);
        let info = font_info(&face, num_glyphs, symbolic_cmap);

        Ok(Self {
            id: next_font_id(),
            data: data.clone(),
            name,
            units_per_em,
            num_glyphs,
            glyph_to_unicode,
            symbolic_cmap,
            info,
        })
    }

    /// Load a font file from disk.
    pub fn open(path: impl AsRef<std::path::Path>) -> TrueTypeResult<Self> {
        Self::parse(std::fs::read(path)?)
    }

    /// Units per em of the design grid.
    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Number of glyphs in the font.
    pub fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    fn face(&self) -> Result<Face<'_>> {
        Face::parse(&self.data, 0)
            .map_err(|e| Error::from(TrueTypeError::ParseError(e.to_string())))
    }

    fn gid(&self, glyph: &Glyph) -> Result<GlyphId> {
        let n = match glyph {
            Glyph::Index(i) | Glyph::Cid(i) => *i,
            Glyph::Name(n) if n == ".notdef" => 0,
            Glyph::Name(n) => {
                return Err(Error::Undefined(format!("glyph /{} has no index in {}", n, self.name)))
            },
        };
        if n >= self.num_glyphs as u32 {
            return Err(Error::Undefined(format!("GID {} beyond {} glyphs", n, self.num_glyphs)));
        }
        Ok(GlyphId(n as u16))
    }
}

fn postscript_name(face: &Face<'_>) -> Option<String> {
    face.names()
        .into_iter()
        .find(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .and_then(|name| name.to_string())
}

fn build_reverse_cmap(face: &Face<'_>) -> (HashMap<u16, u32>, bool) {
    let mut map: HashMap<u16, u32> = HashMap::new();
    let mut symbolic = false;
    if let Some(cmap) = face.tables().cmap {
        for subtable in cmap.subtables {
            if subtable.platform_id == ttf_parser::PlatformId::Windows && subtable.encoding_id == 0
            {
                symbolic = true;
            }
            if !subtable.is_unicode() {
                continue;
            }
            subtable.codepoints(|cp| {
                if let Some(gid) = subtable.glyph_index(cp) {
                    let entry = map.entry(gid.0).or_insert(cp);
                    if cp < *entry {
                        *entry = cp;
                    }
                }
            });
        }
    }
    (map, symbolic)
}

fn raw_table<'a>(face: &Face<'a>, tag: &[u8; 4]) -> Option<&'a [u8]> {
    face.raw_face().table(Tag::from_bytes(tag))
}

fn font_info(face: &Face<'_>, num_glyphs: u16, symbolic_cmap: bool) -> FontInfo {
    let scale = 1000.0 / face.units_per_em() as f64;
    let os2 = raw_table(face, b"OS/2");
    let post = raw_table(face, b"post");

    // OS/2 fsType sits at offset 8.
    let fs_type = os2.filter(|t| t.len() >= 10).map(|t| BigEndian::read_u16(&t[8..10]));
    // post: italicAngle (16.16 fixed) at 4, isFixedPitch at 12.
    let italic_angle = post
        .filter(|t| t.len() >= 8)
        .map(|t| BigEndian::read_i32(&t[4..8]) as f64 / 65536.0)
        .unwrap_or(0.0);
    let fixed_pitch = post
        .filter(|t| t.len() >= 16)
        .is_some_and(|t| BigEndian::read_u32(&t[12..16]) != 0);

    let mut flags = FontFlags::empty();
    if fixed_pitch {
        flags |= FontFlags::FIXED_PITCH;
    }
    if symbolic_cmap {
        flags |= FontFlags::SYMBOLIC;
    } else {
        flags |= FontFlags::NONSYMBOLIC;
    }
    if face.is_italic() || italic_angle != 0.0 {
        flags |= FontFlags::ITALIC;
    }

    let bbox = face.global_bounding_box();
    let ascent = face.ascender() as f64 * scale;
    FontInfo {
        fs_type,
        bbox: BBox::new(
            bbox.x_min as f64 * scale,
            bbox.y_min as f64 * scale,
            bbox.x_max as f64 * scale,
            bbox.y_max as f64 * scale,
        ),
        ascent,
        descent: face.descender() as f64 * scale,
        cap_height: face.capital_height().map_or(ascent, |h| h as f64 * scale),
        italic_angle,
        stem_v: if face.is_bold() { 140.0 } else { 80.0 },
        flags,
        num_glyphs: num_glyphs as u32,
        cid_count: num_glyphs as u32,
        cid_system_info: None,
        base_encoding: None,
    }
}

/// Serialises outline commands as `opcode` + big-endian f32 coordinates.
struct OutlineBytes(Vec<u8>);

impl OutlineBytes {
    fn op(&mut self, op: u8, coords: &[f32]) {
        self.0.push(op);
        for &c in coords {
            // Writes into a Vec cannot fail.
            let _ = self.0.write_f32::<BigEndian>(c);
        }
    }
}

impl OutlineBuilder for OutlineBytes {
    fn move_to(&mut self, x: f32, y: f32) {
        self.op(b'm', &[x, y]);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.op(b'l', &[x, y]);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.op(b'q', &[x1, y1, x, y]);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.op(b'c', &[x1, y1, x2, y2, x, y]);
    }

    fn close(&mut self) {
        self.op(b'h', &[]);
    }
}

impl AbstractFont for TrueTypeFont {
    fn font_id(&self) -> FontId {
        self.id
    }

    fn font_type(&self) -> FontType {
        FontType::TrueType
    }

    fn font_name(&self) -> &str {
        &self.name
    }

    fn font_matrix(&self) -> Matrix {
        let s = 1.0 / self.units_per_em as f64;
        Matrix::scale(s, s)
    }

    fn enumerate_glyph(&self, cursor: &mut usize) -> Option<Glyph> {
        if *cursor < self.num_glyphs as usize {
            let g = Glyph::Index(*cursor as u32);
            *cursor += 1;
            Some(g)
        } else {
            *cursor = 0;
            None
        }
    }

    fn glyph_name(&self, glyph: &Glyph) -> Option<String> {
        let gid = self.gid(glyph).ok()?;
        let face = self.face().ok()?;
        face.glyph_name(gid).map(str::to_string)
    }

    fn glyph_info(&self, glyph: &Glyph, flags: GlyphInfoFlags) -> Result<GlyphInfo> {
        let gid = self.gid(glyph)?;
        let face = self.face()?;
        let mut info = GlyphInfo::default();
        if flags.contains(GlyphInfoFlags::WIDTH0) {
            info.width = Some((face.glyph_hor_advance(gid).unwrap_or(0) as f64, 0.0));
        }
        if flags.contains(GlyphInfoFlags::WIDTH1) {
            let adv = face
                .glyph_ver_advance(gid)
                .map_or(self.units_per_em as f64, |a| a as f64);
            info.width1 = Some((0.0, -adv));
        }
        if flags.contains(GlyphInfoFlags::VVECTOR) {
            let half = face.glyph_hor_advance(gid).unwrap_or(0) as f64 / 2.0;
            let y = face
                .glyph_y_origin(gid)
                .map_or(face.ascender() as f64, |y| y as f64);
            info.v = Some((half, y));
        }
        if flags.contains(GlyphInfoFlags::BBOX) {
            info.bbox = Some(face.glyph_bounding_box(gid).map_or(BBox::default(), |r| {
                BBox::new(r.x_min as f64, r.y_min as f64, r.x_max as f64, r.y_max as f64)
            }));
        }
        Ok(info)
    }

    fn glyph_outline(&self, glyph: &Glyph) -> Result<Bytes> {
        let gid = self.gid(glyph)?;
        let face = self.face()?;
        let mut out = OutlineBytes(Vec::new());
        // Advance is part of the identity: same outline, different width is a different glyph.
        out.op(b'w', &[face.glyph_hor_advance(gid).unwrap_or(0) as f32]);
        face.outline_glyph(gid, &mut out);
        Ok(Bytes::from(out.0))
    }

    fn encode_char(&self, code: u32) -> Option<Glyph> {
        let face = self.face().ok()?;
        if self.symbolic_cmap {
            if let Some(cmap) = face.tables().cmap {
                for subtable in cmap.subtables {
                    if let Some(g) = subtable
                        .glyph_index(0xF000 + code)
                        .or_else(|| subtable.glyph_index(code))
                    {
                        return Some(Glyph::Index(g.0 as u32));
                    }
                }
            }
        }
        let ch = char::from_u32(code)?;
        face.glyph_index(ch).map(|g| Glyph::Index(g.0 as u32))
    }

    fn decode_glyph(&self, glyph: &Glyph, _code: u32) -> Option<Vec<u16>> {
        let gid = self.gid(glyph).ok()?;
        let cp = *self.glyph_to_unicode.get(&gid.0)?;
        let ch = char::from_u32(cp)?;
        let mut buf = [0u16; 2];
        Some(ch.encode_utf16(&mut buf).to_vec())
    }

    fn font_info(&self) -> FontInfo {
        self.info.clone()
    }

    fn font_file(&self) -> Option<Bytes> {
        Some(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_on_empty_data() {
        let result = TrueTypeFont::parse(Vec::new());
        assert!(matches!(result, Err(TrueTypeError::EmptyFont)));
    }

    #[test]
    fn test_error_on_invalid_data() {
        let result = TrueTypeFont::parse(&b"not a font file"[..]);
        assert!(matches!(result, Err(TrueTypeError::ParseError(_))));
    }

    #[test]
    fn test_error_converts_to_font_error() {
        let err: Error = TrueTypeError::EmptyFont.into();
        assert!(matches!(err, Error::Font(_)));
        assert!(err.is_font_fatal());
    }

    #[test]
    fn test_outline_bytes_encoding() {
        let mut out = OutlineBytes(Vec::new());
        out.move_to(1.0, 2.0);
        out.close();
        assert_eq!(out.0.len(), 1 + 8 + 1);
        assert_eq!(out.0[0], b'm');
        assert_eq!(BigEndian::read_f32(&out.0[1..5]), 1.0);
        assert_eq!(out.0[9], b'h');
    }
}
