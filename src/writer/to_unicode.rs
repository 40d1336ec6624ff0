//! ToUnicode maps.
//!
//! Codes map to UTF-16BE values. Simple fonts use one-byte keys, CID and
//! composite fonts two-byte keys. Entries are added while text is shown and
//! serialised as a CMap stream at document close.

use crate::fonts::abstract_font::AbstractFont;
use crate::fonts::encoding::parse_uni_name;
use crate::fonts::glyph::Glyph;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Max entries per `beginbfchar` section.
const BFCHAR_CHUNK: usize = 100;

/// Code to Unicode table of one font resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ToUnicodeMap {
    key_size: u8,
    entries: BTreeMap<u32, Vec<u16>>,
    max_units: usize,
}

impl ToUnicodeMap {
    /// Empty map with 1- or 2-byte keys.
    pub fn new(key_size: u8) -> Self {
        Self {
            key_size: key_size.clamp(1, 2),
            entries: BTreeMap::new(),
            max_units: 1,
        }
    }

    /// Key width in bytes.
    pub fn key_size(&self) -> u8 {
        self.key_size
    }

    /// Longest value stored so far, in UTF-16 units.
    pub fn max_value_units(&self) -> usize {
        self.max_units
    }

    /// Add a mapping. The first mapping of a code wins; returns `false` if
    /// the code was already mapped or the value is empty.
    pub fn insert(&mut self, code: u32, units: Vec<u16>) -> bool {
        if units.is_empty() || self.entries.contains_key(&code) {
            return false;
        }
        self.max_units = self.max_units.max(units.len());
        self.entries.insert(code, units);
        true
    }

    /// True if `code` is mapped.
    pub fn contains(&self, code: u32) -> bool {
        self.entries.contains_key(&code)
    }

    /// Value of `code`.
    pub fn get(&self, code: u32) -> Option<&[u16]> {
        self.entries.get(&code).map(Vec::as_slice)
    }

    /// Value of `code` as UTF-16BE bytes.
    pub fn get_bytes(&self, code: u32) -> Option<Vec<u8>> {
        self.get(code)
            .map(|units| units.iter().flat_map(|u| u.to_be_bytes()).collect())
    }

    /// Number of mapped codes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mappings in code order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u16])> {
        self.entries.iter().map(|(&c, v)| (c, v.as_slice()))
    }

    /// CMap stream contents.
    ///
    /// With `single_unit_only`, values longer than one UTF-16 unit are left
    /// out.
    pub fn to_cmap(&self, single_unit_only: bool) -> Vec<u8> {
        let mut cmap = String::new();

        cmap.push_str("/CIDInit /ProcSet findresource begin\n");
        cmap.push_str("12 dict begin\n");
        cmap.push_str("begincmap\n");
        cmap.push_str("/CIDSystemInfo <<\n");
        cmap.push_str("  /Registry (Adobe)\n");
        cmap.push_str("  /Ordering (UCS)\n");
        cmap.push_str("  /Supplement 0\n");
        cmap.push_str(">> def\n");
        cmap.push_str("/CMapName /Adobe-Identity-UCS def\n");
        cmap.push_str("/CMapType 2 def\n");
        cmap.push_str("1 begincodespacerange\n");
        if self.key_size == 1 {
            cmap.push_str("<00> <FF>\n");
        } else {
            cmap.push_str("<0000> <FFFF>\n");
        }
        cmap.push_str("endcodespacerange\n");

        let mappings: Vec<(u32, &[u16])> = self
            .iter()
            .filter(|(_, units)| !single_unit_only || units.len() == 1)
            .collect();
        for chunk in mappings.chunks(BFCHAR_CHUNK) {
            let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
            for &(code, units) in chunk {
                if self.key_size == 1 {
                    let _ = write!(cmap, "<{:02X}> <", code);
                } else {
                    let _ = write!(cmap, "<{:04X}> <", code);
                }
                for u in units {
                    let _ = write!(cmap, "{:04X}", u);
                }
                cmap.push_str(">\n");
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\n");
        cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
        cmap.push_str("end\n");
        cmap.push_str("end\n");

        cmap.into_bytes()
    }
}

/// UTF-16 units of a code point, as a surrogate pair above the BMP.
pub fn codepoint_to_utf16(cp: u32) -> Vec<u16> {
    if cp <= 0xFFFF {
        vec![cp as u16]
    } else {
        let high = ((cp - 0x10000) >> 10) + 0xD800;
        let low = ((cp - 0x10000) & 0x3FF) + 0xDC00;
        vec![high as u16, low as u16]
    }
}

/// Unicode from the font itself: its own decoding, then a `uniXXXX` name.
pub fn font_unicode(
    font: &dyn AbstractFont,
    glyph: &Glyph,
    code: u32,
    glyph_name: Option<&str>,
) -> Option<Vec<u16>> {
    if let Some(units) = font.decode_glyph(glyph, code).filter(|u| !u.is_empty()) {
        return Some(units);
    }
    let name = match (glyph_name, glyph) {
        (Some(n), _) => n,
        (None, Glyph::Name(n)) => n.as_str(),
        _ => return None,
    };
    parse_uni_name(name).map(|u| vec![u])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::glyph::FontType;
    use crate::fonts::memory_font::{MemoryFont, MemoryGlyph};

    #[test]
    fn test_first_mapping_wins() {
        let mut map = ToUnicodeMap::new(1);
        assert!(map.insert(0x41, vec![0x41]));
        assert!(!map.insert(0x41, vec![0x42]));
        assert!(!map.insert(0x42, vec![]));
        assert_eq!(map.get_bytes(0x41), Some(vec![0x00, 0x41]));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_value_width_grows() {
        let mut map = ToUnicodeMap::new(2);
        map.insert(1, vec![0x41]);
        assert_eq!(map.max_value_units(), 1);
        map.insert(2, codepoint_to_utf16(0x1F600));
        assert_eq!(map.max_value_units(), 2);
        assert_eq!(map.get_bytes(2), Some(vec![0xD8, 0x3D, 0xDE, 0x00]));
    }

    #[test]
    fn test_cmap_text() {
        let mut map = ToUnicodeMap::new(1);
        map.insert(0x41, vec![0x41]);
        map.insert(0x42, vec![0x66, 0x69]);
        let text = String::from_utf8(map.to_cmap(false)).unwrap();
        assert!(text.contains("<00> <FF>"));
        assert!(text.contains("2 beginbfchar"));
        assert!(text.contains("<41> <0041>"));
        assert!(text.contains("<42> <00660069>"));

        let trimmed = String::from_utf8(map.to_cmap(true)).unwrap();
        assert!(trimmed.contains("1 beginbfchar"));
        assert!(!trimmed.contains("<42>"));
    }

    #[test]
    fn test_cmap_chunks_of_100() {
        let mut map = ToUnicodeMap::new(2);
        for code in 0..250u32 {
            map.insert(code, vec![0x4E00 + code as u16]);
        }
        let text = String::from_utf8(map.to_cmap(false)).unwrap();
        assert_eq!(text.matches("100 beginbfchar").count(), 2);
        assert_eq!(text.matches("50 beginbfchar").count(), 1);
        assert!(text.contains("<0000> <4E00>"));
    }

    #[test]
    fn test_font_unicode_order() {
        let font = MemoryFont::builder("T", FontType::Type1)
            .encoded(65, MemoryGlyph::named("A", 500.0).unicode("A"))
            .encoded(66, MemoryGlyph::named("uniFB01", 500.0))
            .encoded(67, MemoryGlyph::named("glyph7", 500.0))
            .build();
        assert_eq!(font_unicode(&font, &Glyph::name("A"), 65, None), Some(vec![0x41]));
        assert_eq!(
            font_unicode(&font, &Glyph::name("uniFB01"), 66, None),
            Some(vec![0xFB01])
        );
        assert_eq!(font_unicode(&font, &Glyph::name("glyph7"), 67, None), None);
    }
}
