//! The 14 standard PDF fonts and their per-document reference table.
//!
//! A font whose every used glyph is byte-identical to the registered
//! reference font of the same name can be written as a standard font
//! without embedding anything.

use crate::fonts::abstract_font::AbstractFont;
use crate::fonts::font_copy::CopiedFont;
use crate::fonts::font_subsetter::strip_subset_prefix;
use crate::fonts::glyph::Glyph;
use phf::phf_map;
use std::sync::Arc;

/// Names of the standard fonts, indexed by [`StandardFont`].
pub const STANDARD_FONT_NAMES: [&str; 14] = [
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Symbol",
    "ZapfDingbats",
];

/// URW clone names of the standard fonts.
static URW_ALIASES: phf::Map<&'static str, &'static str> = phf_map! {
    "NimbusMonL-Regu" => "Courier",
    "NimbusMonoPS-Regular" => "Courier",
    "NimbusMonL-Bold" => "Courier-Bold",
    "NimbusMonoPS-Bold" => "Courier-Bold",
    "NimbusMonL-ReguObli" => "Courier-Oblique",
    "NimbusMonoPS-Italic" => "Courier-Oblique",
    "NimbusMonL-BoldObli" => "Courier-BoldOblique",
    "NimbusMonoPS-BoldItalic" => "Courier-BoldOblique",
    "NimbusSanL-Regu" => "Helvetica",
    "NimbusSans-Regular" => "Helvetica",
    "NimbusSanL-Bold" => "Helvetica-Bold",
    "NimbusSans-Bold" => "Helvetica-Bold",
    "NimbusSanL-ReguItal" => "Helvetica-Oblique",
    "NimbusSans-Italic" => "Helvetica-Oblique",
    "NimbusSanL-BoldItal" => "Helvetica-BoldOblique",
    "NimbusSans-BoldItalic" => "Helvetica-BoldOblique",
    "NimbusRomNo9L-Regu" => "Times-Roman",
    "NimbusRoman-Regular" => "Times-Roman",
    "NimbusRomNo9L-Medi" => "Times-Bold",
    "NimbusRoman-Bold" => "Times-Bold",
    "NimbusRomNo9L-ReguItal" => "Times-Italic",
    "NimbusRoman-Italic" => "Times-Italic",
    "NimbusRomNo9L-MediItal" => "Times-BoldItalic",
    "NimbusRoman-BoldItalic" => "Times-BoldItalic",
    "StandardSymL" => "Symbol",
    "StandardSymbolsPS" => "Symbol",
    "Dingbats" => "ZapfDingbats",
    "D050000L" => "ZapfDingbats",
};

/// One of the 14 standard fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StandardFont(usize);

impl StandardFont {
    /// Standard name, e.g. `Times-Roman`.
    pub fn name(self) -> &'static str {
        STANDARD_FONT_NAMES[self.0]
    }

    /// Index into [`STANDARD_FONT_NAMES`].
    pub fn index(self) -> usize {
        self.0
    }

    /// Symbol and ZapfDingbats have their own built-in encodings.
    pub fn is_symbolic(self) -> bool {
        self.0 >= 12
    }
}

/// Resolve a font name (possibly subset-prefixed or a URW alias) to a
/// standard font.
pub fn find_standard_font(name: &str) -> Option<StandardFont> {
    let name = strip_subset_prefix(name);
    let canonical = URW_ALIASES.get(name).copied().unwrap_or(name);
    STANDARD_FONT_NAMES
        .iter()
        .position(|&n| n == canonical)
        .map(StandardFont)
}

/// Reference fonts registered for the current document.
#[derive(Debug, Default, Clone)]
pub struct StandardFontTable {
    reference: [Option<Arc<dyn AbstractFont>>; 14],
}

impl StandardFontTable {
    /// Empty table; nothing can be substituted until references are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reference font for a standard name.
    ///
    /// Returns `false` if `name` is not a standard font.
    pub fn register(&mut self, name: &str, font: Arc<dyn AbstractFont>) -> bool {
        match find_standard_font(name) {
            Some(std) => {
                self.reference[std.0] = Some(font);
                true
            },
            None => false,
        }
    }

    /// Registered reference font.
    pub fn reference(&self, font: StandardFont) -> Option<&Arc<dyn AbstractFont>> {
        self.reference[font.0].as_ref()
    }

    /// Standard font `copied` can be replaced with, if every used glyph is
    /// identical to the reference.
    pub fn find_match(&self, copied: &CopiedFont) -> Option<StandardFont> {
        let std = find_standard_font(copied.font_name())?;
        let reference = self.reference(std)?;
        let mut any = false;
        for (glyph, stored) in copied.used_glyphs() {
            any = true;
            let lookup = match (glyph, &stored.name) {
                (Glyph::Name(_), _) => glyph.clone(),
                (_, Some(name)) => Glyph::name(name.as_str()),
                (_, None) => return None,
            };
            match reference.glyph_outline(&lookup) {
                Ok(data) if data == stored.data => {},
                _ => return None,
            }
        }
        any.then_some(std)
    }
}
