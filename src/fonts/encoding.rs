//! Named base encodings for simple fonts.
//!
//! A simple font's `/Encoding` is written as one of these names plus a
//! `/Differences` array for the codes whose glyph is not the one the base
//! encoding already implies.

use lazy_static::lazy_static;

/// Predefined single-byte encodings usable as `/BaseEncoding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseEncoding {
    /// Adobe StandardEncoding (implicit for Type 1 fonts)
    Standard,
    /// WinAnsiEncoding (Windows code page 1252)
    WinAnsi,
    /// MacRomanEncoding
    MacRoman,
}

impl BaseEncoding {
    /// All encodings in the order they are tried when refining.
    pub const ALL: [BaseEncoding; 3] = [
        BaseEncoding::Standard,
        BaseEncoding::WinAnsi,
        BaseEncoding::MacRoman,
    ];

    /// PDF name of the encoding.
    pub fn pdf_name(self) -> &'static str {
        match self {
            BaseEncoding::Standard => "StandardEncoding",
            BaseEncoding::WinAnsi => "WinAnsiEncoding",
            BaseEncoding::MacRoman => "MacRomanEncoding",
        }
    }

    /// Glyph name the encoding assigns to `code`.
    pub fn glyph_name(self, code: u32) -> Option<&'static str> {
        if code > 255 {
            return None;
        }
        let table: &[Option<&'static str>; 256] = match self {
            BaseEncoding::Standard => &STANDARD_ENCODING,
            BaseEncoding::WinAnsi => &WIN_ANSI_ENCODING,
            BaseEncoding::MacRoman => &MAC_ROMAN_ENCODING,
        };
        table[code as usize]
    }

    /// Code the encoding assigns to `name`, if any.
    pub fn code_for(self, name: &str) -> Option<u32> {
        (0..256).find(|&c| self.glyph_name(c) == Some(name))
    }
}

const ASCII_NAMES: [&str; 95] = [
    "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand", "quoteright",
    "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period", "slash", "zero",
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "colon", "semicolon",
    "less", "equal", "greater", "question", "at", "A", "B", "C", "D", "E", "F", "G", "H", "I",
    "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z",
    "bracketleft", "backslash", "bracketright", "asciicircum", "underscore", "quoteleft", "a",
    "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s",
    "t", "u", "v", "w", "x", "y", "z", "braceleft", "bar", "braceright", "asciitilde",
];

const STANDARD_HIGH: &[(u8, &str)] = &[
    (161, "exclamdown"), (162, "cent"), (163, "sterling"), (164, "fraction"), (165, "yen"),
    (166, "florin"), (167, "section"), (168, "currency"), (169, "quotesingle"),
    (170, "quotedblleft"), (171, "guillemotleft"), (172, "guilsinglleft"),
    (173, "guilsinglright"), (174, "fi"), (175, "fl"), (177, "endash"), (178, "dagger"),
    (179, "daggerdbl"), (180, "periodcentered"), (182, "paragraph"), (183, "bullet"),
    (184, "quotesinglbase"), (185, "quotedblbase"), (186, "quotedblright"),
    (187, "guillemotright"), (188, "ellipsis"), (189, "perthousand"), (191, "questiondown"),
    (193, "grave"), (194, "acute"), (195, "circumflex"), (196, "tilde"), (197, "macron"),
    (198, "breve"), (199, "dotaccent"), (200, "dieresis"), (202, "ring"), (203, "cedilla"),
    (205, "hungarumlaut"), (206, "ogonek"), (207, "caron"), (208, "emdash"), (225, "AE"),
    (227, "ordfeminine"), (232, "Lslash"), (233, "Oslash"), (234, "OE"), (235, "ordmasculine"),
    (241, "ae"), (245, "dotlessi"), (248, "lslash"), (249, "oslash"), (250, "oe"),
    (251, "germandbls"),
];

const WIN_ANSI_HIGH: &[(u8, &str)] = &[
    (128, "Euro"), (130, "quotesinglbase"), (131, "florin"), (132, "quotedblbase"),
    (133, "ellipsis"), (134, "dagger"), (135, "daggerdbl"), (136, "circumflex"),
    (137, "perthousand"), (138, "Scaron"), (139, "guilsinglleft"), (140, "OE"), (142, "Zcaron"),
    (145, "quoteleft"), (146, "quoteright"), (147, "quotedblleft"), (148, "quotedblright"),
    (149, "bullet"), (150, "endash"), (151, "emdash"), (152, "tilde"), (153, "trademark"),
    (154, "scaron"), (155, "guilsinglright"), (156, "oe"), (158, "zcaron"), (159, "Ydieresis"),
    (160, "space"), (161, "exclamdown"), (162, "cent"), (163, "sterling"), (164, "currency"),
    (165, "yen"), (166, "brokenbar"), (167, "section"), (168, "dieresis"), (169, "copyright"),
    (170, "ordfeminine"), (171, "guillemotleft"), (172, "logicalnot"), (173, "hyphen"),
    (174, "registered"), (175, "macron"), (176, "degree"), (177, "plusminus"),
    (178, "twosuperior"), (179, "threesuperior"), (180, "acute"), (181, "mu"),
    (182, "paragraph"), (183, "periodcentered"), (184, "cedilla"), (185, "onesuperior"),
    (186, "ordmasculine"), (187, "guillemotright"), (188, "onequarter"), (189, "onehalf"),
    (190, "threequarters"), (191, "questiondown"),
];

/// Latin-1 letters shared by WinAnsi at 192..=255.
const LATIN1_LETTERS: [&str; 64] = [
    "Agrave", "Aacute", "Acircumflex", "Atilde", "Adieresis", "Aring", "AE", "Ccedilla",
    "Egrave", "Eacute", "Ecircumflex", "Edieresis", "Igrave", "Iacute", "Icircumflex",
    "Idieresis", "Eth", "Ntilde", "Ograve", "Oacute", "Ocircumflex", "Otilde", "Odieresis",
    "multiply", "Oslash", "Ugrave", "Uacute", "Ucircumflex", "Udieresis", "Yacute", "Thorn",
    "germandbls", "agrave", "aacute", "acircumflex", "atilde", "adieresis", "aring", "ae",
    "ccedilla", "egrave", "eacute", "ecircumflex", "edieresis", "igrave", "iacute",
    "icircumflex", "idieresis", "eth", "ntilde", "ograve", "oacute", "ocircumflex", "otilde",
    "odieresis", "divide", "oslash", "ugrave", "uacute", "ucircumflex", "udieresis", "yacute",
    "thorn", "ydieresis",
];

const MAC_ROMAN_HIGH: &[(u8, &str)] = &[
    (128, "Adieresis"), (129, "Aring"), (130, "Ccedilla"), (131, "Eacute"), (132, "Ntilde"),
    (133, "Odieresis"), (134, "Udieresis"), (135, "aacute"), (136, "agrave"),
    (137, "acircumflex"), (138, "adieresis"), (139, "atilde"), (140, "aring"),
    (141, "ccedilla"), (142, "eacute"), (143, "egrave"), (144, "ecircumflex"),
    (145, "edieresis"), (146, "iacute"), (147, "igrave"), (148, "icircumflex"),
    (149, "idieresis"), (150, "ntilde"), (151, "oacute"), (152, "ograve"),
    (153, "ocircumflex"), (154, "odieresis"), (155, "otilde"), (156, "uacute"),
    (157, "ugrave"), (158, "ucircumflex"), (159, "udieresis"), (160, "dagger"),
    (161, "degree"), (162, "cent"), (163, "sterling"), (164, "section"), (165, "bullet"),
    (166, "paragraph"), (167, "germandbls"), (168, "registered"), (169, "copyright"),
    (170, "trademark"), (171, "acute"), (172, "dieresis"), (174, "AE"), (175, "Oslash"),
    (177, "plusminus"), (180, "yen"), (181, "mu"), (187, "ordfeminine"),
    (188, "ordmasculine"), (190, "ae"), (191, "oslash"), (192, "questiondown"),
    (193, "exclamdown"), (194, "logicalnot"), (196, "florin"), (199, "guillemotleft"),
    (200, "guillemotright"), (201, "ellipsis"), (202, "space"), (203, "Agrave"),
    (204, "Atilde"), (205, "Otilde"), (206, "OE"), (207, "oe"), (208, "endash"),
    (209, "emdash"), (210, "quotedblleft"), (211, "quotedblright"), (212, "quoteleft"),
    (213, "quoteright"), (214, "divide"), (216, "ydieresis"), (217, "Ydieresis"),
    (218, "fraction"), (219, "currency"), (220, "guilsinglleft"), (221, "guilsinglright"),
    (222, "fi"), (223, "fl"), (224, "daggerdbl"), (225, "periodcentered"),
    (226, "quotesinglbase"), (227, "quotedblbase"), (228, "perthousand"),
    (229, "Acircumflex"), (230, "Ecircumflex"), (231, "Aacute"), (232, "Edieresis"),
    (233, "Egrave"), (234, "Iacute"), (235, "Icircumflex"), (236, "Idieresis"),
    (237, "Igrave"), (238, "Oacute"), (239, "Ocircumflex"), (241, "Ograve"), (242, "Uacute"),
    (243, "Ucircumflex"), (244, "Ugrave"), (245, "dotlessi"), (246, "circumflex"),
    (247, "tilde"), (248, "macron"), (249, "breve"), (250, "dotaccent"), (251, "ring"),
    (252, "cedilla"), (253, "hungarumlaut"), (254, "ogonek"), (255, "caron"),
];

fn build_table(
    ascii_overrides: &[(u8, &'static str)],
    high: &[(u8, &'static str)],
) -> [Option<&'static str>; 256] {
    let mut table = [None; 256];
    for (i, name) in ASCII_NAMES.iter().enumerate() {
        table[32 + i] = Some(*name);
    }
    for &(code, name) in ascii_overrides.iter().chain(high) {
        table[code as usize] = Some(name);
    }
    table
}

lazy_static! {
    static ref STANDARD_ENCODING: [Option<&'static str>; 256] = build_table(&[], STANDARD_HIGH);
    static ref WIN_ANSI_ENCODING: [Option<&'static str>; 256] = {
        let mut t = build_table(&[(39, "quotesingle"), (96, "grave")], WIN_ANSI_HIGH);
        for (i, name) in LATIN1_LETTERS.iter().enumerate() {
            t[192 + i] = Some(*name);
        }
        t
    };
    static ref MAC_ROMAN_ENCODING: [Option<&'static str>; 256] =
        build_table(&[(39, "quotesingle"), (96, "grave")], MAC_ROMAN_HIGH);
}

/// Unicode for a glyph name of the form `uniXXXX` (four uppercase hex digits).
pub fn parse_uni_name(name: &str) -> Option<u16> {
    let hex = name.strip_prefix("uni")?;
    if hex.len() != 4 || !hex.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
        return None;
    }
    u16::from_str_radix(hex, 16).ok()
}
