//! Integration tests for simple-font resources.
//!
//! These tests verify encoding and width bookkeeping of single-byte fonts:
//! - FirstChar/LastChar bracketing and the empty sentinel
//! - Differences against the base encoding
//! - TrueType width rounding
//! - ToUnicode values
//! - new resources on encoding conflicts

use pdf_fontwrite::fonts::{AbstractFont, BaseEncoding, FontType, Glyph, MemoryFont, MemoryGlyph};
use pdf_fontwrite::writer::{
    FontManager, SimpleEncoding, TextOp, TextRun, EMPTY_FIRST_CHAR, EMPTY_LAST_CHAR,
};
use proptest::prelude::*;
use std::sync::Arc;

fn standard_font() -> Arc<dyn AbstractFont> {
    Arc::new(
        MemoryFont::builder("Simple-Regular", FontType::Type1)
            .glyph(MemoryGlyph::named("A", 722.0).unicode("A"))
            .glyph(MemoryGlyph::named("B", 667.0).unicode("B"))
            .glyph(MemoryGlyph::named("C", 667.0).unicode("C"))
            .glyph(MemoryGlyph::named("space", 250.0).unicode(" "))
            .glyph(MemoryGlyph::named("Alpha", 722.0))
            .glyph(MemoryGlyph::named("uniFB01", 556.0))
            .with_base_encoding(BaseEncoding::Standard)
            .build(),
    )
}

fn every_code_font() -> Arc<dyn AbstractFont> {
    let mut builder = MemoryFont::builder("Every-Code", FontType::Type1);
    for code in 0..=255u8 {
        builder = builder.encoded(code, MemoryGlyph::named(&format!("g{}", code), 500.0));
    }
    Arc::new(builder.build())
}

/// An unused encoding reports the empty sentinel range.
#[test]
fn test_empty_range_sentinel() {
    let enc = SimpleEncoding::new(Some(BaseEncoding::Standard), false).unwrap();
    assert_eq!(enc.char_range(), (EMPTY_FIRST_CHAR, EMPTY_LAST_CHAR));
    assert!(enc.widths().is_empty());
}

proptest! {
    /// FirstChar/LastChar bracket every used code.
    #[test]
    fn prop_char_range_brackets_used_codes(text in prop::collection::vec(any::<u8>(), 1..40)) {
        let mut fm = FontManager::default();
        let shown = fm.show_text(&TextRun::new(every_code_font(), text.clone(), 10.0)).unwrap();
        let res = fm.resource(shown.resource).unwrap();
        let (first, last) = res.char_range().unwrap();

        let min = *text.iter().min().unwrap() as i32;
        let max = *text.iter().max().unwrap() as i32;
        prop_assert_eq!((first, last), (min, max));

        let enc = res.simple_encoding().unwrap();
        for code in enc.used_codes() {
            prop_assert!(first <= code as i32 && code as i32 <= last);
        }
        prop_assert_eq!(enc.widths().len() as i32, last - first + 1);
    }
}

/// Standard-encoded codes need no Differences; one foreign glyph needs one.
#[test]
fn test_differences_only_where_needed() {
    let font = standard_font();
    let mut fm = FontManager::default();

    let shown = fm.show_text(&TextRun::new(font.clone(), b"AB C".to_vec(), 10.0)).unwrap();
    let enc = fm.resource(shown.resource).unwrap().simple_encoding().unwrap();
    assert!(enc.differences().is_empty());
    assert!(!enc.has_differences());

    let run = TextRun::new(font, b"A".to_vec(), 10.0).with_glyphs(vec![Glyph::name("Alpha")]);
    let shown = fm.show_text(&run).unwrap();
    let enc = fm.resource(shown.resource).unwrap().simple_encoding().unwrap();
    assert_eq!(enc.differences(), vec![(65, "Alpha".to_string())]);
}

/// Conflicting codes get a new resource that shares the descriptor.
#[test]
fn test_encoding_conflict_shares_descriptor() {
    let font = standard_font();
    let mut fm = FontManager::default();

    let plain = fm.show_text(&TextRun::new(font.clone(), b"AB".to_vec(), 10.0)).unwrap();
    let alpha = TextRun::new(font.clone(), b"A".to_vec(), 10.0).with_glyphs(vec![Glyph::name("Alpha")]);
    let conflicting = fm.show_text(&alpha).unwrap();
    let again = fm.show_text(&TextRun::new(font.clone(), b"B".to_vec(), 10.0)).unwrap();

    assert_ne!(plain.resource, conflicting.resource);
    assert_eq!(plain.resource, again.resource);
    let d1 = fm.resource(plain.resource).unwrap().descriptor();
    let d2 = fm.resource(conflicting.resource).unwrap().descriptor();
    assert!(d1.is_some());
    assert_eq!(d1, d2);
    assert_eq!(fm.descriptors().count(), 1);
}

/// ToUnicode comes from the font, then from `uniXXXX` names.
#[test]
fn test_to_unicode_values() {
    let font = standard_font();
    let mut fm = FontManager::default();
    let run = TextRun::new(font, b"AX".to_vec(), 10.0)
        .with_glyphs(vec![Glyph::name("A"), Glyph::name("uniFB01")]);
    let shown = fm.show_text(&run).unwrap();

    let map = fm.resource(shown.resource).unwrap().to_unicode().unwrap();
    assert_eq!(map.get_bytes(0x41), Some(vec![0x00, 0x41]));
    assert_eq!(map.get_bytes(b'X' as u32), Some(vec![0xFB, 0x01]));
}

/// TrueType widths are rounded to the unit before comparing.
#[test]
fn test_truetype_width_rounds() {
    // 1025.0035 / 2048 * 1000 = 500.49
    let font: Arc<dyn AbstractFont> = Arc::new(
        MemoryFont::builder("Grid Sans", FontType::TrueType)
            .encoded(
                65,
                MemoryGlyph::new(Glyph::Index(3), 1025.0035)
                    .with_name("A")
                    .unicode("A"),
            )
            .build(),
    );
    let mut fm = FontManager::default();
    let run = TextRun::new(font, b"A".to_vec(), 10.0).with_replaced_widths(vec![Some((5.0, 0.0))]);
    let shown = fm.show_text(&run).unwrap();

    assert_eq!(shown.ops, vec![TextOp::ShowText(vec![65])]);
    let enc = fm.resource(shown.resource).unwrap().simple_encoding().unwrap();
    assert_eq!(enc.slot(65).unwrap().width, (500.0, 0.0));
}

/// Character and word spacing move both the drawn and the wanted advance.
#[test]
fn test_spacing_does_not_create_adjustments() {
    let font = standard_font();
    let mut fm = FontManager::default();
    let run = TextRun::new(font, b"A B".to_vec(), 12.0)
        .with_char_spacing(0.5)
        .with_word_spacing(3.0);
    let shown = fm.show_text(&run).unwrap();
    assert_eq!(shown.ops, vec![TextOp::ShowText(b"A B".to_vec())]);
    let expected = (722.0 + 250.0 + 667.0) * 12.0 / 1000.0 + 3.0 * 0.5 + 3.0;
    assert!((shown.advance.0 - expected).abs() < 1e-9);
}
