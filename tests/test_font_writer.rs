//! Integration tests for document-close writing of font resources.

use pdf_fontwrite::fonts::{AbstractFont, BaseEncoding, FontType, MemoryFont, MemoryGlyph};
use pdf_fontwrite::writer::{FontManager, MemoryObjectWriter, TextRun};
use pdf_fontwrite::{FontEmbedConfig, Object};
use std::sync::Arc;

fn text_font(name: &str) -> Arc<dyn AbstractFont> {
    Arc::new(
        MemoryFont::builder(name, FontType::Type1)
            .encoded(65, MemoryGlyph::named("A", 722.0).unicode("A"))
            .encoded(66, MemoryGlyph::named("B", 667.0).unicode("B"))
            .glyph(MemoryGlyph::named("fi", 556.0).unicode("fi"))
            .with_base_encoding(BaseEncoding::Standard)
            .font_file(&b"%!PS-AdobeFont-1.0"[..])
            .build(),
    )
}

fn uncompressed() -> FontManager {
    FontManager::new(FontEmbedConfig::new().with_compress_fonts(false))
}

/// Descriptors are written before the fonts that reference them and every
/// allocated object is written.
#[test]
fn test_write_order_and_completeness() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut fm = uncompressed();
    let a = fm.show_text(&TextRun::new(text_font("First"), b"AB".to_vec(), 10.0)).unwrap();
    let b = fm.show_text(&TextRun::new(text_font("Second"), b"A".to_vec(), 10.0)).unwrap();

    let mut out = MemoryObjectWriter::new();
    let written = fm.finalize_and_write_all(&mut out).unwrap();
    assert_eq!(written.len(), 2);
    assert!(written.dropped().is_empty());
    assert!(out.unwritten().is_empty());

    for shown in [a, b] {
        let font_ref = written.get(shown.resource).unwrap();
        let dict = out.get(font_ref).unwrap().as_dict().unwrap();
        let descriptor = dict.get("FontDescriptor").and_then(Object::as_reference).unwrap();
        assert!(out.position(descriptor).unwrap() < out.position(font_ref).unwrap());
        let file = out
            .get(descriptor)
            .unwrap()
            .as_dict()
            .unwrap()
            .get("FontFile")
            .and_then(Object::as_reference)
            .unwrap();
        assert_eq!(out.get(file).unwrap().stream_data(), Some(&b"%!PS-AdobeFont-1.0"[..]));
    }
}

/// Widths cover FirstChar..LastChar and the ToUnicode CMap is written.
#[test]
fn test_simple_font_dictionary() {
    let mut fm = uncompressed();
    let shown = fm.show_text(&TextRun::new(text_font("Dict"), b"AB".to_vec(), 10.0)).unwrap();
    let mut out = MemoryObjectWriter::new();
    let written = fm.finalize_and_write_all(&mut out).unwrap();

    let dict = out.get(written.get(shown.resource).unwrap()).unwrap().as_dict().unwrap();
    assert_eq!(dict.get("Subtype").and_then(Object::as_name), Some("Type1"));
    assert_eq!(dict.get("FirstChar").and_then(Object::as_integer), Some(65));
    assert_eq!(dict.get("LastChar").and_then(Object::as_integer), Some(66));
    assert_eq!(
        dict.get("Widths").and_then(Object::as_array).unwrap(),
        &vec![Object::Integer(722), Object::Integer(667)]
    );

    let to_unicode = dict.get("ToUnicode").and_then(Object::as_reference).unwrap();
    let cmap = String::from_utf8(out.get(to_unicode).unwrap().stream_data().unwrap().to_vec()).unwrap();
    assert!(cmap.contains("2 beginbfchar"));
    assert!(cmap.contains("<41> <0041>"));
    assert!(cmap.contains("<42> <0042>"));
}

/// Multi-unit ToUnicode values are dropped for fonts with Differences
/// unless configured otherwise.
#[test]
fn test_multi_unit_to_unicode_with_differences() {
    let run = TextRun::new(text_font("Ligature"), b"A".to_vec(), 10.0)
        .with_glyphs(vec![pdf_fontwrite::fonts::Glyph::name("fi")]);

    for (drop, expect) in [(true, false), (false, true)] {
        let config = FontEmbedConfig::new()
            .with_compress_fonts(false)
            .with_drop_multi_unit_to_unicode(drop);
        let mut fm = FontManager::new(config);
        let shown = fm.show_text(&run).unwrap();
        let mut out = MemoryObjectWriter::new();
        let written = fm.finalize_and_write_all(&mut out).unwrap();
        let dict = out.get(written.get(shown.resource).unwrap()).unwrap().as_dict().unwrap();
        let kept = dict
            .get("ToUnicode")
            .and_then(Object::as_reference)
            .and_then(|r| out.get(r))
            .and_then(Object::stream_data)
            .is_some_and(|data| String::from_utf8_lossy(data).contains("<41> <00660069>"));
        assert_eq!(kept, expect, "drop_multi_unit_to_unicode = {}", drop);
    }
}

/// Font programs are Flate-compressed by default.
#[test]
fn test_compressed_font_file() {
    let mut fm = FontManager::default();
    let shown = fm.show_text(&TextRun::new(text_font("Packed"), b"A".to_vec(), 10.0)).unwrap();
    let mut out = MemoryObjectWriter::new();
    let written = fm.finalize_and_write_all(&mut out).unwrap();

    let dict = out.get(written.get(shown.resource).unwrap()).unwrap().as_dict().unwrap();
    let descriptor = dict.get("FontDescriptor").and_then(Object::as_reference).unwrap();
    let file = out.get(descriptor).unwrap().as_dict().unwrap().get("FontFile").and_then(Object::as_reference).unwrap();
    match out.get(file).unwrap() {
        Object::Stream { dict, data } => {
            assert_eq!(dict.get("Filter").and_then(Object::as_name), Some("FlateDecode"));
            assert_eq!(data[0], 0x78);
        },
        other => panic!("expected stream, got {:?}", other),
    }
}

/// A resource whose glyphs were all refused has nothing to write and is dropped.
#[test]
fn test_unused_resource_is_dropped() {
    let mut fm = FontManager::default();
    let shown = fm.show_text(&TextRun::new(text_font("Unused"), b"Z".to_vec(), 10.0)).unwrap();
    assert_eq!(shown.fallback, vec![0]);

    let mut out = MemoryObjectWriter::new();
    let written = fm.finalize_and_write_all(&mut out).unwrap();
    assert!(written.is_dropped(shown.resource));
    assert!(written.get(shown.resource).is_none());
    assert!(out.unwritten().is_empty());
}

/// Type 3 fonts carry their glyph procedures inline.
#[test]
fn test_type3_font() {
    let font: Arc<dyn AbstractFont> = Arc::new(
        MemoryFont::builder("Shapes", FontType::Type3)
            .encoded(97, MemoryGlyph::named("square", 1000.0).outline(&b"0 0 1000 1000 re f"[..]))
            .encoded(98, MemoryGlyph::named("circle", 1000.0))
            .build(),
    );
    let mut fm = uncompressed();
    let shown = fm.show_text(&TextRun::new(font, b"a".to_vec(), 12.0)).unwrap();
    let mut out = MemoryObjectWriter::new();
    let written = fm.finalize_and_write_all(&mut out).unwrap();

    let dict = out.get(written.get(shown.resource).unwrap()).unwrap().as_dict().unwrap();
    assert_eq!(dict.get("Subtype").and_then(Object::as_name), Some("Type3"));
    assert!(dict.get("FontDescriptor").is_none());
    assert_eq!(dict.get("FontMatrix").and_then(Object::as_array).map(Vec::len), Some(6));
    assert_eq!(dict.get("Widths").and_then(Object::as_array).map(Vec::len), Some(1));

    let procs = dict.get("CharProcs").and_then(Object::as_dict).unwrap();
    assert_eq!(procs.len(), 1);
    let square = procs.get("square").and_then(Object::as_reference).unwrap();
    assert_eq!(out.get(square).unwrap().stream_data(), Some(&b"0 0 1000 1000 re f"[..]));
}
