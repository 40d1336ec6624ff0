//! Integration tests for the OCR fallback of ToUnicode recovery.

use pdf_fontwrite::fonts::{AbstractFont, FontType, GlyphBitmap, MemoryFont, MemoryGlyph};
use pdf_fontwrite::writer::{FontManager, OcrBitmap, OcrEngine, OcrStage, TextRun};
use pdf_fontwrite::{Error, FontEmbedConfig, Result, UseOcr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct StubEngine {
    calls: Arc<AtomicUsize>,
    reply: Option<Vec<u32>>,
}

impl OcrEngine for StubEngine {
    fn bitmap_to_unicode(&self, bitmap: &OcrBitmap, _: (u32, u32), _: usize) -> Result<Vec<u32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(bitmap.width > 0 && bitmap.height > 0);
        self.reply
            .clone()
            .ok_or_else(|| Error::Ocr("recogniser unavailable".to_string()))
    }
}

fn block() -> GlyphBitmap {
    GlyphBitmap {
        width: 8,
        height: 10,
        stride: 1,
        left: 0,
        bottom: 0,
        data: vec![0xFF; 10],
    }
}

/// Glyph names that carry no Unicode information.
fn opaque_font() -> Arc<dyn AbstractFont> {
    Arc::new(
        MemoryFont::builder("Opaque", FontType::Type1)
            .encoded(1, MemoryGlyph::named("glyph1", 500.0).bitmap(block()))
            .encoded(2, MemoryGlyph::named("glyph2", 500.0).bitmap(block()))
            .encoded(3, MemoryGlyph::named("glyph3", 500.0).bitmap(block()))
            .build(),
    )
}

fn manager(mode: UseOcr, reply: Option<Vec<u32>>) -> (FontManager, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = StubEngine {
        calls: calls.clone(),
        reply,
    };
    let fm = FontManager::new(FontEmbedConfig::new().with_ocr(mode)).with_ocr_engine(Box::new(engine));
    (fm, calls)
}

/// Recognised characters map to the codes in left-to-right order.
#[test]
fn test_ocr_maps_codes() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut fm, calls) = manager(UseOcr::AsNeeded, Some(vec!['x' as u32, 'y' as u32, 'z' as u32]));
    let shown = fm.show_text(&TextRun::new(opaque_font(), vec![1, 2, 3], 10.0)).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let map = fm.resource(shown.resource).unwrap().to_unicode().unwrap();
    assert_eq!(map.get(1), Some(&[0x78u16][..]));
    assert_eq!(map.get(2), Some(&[0x79u16][..]));
    assert_eq!(map.get(3), Some(&[0x7Au16][..]));
    assert_eq!(fm.ocr_stage(), OcrStage::Idle);
}

/// Once the engine fails, OCR stays off for the rest of the document.
#[test]
fn test_ocr_failure_is_sticky() {
    let (mut fm, calls) = manager(UseOcr::AsNeeded, None);
    let shown = fm.show_text(&TextRun::new(opaque_font(), vec![1, 2], 10.0)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(fm.ocr_stage(), OcrStage::Failed);
    assert!(fm.resource(shown.resource).unwrap().to_unicode().unwrap().is_empty());

    fm.show_text(&TextRun::new(opaque_font(), vec![3], 10.0)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(fm.ocr_stage(), OcrStage::Failed);
}

/// A character count that does not match the glyphs is treated as failure.
#[test]
fn test_ocr_count_mismatch() {
    let (mut fm, _) = manager(UseOcr::AsNeeded, Some(vec!['x' as u32]));
    let shown = fm.show_text(&TextRun::new(opaque_font(), vec![1, 2, 3], 10.0)).unwrap();
    assert!(fm.resource(shown.resource).unwrap().to_unicode().unwrap().is_empty());
    assert_eq!(fm.ocr_stage(), OcrStage::Failed);
}

/// With OCR disabled the engine is never consulted.
#[test]
fn test_ocr_never() {
    let (mut fm, calls) = manager(UseOcr::Never, Some(vec!['x' as u32]));
    fm.show_text(&TextRun::new(opaque_font(), vec![1], 10.0)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// As-needed OCR is skipped when the font already knows the Unicode.
#[test]
fn test_ocr_as_needed_prefers_font() {
    let font: Arc<dyn AbstractFont> = Arc::new(
        MemoryFont::builder("Known", FontType::Type1)
            .encoded(65, MemoryGlyph::named("A", 600.0).unicode("A").bitmap(block()))
            .build(),
    );
    let (mut fm, calls) = manager(UseOcr::AsNeeded, Some(vec!['Q' as u32]));
    let shown = fm.show_text(&TextRun::new(font.clone(), b"A".to_vec(), 10.0)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(fm.resource(shown.resource).unwrap().to_unicode().unwrap().get(65), Some(&[0x41u16][..]));

    let (mut fm, calls) = manager(UseOcr::Always, Some(vec!['Q' as u32]));
    let shown = fm.show_text(&TextRun::new(font, b"A".to_vec(), 10.0)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(fm.resource(shown.resource).unwrap().to_unicode().unwrap().get(65), Some(&[0x51u16][..]));
}
