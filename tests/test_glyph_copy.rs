//! Integration tests for the glyph copy engine.
//!
//! These tests verify copy-once semantics:
//! - identical glyphs are stored once
//! - conflicting redefinitions are refused
//! - CID tables grow for out-of-range CIDs

use pdf_fontwrite::fonts::{
    AbstractFont, CopiedFont, CopyGlyphOptions, CopyOutcome, FontType, Glyph, MemoryFont,
    MemoryGlyph, WMode,
};
use pdf_fontwrite::writer::{FontManager, ResourceKind, TextRun};
use pdf_fontwrite::Error;
use std::sync::Arc;

fn type1(name: &str) -> MemoryFont {
    MemoryFont::builder(name, FontType::Type1)
        .encoded(65, MemoryGlyph::named("A", 722.0))
        .encoded(66, MemoryGlyph::named("B", 667.0))
        .build()
}

/// Copying the same glyph twice reports "already present" and stores it once.
#[test]
fn test_copy_identical_glyph_twice() {
    let font = type1("Copy");
    let mut copied = CopiedFont::new(&font, font.font_matrix(), None).unwrap();

    let first = copied
        .copy_glyph(&font, &Glyph::name("A"), CopyGlyphOptions::empty())
        .unwrap();
    assert_eq!(first, CopyOutcome::NewlyCopied);

    for _ in 0..2 {
        let again = copied
            .copy_glyph(&font, &Glyph::name("A"), CopyGlyphOptions::empty())
            .unwrap();
        assert_eq!(again, CopyOutcome::AlreadyPresent);
    }
    assert_eq!(copied.len(), 1);
}

/// A redefinition under the same glyph identity is refused with InvalidAccess.
#[test]
fn test_copy_conflicting_definition() {
    let original = type1("Redefined");
    let redefined = MemoryFont::builder("Redefined", FontType::Type1)
        .with_id(original.font_id())
        .encoded(65, MemoryGlyph::named("A", 722.0).outline(&b"different outline"[..]))
        .build();

    let mut copied = CopiedFont::new(&original, original.font_matrix(), None).unwrap();
    copied
        .copy_glyph(&original, &Glyph::name("A"), CopyGlyphOptions::empty())
        .unwrap();

    let err = copied
        .copy_glyph(&redefined, &Glyph::name("A"), CopyGlyphOptions::empty())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAccess(_)));
    assert_eq!(copied.len(), 1);
}

/// A glyph missing from the source is Undefined and leaves nothing behind.
#[test]
fn test_copy_missing_glyph() {
    let font = type1("Missing");
    let mut copied = CopiedFont::new(&font, font.font_matrix(), None).unwrap();
    let err = copied
        .copy_glyph(&font, &Glyph::name("Z"), CopyGlyphOptions::empty())
        .unwrap_err();
    assert!(matches!(err, Error::Undefined(_)));
    assert!(copied.is_empty());
}

/// A redefined glyph on the show path falls back instead of failing the run.
#[test]
fn test_show_redefined_glyph_falls_back() {
    let original: Arc<dyn AbstractFont> = Arc::new(type1("Shown"));
    let redefined: Arc<dyn AbstractFont> = Arc::new(
        MemoryFont::builder("Shown", FontType::Type1)
            .with_id(original.font_id())
            .encoded(65, MemoryGlyph::named("A", 722.0).outline(&b"changed"[..]))
            .build(),
    );

    let mut fm = FontManager::default();
    let first = fm.show_text(&TextRun::new(original, b"A".to_vec(), 10.0)).unwrap();
    assert!(first.fallback.is_empty());

    let second = fm.show_text(&TextRun::new(redefined, b"A".to_vec(), 10.0)).unwrap();
    assert_eq!(second.fallback, vec![0]);
}

/// CIDs beyond the claimed CIDCount grow the width tables upward.
#[test]
fn test_cid_tables_resize_upward() {
    let cid: Arc<dyn AbstractFont> = Arc::new(
        MemoryFont::builder("Malformed-CID", FontType::CidType0)
            .glyph(MemoryGlyph::new(Glyph::Cid(1), 1000.0))
            .glyph(MemoryGlyph::new(Glyph::Cid(40), 500.0))
            .cid_count(2)
            .build(),
    );
    let composite: Arc<dyn AbstractFont> = Arc::new(
        MemoryFont::builder("Malformed", FontType::Composite)
            .descendant(cid, "Identity-H")
            .build(),
    );

    let mut fm = FontManager::default();
    let shown = fm
        .show_text(&TextRun::new(composite, vec![0, 1, 0, 40], 10.0))
        .unwrap();
    assert!(shown.fallback.is_empty());

    let descendant = match fm.resource(shown.resource).unwrap().kind() {
        ResourceKind::Type0 { descendant, .. } => *descendant,
        other => panic!("expected Type0, got {:?}", other),
    };
    let metrics = fm.resource(descendant).unwrap().cid_metrics().unwrap();
    assert!(metrics.len() > 40);
    assert_eq!(metrics.width(40), Some(500.0));
    assert!(metrics.is_used(1));
}

fn vertical_cid_type2() -> MemoryFont {
    MemoryFont::builder("Vertical-CID", FontType::CidType2)
        .wmode(WMode::Vertical)
        .glyph(MemoryGlyph::new(Glyph::Index(5), 1000.0).outline(&b"horizontal form"[..]))
        .glyph(MemoryGlyph::new(Glyph::Index(9), 1000.0).outline(&b"vertical form"[..]))
        .map_cid(1, 5)
        .vertical_substitution(5, 9)
        .build()
}

/// In vertical CIDFontType2 fonts the substituted glyph is stored under its
/// own index, and copying it again is caught as already present.
#[test]
fn test_vertical_substitution_storage_key() {
    let font = vertical_cid_type2();
    let mut copied = CopiedFont::new(&font, font.font_matrix(), None).unwrap();
    let cid = Glyph::Cid(1);

    assert_eq!(copied.storage_key(&font, &cid, CopyGlyphOptions::empty()), Glyph::Index(5));
    assert_eq!(copied.storage_key(&font, &cid, CopyGlyphOptions::USE_GSUB), Glyph::Index(9));

    let first = copied.copy_glyph(&font, &cid, CopyGlyphOptions::USE_GSUB).unwrap();
    assert_eq!(first, CopyOutcome::NewlyCopied);
    assert!(copied.contains(&Glyph::Index(9)));
    assert!(!copied.contains(&Glyph::Index(5)));
    assert_eq!(copied.cid_map().get(&1), Some(&9));

    let again = copied.copy_glyph(&font, &cid, CopyGlyphOptions::USE_GSUB).unwrap();
    assert_eq!(again, CopyOutcome::AlreadyPresent);
    assert_eq!(copied.len(), 1);

    // The unsubstituted form would remap CID 1.
    let err = copied.copy_glyph(&font, &cid, CopyGlyphOptions::empty()).unwrap_err();
    assert!(matches!(err, Error::InvalidAccess(_)));
}

/// A vertical Type 0 run copies the vertical alternate of each glyph.
#[test]
fn test_vertical_run_uses_substituted_glyph() {
    let cid: Arc<dyn AbstractFont> = Arc::new(vertical_cid_type2());
    let composite: Arc<dyn AbstractFont> = Arc::new(
        MemoryFont::builder("Vertical", FontType::Composite)
            .wmode(WMode::Vertical)
            .descendant(cid, "Identity-V")
            .build(),
    );

    let mut fm = FontManager::default();
    let first = fm.show_text(&TextRun::new(composite.clone(), vec![0, 1], 10.0)).unwrap();
    assert!(first.fallback.is_empty());
    let second = fm.show_text(&TextRun::new(composite, vec![0, 1, 0, 1], 10.0)).unwrap();
    assert!(second.fallback.is_empty());

    let base = fm.descriptors().next().unwrap().base();
    assert!(base.copied().contains(&Glyph::Index(9)));
    assert!(!base.copied().contains(&Glyph::Index(5)));
    assert_eq!(base.copied().len(), 1);
    assert!(base.is_cid_used(1));

    let descendant = match fm.resource(first.resource).unwrap().kind() {
        ResourceKind::Type0 { descendant, .. } => *descendant,
        other => panic!("expected Type0, got {:?}", other),
    };
    assert!(!fm.resource(descendant).unwrap().cid_metrics().unwrap().is_identity());
}
