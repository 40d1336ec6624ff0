//! Integration tests for composite (Type 0 / CIDFont) resources.

use pdf_fontwrite::fonts::{AbstractFont, FontType, Glyph, MemoryFont, MemoryGlyph, WMode};
use pdf_fontwrite::writer::{
    choose_default, FontManager, MemoryObjectWriter, ResourceId, ResourceKind, TextOp, TextRun,
};
use pdf_fontwrite::{Error, FontEmbedConfig, Object};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn composite(widths: &[f64], wmode: WMode) -> Arc<dyn AbstractFont> {
    let mut builder = MemoryFont::builder("KozMin", FontType::CidType0);
    for (i, w) in widths.iter().enumerate() {
        builder = builder.glyph(MemoryGlyph::new(Glyph::Cid(i as u32 + 1), *w));
    }
    let cid: Arc<dyn AbstractFont> = Arc::new(builder.build());
    let cmap = if wmode == WMode::Vertical { "Identity-V" } else { "Identity-H" };
    Arc::new(
        MemoryFont::builder("KozMin-Identity", FontType::Composite)
            .wmode(wmode)
            .descendant(cid, cmap)
            .build(),
    )
}

fn codes(cids: impl IntoIterator<Item = u16>) -> Vec<u8> {
    cids.into_iter().flat_map(|c| c.to_be_bytes()).collect()
}

fn descendant(fm: &FontManager, type0: ResourceId) -> ResourceId {
    match fm.resource(type0).unwrap().kind() {
        ResourceKind::Type0 { descendant, .. } => *descendant,
        other => panic!("expected Type0, got {:?}", other),
    }
}

/// The most common width becomes DW; only the odd one is listed in W.
#[test]
fn test_default_width_and_w() {
    let font = composite(&[500.0, 500.0, 500.0, 500.0, 600.0], WMode::Horizontal);
    let mut fm = FontManager::default();
    let shown = fm.show_text(&TextRun::new(font, codes(1..=5), 10.0)).unwrap();

    let cid = descendant(&fm, shown.resource);
    let metrics = fm.resource(cid).unwrap().cid_metrics().unwrap();
    assert_eq!(metrics.default_width(), 500.0);
    assert_eq!(
        metrics.w_array(500.0),
        vec![Object::Integer(5), Object::Array(vec![Object::Integer(600)])]
    );
}

/// An odd byte count cannot be split into 2-byte codes.
#[test]
fn test_odd_byte_count_is_rangecheck() {
    let font = composite(&[500.0], WMode::Horizontal);
    let mut fm = FontManager::default();
    let err = fm.show_text(&TextRun::new(font, vec![0, 1, 0], 10.0)).unwrap_err();
    assert!(matches!(err, Error::RangeCheck(_)));
}

/// One Type 0 and one CIDFont resource per composite font.
#[test]
fn test_one_resource_pair_per_font() {
    let font = composite(&[500.0, 600.0], WMode::Horizontal);
    let mut fm = FontManager::default();
    let a = fm.show_text(&TextRun::new(font.clone(), codes([1]), 10.0)).unwrap();
    let b = fm.show_text(&TextRun::new(font, codes([2]), 10.0)).unwrap();
    assert_eq!(a.resource, b.resource);
    assert_eq!(fm.len(), 2);
    assert_eq!(fm.resource(a.resource).unwrap().to_unicode().unwrap().key_size(), 2);
}

/// Vertical runs advance downward by the default vertical width.
#[test]
fn test_vertical_advance() {
    let font = composite(&[1000.0, 1000.0], WMode::Vertical);
    let mut fm = FontManager::default();
    let shown = fm.show_text(&TextRun::new(font, codes([1, 2]), 10.0)).unwrap();
    assert_eq!(shown.ops, vec![TextOp::ShowText(codes([1, 2]))]);
    assert!((shown.advance.1 + 20.0).abs() < 1e-9);
    assert_eq!(shown.advance.0, 0.0);
}

/// CIDFont dictionaries are written before the Type 0 fonts that use them.
#[test]
fn test_cid_font_written_before_type0() {
    let font = composite(&[500.0, 500.0, 600.0], WMode::Horizontal);
    let mut fm = FontManager::new(FontEmbedConfig::new().with_compress_fonts(false));
    let shown = fm.show_text(&TextRun::new(font, codes([1, 3]), 10.0)).unwrap();
    let cid = descendant(&fm, shown.resource);

    let mut out = MemoryObjectWriter::new();
    let written = fm.finalize_and_write_all(&mut out).unwrap();
    let type0_ref = written.get(shown.resource).unwrap();
    let cid_ref = written.get(cid).unwrap();
    assert!(out.position(cid_ref).unwrap() < out.position(type0_ref).unwrap());
    assert!(out.unwritten().is_empty());

    let type0 = out.get(type0_ref).unwrap().as_dict().unwrap();
    assert_eq!(type0.get("Subtype").and_then(Object::as_name), Some("Type0"));
    assert_eq!(type0.get("Encoding").and_then(Object::as_name), Some("Identity-H"));
    let descendants = type0.get("DescendantFonts").and_then(Object::as_array).unwrap();
    assert_eq!(descendants[0].as_reference(), Some(cid_ref));
    let base_font = type0.get("BaseFont").and_then(Object::as_name).unwrap();
    assert!(base_font.ends_with("KozMin-Identity-H"));

    let cid_font = out.get(cid_ref).unwrap().as_dict().unwrap();
    assert_eq!(cid_font.get("Subtype").and_then(Object::as_name), Some("CIDFontType0"));
    assert_eq!(cid_font.get("DW").and_then(Object::as_integer), Some(500));
    let descriptor_ref = cid_font.get("FontDescriptor").and_then(Object::as_reference).unwrap();
    let descriptor = out.get(descriptor_ref).unwrap().as_dict().unwrap();
    let cid_set = descriptor.get("CIDSet").and_then(Object::as_reference).unwrap();
    // CIDs 1 and 3
    assert_eq!(out.get(cid_set).unwrap().stream_data(), Some(&[0b0101_0000u8][..]));
}

/// CIDFontType2 glyphs that do not map to their own index get a CIDToGIDMap stream.
#[test]
fn test_cid_to_gid_map_stream() {
    let cid: Arc<dyn AbstractFont> = Arc::new(
        MemoryFont::builder("Mapped", FontType::CidType2)
            .glyph(MemoryGlyph::new(Glyph::Index(7), 2048.0))
            .map_cid(1, 7)
            .build(),
    );
    let font: Arc<dyn AbstractFont> = Arc::new(
        MemoryFont::builder("Mapped-H", FontType::Composite)
            .descendant(cid, "Identity-H")
            .build(),
    );
    let mut fm = FontManager::new(FontEmbedConfig::new().with_compress_fonts(false));
    let shown = fm.show_text(&TextRun::new(font, codes([1]), 10.0)).unwrap();
    assert!(shown.fallback.is_empty());
    let cid_id = descendant(&fm, shown.resource);

    let mut out = MemoryObjectWriter::new();
    let written = fm.finalize_and_write_all(&mut out).unwrap();
    let cid_font = out.get(written.get(cid_id).unwrap()).unwrap().as_dict().unwrap();
    let map_ref = cid_font.get("CIDToGIDMap").and_then(Object::as_reference).unwrap();
    assert_eq!(out.get(map_ref).unwrap().stream_data(), Some(&[0, 0, 0, 7][..]));
    assert_eq!(cid_font.get("DW").and_then(Object::as_integer), Some(1000));
}

proptest! {
    /// The default width is one of the most frequent widths.
    #[test]
    fn prop_default_width_is_a_mode(widths in prop::collection::vec(prop::sample::select(vec![250.0, 500.0, 750.0, 1000.0]), 1..60)) {
        let dw = choose_default(widths.iter().copied()).unwrap();
        let count = |w: f64| widths.iter().filter(|&&x| x == w).count();
        let best = [250.0, 500.0, 750.0, 1000.0].iter().map(|&w| count(w)).max().unwrap();
        prop_assert_eq!(count(dw), best);
    }

    /// A CIDSet bit is set exactly for the CIDs that were shown.
    #[test]
    fn prop_cid_set_matches_shown(cids in prop::collection::btree_set(1u16..=20, 1..10)) {
        let widths = vec![500.0; 20];
        let font = composite(&widths, WMode::Horizontal);
        let mut fm = FontManager::default();
        fm.show_text(&TextRun::new(font, codes(cids.iter().copied()), 10.0)).unwrap();

        let descriptor = fm.descriptors().next().unwrap();
        let shown: BTreeSet<u32> = cids.iter().map(|&c| c as u32).collect();
        for cid in 0..=21u32 {
            prop_assert_eq!(descriptor.base().is_cid_used(cid), shown.contains(&cid));
        }
    }
}
