//! OCR fallback for ToUnicode recovery.
//!
//! When a glyph has no usable Unicode, the glyphs of the current text run
//! are rasterised, composed into one 1-bit strip and handed to an
//! [`OcrEngine`]. Results are assumed to come back left to right, one code
//! point per non-blank glyph. Any failure or count mismatch switches OCR off
//! for the rest of the document.

use crate::error::{Error, Result};
use crate::fonts::glyph::{Glyph, GlyphBitmap};
use crate::writer::to_unicode::codepoint_to_utf16;

/// A 1-bit strip passed to the engine. Rows run top to bottom, MSB first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrBitmap {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: Vec<u8>,
}

impl OcrBitmap {
    /// Pixel at `(x, y)`, row 0 at the top.
    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data
            .get(y as usize * self.stride + (x / 8) as usize)
            .is_some_and(|b| b & (0x80 >> (x & 7)) != 0)
    }
}

/// External text recogniser.
pub trait OcrEngine: Send + Sync {
    /// Recognise the characters in `bitmap`.
    ///
    /// `expected_count` is the number of non-blank glyphs in the strip.
    fn bitmap_to_unicode(
        &self,
        bitmap: &OcrBitmap,
        resolution: (u32, u32),
        expected_count: usize,
    ) -> Result<Vec<u32>>;
}

/// Document-wide OCR state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcrStage {
    /// Nothing pending.
    #[default]
    Idle,
    /// Bitmaps of the current run are collected.
    Rendered,
    /// Results for the current run are available.
    UnicodeAvailable,
    /// OCR failed once and is no longer attempted.
    Failed,
}

/// One rasterised glyph of a run, positioned in device pixels.
#[derive(Debug, Clone)]
pub struct OcrGlyph {
    pub code: u32,
    pub glyph: Glyph,
    /// Left edge of the raster.
    pub x: i32,
    /// Bottom edge of the raster, y up.
    pub y: i32,
    pub bitmap: Option<GlyphBitmap>,
}

impl OcrGlyph {
    /// Blank or missing rasters are spaces.
    pub fn is_space(&self) -> bool {
        self.bitmap.as_ref().map_or(true, GlyphBitmap::is_blank)
    }
}

/// Compose the rasters into one strip. Returns the strip and the number of
/// non-space glyphs.
pub fn compose_strip(glyphs: &[OcrGlyph]) -> Result<(OcrBitmap, usize)> {
    let mut bounds: Option<(i32, i32, i32, i32)> = None;
    let mut expected = 0;
    for g in glyphs {
        let (w, h) = g
            .bitmap
            .as_ref()
            .map_or((0, 0), |b| (b.width as i32, b.height as i32));
        if !g.is_space() {
            expected += 1;
        }
        let (llx, lly, urx, ury) = bounds.unwrap_or((g.x, g.y, g.x + w, g.y + h));
        bounds = Some((llx.min(g.x), lly.min(g.y), urx.max(g.x + w), ury.max(g.y + h)));
    }
    let (llx, lly, urx, ury) =
        bounds.ok_or_else(|| Error::Ocr("no glyph bitmaps to recognise".into()))?;

    let width = (urx - llx).max(0) as u32;
    let height = (ury - lly).max(0) as u32;
    let stride = ((urx - llx).max(0) as usize).div_ceil(8) + 1;
    let mut data = Vec::new();
    data.try_reserve_exact(stride * height as usize)?;
    data.resize(stride * height as usize, 0u8);

    for g in glyphs {
        let Some(bitmap) = &g.bitmap else { continue };
        let dx = (g.x - llx) as u32;
        // Strip row 0 is the top edge, `ury`.
        let top = (ury - (g.y + bitmap.height as i32)) as u32;
        for row in 0..bitmap.height {
            for col in 0..bitmap.width {
                if bitmap.pixel(col, row) {
                    let x = dx + col;
                    let idx = (top + row) as usize * stride + (x / 8) as usize;
                    data[idx] |= 0x80 >> (x & 7);
                }
            }
        }
    }

    Ok((
        OcrBitmap {
            width,
            height,
            stride,
            data,
        },
        expected,
    ))
}

/// Glyphs of one text run collected for recognition.
#[derive(Debug, Default)]
pub struct OcrRun {
    glyphs: Vec<OcrGlyph>,
    results: Option<Vec<u32>>,
}

impl OcrRun {
    /// Collected glyphs.
    pub fn new(glyphs: Vec<OcrGlyph>) -> Self {
        Self {
            glyphs,
            results: None,
        }
    }

    /// Run the engine once for this run. Moves `stage` to `UnicodeAvailable`
    /// or, on any error or count mismatch, to `Failed`.
    pub fn recognize(
        &mut self,
        engine: &dyn OcrEngine,
        resolution: (u32, u32),
        stage: &mut OcrStage,
    ) {
        if *stage == OcrStage::Failed || self.results.is_some() {
            return;
        }
        *stage = OcrStage::Rendered;
        let outcome = compose_strip(&self.glyphs).and_then(|(strip, expected)| {
            let found = engine.bitmap_to_unicode(&strip, resolution, expected)?;
            if found.len() != expected {
                return Err(Error::Ocr(format!(
                    "expected {} characters, recogniser returned {}",
                    expected,
                    found.len()
                )));
            }
            Ok(found)
        });
        match outcome {
            Ok(found) => {
                self.results = Some(found);
                *stage = OcrStage::UnicodeAvailable;
            },
            Err(e) => {
                log::warn!("OCR failed, not attempting it again: {}", e);
                *stage = OcrStage::Failed;
            },
        }
    }

    /// Unicode recognised for the glyph shown with `code`.
    ///
    /// The result index is the number of non-space glyphs to its left; a
    /// space maps to U+0020.
    pub fn unicode_for(&self, code: u32, glyph: &Glyph) -> Option<Vec<u16>> {
        let results = self.results.as_ref()?;
        let target = self
            .glyphs
            .iter()
            .find(|g| g.code == code || &g.glyph == glyph)?;
        if target.is_space() {
            return Some(vec![0x20]);
        }
        let index = self
            .glyphs
            .iter()
            .filter(|g| !g.is_space() && g.x < target.x)
            .count();
        results.get(index).map(|&cp| codepoint_to_utf16(cp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(width: u32, height: u32) -> GlyphBitmap {
        let stride = (width as usize).div_ceil(8);
        GlyphBitmap {
            width,
            height,
            stride,
            left: 0,
            bottom: 0,
            data: vec![0xFF; stride * height as usize],
        }
    }

    fn glyph(code: u32, x: i32, bitmap: Option<GlyphBitmap>) -> OcrGlyph {
        OcrGlyph {
            code,
            glyph: Glyph::Index(code),
            x,
            y: 0,
            bitmap,
        }
    }

    struct FixedEngine(Vec<u32>);

    impl OcrEngine for FixedEngine {
        fn bitmap_to_unicode(&self, _: &OcrBitmap, _: (u32, u32), _: usize) -> Result<Vec<u32>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_strip_geometry() {
        let glyphs = vec![glyph(1, 0, Some(block(4, 4))), glyph(2, 10, Some(block(3, 6)))];
        let (strip, expected) = compose_strip(&glyphs).unwrap();
        assert_eq!(expected, 2);
        assert_eq!((strip.width, strip.height), (13, 6));
        assert_eq!(strip.stride, 3);
        // First glyph sits on the baseline, below the taller second one.
        assert!(!strip.pixel(0, 0));
        assert!(strip.pixel(0, 2));
        assert!(strip.pixel(10, 0));
        assert!(strip.pixel(12, 5));
        assert!(!strip.pixel(5, 5));
    }

    #[test]
    fn test_spaces_not_counted() {
        let glyphs = vec![
            glyph(1, 0, Some(block(4, 4))),
            glyph(32, 5, None),
            glyph(2, 10, Some(block(4, 4))),
        ];
        let (_, expected) = compose_strip(&glyphs).unwrap();
        assert_eq!(expected, 2);
    }

    #[test]
    fn test_index_by_position() {
        let glyphs = vec![
            glyph(2, 10, Some(block(4, 4))),
            glyph(32, 5, None),
            glyph(1, 0, Some(block(4, 4))),
        ];
        let mut run = OcrRun::new(glyphs);
        let mut stage = OcrStage::Idle;
        run.recognize(&FixedEngine(vec![0x61, 0x1F600]), (300, 300), &mut stage);
        assert_eq!(stage, OcrStage::UnicodeAvailable);
        assert_eq!(run.unicode_for(1, &Glyph::Index(1)), Some(vec![0x61]));
        assert_eq!(run.unicode_for(2, &Glyph::Index(2)), Some(vec![0xD83D, 0xDE00]));
        assert_eq!(run.unicode_for(32, &Glyph::Index(32)), Some(vec![0x20]));
    }

    #[test]
    fn test_count_mismatch_fails() {
        let mut run = OcrRun::new(vec![glyph(1, 0, Some(block(4, 4)))]);
        let mut stage = OcrStage::Idle;
        run.recognize(&FixedEngine(vec![0x61, 0x62]), (300, 300), &mut stage);
        assert_eq!(stage, OcrStage::Failed);
        assert_eq!(run.unicode_for(1, &Glyph::Index(1)), None);
    }

    #[test]
    fn test_failed_is_sticky() {
        let mut run = OcrRun::new(vec![glyph(1, 0, Some(block(4, 4)))]);
        let mut stage = OcrStage::Failed;
        run.recognize(&FixedEngine(vec![0x61]), (300, 300), &mut stage);
        assert_eq!(stage, OcrStage::Failed);
        assert_eq!(run.unicode_for(1, &Glyph::Index(1)), None);
    }
}
