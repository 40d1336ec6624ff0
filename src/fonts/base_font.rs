//! Base font copy manager.
//!
//! A [`BaseFont`] is created the first time a live font is used in a
//! document. It owns the growing subset copy, optionally a complete copy kept
//! for a late switch to full embedding, the CIDSet of CID fonts, and the
//! subsetting decision.

use crate::error::{try_filled, try_grow, Error, Result};
use crate::fonts::abstract_font::{count_glyphs, AbstractFont};
use crate::fonts::font_copy::{CopiedFont, CopyGlyphOptions, CopyOutcome};
use crate::fonts::font_subsetter::strip_subset_prefix;
use crate::fonts::glyph::{FontInfo, FontType, Glyph, Matrix};
use bytes::Bytes;

/// Above this many glyphs a Type 1/CFF font is never copied completely.
pub const MAX_COMPLETE_GLYPHS: usize = 2048;

/// Glyph reservation used for oversize fonts.
pub const OVERSIZE_RESERVE: usize = 257;

/// TrueType fonts with more glyphs than this are always subset.
pub const TRUETYPE_SUBSET_THRESHOLD: usize = 4096;

/// Subsetting decision of a base font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubsetDecision {
    /// Decided at finalize time.
    #[default]
    Unknown,
    /// Embed only the used glyphs.
    Yes,
    /// Embed the complete font.
    No,
}

/// Stable, embeddable snapshot of one live font.
#[derive(Debug)]
pub struct BaseFont {
    copied: CopiedFont,
    complete: Option<CopiedFont>,
    num_glyphs: usize,
    cid_set: Vec<u8>,
    subset: SubsetDecision,
    is_standard: bool,
    font_name: String,
    font_file: Option<Bytes>,
    finalized: bool,
}

impl BaseFont {
    /// Snapshot `source`.
    ///
    /// `max_reserved_glyphs` bounds the subset copy (`None` is unbounded).
    /// `is_standard` marks Type 1 fonts named like one of the standard 14;
    /// they are never subset and are exempt from the oversize heuristic.
    pub fn copy_font(
        source: &dyn AbstractFont,
        orig_matrix: Matrix,
        max_reserved_glyphs: Option<usize>,
        is_standard: bool,
    ) -> Result<Self> {
        let font_type = source.font_type();
        let matrix = orig_matrix.without_translation();
        let info = source.font_info();
        let mut reserve = max_reserved_glyphs;
        let mut subset = SubsetDecision::Unknown;
        let mut cid_set = Vec::new();

        let num_glyphs = match font_type {
            FontType::Type1 | FontType::Type2 => {
                let n = count_glyphs(source);
                if is_standard {
                    subset = SubsetDecision::No;
                } else if n > MAX_COMPLETE_GLYPHS {
                    log::warn!(
                        "Can't embed the complete font {} as it is too large, embedding a subset.",
                        source.font_name()
                    );
                    reserve = Some(OVERSIZE_RESERVE);
                    subset = SubsetDecision::Yes;
                }
                n
            },
            FontType::TrueType => {
                let n = if info.num_glyphs > 0 {
                    info.num_glyphs as usize
                } else {
                    count_glyphs(source)
                };
                if n > TRUETYPE_SUBSET_THRESHOLD {
                    subset = SubsetDecision::Yes;
                }
                n
            },
            FontType::CidType0 | FontType::CidType2 => {
                let n = if info.cid_count > 0 {
                    info.cid_count as usize
                } else {
                    count_glyphs(source)
                };
                subset = SubsetDecision::Yes;
                cid_set = try_filled(n.div_ceil(8), 0u8)?;
                n
            },
            FontType::Type3 => {
                subset = SubsetDecision::No;
                count_glyphs(source)
            },
            FontType::Composite => {
                return Err(Error::RangeCheck(format!(
                    "composite font {} has no base font of its own",
                    source.font_name()
                )))
            },
        };

        let copied = CopiedFont::new(source, matrix, reserve)?;

        let wants_complete = !font_type.is_cid()
            && font_type != FontType::Type3
            && subset != SubsetDecision::Yes
            && reserve.is_none();
        let complete = if wants_complete {
            match CopiedFont::copy_font_complete(source, matrix) {
                Ok(c) => Some(c),
                Err(e) => {
                    log::warn!(
                        "Can't make a complete copy of font {} ({}), embedding a subset.",
                        source.font_name(),
                        e
                    );
                    subset = SubsetDecision::Yes;
                    None
                },
            }
        } else {
            None
        };

        let stripped = strip_subset_prefix(source.font_name());
        let font_name = if stripped.is_empty() {
            "Anonymous".to_string()
        } else {
            stripped.to_string()
        };

        log::debug!(
            "base font {} ({:?}): {} glyphs, subset {:?}, complete copy {}",
            font_name,
            font_type,
            num_glyphs,
            subset,
            complete.is_some()
        );

        Ok(Self {
            copied,
            complete,
            num_glyphs,
            cid_set,
            subset,
            is_standard,
            font_name,
            font_file: source.font_file(),
            finalized: false,
        })
    }

    /// Copy a shown glyph into the subset copy and probe the complete copy.
    ///
    /// `code` is the single-byte code of simple fonts; a complete copy that
    /// lacks the glyph or encodes the code differently is dropped.
    pub fn use_glyph(
        &mut self,
        source: &dyn AbstractFont,
        glyph: &Glyph,
        code: Option<u32>,
        options: CopyGlyphOptions,
    ) -> Result<CopyOutcome> {
        let outcome = self.copied.copy_glyph(source, glyph, options)?;

        if let Some(complete) = self.complete.as_mut() {
            let probe = complete
                .copy_glyph(source, glyph, (options & CopyGlyphOptions::USE_GSUB) | CopyGlyphOptions::NO_NEW)
                .and_then(|_| match code {
                    Some(c) => complete.add_encoding(c, glyph),
                    None => Ok(()),
                });
            if let Err(e) = probe {
                log::debug!("dropping complete copy of {}: {}", self.font_name, e);
                self.complete = None;
            }
        }

        if self.copied.font_type().is_cid() {
            if let Glyph::Cid(cid) = glyph {
                self.set_cid_used(*cid)?;
            }
        }
        Ok(outcome)
    }

    /// Mark a CID as present in the CIDSet, growing it if needed.
    pub fn set_cid_used(&mut self, cid: u32) -> Result<()> {
        let byte = (cid / 8) as usize;
        try_grow(&mut self.cid_set, byte + 1, 0)?;
        self.cid_set[byte] |= 0x80 >> (cid & 7);
        Ok(())
    }

    /// True if the CIDSet has bit `cid` set.
    pub fn is_cid_used(&self, cid: u32) -> bool {
        self.cid_set
            .get((cid / 8) as usize)
            .is_some_and(|b| b & (0x80 >> (cid & 7)) != 0)
    }

    /// CIDSet bitmap, MSB first.
    pub fn cid_set(&self) -> &[u8] {
        &self.cid_set
    }

    /// The subset copy.
    pub fn copied(&self) -> &CopiedFont {
        &self.copied
    }

    /// The complete copy, while it is still usable.
    pub fn complete(&self) -> Option<&CopiedFont> {
        self.complete.as_ref()
    }

    /// Copy used for embedding: the complete copy when not subsetting.
    pub fn embedded_copy(&self) -> &CopiedFont {
        match (&self.subset, &self.complete) {
            (SubsetDecision::No, Some(complete)) => complete,
            _ => &self.copied,
        }
    }

    /// Total glyph (or CID) count of the source.
    pub fn num_glyphs(&self) -> usize {
        self.num_glyphs
    }

    /// Font name with any subset prefix removed.
    pub fn font_name(&self) -> &str {
        &self.font_name
    }

    /// Font technology.
    pub fn font_type(&self) -> FontType {
        self.copied.font_type()
    }

    /// Metadata captured from the source.
    pub fn info(&self) -> &FontInfo {
        self.copied.info()
    }

    /// Named like one of the standard 14.
    pub fn is_standard(&self) -> bool {
        self.is_standard
    }

    /// Original font program bytes.
    pub fn font_file(&self) -> Option<&Bytes> {
        self.font_file.as_ref()
    }

    /// Current subsetting decision.
    pub fn subset(&self) -> SubsetDecision {
        self.subset
    }

    /// Override the subsetting decision.
    pub fn set_subset(&mut self, decision: SubsetDecision) {
        self.subset = decision;
    }

    /// True once finalized.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Settle the decision and freeze the copies.
    ///
    /// A font set to full embedding whose complete copy is missing or short
    /// falls back to the subset copy with a warning.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        if self.subset == SubsetDecision::No && self.font_type() != FontType::Type3 {
            let complete_ok = self
                .complete
                .as_ref()
                .is_some_and(|c| c.len() >= self.num_glyphs);
            if !complete_ok {
                log::warn!(
                    "Font {} could not be copied completely, embedding a subset instead.",
                    self.font_name
                );
                self.subset = SubsetDecision::Yes;
                self.complete = None;
            }
        }
        self.copied.set_read_only();
        if let Some(c) = self.complete.as_mut() {
            c.set_read_only();
        }
        self.finalized = true;
    }
}
