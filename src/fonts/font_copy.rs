//! Glyph copy engine.
//!
//! A [`CopiedFont`] is a stable snapshot of the glyphs of a live font that
//! have been used so far. A glyph, once copied, never changes: copying the
//! same identity again either confirms the stored definition or fails with
//! `InvalidAccess`.

use crate::error::{Error, Result};
use crate::fonts::abstract_font::{AbstractFont, GlyphIter};
use crate::fonts::glyph::{FontId, FontInfo, FontType, Glyph, GlyphInfo, GlyphInfoFlags, Matrix, WMode};
use bitflags::bitflags;
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Deepest chain of composite components followed by a copy.
pub const MAX_COMPONENT_DEPTH: usize = 64;

bitflags! {
    /// Options for [`CopiedFont::copy_glyph`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CopyGlyphOptions: u8 {
        /// Fail if the glyph is already present.
        const NO_OLD = 1 << 0;
        /// Fail if the glyph is not present yet (read-only probe).
        const NO_NEW = 1 << 1;
        /// CIDFontType2 only: consult the vertical substitution table.
        const USE_GSUB = 1 << 2;
        /// The glyph is addressed by index (composite pieces).
        const BY_INDEX = 1 << 3;
    }
}

/// Result of a successful copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The glyph was added.
    NewlyCopied,
    /// An identical glyph was already there.
    AlreadyPresent,
}

/// A glyph definition held by a [`CopiedFont`].
#[derive(Debug, Clone, PartialEq)]
pub struct CopiedGlyph {
    pub data: Bytes,
    pub name: Option<String>,
    pub info: GlyphInfo,
    pub used: bool,
}

/// Embeddable snapshot of part (or all) of a live font.
#[derive(Debug, Clone)]
pub struct CopiedFont {
    source: FontId,
    font_type: FontType,
    font_name: String,
    matrix: Matrix,
    wmode: WMode,
    info: FontInfo,
    glyphs: IndexMap<Glyph, CopiedGlyph>,
    reserve: Option<usize>,
    encoding: Vec<Option<Glyph>>,
    cid_map: BTreeMap<u32, u32>,
    read_only: bool,
}

impl CopiedFont {
    /// Start an empty copy of `source`.
    ///
    /// `reserve` bounds the number of glyphs that may be stored; `None` is
    /// unbounded.
    pub fn new(source: &dyn AbstractFont, matrix: Matrix, reserve: Option<usize>) -> Result<Self> {
        let font_type = source.font_type();
        if font_type == FontType::Composite {
            return Err(Error::RangeCheck(format!(
                "composite font {} cannot be copied directly",
                source.font_name()
            )));
        }
        let mut encoding = Vec::new();
        if font_type.is_simple() {
            encoding.try_reserve_exact(256)?;
            encoding.resize(256, None);
        }
        Ok(Self {
            source: source.font_id(),
            font_type,
            font_name: source.font_name().to_string(),
            matrix,
            wmode: source.wmode(),
            info: source.font_info(),
            glyphs: IndexMap::new(),
            reserve,
            encoding,
            cid_map: BTreeMap::new(),
            read_only: false,
        })
    }

    /// Copy every glyph of `source`, together with its encoding.
    pub fn copy_font_complete(source: &dyn AbstractFont, matrix: Matrix) -> Result<Self> {
        let mut copy = Self::new(source, matrix, None)?;
        for glyph in GlyphIter::new(source) {
            copy.copy_glyph(source, &glyph, CopyGlyphOptions::empty())?;
        }
        if copy.font_type.is_simple() {
            for code in 0..256u32 {
                if let Some(glyph) = source.encode_char(code) {
                    if copy.contains(&glyph) {
                        copy.add_encoding(code, &glyph)?;
                    }
                }
            }
        }
        for g in copy.glyphs.values_mut() {
            g.used = false;
        }
        Ok(copy)
    }

    /// Identity of the live font this was copied from.
    pub fn source(&self) -> FontId {
        self.source
    }

    /// Font technology of the source.
    pub fn font_type(&self) -> FontType {
        self.font_type
    }

    /// Name of the source font.
    pub fn font_name(&self) -> &str {
        &self.font_name
    }

    /// Font matrix with translation removed.
    pub fn matrix(&self) -> Matrix {
        self.matrix
    }

    /// Writing mode of the source.
    pub fn wmode(&self) -> WMode {
        self.wmode
    }

    /// Metadata captured from the source.
    pub fn info(&self) -> &FontInfo {
        &self.info
    }

    /// Number of stored glyphs.
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// True if nothing has been copied.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// True once the font has been finalized.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Freeze the font; further new glyphs are refused.
    pub fn set_read_only(&mut self) {
        self.read_only = true;
    }

    /// True if `glyph` (as stored) is present.
    pub fn contains(&self, glyph: &Glyph) -> bool {
        self.glyphs.contains_key(glyph)
    }

    /// Stored definition of `glyph`.
    pub fn glyph(&self, glyph: &Glyph) -> Option<&CopiedGlyph> {
        self.glyphs.get(glyph)
    }

    /// All stored glyphs in copy order.
    pub fn glyphs(&self) -> impl Iterator<Item = (&Glyph, &CopiedGlyph)> {
        self.glyphs.iter()
    }

    /// Glyphs marked used.
    pub fn used_glyphs(&self) -> impl Iterator<Item = (&Glyph, &CopiedGlyph)> {
        self.glyphs.iter().filter(|(_, g)| g.used)
    }

    /// Number of glyphs marked used.
    pub fn used_count(&self) -> usize {
        self.glyphs.values().filter(|g| g.used).count()
    }

    /// CID to glyph index map of a CIDFontType2 copy.
    pub fn cid_map(&self) -> &BTreeMap<u32, u32> {
        &self.cid_map
    }

    /// Glyph the copy encodes at `code`.
    pub fn encode_char(&self, code: u32) -> Option<&Glyph> {
        self.encoding.get(code as usize).and_then(|g| g.as_ref())
    }

    /// Key under which a source glyph is stored.
    ///
    /// CIDFontType2 glyphs are stored by glyph index; the CID is kept in
    /// the CID map.
    pub fn storage_key(
        &self,
        source: &dyn AbstractFont,
        glyph: &Glyph,
        options: CopyGlyphOptions,
    ) -> Glyph {
        match (self.font_type, glyph) {
            (FontType::CidType2, Glyph::Cid(cid)) => {
                let mut gid = source.cid_to_gid(*cid).unwrap_or(*cid);
                if options.contains(CopyGlyphOptions::USE_GSUB) && self.wmode == WMode::Vertical {
                    if let Some(v) = source.substitute_vertical(gid) {
                        gid = v;
                    }
                }
                Glyph::Index(gid)
            },
            _ => glyph.clone(),
        }
    }

    /// Copy one glyph from `source`.
    ///
    /// Fails with `InvalidAccess` if a different definition is already stored
    /// under the same identity (or `NO_OLD` is set and it is present at all),
    /// and with `Undefined` if the glyph is missing from the source, or is not
    /// present and `NO_NEW` is set, or no slot is left. Components that
    /// refer back to a glyph being copied, or nest deeper than
    /// [`MAX_COMPONENT_DEPTH`], fail with `RangeCheck`.
    pub fn copy_glyph(
        &mut self,
        source: &dyn AbstractFont,
        glyph: &Glyph,
        options: CopyGlyphOptions,
    ) -> Result<CopyOutcome> {
        self.copy_glyph_nested(source, glyph, options, &mut Vec::new())
    }

    /// `pending` holds the composites whose components are being copied.
    fn copy_glyph_nested(
        &mut self,
        source: &dyn AbstractFont,
        glyph: &Glyph,
        options: CopyGlyphOptions,
        pending: &mut Vec<Glyph>,
    ) -> Result<CopyOutcome> {
        let key = self.storage_key(source, glyph, options);
        if pending.contains(&key) {
            return Err(Error::RangeCheck(format!(
                "{} refers to itself through its components",
                key
            )));
        }
        if pending.len() >= MAX_COMPONENT_DEPTH {
            return Err(Error::RangeCheck(format!(
                "components of {} nested deeper than {}",
                key, MAX_COMPONENT_DEPTH
            )));
        }
        let fetch_as = match (glyph, &key) {
            (Glyph::Cid(_), Glyph::Index(_)) => key.clone(),
            _ => glyph.clone(),
        };
        let (data, fetched) = fetch_outline(source, &fetch_as)?;

        if let Some(existing) = self.glyphs.get_mut(&key) {
            if options.contains(CopyGlyphOptions::NO_OLD) {
                return Err(Error::InvalidAccess(format!("{} already copied", key)));
            }
            if existing.data != data {
                return Err(Error::InvalidAccess(format!(
                    "{} redefined in {}",
                    key, self.font_name
                )));
            }
            existing.used = true;
            self.record_cid(glyph, &key)?;
            return Ok(CopyOutcome::AlreadyPresent);
        }

        if options.contains(CopyGlyphOptions::NO_NEW) {
            return Err(Error::Undefined(format!("{} not present in copy", key)));
        }
        if self.read_only {
            return Err(Error::InvalidAccess(format!(
                "{} is finalized, cannot add {}",
                self.font_name, key
            )));
        }
        if self.reserve.is_some_and(|limit| self.glyphs.len() >= limit) {
            return Err(Error::Undefined(format!(
                "no free glyph slot in {} for {}",
                self.font_name, key
            )));
        }
        self.check_cid(glyph, &key)?;

        let mut newly_added = Vec::new();
        pending.push(key.clone());
        for piece in source.glyph_components(&fetched) {
            let piece_opts = (options - CopyGlyphOptions::NO_OLD) | CopyGlyphOptions::BY_INDEX;
            match self.copy_glyph_nested(source, &piece, piece_opts, pending) {
                Ok(CopyOutcome::NewlyCopied) => newly_added.push(self.storage_key(source, &piece, piece_opts)),
                Ok(CopyOutcome::AlreadyPresent) => {},
                Err(e) => {
                    pending.pop();
                    for added in &newly_added {
                        self.glyphs.shift_remove(added);
                    }
                    log::debug!("rolling back {} after component failure: {}", key, e);
                    return Err(e);
                },
            }
        }
        pending.pop();

        let info = source.glyph_info(
            &fetched,
            GlyphInfoFlags::WIDTH0 | GlyphInfoFlags::WIDTH1 | GlyphInfoFlags::VVECTOR | GlyphInfoFlags::BBOX,
        )?;
        let name = source.glyph_name(&fetched).or_else(|| match &key {
            Glyph::Name(n) => Some(n.clone()),
            _ => None,
        });

        self.glyphs
            .try_reserve(1)
            .map_err(|e| Error::VmError(e.to_string()))?;
        self.glyphs.insert(
            key.clone(),
            CopiedGlyph {
                data,
                name,
                info,
                used: true,
            },
        );
        self.record_cid(glyph, &key)?;
        log::trace!("copied {} into {}", key, self.font_name);
        Ok(CopyOutcome::NewlyCopied)
    }

    fn check_cid(&self, glyph: &Glyph, key: &Glyph) -> Result<()> {
        if let (Glyph::Cid(cid), Glyph::Index(gid)) = (glyph, key) {
            if let Some(&mapped) = self.cid_map.get(cid) {
                if mapped != *gid {
                    return Err(Error::InvalidAccess(format!(
                        "CID {} already mapped to GID {}, not {}",
                        cid, mapped, gid
                    )));
                }
            }
        }
        Ok(())
    }

    fn record_cid(&mut self, glyph: &Glyph, key: &Glyph) -> Result<()> {
        self.check_cid(glyph, key)?;
        if let (Glyph::Cid(cid), Glyph::Index(gid)) = (glyph, key) {
            self.cid_map.insert(*cid, *gid);
        }
        Ok(())
    }

    /// Record that `code` selects `glyph`.
    ///
    /// Fails with `InvalidAccess` if the code already selects another glyph.
    pub fn add_encoding(&mut self, code: u32, glyph: &Glyph) -> Result<()> {
        let slot = self
            .encoding
            .get_mut(code as usize)
            .ok_or_else(|| Error::RangeCheck(format!("code {} outside simple encoding", code)))?;
        match slot {
            Some(existing) if existing != glyph => Err(Error::InvalidAccess(format!(
                "code {} already encodes {}, not {}",
                code, existing, glyph
            ))),
            _ => {
                *slot = Some(glyph.clone());
                Ok(())
            },
        }
    }

    /// Clear every used mark.
    pub fn clear_used(&mut self) {
        for g in self.glyphs.values_mut() {
            g.used = false;
        }
    }
}

/// Fetch a glyph program, retrying `.notdef` at glyph index 0.
fn fetch_outline(source: &dyn AbstractFont, glyph: &Glyph) -> Result<(Bytes, Glyph)> {
    match source.glyph_outline(glyph) {
        Ok(data) => Ok((data, glyph.clone())),
        Err(Error::Undefined(msg)) if glyph.is_notdef() && *glyph != Glyph::Index(0) => {
            let fallback = Glyph::Index(0);
            match source.glyph_outline(&fallback) {
                Ok(data) => Ok((data, fallback)),
                Err(_) => Err(Error::Undefined(msg)),
            }
        },
        Err(e) => Err(e),
    }
}
