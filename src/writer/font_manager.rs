//! Per-document font registry and the text-show path.
//!
//! A [`FontManager`] is created at document open. Every text-show call goes
//! through [`FontManager::show_text`], which finds or creates the font
//! resource, copies newly seen glyphs into the base font, updates the
//! encoding, width and ToUnicode tables, and lays out the run. At document
//! close [`FontManager::finalize_and_write_all`] writes everything once.
//!
//! ```ignore
//! use pdf_fontwrite::writer::{FontManager, MemoryObjectWriter, TextRun};
//!
//! let mut fonts = FontManager::new(FontEmbedConfig::default());
//! let shown = fonts.show_text(&TextRun::new(font.clone(), b"Hello".to_vec(), 12.0))?;
//! page.extend(shown.content_bytes()?);
//! let mut out = MemoryObjectWriter::new();
//! let written = fonts.finalize_and_write_all(&mut out)?;
//! ```

use crate::config::{ComplianceProfile, FontEmbedConfig, MissingGlyphPolicy, UseOcr};
use crate::error::{Error, Result};
use crate::fonts::abstract_font::{glyph_advance_1000, round_grid_width, AbstractFont};
use crate::fonts::base_font::BaseFont;
use crate::fonts::encoding::BaseEncoding;
use crate::fonts::font_copy::CopyGlyphOptions;
use crate::fonts::font_subsetter::strip_subset_prefix;
use crate::fonts::glyph::{FontId, FontType, Glyph, GlyphInfoFlags, WMode};
use crate::fonts::standard_fonts::{find_standard_font, StandardFontTable};
use crate::writer::cid_widths::{CidMetrics, DEFAULT_DW2};
use crate::writer::font_descriptor::FontDescriptor;
use crate::writer::font_resource::{DescriptorId, FontResource, ResourceFont, ResourceId, ResourceKind};
use crate::writer::font_writer::{FontProgramEncoder, OriginalProgramEncoder};
use crate::writer::ocr::{OcrEngine, OcrGlyph, OcrRun, OcrStage};
use crate::writer::simple_encoding::SimpleEncoding;
use crate::writer::text_layout::{layout, ops_to_bytes, PlacedGlyph, TextOp};
use crate::writer::to_unicode::font_unicode;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// CMap used for composite fonts that do not name one.
const DEFAULT_CMAP: &str = "Identity-H";

/// Tolerance when comparing advances in 1000-unit space.
const WIDTH_EPSILON: f64 = 1e-3;

/// One text-show call.
#[derive(Debug, Clone)]
pub struct TextRun {
    /// Font the text is shown with.
    pub font: Arc<dyn AbstractFont>,
    /// Character codes; two bytes per code for composite fonts.
    pub text: Vec<u8>,
    /// Explicit glyph per code, overriding the font's encoding.
    pub glyphs: Option<Vec<Glyph>>,
    /// Font size.
    pub size: f64,
    /// Caller-supplied advances per code, in text space.
    pub replaced_widths: Option<Vec<Option<(f64, f64)>>>,
    /// Caller-supplied vertical origins per code, in 1000-unit space.
    pub replaced_v: Option<Vec<Option<(f64, f64)>>>,
    /// Character spacing (Tc).
    pub char_spacing: f64,
    /// Word spacing (Tw), applied to single-byte code 32.
    pub word_spacing: f64,
}

impl TextRun {
    /// Plain run with no overrides.
    pub fn new(font: Arc<dyn AbstractFont>, text: impl Into<Vec<u8>>, size: f64) -> Self {
        Self {
            font,
            text: text.into(),
            glyphs: None,
            size,
            replaced_widths: None,
            replaced_v: None,
            char_spacing: 0.0,
            word_spacing: 0.0,
        }
    }

    /// Show explicit glyphs.
    pub fn with_glyphs(mut self, glyphs: Vec<Glyph>) -> Self {
        self.glyphs = Some(glyphs);
        self
    }

    /// Override advances (x/y/xy show).
    pub fn with_replaced_widths(mut self, widths: Vec<Option<(f64, f64)>>) -> Self {
        self.replaced_widths = Some(widths);
        self
    }

    /// Override vertical origins.
    pub fn with_replaced_v(mut self, v: Vec<Option<(f64, f64)>>) -> Self {
        self.replaced_v = Some(v);
        self
    }

    /// Set character spacing.
    pub fn with_char_spacing(mut self, spacing: f64) -> Self {
        self.char_spacing = spacing;
        self
    }

    /// Set word spacing.
    pub fn with_word_spacing(mut self, spacing: f64) -> Self {
        self.word_spacing = spacing;
        self
    }

    fn replaced_width(&self, index: usize) -> Option<(f64, f64)> {
        self.replaced_widths.as_ref().and_then(|w| w.get(index).copied().flatten())
    }

    fn replaced_v_at(&self, index: usize) -> Option<(f64, f64)> {
        self.replaced_v.as_ref().and_then(|v| v.get(index).copied().flatten())
    }
}

/// Outcome of [`FontManager::show_text`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShowResult {
    /// Resource to select with `Tf`.
    pub resource: ResourceId,
    /// Positioning and showing operations.
    pub ops: Vec<TextOp>,
    /// Indices of codes that could not be embedded; the caller draws them
    /// another way (bitmap).
    pub fallback: Vec<usize>,
    /// Total advance of the run in text space.
    pub advance: (f64, f64),
}

impl ShowResult {
    /// Operations as content-stream bytes.
    pub fn content_bytes(&self) -> Result<Vec<u8>> {
        Ok(ops_to_bytes(&self.ops)?)
    }
}

/// One decoded code of a run.
#[derive(Debug, Clone)]
struct ShownChar {
    index: usize,
    code: u32,
    code_bytes: Vec<u8>,
    glyph: Option<Glyph>,
}

/// Document-level font state.
pub struct FontManager {
    pub(crate) config: FontEmbedConfig,
    pub(crate) compliance: ComplianceProfile,
    pub(crate) resources: IndexMap<ResourceId, FontResource>,
    pub(crate) descriptors: IndexMap<DescriptorId, FontDescriptor>,
    descriptor_by_font: HashMap<FontId, DescriptorId>,
    resources_by_font: HashMap<FontId, Vec<ResourceId>>,
    pub(crate) standard_fonts: StandardFontTable,
    ocr_engine: Option<Box<dyn OcrEngine>>,
    ocr_stage: OcrStage,
    pub(crate) encoder: Box<dyn FontProgramEncoder>,
}

impl fmt::Debug for FontManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontManager")
            .field("compliance", &self.compliance)
            .field("resources", &self.resources.len())
            .field("descriptors", &self.descriptors.len())
            .field("ocr_stage", &self.ocr_stage)
            .finish_non_exhaustive()
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new(FontEmbedConfig::default())
    }
}

impl FontManager {
    /// Font state for a new document.
    pub fn new(config: FontEmbedConfig) -> Self {
        Self {
            compliance: config.compliance,
            config,
            resources: IndexMap::new(),
            descriptors: IndexMap::new(),
            descriptor_by_font: HashMap::new(),
            resources_by_font: HashMap::new(),
            standard_fonts: StandardFontTable::new(),
            ocr_engine: None,
            ocr_stage: OcrStage::Idle,
            encoder: Box::new(OriginalProgramEncoder),
        }
    }

    /// Use `engine` for OCR fallback.
    pub fn with_ocr_engine(mut self, engine: Box<dyn OcrEngine>) -> Self {
        self.ocr_engine = Some(engine);
        self
    }

    /// Use `encoder` to produce embedded font programs.
    pub fn with_program_encoder(mut self, encoder: Box<dyn FontProgramEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Configuration in effect.
    pub fn config(&self) -> &FontEmbedConfig {
        &self.config
    }

    /// Current compliance profile; may have been reverted on the show path.
    pub fn compliance(&self) -> ComplianceProfile {
        self.compliance
    }

    /// OCR state.
    pub fn ocr_stage(&self) -> OcrStage {
        self.ocr_stage
    }

    /// Reference fonts for standard-font substitution.
    pub fn standard_fonts(&self) -> &StandardFontTable {
        &self.standard_fonts
    }

    /// Register reference fonts for standard-font substitution.
    pub fn standard_fonts_mut(&mut self) -> &mut StandardFontTable {
        &mut self.standard_fonts
    }

    /// Resource by handle.
    pub fn resource(&self, id: ResourceId) -> Option<&FontResource> {
        self.resources.get(&id)
    }

    /// All resources in creation order.
    pub fn resources(&self) -> impl Iterator<Item = &FontResource> {
        self.resources.values()
    }

    /// Descriptor by handle.
    pub fn descriptor(&self, id: DescriptorId) -> Option<&FontDescriptor> {
        self.descriptors.get(&id)
    }

    /// All descriptors in creation order.
    pub fn descriptors(&self) -> impl Iterator<Item = &FontDescriptor> {
        self.descriptors.values()
    }

    /// Descriptor of a live font, if it has been used.
    pub fn descriptor_for(&self, font: FontId) -> Option<&FontDescriptor> {
        self.descriptor_by_font
            .get(&font)
            .and_then(|id| self.descriptors.get(id))
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// True if no font has been used.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn resource_mut(&mut self, id: ResourceId) -> Result<&mut FontResource> {
        self.resources
            .get_mut(&id)
            .ok_or_else(|| Error::Unregistered(format!("unknown font resource {}", id)))
    }

    fn decode_run(&self, run: &TextRun) -> Result<Vec<ShownChar>> {
        let font = run.font.as_ref();
        let explicit = |i: usize| run.glyphs.as_ref().and_then(|g| g.get(i).cloned());
        match font.font_type() {
            FontType::Composite => {
                if run.text.len() % 2 != 0 {
                    return Err(Error::RangeCheck(format!(
                        "odd byte count {} for composite font {}",
                        run.text.len(),
                        font.font_name()
                    )));
                }
                let descendant = font.descendant();
                Ok(run
                    .text
                    .chunks_exact(2)
                    .enumerate()
                    .map(|(index, pair)| {
                        let code = u16::from_be_bytes([pair[0], pair[1]]) as u32;
                        let glyph = explicit(index)
                            .or_else(|| font.encode_char(code))
                            .or_else(|| descendant.as_ref().and_then(|d| d.encode_char(code)));
                        ShownChar {
                            index,
                            code,
                            code_bytes: pair.to_vec(),
                            glyph,
                        }
                    })
                    .collect())
            },
            FontType::CidType0 | FontType::CidType2 => Err(Error::RangeCheck(format!(
                "CID font {} shown without a composite parent",
                font.font_name()
            ))),
            _ => Ok(run
                .text
                .iter()
                .enumerate()
                .map(|(index, &b)| ShownChar {
                    index,
                    code: b as u32,
                    code_bytes: vec![b],
                    glyph: explicit(index).or_else(|| font.encode_char(b as u32)),
                })
                .collect()),
        }
    }

    /// Find or create the resource a text run is shown with.
    pub fn obtain_font_resource(&mut self, run: &TextRun) -> Result<ResourceId> {
        let chars = self.decode_run(run)?;
        let pairs: Vec<(u32, Glyph)> = chars
            .iter()
            .filter_map(|c| c.glyph.clone().map(|g| (c.code, g)))
            .collect();
        self.obtain_resource(&run.font, &pairs)
    }

    /// Find a resource of `font` whose encoding accepts every `(code, glyph)`
    /// pair, or create one.
    ///
    /// Composite fonts get one Type 0 resource wrapping one CIDFont resource.
    pub fn obtain_resource(
        &mut self,
        font: &Arc<dyn AbstractFont>,
        pairs: &[(u32, Glyph)],
    ) -> Result<ResourceId> {
        match font.font_type() {
            FontType::Composite => self.obtain_type0(font),
            FontType::CidType0 | FontType::CidType2 => self.obtain_cid_font(font),
            FontType::Type3 => self.obtain_simple(font, pairs, true),
            FontType::Type1 | FontType::Type2 | FontType::TrueType => {
                self.obtain_simple(font, pairs, false)
            },
        }
    }

    fn obtain_descriptor(&mut self, font: &dyn AbstractFont) -> Result<DescriptorId> {
        if let Some(&id) = self.descriptor_by_font.get(&font.font_id()) {
            return Ok(id);
        }
        let is_standard = find_standard_font(font.font_name()).is_some();
        let base = BaseFont::copy_font(font, font.font_matrix(), None, is_standard)?;
        self.descriptors
            .try_reserve(1)
            .map_err(|e| Error::VmError(e.to_string()))?;
        let id = DescriptorId(self.descriptors.len());
        self.descriptors
            .insert(id, FontDescriptor::new(id, font.font_id(), base));
        self.descriptor_by_font.insert(font.font_id(), id);
        log::debug!("new font descriptor for {}", font.font_name());
        Ok(id)
    }

    fn insert_resource(&mut self, resource: FontResource) -> Result<ResourceId> {
        self.resources
            .try_reserve(1)
            .map_err(|e| Error::VmError(e.to_string()))?;
        let id = resource.id;
        self.resources_by_font
            .entry(resource.font_id)
            .or_default()
            .push(id);
        self.resources.insert(id, resource);
        Ok(id)
    }

    fn existing(&self, font: FontId, matches: impl Fn(&FontResource) -> bool) -> Option<ResourceId> {
        self.resources_by_font
            .get(&font)?
            .iter()
            .copied()
            .find(|id| self.resources.get(id).is_some_and(&matches))
    }

    fn obtain_simple(
        &mut self,
        font: &Arc<dyn AbstractFont>,
        pairs: &[(u32, Glyph)],
        type3: bool,
    ) -> Result<ResourceId> {
        // One glyph per code: later glyphs on a code already taken in this
        // run fall back when placed.
        let mut wanted: HashMap<u32, &Glyph> = HashMap::with_capacity(pairs.len());
        for (code, glyph) in pairs {
            let first = *wanted.entry(*code).or_insert(glyph);
            if first != glyph {
                log::debug!(
                    "code {} maps to both {} and {} in one run of {}",
                    code,
                    first,
                    glyph,
                    font.font_name()
                );
            }
        }
        let compatible = self.existing(font.font_id(), |r| {
            r.simple_encoding()
                .is_some_and(|enc| wanted.iter().all(|(code, g)| enc.is_compatible(*code, g)))
        });
        if let Some(id) = compatible {
            return Ok(id);
        }

        let info = font.font_info();
        let (owner, base_encoding) = if type3 {
            let base = BaseFont::copy_font(font.as_ref(), font.font_matrix(), None, false)?;
            (ResourceFont::Owned(Box::new(base)), None)
        } else {
            let base = if info.is_symbolic() {
                None
            } else {
                Some(info.base_encoding.unwrap_or(BaseEncoding::Standard))
            };
            (ResourceFont::Descriptor(self.obtain_descriptor(font.as_ref())?), base)
        };
        let encoding = SimpleEncoding::new(base_encoding, type3)?;
        let id = ResourceId(self.resources.len());
        let mut resource = FontResource::new(
            id,
            font.font_id(),
            font.font_type(),
            strip_subset_prefix(font.font_name()),
            Some(owner),
            ResourceKind::Simple(encoding),
        );
        resource.matrix = font.font_matrix();
        if self.resources_by_font.contains_key(&font.font_id()) {
            log::debug!(
                "encoding conflict in {}, new resource {} sharing the descriptor",
                font.font_name(),
                id
            );
        }
        self.insert_resource(resource)
    }

    fn obtain_cid_font(&mut self, font: &Arc<dyn AbstractFont>) -> Result<ResourceId> {
        if let Some(id) = self.existing(font.font_id(), |r| r.cid_metrics().is_some()) {
            return Ok(id);
        }
        let did = self.obtain_descriptor(font.as_ref())?;
        let cid_count = font.font_info().cid_count as usize;
        let metrics = CidMetrics::new(cid_count)?;
        let id = ResourceId(self.resources.len());
        let mut resource = FontResource::new(
            id,
            font.font_id(),
            font.font_type(),
            strip_subset_prefix(font.font_name()),
            Some(ResourceFont::Descriptor(did)),
            ResourceKind::CidFont(metrics),
        );
        resource.wmode = font.wmode();
        resource.matrix = font.font_matrix();
        self.insert_resource(resource)
    }

    fn obtain_type0(&mut self, font: &Arc<dyn AbstractFont>) -> Result<ResourceId> {
        if let Some(id) = self.existing(font.font_id(), |r| matches!(r.kind, ResourceKind::Type0 { .. })) {
            return Ok(id);
        }
        let descendant = font.descendant().ok_or_else(|| {
            Error::RangeCheck(format!("composite font {} has no descendant", font.font_name()))
        })?;
        if !descendant.font_type().is_cid() {
            return Err(Error::RangeCheck(format!(
                "descendant of {} is not a CID font",
                font.font_name()
            )));
        }
        let cid_id = self.obtain_cid_font(&descendant)?;
        if font.wmode() == WMode::Vertical {
            self.resource_mut(cid_id)?.wmode = WMode::Vertical;
        }
        let cmap_name = font.cmap_name().unwrap_or_else(|| DEFAULT_CMAP.to_string());
        let id = ResourceId(self.resources.len());
        let mut resource = FontResource::new(
            id,
            font.font_id(),
            FontType::Composite,
            strip_subset_prefix(descendant.font_name()),
            None,
            ResourceKind::Type0 {
                descendant: cid_id,
                cmap_name,
            },
        );
        resource.wmode = self.resource_mut(cid_id)?.wmode;
        self.insert_resource(resource)
    }

    /// Show one text run.
    ///
    /// Glyphs that cannot be copied are reported in
    /// [`ShowResult::fallback`]; under a strict compliance profile the
    /// configured [`MissingGlyphPolicy`] applies first.
    pub fn show_text(&mut self, run: &TextRun) -> Result<ShowResult> {
        let chars = self.decode_run(run)?;
        let pairs: Vec<(u32, Glyph)> = chars
            .iter()
            .filter_map(|c| c.glyph.clone().map(|g| (c.code, g)))
            .collect();
        let rid = self.obtain_resource(&run.font, &pairs)?;

        let kind = &self.resource_mut(rid)?.kind;
        let (source, glyph_rid) = match kind {
            ResourceKind::Type0 { descendant, .. } => {
                let font = run.font.descendant().ok_or_else(|| {
                    Error::Unregistered(format!("composite font {} lost its descendant", run.font.font_name()))
                })?;
                (font, *descendant)
            },
            _ => (run.font.clone(), rid),
        };

        let mut placed = Vec::with_capacity(chars.len());
        let mut fallback = Vec::new();
        for ch in &chars {
            let outcome = match &ch.glyph {
                Some(glyph) => self.place_glyph(glyph_rid, source.as_ref(), run, ch, glyph),
                None => Err(Error::Undefined(format!(
                    "code {} not encoded in {}",
                    ch.code,
                    run.font.font_name()
                ))),
            };
            match outcome {
                Ok(p) => placed.push(p),
                Err(e) if e.is_glyph_recoverable() => {
                    self.handle_missing_glyph(run.font.font_name(), &e)?;
                    fallback.push(ch.index);
                    let natural = ch
                        .glyph
                        .as_ref()
                        .map_or((0.0, 0.0), |g| natural_advance(source.as_ref(), g, run.size));
                    placed.push(PlacedGlyph {
                        code_bytes: Vec::new(),
                        did: (0.0, 0.0),
                        wanted: run.replaced_width(ch.index).unwrap_or(natural),
                        v_shift: (0.0, 0.0),
                    });
                },
                Err(e) => return Err(e),
            }
        }

        self.add_to_unicode(rid, run, source.as_ref(), &chars, &fallback)?;
        if self.ocr_stage != OcrStage::Failed {
            self.ocr_stage = OcrStage::Idle;
        }

        let wmode = self.resource_mut(rid)?.wmode;
        let (ops, advance) = layout(&placed, run.size, wmode, run.replaced_widths.is_some());
        Ok(ShowResult {
            resource: rid,
            ops,
            fallback,
            advance,
        })
    }

    fn handle_missing_glyph(&mut self, font_name: &str, err: &Error) -> Result<()> {
        if !self.compliance.is_strict() {
            log::debug!("glyph falls back to bitmap in {}: {}", font_name, err);
            return Ok(());
        }
        match self.config.missing_glyph_policy {
            MissingGlyphPolicy::DropGlyph => {
                log::warn!(
                    "Font {} lacks a glyph ({}); dropping it to stay compliant.",
                    font_name,
                    err
                );
                Ok(())
            },
            MissingGlyphPolicy::RevertOutputMode => {
                log::warn!(
                    "Font {} lacks a glyph ({}); reverting to normal output.",
                    font_name,
                    err
                );
                self.compliance = ComplianceProfile::None;
                Ok(())
            },
            MissingGlyphPolicy::Abort => Err(Error::InvalidFont(format!(
                "font {} lacks a glyph required for compliant output: {}",
                font_name, err
            ))),
        }
    }

    /// Copy one glyph and record its code and metrics.
    fn place_glyph(
        &mut self,
        rid: ResourceId,
        source: &dyn AbstractFont,
        run: &TextRun,
        ch: &ShownChar,
        glyph: &Glyph,
    ) -> Result<PlacedGlyph> {
        let resource = self
            .resources
            .get_mut(&rid)
            .ok_or_else(|| Error::Unregistered(format!("unknown font resource {}", rid)))?;
        let font_type = resource.font_type;
        let wmode = resource.wmode;
        let options = if font_type.is_cid() && wmode == WMode::Vertical {
            CopyGlyphOptions::USE_GSUB
        } else {
            CopyGlyphOptions::empty()
        };
        let simple_code = font_type.is_simple().then_some(ch.code);
        if let ResourceKind::Simple(enc) = &resource.kind {
            if !enc.is_compatible(ch.code, glyph) {
                return Err(Error::InvalidAccess(format!(
                    "code {} of resource {} already holds another glyph than {}",
                    ch.code, rid, glyph
                )));
            }
        }

        let (info, name, gid, matrix) = {
            let base: &mut BaseFont = match &mut resource.font {
                Some(ResourceFont::Owned(base)) => base.as_mut(),
                Some(ResourceFont::Descriptor(did)) => self
                    .descriptors
                    .get_mut(&*did)
                    .ok_or_else(|| Error::Unregistered(format!("missing descriptor for {}", rid)))?
                    .base_mut(),
                None => {
                    return Err(Error::Unregistered(format!("resource {} has no base font", rid)))
                },
            };
            base.use_glyph(source, glyph, simple_code, options)?;
            let copied = base.copied();
            let key = copied.storage_key(source, glyph, options);
            let stored = copied
                .glyph(&key)
                .ok_or_else(|| Error::Unregistered(format!("{} missing right after copy", key)))?;
            let gid = match (&key, glyph) {
                (Glyph::Index(g), _) => *g,
                (_, Glyph::Cid(c)) => *c,
                _ => 0,
            };
            (stored.info, stored.name.clone(), gid, copied.matrix())
        };

        let natural = glyph_advance_1000(font_type, &matrix, info.width.unwrap_or((0.0, 0.0)));
        let mut v_shift = (0.0, 0.0);
        let did_1000 = match &mut resource.kind {
            ResourceKind::Simple(enc) => {
                if enc.slot(ch.code).is_none() {
                    let builtin = builtin_name(source, ch.code);
                    enc.assign(ch.code, glyph.clone(), name, builtin.as_deref(), natural);
                }
                enc.mark_used(ch.code);
                enc.slot(ch.code).map_or(natural, |s| s.width)
            },
            ResourceKind::CidFont(metrics) => {
                let Glyph::Cid(cid) = glyph else {
                    return Err(Error::RangeCheck(format!("{} shown through a CIDFont", glyph)));
                };
                let w1 = info
                    .width1
                    .map_or(DEFAULT_DW2.1, |w| glyph_advance_1000(font_type, &matrix, w).1);
                let v = info
                    .v
                    .map(|v| glyph_advance_1000(font_type, &matrix, v))
                    .unwrap_or((natural.0 / 2.0, DEFAULT_DW2.0));
                metrics.set_glyph(*cid, gid, natural.0, w1, v)?;
                let width = metrics.width(*cid).unwrap_or(natural.0);
                let (stored_w1, stored_v) = metrics.vertical(*cid).unwrap_or((w1, v));
                if wmode == WMode::Vertical {
                    let actual_v = run.replaced_v_at(ch.index).unwrap_or(v);
                    v_shift = (
                        (stored_v.0 - actual_v.0) * run.size / 1000.0,
                        (stored_v.1 - actual_v.1) * run.size / 1000.0,
                    );
                    (0.0, stored_w1)
                } else {
                    (width, 0.0)
                }
            },
            ResourceKind::Type0 { .. } => {
                return Err(Error::Unregistered(format!(
                    "glyph copied into Type 0 resource {}",
                    rid
                )))
            },
        };

        let did = to_text_space(font_type, &matrix, did_1000, run.size);
        let wanted = match run.replaced_width(ch.index) {
            Some(r) if !same_advance(font_type, &matrix, did, r, run.size) => r,
            _ => did,
        };

        let mut spacing = run.char_spacing;
        if font_type.is_simple() && ch.code == 32 {
            spacing += run.word_spacing;
        }
        let extra = if wmode == WMode::Vertical {
            (0.0, spacing)
        } else {
            (spacing, 0.0)
        };

        Ok(PlacedGlyph {
            code_bytes: ch.code_bytes.clone(),
            did: (did.0 + extra.0, did.1 + extra.1),
            wanted: (wanted.0 + extra.0, wanted.1 + extra.1),
            v_shift,
        })
    }

    fn add_to_unicode(
        &mut self,
        rid: ResourceId,
        run: &TextRun,
        source: &dyn AbstractFont,
        chars: &[ShownChar],
        fallback: &[usize],
    ) -> Result<()> {
        let composite = run.font.font_type() == FontType::Composite;
        let mut ocr: Option<OcrRun> = None;
        for ch in chars {
            let Some(glyph) = &ch.glyph else { continue };
            if fallback.contains(&ch.index) {
                continue;
            }
            let mapped = self
                .resource_mut(rid)?
                .to_unicode()
                .is_some_and(|m| m.contains(ch.code));
            if mapped {
                continue;
            }

            let name = source.glyph_name(glyph);
            let from_font = || {
                font_unicode(run.font.as_ref(), glyph, ch.code, name.as_deref()).or_else(|| {
                    if composite {
                        font_unicode(source, glyph, ch.code, name.as_deref())
                    } else {
                        None
                    }
                })
            };
            let unicode = match self.config.use_ocr {
                UseOcr::Always => self
                    .ocr_unicode(&mut ocr, run, source, chars, ch, glyph)
                    .or_else(from_font),
                UseOcr::AsNeeded => {
                    from_font().or_else(|| self.ocr_unicode(&mut ocr, run, source, chars, ch, glyph))
                },
                UseOcr::Never => from_font(),
            };
            if let Some(units) = unicode {
                if let Some(map) = self.resource_mut(rid)?.to_unicode_mut() {
                    map.insert(ch.code, units);
                }
            }
        }
        Ok(())
    }

    fn ocr_unicode(
        &mut self,
        ocr: &mut Option<OcrRun>,
        run: &TextRun,
        source: &dyn AbstractFont,
        chars: &[ShownChar],
        ch: &ShownChar,
        glyph: &Glyph,
    ) -> Option<Vec<u16>> {
        let engine = self.ocr_engine.as_deref()?;
        if self.ocr_stage == OcrStage::Failed {
            return None;
        }
        let resolution = self.config.ocr_resolution;
        let pending = ocr.get_or_insert_with(|| {
            OcrRun::new(render_run(source, run, chars, resolution))
        });
        pending.recognize(engine, (resolution, resolution), &mut self.ocr_stage);
        pending.unicode_for(ch.code, glyph)
    }
}

/// Glyph to query for metrics and rasters: CIDFontType2 glyphs live under
/// their glyph index.
fn metrics_glyph(source: &dyn AbstractFont, glyph: &Glyph) -> Glyph {
    match glyph {
        Glyph::Cid(cid) if source.font_type() == FontType::CidType2 => {
            source.cid_to_gid(*cid).map_or_else(|| glyph.clone(), Glyph::Index)
        },
        _ => glyph.clone(),
    }
}

/// Advance of a glyph in text space, straight from the live font.
fn natural_advance(source: &dyn AbstractFont, glyph: &Glyph, size: f64) -> (f64, f64) {
    let font_type = source.font_type();
    let matrix = source.font_matrix().without_translation();
    let w = source
        .glyph_info(&metrics_glyph(source, glyph), GlyphInfoFlags::WIDTH0)
        .ok()
        .and_then(|i| i.width)
        .unwrap_or((0.0, 0.0));
    to_text_space(font_type, &matrix, glyph_advance_1000(font_type, &matrix, w), size)
}

fn to_text_space(
    font_type: FontType,
    matrix: &crate::fonts::glyph::Matrix,
    w: (f64, f64),
    size: f64,
) -> (f64, f64) {
    if font_type == FontType::Type3 {
        let (x, y) = matrix.transform_vector(w.0, w.1);
        (x * size, y * size)
    } else {
        (w.0 * size / 1000.0, w.1 * size / 1000.0)
    }
}

/// Compare a drawn and a requested advance in 1000-unit space, rounding
/// TrueType-grid values first.
fn same_advance(
    font_type: FontType,
    matrix: &crate::fonts::glyph::Matrix,
    did: (f64, f64),
    wanted: (f64, f64),
    size: f64,
) -> bool {
    if size == 0.0 {
        return true;
    }
    let scale = if font_type == FontType::Type3 {
        let (sx, _) = matrix.transform_vector(1.0, 0.0);
        if sx == 0.0 {
            1.0
        } else {
            1.0 / sx
        }
    } else {
        1000.0
    };
    let to_units = |v: f64| {
        let u = v * scale / size;
        if font_type.is_truetype_flavored() {
            round_grid_width(u)
        } else {
            u
        }
    };
    (to_units(did.0) - to_units(wanted.0)).abs() < WIDTH_EPSILON
        && (to_units(did.1) - to_units(wanted.1)).abs() < WIDTH_EPSILON
}

/// Name the font's own encoding gives `code`.
fn builtin_name(source: &dyn AbstractFont, code: u32) -> Option<String> {
    let glyph = source.encode_char(code)?;
    source.glyph_name(&glyph).or(match glyph {
        Glyph::Name(n) => Some(n),
        _ => None,
    })
}

/// Rasterise every glyph of a run, placed at its natural position.
fn render_run(
    source: &dyn AbstractFont,
    run: &TextRun,
    chars: &[ShownChar],
    resolution: u32,
) -> Vec<OcrGlyph> {
    let scale = resolution as f64 / 72.0;
    let mut pen = (0.0, 0.0);
    let mut out = Vec::with_capacity(chars.len());
    for ch in chars {
        let Some(glyph) = &ch.glyph else { continue };
        let bitmap = source.render_glyph(&metrics_glyph(source, glyph), run.size, (resolution, resolution));
        let (left, bottom) = bitmap.as_ref().map_or((0, 0), |b| (b.left, b.bottom));
        out.push(OcrGlyph {
            code: ch.code,
            glyph: glyph.clone(),
            x: (pen.0 * scale).round() as i32 + left,
            y: (pen.1 * scale).round() as i32 + bottom,
            bitmap,
        });
        let adv = natural_advance(source, glyph, run.size);
        pen = (pen.0 + adv.0, pen.1 + adv.1);
    }
    out
}
