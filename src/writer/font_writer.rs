//! Document-close serialisation of font resources.
//!
//! Every descriptor is written first, then CIDFonts, then simple and Type 3
//! fonts, then the Type 0 wrappers, so that each object references only
//! objects already emitted. A resource that fails with a per-font error is
//! dropped with a warning; the rest of the document is still written.

use crate::error::{Error, Result};
use crate::fonts::base_font::{BaseFont, SubsetDecision};
use crate::fonts::font_copy::CopiedFont;
use crate::fonts::font_subsetter::{
    decide_subset, embed_status, font_digest, has_subset_prefix, make_subset_prefix, EmbedStatus,
};
use crate::fonts::glyph::{BBox, CidSystemInfo, FontType, WMode};
use crate::object::{Dict, Object, ObjectRef};
use crate::writer::cid_widths::{CidMetrics, DEFAULT_DW2};
use crate::writer::font_descriptor::FontDescriptor;
use crate::writer::font_manager::FontManager;
use crate::writer::font_resource::{DescriptorId, FontResource, ResourceFont, ResourceId, ResourceKind};
use crate::writer::object_serializer::ObjectWriter;
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::io::Write;

/// Descriptor key an embedded program is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFileKey {
    /// Type 1 program
    FontFile,
    /// TrueType program
    FontFile2,
    /// CFF or OpenType program, qualified by `/Subtype`
    FontFile3,
}

impl FontFileKey {
    /// Dictionary key.
    pub fn as_str(self) -> &'static str {
        match self {
            FontFileKey::FontFile => "FontFile",
            FontFileKey::FontFile2 => "FontFile2",
            FontFileKey::FontFile3 => "FontFile3",
        }
    }
}

/// An encoded font program ready to be embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct FontProgram {
    pub key: FontFileKey,
    /// `/Subtype` of a FontFile3 stream.
    pub subtype: Option<&'static str>,
    pub data: Bytes,
    /// `/Length1` of TrueType programs.
    pub length1: Option<usize>,
}

/// What the encoder is asked to embed.
#[derive(Debug)]
pub struct EmbedRequest<'a> {
    /// Name as written, including any subset prefix.
    pub font_name: &'a str,
    pub font_type: FontType,
    /// The copy to embed: the subset copy, or the complete copy.
    pub copied: &'a CopiedFont,
    /// Original program bytes.
    pub font_file: Option<&'a Bytes>,
    pub subset: bool,
}

/// Produces embedded font programs.
pub trait FontProgramEncoder: Send + Sync {
    /// Encode the program for `request`. `Ok(None)` writes the descriptor
    /// without a program.
    fn encode(&self, request: &EmbedRequest<'_>) -> Result<Option<FontProgram>>;
}

/// Embeds the original font file bytes as captured at snapshot time.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginalProgramEncoder;

impl FontProgramEncoder for OriginalProgramEncoder {
    fn encode(&self, request: &EmbedRequest<'_>) -> Result<Option<FontProgram>> {
        let Some(data) = request.font_file else {
            log::warn!("No program bytes for font {}, writing it without FontFile.", request.font_name);
            return Ok(None);
        };
        let program = match request.font_type {
            FontType::Type1 => FontProgram {
                key: FontFileKey::FontFile,
                subtype: None,
                data: data.clone(),
                length1: None,
            },
            FontType::TrueType | FontType::CidType2 => FontProgram {
                key: FontFileKey::FontFile2,
                subtype: None,
                data: data.clone(),
                length1: Some(data.len()),
            },
            FontType::Type2 => FontProgram {
                key: FontFileKey::FontFile3,
                subtype: Some("Type1C"),
                data: data.clone(),
                length1: None,
            },
            FontType::CidType0 => FontProgram {
                key: FontFileKey::FontFile3,
                subtype: Some("CIDFontType0C"),
                data: data.clone(),
                length1: None,
            },
            FontType::Type3 | FontType::Composite => {
                return Err(Error::RangeCheck(format!(
                    "{} fonts carry no font program",
                    request.font_type.pdf_subtype()
                )))
            },
        };
        Ok(Some(program))
    }
}

/// Object references of the written font dictionaries.
#[derive(Debug, Default)]
pub struct WrittenFonts {
    fonts: IndexMap<ResourceId, ObjectRef>,
    dropped: Vec<ResourceId>,
}

impl WrittenFonts {
    /// Font dictionary of `id`, unless it was dropped.
    pub fn get(&self, id: ResourceId) -> Option<ObjectRef> {
        self.fonts.get(&id).copied()
    }

    /// True if `id` could not be written.
    pub fn is_dropped(&self, id: ResourceId) -> bool {
        self.dropped.contains(&id)
    }

    /// Resources that could not be written.
    pub fn dropped(&self) -> &[ResourceId] {
        &self.dropped
    }

    /// Number of written font dictionaries.
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// True if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Written dictionaries in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, ObjectRef)> + '_ {
        self.fonts.iter().map(|(id, r)| (*id, *r))
    }
}

fn compress_data(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// `/BaseFont` for a finalized base font.
///
/// TrueType names lose their spaces; a subset whose program is written gets
/// the deterministic prefix unless it already carries one.
pub fn base_font_name(base: &BaseFont, with_program: bool, used: &[u8]) -> String {
    let mut name = base.font_name().to_string();
    if matches!(base.font_type(), FontType::TrueType | FontType::CidType2) {
        name.retain(|c| c != ' ');
    }
    if with_program && base.subset() == SubsetDecision::Yes && !has_subset_prefix(&name) {
        name.insert_str(0, &make_subset_prefix(&font_digest(base), used));
    }
    name
}

/// Encode the program of an embedded font under its prefixed name.
///
/// Per-font encoder failures leave the font without a program.
fn encode_program(
    encoder: &dyn FontProgramEncoder,
    base: &BaseFont,
    status: EmbedStatus,
    used: &[u8],
) -> Result<Option<FontProgram>> {
    if status != EmbedStatus::Embed || base.font_type() == FontType::Type3 {
        return Ok(None);
    }
    let name = base_font_name(base, true, used);
    let request = EmbedRequest {
        font_name: &name,
        font_type: base.font_type(),
        copied: base.embedded_copy(),
        font_file: base.font_file(),
        subset: base.subset() == SubsetDecision::Yes,
    };
    match encoder.encode(&request) {
        Ok(program) => Ok(program),
        Err(e) if e.is_font_fatal() => {
            log::warn!("Could not encode font program of {}: {}", name, e);
            Ok(None)
        },
        Err(e) => Err(e),
    }
}

fn used_bitmap(resources: &IndexMap<ResourceId, FontResource>, d: &FontDescriptor) -> Vec<u8> {
    if d.base().font_type().is_cid() {
        return d.base().cid_set().to_vec();
    }
    let mut used = vec![0u8; 32];
    for r in resources.values() {
        if r.descriptor() != Some(d.id()) {
            continue;
        }
        if let Some(enc) = r.simple_encoding() {
            for (acc, b) in used.iter_mut().zip(enc.used_bitmap().iter()) {
                *acc |= *b;
            }
        }
    }
    used
}

fn cid_system_info(info: Option<&CidSystemInfo>) -> Object {
    let csi = info.cloned().unwrap_or_default();
    Object::dict([
        ("Registry", Object::String(csi.registry.into_bytes())),
        ("Ordering", Object::String(csi.ordering.into_bytes())),
        ("Supplement", Object::Integer(csi.supplement as i64)),
    ])
}

fn bbox_array(bbox: &BBox) -> Object {
    Object::Array(vec![
        Object::number(bbox.llx),
        Object::number(bbox.lly),
        Object::number(bbox.urx),
        Object::number(bbox.ury),
    ])
}

/// Per-document state of one write pass.
struct FontWriter<'a, 'w> {
    fm: &'a FontManager,
    out: &'w mut dyn ObjectWriter,
    descriptors: HashMap<DescriptorId, ObjectRef>,
    written: WrittenFonts,
}

impl<'a, 'w> FontWriter<'a, 'w> {
    fn write_stream(&mut self, mut dict: Dict, data: &[u8]) -> Result<ObjectRef> {
        let obj = if self.fm.config.compress_fonts {
            let packed = compress_data(data)?;
            dict.insert("Filter".to_string(), Object::name("FlateDecode"));
            Object::stream(dict, packed)
        } else {
            Object::stream(dict, data.to_vec())
        };
        let id = self.out.allocate_id();
        self.out.write_object(id, obj)?;
        Ok(id)
    }

    fn write_descriptor(&mut self, d: &FontDescriptor) -> Result<()> {
        let Some(status) = d.status() else {
            return Err(Error::Unregistered(format!(
                "descriptor of {} written before finalization",
                d.base().font_name()
            )));
        };
        if matches!(status, EmbedStatus::Standard(_)) || d.base().font_type() == FontType::Type3 {
            return Ok(());
        }
        let name = d.written_name().unwrap_or(d.base().font_name()).to_string();
        let base = d.base();

        let mut font_file = None;
        if let Some(program) = d.program() {
            let mut dict = Dict::new();
            if let Some(subtype) = program.subtype {
                dict.insert("Subtype".to_string(), Object::name(subtype));
            }
            if let Some(len) = program.length1 {
                dict.insert("Length1".to_string(), Object::Integer(len as i64));
            }
            let r = self.write_stream(dict, &program.data)?;
            font_file = Some((program.key.as_str(), r));
        }

        let cid_set = if base.font_type().is_cid() && d.is_subset_embedded() {
            Some(self.write_stream(Dict::new(), base.cid_set())?)
        } else {
            None
        };

        let obj = d.to_object(&name, font_file, cid_set);
        let id = self.out.allocate_id();
        self.out.write_object(id, obj)?;
        self.descriptors.insert(d.id(), id);
        Ok(())
    }

    fn descriptor_of(&self, r: &FontResource) -> Result<(&'a FontDescriptor, Option<ObjectRef>)> {
        let did = r
            .descriptor()
            .ok_or_else(|| Error::Unregistered(format!("resource {} has no descriptor", r.id())))?;
        let d = self
            .fm
            .descriptors
            .get(&did)
            .ok_or_else(|| Error::Unregistered(format!("missing descriptor for {}", r.id())))?;
        Ok((d, self.descriptors.get(&did).copied()))
    }

    fn to_unicode_entry(&mut self, r: &FontResource, dict: &mut Vec<(&'static str, Object)>) -> Result<()> {
        let Some(map) = r.to_unicode().filter(|m| !m.is_empty()) else {
            return Ok(());
        };
        let single_unit_only = self.fm.config.drop_multi_unit_to_unicode
            && r.simple_encoding().is_some_and(|enc| enc.has_differences());
        let cmap = map.to_cmap(single_unit_only);
        let id = self.write_stream(Dict::new(), &cmap)?;
        dict.push(("ToUnicode", Object::Reference(id)));
        Ok(())
    }

    fn cid_font_object(&mut self, r: &FontResource, metrics: &CidMetrics) -> Result<Object> {
        let (d, descriptor_ref) = self.descriptor_of(r)?;
        let descriptor_ref = descriptor_ref.ok_or_else(|| {
            Error::RangeCheck(format!("CIDFont {} has no written descriptor", r.font_name()))
        })?;
        let base = d.base();
        let name = d.written_name().unwrap_or(base.font_name()).to_string();

        let dw = metrics.default_width();
        let mut entries = vec![
            ("Type", Object::name("Font")),
            ("Subtype", Object::name(r.font_type().pdf_subtype())),
            ("BaseFont", Object::name(name)),
            ("CIDSystemInfo", cid_system_info(base.info().cid_system_info.as_ref())),
            ("FontDescriptor", Object::Reference(descriptor_ref)),
            ("DW", Object::number(dw)),
        ];
        let w = metrics.w_array(dw);
        if !w.is_empty() {
            entries.push(("W", Object::Array(w)));
        }
        if r.wmode() == WMode::Vertical {
            let dw2 = metrics.default_width2();
            if dw2 != DEFAULT_DW2 {
                entries.push(("DW2", Object::Array(vec![Object::number(dw2.0), Object::number(dw2.1)])));
            }
            let w2 = metrics.w2_array(dw2);
            if !w2.is_empty() {
                entries.push(("W2", Object::Array(w2)));
            }
        }
        if r.font_type() == FontType::CidType2 {
            match metrics.cid_to_gid_map()? {
                None => entries.push(("CIDToGIDMap", Object::name("Identity"))),
                Some(map) => {
                    let id = self.write_stream(Dict::new(), &map)?;
                    entries.push(("CIDToGIDMap", Object::Reference(id)));
                },
            }
        }
        Ok(Object::dict(entries))
    }

    fn simple_font_object(&mut self, r: &FontResource) -> Result<Object> {
        let Some(enc) = r.simple_encoding() else {
            return Err(Error::Unregistered(format!("{} is not a simple font", r.id())));
        };
        if enc.used_codes().next().is_none() {
            return Err(Error::RangeCheck(format!("no glyph of {} was used", r.font_name())));
        }
        if r.font_type() == FontType::Type3 {
            return self.type3_font_object(r);
        }

        let (d, descriptor_ref) = self.descriptor_of(r)?;
        let mut entries = vec![("Type", Object::name("Font"))];
        if let Some(EmbedStatus::Standard(std)) = d.status() {
            entries.push(("Subtype", Object::name("Type1")));
            entries.push(("BaseFont", Object::name(std.name())));
            if let Some(encoding) = enc.encoding_object() {
                entries.push(("Encoding", encoding));
            }
            self.to_unicode_entry(r, &mut entries)?;
            return Ok(Object::dict(entries));
        }

        let descriptor_ref = descriptor_ref.ok_or_else(|| {
            Error::RangeCheck(format!("font {} has no written descriptor", r.font_name()))
        })?;
        let name = d.written_name().unwrap_or(d.base().font_name()).to_string();
        let (first, last) = enc.char_range();
        entries.extend([
            ("Subtype", Object::name(r.font_type().pdf_subtype())),
            ("BaseFont", Object::name(name)),
            ("FirstChar", Object::Integer(first as i64)),
            ("LastChar", Object::Integer(last as i64)),
            ("Widths", Object::Array(enc.widths())),
            ("FontDescriptor", Object::Reference(descriptor_ref)),
        ]);
        if let Some(encoding) = enc.encoding_object() {
            entries.push(("Encoding", encoding));
        }
        self.to_unicode_entry(r, &mut entries)?;
        Ok(Object::dict(entries))
    }

    fn type3_font_object(&mut self, r: &FontResource) -> Result<Object> {
        let (Some(enc), Some(base)) = (r.simple_encoding(), r.owned_base()) else {
            return Err(Error::Unregistered(format!("Type 3 resource {} lost its glyphs", r.id())));
        };
        let copied = base.copied();
        let mut procs = Dict::new();
        let mut bbox = BBox::default();
        for code in enc.used_codes() {
            let Some(slot) = enc.slot(code) else { continue };
            let name = slot.difference_name();
            if procs.contains_key(&name) {
                continue;
            }
            let stored = copied.glyph(&slot.glyph).ok_or_else(|| {
                Error::Unregistered(format!("{} of {} was never copied", slot.glyph, r.font_name()))
            })?;
            if let Some(b) = stored.info.bbox {
                bbox = bbox.union(&b);
            }
            let id = self.write_stream(Dict::new(), &stored.data)?;
            procs.insert(name, Object::Reference(id));
        }

        let (first, last) = enc.char_range();
        let mut entries = vec![
            ("Type", Object::name("Font")),
            ("Subtype", Object::name("Type3")),
            ("FontBBox", bbox_array(&bbox)),
            (
                "FontMatrix",
                Object::Array(r.matrix().to_array().iter().map(|v| Object::Real(*v)).collect()),
            ),
            ("CharProcs", Object::Dictionary(procs)),
            ("FirstChar", Object::Integer(first as i64)),
            ("LastChar", Object::Integer(last as i64)),
            ("Widths", Object::Array(enc.widths())),
        ];
        if let Some(encoding) = enc.encoding_object() {
            entries.push(("Encoding", encoding));
        }
        self.to_unicode_entry(r, &mut entries)?;
        Ok(Object::dict(entries))
    }

    fn type0_font_object(&mut self, r: &FontResource, descendant: ResourceId, cmap_name: &str) -> Result<Object> {
        let Some(descendant_ref) = self.written.get(descendant) else {
            return Err(Error::RangeCheck(format!(
                "descendant of {} was not written",
                r.font_name()
            )));
        };
        let cid = self
            .fm
            .resources
            .get(&descendant)
            .ok_or_else(|| Error::Unregistered(format!("unknown descendant {}", descendant)))?;
        let (d, _) = self.descriptor_of(cid)?;
        let mut name = d.written_name().unwrap_or(d.base().font_name()).to_string();
        if cid.font_type() == FontType::CidType0 {
            name.push('-');
            name.push_str(cmap_name);
        }
        let mut entries = vec![
            ("Type", Object::name("Font")),
            ("Subtype", Object::name("Type0")),
            ("BaseFont", Object::name(name)),
            ("Encoding", Object::name(cmap_name)),
            ("DescendantFonts", Object::Array(vec![Object::Reference(descendant_ref)])),
        ];
        self.to_unicode_entry(r, &mut entries)?;
        Ok(Object::dict(entries))
    }

    fn write_resource(&mut self, r: &FontResource) -> Result<()> {
        let built = match r.kind() {
            ResourceKind::CidFont(metrics) => self.cid_font_object(r, metrics),
            ResourceKind::Simple(_) => self.simple_font_object(r),
            ResourceKind::Type0 {
                descendant,
                cmap_name,
            } => self.type0_font_object(r, *descendant, cmap_name),
        };
        match built {
            Ok(obj) => {
                let id = self.out.allocate_id();
                self.out.write_object(id, obj)?;
                self.written.fonts.insert(r.id(), id);
                Ok(())
            },
            Err(e) if e.is_font_fatal() => {
                log::warn!("Dropping font {} ({}): {}", r.font_name(), r.id(), e);
                self.written.dropped.push(r.id());
                Ok(())
            },
            Err(e) => Err(e),
        }
    }
}

impl FontManager {
    /// Settle subsetting and embedding for every font and write all
    /// descriptors and font dictionaries, each exactly once.
    ///
    /// Consumes the manager; nothing can be shown after document close.
    pub fn finalize_and_write_all(mut self, out: &mut dyn ObjectWriter) -> Result<WrittenFonts> {
        let mut config = self.config.clone();
        config.compliance = self.compliance;

        for r in self.resources.values_mut() {
            let symbolic = r
                .descriptor()
                .and_then(|id| self.descriptors.get(&id))
                .is_some_and(|d| d.base().info().is_symbolic());
            let refine = !symbolic && !r.font_type().is_cid() && r.font_type() != FontType::Type3;
            if let Some(enc) = r.simple_encoding_mut() {
                if refine {
                    enc.refine_base_encoding();
                }
            }
            if let Some(ResourceFont::Owned(base)) = r.font.as_mut() {
                decide_subset(base, &config);
            }
        }

        let ids: Vec<DescriptorId> = self.descriptors.keys().copied().collect();
        for did in ids {
            let used = match self.descriptors.get(&did) {
                Some(d) => used_bitmap(&self.resources, d),
                None => continue,
            };
            let Some(d) = self.descriptors.get_mut(&did) else { continue };
            decide_subset(d.base_mut(), &config);
            let font_type = d.base().font_type();
            let standard = if font_type.is_cid() || font_type == FontType::Type3 {
                None
            } else {
                self.standard_fonts.find_match(d.base().copied())
            };
            let status = embed_status(d.base().font_name(), d.base().info(), &config, standard);
            let program = encode_program(self.encoder.as_ref(), d.base(), status, &used)?;
            let name = base_font_name(d.base(), program.is_some(), &used);
            log::debug!("{}: {:?}, written as {}", d.base().font_name(), status, name);
            d.set_status(status);
            d.set_written_name(name);
            d.set_program(program);
        }

        let mut writer = FontWriter {
            fm: &self,
            out,
            descriptors: HashMap::new(),
            written: WrittenFonts::default(),
        };
        for d in self.descriptors.values() {
            writer.write_descriptor(d)?;
        }
        let order = |r: &FontResource| match r.kind() {
            ResourceKind::CidFont(_) => 0,
            ResourceKind::Simple(_) => 1,
            ResourceKind::Type0 { .. } => 2,
        };
        for pass in 0..3 {
            for r in self.resources.values().filter(|r| order(r) == pass) {
                writer.write_resource(r)?;
            }
        }
        Ok(writer.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::abstract_font::AbstractFont;
    use crate::fonts::glyph::{Glyph, Matrix};
    use crate::fonts::memory_font::{MemoryFont, MemoryGlyph};

    fn request<'a>(font_type: FontType, copied: &'a CopiedFont, file: Option<&'a Bytes>) -> EmbedRequest<'a> {
        EmbedRequest {
            font_name: "Test",
            font_type,
            copied,
            font_file: file,
            subset: false,
        }
    }

    #[test]
    fn test_original_encoder_keys() {
        let font = MemoryFont::builder("Test", FontType::Type1)
            .glyph(MemoryGlyph::named("A", 500.0))
            .build();
        let copied = CopiedFont::new(&font, Matrix::identity(), None).unwrap();
        let file = Bytes::from_static(b"program");

        let p = OriginalProgramEncoder
            .encode(&request(FontType::TrueType, &copied, Some(&file)))
            .unwrap()
            .unwrap();
        assert_eq!(p.key, FontFileKey::FontFile2);
        assert_eq!(p.length1, Some(7));

        let p = OriginalProgramEncoder
            .encode(&request(FontType::CidType0, &copied, Some(&file)))
            .unwrap()
            .unwrap();
        assert_eq!(p.key, FontFileKey::FontFile3);
        assert_eq!(p.subtype, Some("CIDFontType0C"));

        assert!(OriginalProgramEncoder
            .encode(&request(FontType::Type1, &copied, None))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_base_font_name_rules() {
        let font = MemoryFont::builder("Arial Bold", FontType::TrueType)
            .glyph(MemoryGlyph::new(Glyph::Index(1), 1000.0))
            .build();
        let mut base = BaseFont::copy_font(&font, font.font_matrix(), None, false).unwrap();
        assert_eq!(base_font_name(&base, true, &[]), "ArialBold");

        base.set_subset(SubsetDecision::Yes);
        let name = base_font_name(&base, true, &[1, 0]);
        assert!(has_subset_prefix(&name));
        assert!(name.ends_with("+ArialBold"));
        assert_eq!(name, base_font_name(&base, true, &[1, 0]));
        assert_eq!(base_font_name(&base, false, &[1, 0]), "ArialBold");
    }

    #[test]
    fn test_subset_without_program_has_no_prefix() {
        let font = MemoryFont::builder("Bare", FontType::Type1)
            .encoded(65, MemoryGlyph::named("A", 722.0))
            .build();
        let mut base = BaseFont::copy_font(&font, font.font_matrix(), None, false).unwrap();
        base.set_subset(SubsetDecision::Yes);
        assert_eq!(encode_program(&OriginalProgramEncoder, &base, EmbedStatus::Embed, &[]).unwrap(), None);

        let font = MemoryFont::builder("Bare", FontType::Type1)
            .encoded(65, MemoryGlyph::named("A", 722.0))
            .font_file(&b"%!PS-AdobeFont-1.0: Bare"[..])
            .build();
        let mut base = BaseFont::copy_font(&font, font.font_matrix(), None, false).unwrap();
        base.set_subset(SubsetDecision::Yes);
        let program = encode_program(&OriginalProgramEncoder, &base, EmbedStatus::Embed, &[]).unwrap();
        assert_eq!(program.map(|p| p.key), Some(FontFileKey::FontFile));
        assert!(encode_program(&OriginalProgramEncoder, &base, EmbedStatus::NoEmbed, &[])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_compress_roundtrip_header() {
        let packed = compress_data(b"hello hello hello").unwrap();
        // zlib header
        assert_eq!(packed[0], 0x78);
    }
}
