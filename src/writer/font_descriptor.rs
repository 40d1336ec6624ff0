//! Font descriptors.
//!
//! Exactly one descriptor exists per base font; every resource created for
//! the same live font shares it. The descriptor owns the [`BaseFont`] and the
//! embedding decision taken at document close.

use crate::fonts::base_font::{BaseFont, SubsetDecision};
use crate::fonts::font_subsetter::EmbedStatus;
use crate::fonts::glyph::{FontFlags, FontId, FontType, Glyph};
use crate::object::{Object, ObjectRef};
use crate::writer::font_resource::DescriptorId;
use crate::writer::font_writer::FontProgram;

/// Shared metrics and embedding metadata of one base font.
#[derive(Debug)]
pub struct FontDescriptor {
    id: DescriptorId,
    font_id: FontId,
    base: BaseFont,
    status: Option<EmbedStatus>,
    written_name: Option<String>,
    program: Option<FontProgram>,
}

impl FontDescriptor {
    pub(crate) fn new(id: DescriptorId, font_id: FontId, base: BaseFont) -> Self {
        Self {
            id,
            font_id,
            base,
            status: None,
            written_name: None,
            program: None,
        }
    }

    /// Handle of this descriptor.
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    /// Live font the base font was copied from.
    pub fn font_id(&self) -> FontId {
        self.font_id
    }

    /// The owned base font.
    pub fn base(&self) -> &BaseFont {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut BaseFont {
        &mut self.base
    }

    /// Embedding decision, once finalized.
    pub fn status(&self) -> Option<EmbedStatus> {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: EmbedStatus) {
        self.status = Some(status);
    }

    /// True when the program is embedded as a subset.
    pub fn is_subset_embedded(&self) -> bool {
        self.status == Some(EmbedStatus::Embed) && self.base.subset() == SubsetDecision::Yes
    }

    /// `/FontName` as written (with subset prefix), after finalization.
    pub fn written_name(&self) -> Option<&str> {
        self.written_name.as_deref()
    }

    pub(crate) fn set_written_name(&mut self, name: String) {
        self.written_name = Some(name);
    }

    /// Font program encoded at finalization, if one is embedded.
    pub fn program(&self) -> Option<&FontProgram> {
        self.program.as_ref()
    }

    pub(crate) fn set_program(&mut self, program: Option<FontProgram>) {
        self.program = program;
    }

    /// `/Flags`, with exactly one of Symbolic/Nonsymbolic set.
    pub fn flags(&self) -> FontFlags {
        let mut flags = self.base.info().flags;
        if flags.contains(FontFlags::SYMBOLIC) {
            flags.remove(FontFlags::NONSYMBOLIC);
        } else {
            flags.insert(FontFlags::NONSYMBOLIC);
        }
        flags
    }

    /// `/CharSet` for subset Type 1 fonts: the used glyph names.
    pub fn char_set(&self) -> Option<String> {
        if !matches!(self.base.font_type(), FontType::Type1 | FontType::Type2)
            || !self.is_subset_embedded()
        {
            return None;
        }
        let mut names: Vec<&str> = self
            .base
            .copied()
            .used_glyphs()
            .filter_map(|(glyph, stored)| match (glyph, &stored.name) {
                (Glyph::Name(n), _) => Some(n.as_str()),
                (_, Some(n)) => Some(n.as_str()),
                _ => None,
            })
            .filter(|n| *n != ".notdef")
            .collect();
        names.sort_unstable();
        names.dedup();
        Some(names.iter().map(|n| format!("/{}", n)).collect())
    }

    /// Descriptor dictionary.
    ///
    /// `font_file` is the program stream as `(key, ref)`, `cid_set` the CIDSet
    /// stream.
    pub fn to_object(
        &self,
        font_name: &str,
        font_file: Option<(&str, ObjectRef)>,
        cid_set: Option<ObjectRef>,
    ) -> Object {
        let info = self.base.info();
        let bbox = info.bbox;
        let mut entries = vec![
            ("Type", Object::name("FontDescriptor")),
            ("FontName", Object::name(font_name)),
            ("Flags", Object::Integer(self.flags().bits() as i64)),
            (
                "FontBBox",
                Object::Array(vec![
                    Object::number(bbox.llx.floor()),
                    Object::number(bbox.lly.floor()),
                    Object::number(bbox.urx.ceil()),
                    Object::number(bbox.ury.ceil()),
                ]),
            ),
            ("ItalicAngle", Object::number(info.italic_angle)),
            ("Ascent", Object::number(info.ascent.round())),
            ("Descent", Object::number(info.descent.round())),
            ("CapHeight", Object::number(info.cap_height.round())),
            ("StemV", Object::number(info.stem_v.round())),
        ];
        if let Some((key, r)) = font_file {
            entries.push((key, Object::Reference(r)));
        }
        if let Some(r) = cid_set {
            entries.push(("CIDSet", Object::Reference(r)));
        }
        if let Some(cs) = self.char_set() {
            entries.push(("CharSet", Object::String(cs.into_bytes())));
        }
        Object::dict(entries)
    }
}
