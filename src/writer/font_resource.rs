//! Font resources: one per output font dictionary.
//!
//! A resource is created for each distinct (live font, encoding) pair shown
//! in the document. Simple and CID resources point at the shared
//! [`FontDescriptor`](crate::writer::FontDescriptor) of their base font; Type 3
//! resources own their base font outright.

use crate::fonts::base_font::BaseFont;
use crate::fonts::glyph::{FontId, FontType, Matrix, WMode};
use crate::writer::cid_widths::CidMetrics;
use crate::writer::simple_encoding::SimpleEncoding;
use crate::writer::to_unicode::ToUnicodeMap;
use std::fmt;

/// Handle of a font resource within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub usize);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Handle of a font descriptor within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(pub usize);

/// Where a resource's base font lives.
#[derive(Debug)]
pub enum ResourceFont {
    /// Owned by the resource (Type 3).
    Owned(Box<BaseFont>),
    /// Owned by a shared descriptor.
    Descriptor(DescriptorId),
}

/// Variant data of a resource.
#[derive(Debug)]
pub enum ResourceKind {
    /// Single-byte font, including Type 3.
    Simple(SimpleEncoding),
    /// CIDFont descendant.
    CidFont(CidMetrics),
    /// Type 0 wrapper over one CIDFont resource.
    Type0 {
        descendant: ResourceId,
        cmap_name: String,
    },
}

/// One output font dictionary.
#[derive(Debug)]
pub struct FontResource {
    pub(crate) id: ResourceId,
    pub(crate) font_id: FontId,
    pub(crate) font_type: FontType,
    pub(crate) font_name: String,
    pub(crate) font: Option<ResourceFont>,
    pub(crate) kind: ResourceKind,
    pub(crate) to_unicode: Option<ToUnicodeMap>,
    pub(crate) wmode: WMode,
    pub(crate) matrix: Matrix,
}

impl FontResource {
    pub(crate) fn new(
        id: ResourceId,
        font_id: FontId,
        font_type: FontType,
        font_name: &str,
        font: Option<ResourceFont>,
        kind: ResourceKind,
    ) -> Self {
        let to_unicode = match &kind {
            ResourceKind::Simple(_) => Some(ToUnicodeMap::new(1)),
            ResourceKind::Type0 { .. } => Some(ToUnicodeMap::new(2)),
            ResourceKind::CidFont(_) => None,
        };
        Self {
            id,
            font_id,
            font_type,
            font_name: font_name.to_string(),
            font,
            kind,
            to_unicode,
            wmode: WMode::Horizontal,
            matrix: Matrix::identity(),
        }
    }

    /// Handle of this resource.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Identity of the live font.
    pub fn font_id(&self) -> FontId {
        self.font_id
    }

    /// Technology of the written font.
    pub fn font_type(&self) -> FontType {
        self.font_type
    }

    /// Font name without subset prefix.
    pub fn font_name(&self) -> &str {
        &self.font_name
    }

    /// Writing mode.
    pub fn wmode(&self) -> WMode {
        self.wmode
    }

    /// Font matrix (Type 3 `/FontMatrix`).
    pub fn matrix(&self) -> Matrix {
        self.matrix
    }

    /// Descriptor this resource shares, if any.
    pub fn descriptor(&self) -> Option<DescriptorId> {
        match self.font {
            Some(ResourceFont::Descriptor(id)) => Some(id),
            _ => None,
        }
    }

    /// Base font owned by the resource itself.
    pub fn owned_base(&self) -> Option<&BaseFont> {
        match &self.font {
            Some(ResourceFont::Owned(base)) => Some(base),
            _ => None,
        }
    }

    /// Variant data.
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Encoding table of simple resources.
    pub fn simple_encoding(&self) -> Option<&SimpleEncoding> {
        match &self.kind {
            ResourceKind::Simple(enc) => Some(enc),
            _ => None,
        }
    }

    pub(crate) fn simple_encoding_mut(&mut self) -> Option<&mut SimpleEncoding> {
        match &mut self.kind {
            ResourceKind::Simple(enc) => Some(enc),
            _ => None,
        }
    }

    /// Width tables of CIDFont resources.
    pub fn cid_metrics(&self) -> Option<&CidMetrics> {
        match &self.kind {
            ResourceKind::CidFont(m) => Some(m),
            _ => None,
        }
    }

    /// ToUnicode map (simple and Type 0 resources).
    pub fn to_unicode(&self) -> Option<&ToUnicodeMap> {
        self.to_unicode.as_ref()
    }

    pub(crate) fn to_unicode_mut(&mut self) -> Option<&mut ToUnicodeMap> {
        self.to_unicode.as_mut()
    }

    /// `(FirstChar, LastChar)` of simple resources.
    pub fn char_range(&self) -> Option<(i32, i32)> {
        self.simple_encoding().map(SimpleEncoding::char_range)
    }
}
