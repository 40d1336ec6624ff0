//! Subsetting and embedding policy.
//!
//! Decides, per base font, whether to embed it in full, embed a subset,
//! substitute a standard font, or refuse embedding, and derives the
//! `XXXXXX+` subset prefix.

use crate::config::FontEmbedConfig;
use crate::fonts::base_font::{BaseFont, SubsetDecision};
use crate::fonts::glyph::{FontInfo, FontType};
use crate::fonts::standard_fonts::StandardFont;
use byteorder::{ByteOrder, LittleEndian};
use md5::{Digest, Md5};

/// Length of a subset prefix including the `+`.
pub const SUBSET_PREFIX_LEN: usize = 7;

/// fsType value for restricted-license embedding.
const FS_TYPE_RESTRICTED: u16 = 0x0002;
/// fsType bit for bitmap-only embedding.
const FS_TYPE_BITMAP_ONLY: u16 = 0x0200;

/// How a font ends up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedStatus {
    /// Embed the font program.
    Embed,
    /// Refer to a standard font without embedding.
    Standard(StandardFont),
    /// Do not embed.
    NoEmbed,
}

/// True if `name` starts with six uppercase letters and a `+`.
pub fn has_subset_prefix(name: &str) -> bool {
    let b = name.as_bytes();
    b.len() >= SUBSET_PREFIX_LEN
        && b[SUBSET_PREFIX_LEN - 1] == b'+'
        && b[..SUBSET_PREFIX_LEN - 1].iter().all(u8::is_ascii_uppercase)
}

/// Remove every leading subset prefix.
pub fn strip_subset_prefix(mut name: &str) -> &str {
    while has_subset_prefix(name) {
        name = &name[SUBSET_PREFIX_LEN..];
    }
    name
}

/// Subset prefix derived from a font-file digest and the used-glyph bitmap.
pub fn make_subset_prefix(digest: &[u8; 16], used: &[u8]) -> String {
    const MULT: u64 = 3141592653;
    let mut v: u64 = 0;
    for chunk in digest[..8].chunks_exact(2) {
        v = v.wrapping_mul(MULT).wrapping_add(LittleEndian::read_u16(chunk) as u64);
    }
    let pairs = used.len() & !1;
    for chunk in used[..pairs].chunks_exact(2) {
        v = v.wrapping_mul(MULT).wrapping_add(LittleEndian::read_u16(chunk) as u64);
    }
    for &b in &used[pairs..] {
        v = v.wrapping_mul(MULT).wrapping_add(b as u64);
    }
    let mut prefix = String::with_capacity(SUBSET_PREFIX_LEN);
    for _ in 0..SUBSET_PREFIX_LEN - 1 {
        prefix.push((b'A' + (v % 26) as u8) as char);
        v /= 26;
    }
    prefix.push('+');
    prefix
}

/// MD5 of the font program, or of the copied glyph programs when the font
/// file was not kept.
pub fn font_digest(base: &BaseFont) -> [u8; 16] {
    let mut hasher = Md5::new();
    match base.font_file() {
        Some(file) => hasher.update(file),
        None => {
            hasher.update(base.font_name().as_bytes());
            for (_, g) in base.copied().glyphs() {
                hasher.update(&g.data);
            }
        },
    }
    hasher.finalize().into()
}

/// General subsetting rule.
pub fn should_subset(used: usize, total: usize, config: &FontEmbedConfig) -> bool {
    let mut subset = config.subset_fonts && config.max_subset_pct > 0;
    if subset && config.max_subset_pct < 100 {
        subset = (used as u64) <= (total as u64) * (config.max_subset_pct as u64) / 100;
    }
    subset
}

/// Settle the subsetting decision of `base` and freeze it.
pub fn decide_subset(base: &mut BaseFont, config: &FontEmbedConfig) -> SubsetDecision {
    if base.font_type() != FontType::Type3 {
        if config.compliance.is_strict() {
            base.set_subset(SubsetDecision::Yes);
        } else if base.subset() == SubsetDecision::Unknown {
            let used = base.copied().used_count();
            let decision = if should_subset(used, base.num_glyphs(), config) {
                SubsetDecision::Yes
            } else {
                SubsetDecision::No
            };
            log::debug!(
                "{}: {} of {} glyphs used, subset {:?}",
                base.font_name(),
                used,
                base.num_glyphs(),
                decision
            );
            base.set_subset(decision);
        }
    }
    base.finalize();
    base.subset()
}

/// True if the fsType bits forbid embedding.
pub fn is_embedding_restricted(fs_type: Option<u16>) -> bool {
    fs_type.is_some_and(|t| t == FS_TYPE_RESTRICTED || t & FS_TYPE_BITMAP_ONLY != 0)
}

fn list_includes(list: &[String], name: &str) -> bool {
    list.iter().any(|n| n == name)
}

/// Embedding decision for a font.
///
/// `standard` is the standard font every used glyph matches, if any.
pub fn embed_status(
    font_name: &str,
    info: &FontInfo,
    config: &FontEmbedConfig,
    standard: Option<StandardFont>,
) -> EmbedStatus {
    let name = strip_subset_prefix(font_name);
    if is_embedding_restricted(info.fs_type) && !list_includes(&config.embedding_allow_list, name) {
        log::warn!(
            "Font {} cannot be embedded because of licensing restrictions",
            name
        );
        return EmbedStatus::NoEmbed;
    }
    if config.compliance.is_strict() || list_includes(&config.always_embed, name) {
        return EmbedStatus::Embed;
    }
    if let Some(std) = standard {
        return EmbedStatus::Standard(std);
    }
    if list_includes(&config.never_embed, name) {
        return EmbedStatus::NoEmbed;
    }
    if config.embed_all_fonts || info.is_symbolic() {
        EmbedStatus::Embed
    } else {
        EmbedStatus::NoEmbed
    }
}
