//! Configuration for font embedding and subsetting.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output compliance profile.
///
/// PDF/A and PDF/X require every font to be embedded in full fidelity, which
/// forces subsetting on and embedding on regardless of the other knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceProfile {
    /// Plain PDF output
    #[default]
    None,
    /// PDF/A archival output
    PdfA,
    /// PDF/X print exchange output
    PdfX,
}

impl ComplianceProfile {
    /// True for profiles that demand full-fidelity embedding.
    pub fn is_strict(self) -> bool {
        !matches!(self, ComplianceProfile::None)
    }
}

/// What to do when a glyph is missing under a strict compliance profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingGlyphPolicy {
    /// Refuse the glyph; the caller renders it another way.
    #[default]
    DropGlyph,
    /// Warn and switch the compliance profile off for the rest of the document.
    RevertOutputMode,
    /// Fail the show with `InvalidFont`.
    Abort,
}

/// When to fall back to OCR for ToUnicode recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseOcr {
    /// Never run OCR
    #[default]
    Never,
    /// Only for glyphs with no other Unicode source
    AsNeeded,
    /// Prefer OCR over the font's own information
    Always,
}

/// Font embedding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontEmbedConfig {
    /// Allow subsetting at all.
    pub subset_fonts: bool,

    /// Subset when at most this percentage of the glyphs is used.
    pub max_subset_pct: u32,

    /// Embed every font that is not on `never_embed`.
    pub embed_all_fonts: bool,

    /// Font names that are always embedded.
    pub always_embed: Vec<String>,

    /// Font names that are never embedded.
    pub never_embed: Vec<String>,

    /// Font names that may be embedded despite licensing restrictions.
    pub embedding_allow_list: Vec<String>,

    /// Output compliance profile.
    pub compliance: ComplianceProfile,

    /// Strict-profile missing-glyph handling.
    pub missing_glyph_policy: MissingGlyphPolicy,

    /// OCR fallback mode for ToUnicode.
    pub use_ocr: UseOcr,

    /// Rendering resolution for OCR bitmaps (dpi).
    pub ocr_resolution: u32,

    /// Flate-compress embedded font programs.
    pub compress_fonts: bool,

    /// Drop ToUnicode entries longer than one UTF-16 unit for fonts with a
    /// Differences encoding.
    pub drop_multi_unit_to_unicode: bool,
}

impl Default for FontEmbedConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FontEmbedConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            subset_fonts: true,
            max_subset_pct: 100,
            embed_all_fonts: true,
            always_embed: Vec::new(),
            never_embed: Vec::new(),
            embedding_allow_list: Vec::new(),
            compliance: ComplianceProfile::None,
            missing_glyph_policy: MissingGlyphPolicy::DropGlyph,
            use_ocr: UseOcr::Never,
            ocr_resolution: 300,
            compress_fonts: true,
            drop_multi_unit_to_unicode: true,
        }
    }

    /// Parse configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.max_subset_pct > 100 {
            return Err(Error::Config(format!(
                "max_subset_pct must be 0..=100, got {}",
                self.max_subset_pct
            )));
        }
        if self.ocr_resolution == 0 {
            return Err(Error::Config("ocr_resolution must be positive".to_string()));
        }
        Ok(())
    }

    /// Enable or disable subsetting.
    pub fn with_subset_fonts(mut self, enable: bool) -> Self {
        self.subset_fonts = enable;
        self
    }

    /// Set the subsetting threshold percentage (clamped to 100).
    pub fn with_max_subset_pct(mut self, pct: u32) -> Self {
        self.max_subset_pct = pct.min(100);
        self
    }

    /// Embed every font not explicitly excluded.
    pub fn with_embed_all_fonts(mut self, enable: bool) -> Self {
        self.embed_all_fonts = enable;
        self
    }

    /// Add a font to the always-embed list.
    pub fn with_always_embed(mut self, name: impl Into<String>) -> Self {
        self.always_embed.push(name.into());
        self
    }

    /// Add a font to the never-embed list.
    pub fn with_never_embed(mut self, name: impl Into<String>) -> Self {
        self.never_embed.push(name.into());
        self
    }

    /// Allow embedding a licensing-restricted font.
    pub fn with_embedding_allowed(mut self, name: impl Into<String>) -> Self {
        self.embedding_allow_list.push(name.into());
        self
    }

    /// Set the compliance profile.
    pub fn with_compliance(mut self, profile: ComplianceProfile) -> Self {
        self.compliance = profile;
        self
    }

    /// Set the strict-profile missing-glyph policy.
    pub fn with_missing_glyph_policy(mut self, policy: MissingGlyphPolicy) -> Self {
        self.missing_glyph_policy = policy;
        self
    }

    /// Set the OCR fallback mode.
    pub fn with_ocr(mut self, mode: UseOcr) -> Self {
        self.use_ocr = mode;
        self
    }

    /// Set the OCR rendering resolution.
    pub fn with_ocr_resolution(mut self, dpi: u32) -> Self {
        self.ocr_resolution = dpi.max(1);
        self
    }

    /// Enable or disable Flate compression of font programs.
    pub fn with_compress_fonts(mut self, enable: bool) -> Self {
        self.compress_fonts = enable;
        self
    }

    /// Toggle the multi-unit ToUnicode compatibility quirk.
    pub fn with_drop_multi_unit_to_unicode(mut self, enable: bool) -> Self {
        self.drop_multi_unit_to_unicode = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = FontEmbedConfig::default();
        assert!(c.subset_fonts);
        assert_eq!(c.max_subset_pct, 100);
        assert!(c.embed_all_fonts);
        assert_eq!(c.compliance, ComplianceProfile::None);
        assert_eq!(c.use_ocr, UseOcr::Never);
        assert_eq!(c.ocr_resolution, 300);
        assert!(c.drop_multi_unit_to_unicode);
    }

    #[test]
    fn test_builder() {
        let c = FontEmbedConfig::new()
            .with_max_subset_pct(150)
            .with_compliance(ComplianceProfile::PdfA)
            .with_never_embed("Courier");
        assert_eq!(c.max_subset_pct, 100);
        assert!(c.compliance.is_strict());
        assert_eq!(c.never_embed, vec!["Courier".to_string()]);
    }

    #[test]
    fn test_from_json_partial() {
        let c = FontEmbedConfig::from_json(r#"{"max_subset_pct": 50, "use_ocr": "as_needed"}"#)
            .unwrap();
        assert_eq!(c.max_subset_pct, 50);
        assert_eq!(c.use_ocr, UseOcr::AsNeeded);
        assert!(c.subset_fonts);
    }

    #[test]
    fn test_from_json_rejects_bad_pct() {
        let err = FontEmbedConfig::from_json(r#"{"max_subset_pct": 101}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(FontEmbedConfig::from_json("{not json"), Err(Error::Config(_))));
    }

    #[test]
    fn test_json_roundtrip_preserves_lists() {
        let c = FontEmbedConfig::new().with_always_embed("Symbol");
        let back = FontEmbedConfig::from_json(&c.to_json().unwrap()).unwrap();
        assert_eq!(back, c);
    }
}
