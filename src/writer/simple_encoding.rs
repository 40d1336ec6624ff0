//! Encoding and width tables of simple (single-byte) font resources.
//!
//! Each of the 256 codes holds at most one glyph. A slot is a difference when
//! the glyph name is not what the base encoding (or, for symbolic fonts
//! without one, the font's built-in encoding) puts at that code; Type 3 fonts
//! list every used code.

use crate::error::{try_filled, Result};
use crate::fonts::encoding::BaseEncoding;
use crate::fonts::glyph::Glyph;
use crate::object::Object;

/// FirstChar of a resource with no used code.
pub const EMPTY_FIRST_CHAR: i32 = 256;
/// LastChar of a resource with no used code.
pub const EMPTY_LAST_CHAR: i32 = -1;

/// One encoded code.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingSlot {
    pub glyph: Glyph,
    pub name: Option<String>,
    pub is_difference: bool,
    /// Advance in 1000-unit text space, or glyph space for Type 3.
    pub width: (f64, f64),
}

impl EncodingSlot {
    /// Name used in a Differences array.
    pub fn difference_name(&self) -> String {
        match (&self.name, &self.glyph) {
            (Some(n), _) => n.clone(),
            (None, Glyph::Name(n)) => n.clone(),
            (None, g) => format!("g{}", g.number().unwrap_or(0)),
        }
    }
}

/// 256-slot encoding with used bitmap and widths.
#[derive(Debug, Clone)]
pub struct SimpleEncoding {
    slots: Vec<Option<EncodingSlot>>,
    used: [u8; 32],
    base: Option<BaseEncoding>,
    list_all: bool,
}

impl SimpleEncoding {
    /// Empty table over `base`. `list_all` makes every used code a
    /// difference (Type 3 fonts).
    pub fn new(base: Option<BaseEncoding>, list_all: bool) -> Result<Self> {
        Ok(Self {
            slots: try_filled(256, None)?,
            used: [0; 32],
            base,
            list_all,
        })
    }

    /// Base encoding differences are taken against.
    pub fn base_encoding(&self) -> Option<BaseEncoding> {
        self.base
    }

    /// Slot at `code`.
    pub fn slot(&self, code: u32) -> Option<&EncodingSlot> {
        self.slots.get(code as usize).and_then(|s| s.as_ref())
    }

    /// True if `code` is free or already holds `glyph`.
    pub fn is_compatible(&self, code: u32, glyph: &Glyph) -> bool {
        match self.slots.get(code as usize) {
            Some(Some(slot)) => &slot.glyph == glyph,
            Some(None) => true,
            None => false,
        }
    }

    /// Encode `glyph` at `code`.
    ///
    /// `builtin` is the name the font's own encoding gives the code; it is the
    /// reference for fonts without a base encoding. Returns `false` if the
    /// code was already assigned (the existing slot is kept).
    pub fn assign(
        &mut self,
        code: u32,
        glyph: Glyph,
        name: Option<String>,
        builtin: Option<&str>,
        width: (f64, f64),
    ) -> bool {
        let Some(entry) = self.slots.get_mut(code as usize) else {
            return false;
        };
        if entry.is_some() {
            return false;
        }
        let mut slot = EncodingSlot {
            glyph,
            name,
            is_difference: false,
            width,
        };
        slot.is_difference = self.list_all || {
            let reference = match self.base {
                Some(base) => base.glyph_name(code),
                None => builtin,
            };
            reference != Some(slot.difference_name().as_str())
        };
        *entry = Some(slot);
        true
    }

    /// Mark `code` as shown.
    pub fn mark_used(&mut self, code: u32) {
        if code < 256 {
            self.used[(code >> 3) as usize] |= 0x80 >> (code & 7);
        }
    }

    /// True if `code` has been shown.
    pub fn is_used(&self, code: u32) -> bool {
        code < 256 && self.used[(code >> 3) as usize] & (0x80 >> (code & 7)) != 0
    }

    /// Used-code bitmap, MSB first.
    pub fn used_bitmap(&self) -> &[u8; 32] {
        &self.used
    }

    /// Used codes in increasing order.
    pub fn used_codes(&self) -> impl Iterator<Item = u32> + '_ {
        (0..256u32).filter(|&c| self.is_used(c))
    }

    /// `(FirstChar, LastChar)`, or the empty sentinel `(256, -1)`.
    pub fn char_range(&self) -> (i32, i32) {
        let mut first = EMPTY_FIRST_CHAR;
        let mut last = EMPTY_LAST_CHAR;
        for code in self.used_codes() {
            first = first.min(code as i32);
            last = last.max(code as i32);
        }
        (first, last)
    }

    /// Widths array from FirstChar to LastChar; unused codes are 0.
    pub fn widths(&self) -> Vec<Object> {
        let (first, last) = self.char_range();
        (first..=last)
            .map(|code| {
                let code = code as u32;
                match self.slot(code) {
                    Some(slot) if self.is_used(code) => Object::number(slot.width.0),
                    _ => Object::Integer(0),
                }
            })
            .collect()
    }

    fn differs_from(&self, base: BaseEncoding, code: u32, slot: &EncodingSlot) -> bool {
        self.list_all || base.glyph_name(code) != Some(slot.difference_name().as_str())
    }

    /// Number of used codes that differ from `base`.
    pub fn count_differences(&self, base: BaseEncoding) -> usize {
        self.used_codes()
            .filter(|&code| {
                self.slot(code)
                    .is_some_and(|slot| self.differs_from(base, code, slot))
            })
            .count()
    }

    /// Switch to the standard base encoding giving the fewest differences.
    /// The current base wins ties.
    pub fn refine_base_encoding(&mut self) {
        let Some(current) = self.base else {
            return;
        };
        if self.list_all {
            return;
        }
        let mut best = current;
        let mut best_count = self.count_differences(current);
        for candidate in BaseEncoding::ALL {
            let count = self.count_differences(candidate);
            if count < best_count {
                best = candidate;
                best_count = count;
            }
        }
        if best != current {
            log::debug!(
                "base encoding {} -> {} ({} differences)",
                current.pdf_name(),
                best.pdf_name(),
                best_count
            );
            self.base = Some(best);
            for code in 0..256u32 {
                if let Some(Some(slot)) = self.slots.get(code as usize) {
                    let diff = self.differs_from(best, code, slot);
                    if let Some(Some(slot)) = self.slots.get_mut(code as usize) {
                        slot.is_difference = diff;
                    }
                }
            }
        }
    }

    /// True if any used code is a difference.
    pub fn has_differences(&self) -> bool {
        self.used_codes()
            .any(|code| self.slot(code).is_some_and(|s| s.is_difference))
    }

    /// `(code, name)` for every used difference, in code order.
    pub fn differences(&self) -> Vec<(u32, String)> {
        self.used_codes()
            .filter_map(|code| {
                self.slot(code)
                    .filter(|s| s.is_difference)
                    .map(|s| (code, s.difference_name()))
            })
            .collect()
    }

    /// Differences array, with consecutive codes sharing one leading code.
    pub fn differences_array(&self) -> Vec<Object> {
        let mut out = Vec::new();
        let mut next: Option<u32> = None;
        for (code, name) in self.differences() {
            if next != Some(code) {
                out.push(Object::Integer(code as i64));
            }
            out.push(Object::Name(name));
            next = Some(code + 1);
        }
        out
    }

    /// `/Encoding` value: a base encoding name, a dictionary with
    /// Differences, or `None` for the font's built-in encoding.
    pub fn encoding_object(&self) -> Option<Object> {
        if !self.has_differences() {
            return self.base.map(|b| Object::name(b.pdf_name()));
        }
        let mut entries = vec![
            ("Type", Object::name("Encoding")),
            ("Differences", Object::Array(self.differences_array())),
        ];
        if let Some(base) = self.base {
            entries.push(("BaseEncoding", Object::name(base.pdf_name())));
        }
        Some(Object::dict(entries))
    }
}
