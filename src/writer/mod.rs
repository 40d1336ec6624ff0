//! PDF font resource writing.
//!
//! ## Architecture
//!
//! ```text
//! TextRun
//!     ↓
//! [FontManager::show_text] (resource lookup, glyph copy, widths, ToUnicode)
//!     ↓
//! [text_layout] (Td / Tj / TJ operations)
//!     ↓
//! content stream bytes
//!
//! document close
//!     ↓
//! [FontManager::finalize_and_write_all] (subset, embed, serialise)
//!     ↓
//! [ObjectWriter] (indirect objects)
//! ```

mod cid_widths;
mod font_descriptor;
mod font_manager;
mod font_resource;
mod font_writer;
mod object_serializer;
mod ocr;
mod simple_encoding;
mod text_layout;
mod to_unicode;

pub use cid_widths::{choose_default, CidMetrics, DEFAULT_DW, DEFAULT_DW2};
pub use font_descriptor::FontDescriptor;
pub use font_manager::{FontManager, ShowResult, TextRun};
pub use font_resource::{DescriptorId, FontResource, ResourceFont, ResourceId, ResourceKind};
pub use font_writer::{
    base_font_name, EmbedRequest, FontFileKey, FontProgram, FontProgramEncoder,
    OriginalProgramEncoder, WrittenFonts,
};
pub use object_serializer::{write_hex_string, MemoryObjectWriter, ObjectSerializer, ObjectWriter};
pub use ocr::{compose_strip, OcrBitmap, OcrEngine, OcrGlyph, OcrRun, OcrStage};
pub use simple_encoding::{EncodingSlot, SimpleEncoding, EMPTY_FIRST_CHAR, EMPTY_LAST_CHAR};
pub use text_layout::{layout, ops_to_bytes, PlacedGlyph, TextArrayItem, TextOp};
pub use to_unicode::{codepoint_to_utf16, font_unicode, ToUnicodeMap};
