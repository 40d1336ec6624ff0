//! Text layout overrides.
//!
//! Turns the glyphs of one text run into `Td`/`Tj`/`TJ` operations so that
//! every glyph lands where the caller wants it, even when that differs from
//! the advance a PDF reader derives from the font's widths.
//!
//! Positions and advances are in unscaled text space.

use crate::fonts::glyph::WMode;
use crate::writer::object_serializer::write_hex_string;
use std::io::Write;

/// Positions closer than this are equal.
const POSITION_EPSILON: f64 = 1e-4;

/// One glyph as it goes into the content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedGlyph {
    /// Code bytes written in the string; empty for glyphs drawn elsewhere.
    pub code_bytes: Vec<u8>,
    /// Advance a reader computes from the written font.
    pub did: (f64, f64),
    /// Advance the caller asked for.
    pub wanted: (f64, f64),
    /// Origin shift applied before drawing.
    pub v_shift: (f64, f64),
}

impl PlacedGlyph {
    /// A glyph drawn with its natural advance.
    pub fn natural(code_bytes: Vec<u8>, advance: (f64, f64)) -> Self {
        Self {
            code_bytes,
            did: advance,
            wanted: advance,
            v_shift: (0.0, 0.0),
        }
    }
}

/// Item in a `TJ` array.
#[derive(Debug, Clone, PartialEq)]
pub enum TextArrayItem {
    /// String (written as hex)
    Text(Vec<u8>),
    /// Adjustment in thousandths of text space; positive moves left
    Adjustment(f64),
}

/// Text-positioning and showing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TextOp {
    /// Move to the start of the next line (Td)
    MoveText(f64, f64),
    /// Show a string (Tj)
    ShowText(Vec<u8>),
    /// Show strings with adjustments (TJ)
    ShowTextArray(Vec<TextArrayItem>),
}

fn same(a: (f64, f64), b: (f64, f64)) -> bool {
    (a.0 - b.0).abs() < POSITION_EPSILON && (a.1 - b.1).abs() < POSITION_EPSILON
}

fn add(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 + b.0, a.1 + b.1)
}

fn sub(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 - b.0, a.1 - b.1)
}

/// Lay out one run.
///
/// Horizontal runs without explicit overrides are corrected with `TJ`
/// adjustments. Runs with overrides, and vertical runs, are split into
/// sub-runs with explicit repositioning since a `TJ` adjustment would be
/// applied on top of the override. Returns the operations and the total
/// wanted advance.
pub fn layout(
    glyphs: &[PlacedGlyph],
    size: f64,
    wmode: WMode,
    has_overrides: bool,
) -> (Vec<TextOp>, (f64, f64)) {
    if wmode == WMode::Horizontal && !has_overrides && size != 0.0 {
        layout_with_adjustments(glyphs, size)
    } else {
        layout_with_moves(glyphs)
    }
}

fn layout_with_adjustments(glyphs: &[PlacedGlyph], size: f64) -> (Vec<TextOp>, (f64, f64)) {
    let mut items = Vec::new();
    let mut text = Vec::new();
    let mut pen = (0.0, 0.0);
    for g in glyphs {
        text.extend_from_slice(&g.code_bytes);
        pen = add(pen, g.wanted);
        let delta = g.did.0 - g.wanted.0;
        if delta.abs() >= POSITION_EPSILON {
            if !text.is_empty() {
                items.push(TextArrayItem::Text(std::mem::take(&mut text)));
            }
            let adjust = delta * 1000.0 / size;
            match items.last_mut() {
                Some(TextArrayItem::Adjustment(prev)) => *prev += adjust,
                _ => items.push(TextArrayItem::Adjustment(adjust)),
            }
        }
    }
    if !text.is_empty() {
        items.push(TextArrayItem::Text(text));
    }

    let ops = match items.as_slice() {
        [] => Vec::new(),
        [TextArrayItem::Text(t)] => vec![TextOp::ShowText(t.clone())],
        _ => vec![TextOp::ShowTextArray(items)],
    };
    (ops, pen)
}

fn layout_with_moves(glyphs: &[PlacedGlyph]) -> (Vec<TextOp>, (f64, f64)) {
    let mut ops = Vec::new();
    let mut text: Vec<u8> = Vec::new();
    let mut line_start = (0.0, 0.0);
    let mut pdf_pos = (0.0, 0.0);
    let mut pen = (0.0, 0.0);

    for g in glyphs {
        if !g.code_bytes.is_empty() {
            let target = add(pen, g.v_shift);
            if !same(pdf_pos, target) {
                if !text.is_empty() {
                    ops.push(TextOp::ShowText(std::mem::take(&mut text)));
                }
                let (dx, dy) = sub(target, line_start);
                ops.push(TextOp::MoveText(dx, dy));
                line_start = target;
                pdf_pos = target;
            }
            text.extend_from_slice(&g.code_bytes);
            pdf_pos = add(pdf_pos, g.did);
        }
        pen = add(pen, g.wanted);
    }
    if !text.is_empty() {
        ops.push(TextOp::ShowText(text));
    }
    if !same(pdf_pos, pen) {
        let (dx, dy) = sub(pen, line_start);
        ops.push(TextOp::MoveText(dx, dy));
    }
    (ops, pen)
}

fn write_number<W: Write>(w: &mut W, v: f64) -> std::io::Result<()> {
    let rounded = (v * 10000.0).round() / 10000.0;
    if rounded.fract() == 0.0 {
        write!(w, "{}", rounded as i64)
    } else {
        let s = format!("{:.4}", rounded);
        write!(w, "{}", s.trim_end_matches('0').trim_end_matches('.'))
    }
}

/// Serialise operations as content-stream bytes, one per line.
pub fn ops_to_bytes(ops: &[TextOp]) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    for op in ops {
        match op {
            TextOp::MoveText(tx, ty) => {
                write_number(&mut buf, *tx)?;
                write!(buf, " ")?;
                write_number(&mut buf, *ty)?;
                write!(buf, " Td")?;
            },
            TextOp::ShowText(text) => {
                write_hex_string(&mut buf, text)?;
                write!(buf, " Tj")?;
            },
            TextOp::ShowTextArray(items) => {
                write!(buf, "[")?;
                for item in items {
                    match item {
                        TextArrayItem::Text(t) => write_hex_string(&mut buf, t)?,
                        TextArrayItem::Adjustment(adj) => write_number(&mut buf, *adj)?,
                    }
                    write!(buf, " ")?;
                }
                write!(buf, "] TJ")?;
            },
        }
        writeln!(buf)?;
    }
    Ok(buf)
}
