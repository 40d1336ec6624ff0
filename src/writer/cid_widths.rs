//! Width and glyph-map tables of CIDFont resources.
//!
//! The arrays are indexed by CID and sized to the font's CIDCount. They only
//! ever grow: a CID beyond the claimed count (malformed fonts) extends them.

use crate::error::{try_filled, try_grow, Result};
use crate::object::Object;
use byteorder::{BigEndian, WriteBytesExt};

/// Distinct width values tracked by the default-width histogram.
const DW_BUCKETS: usize = 16;

/// `/DW` when no glyph is used.
pub const DEFAULT_DW: f64 = 1000.0;

/// `/DW2` default: vertical origin y and advance.
pub const DEFAULT_DW2: (f64, f64) = (880.0, -1000.0);

/// Per-CID metrics of a CIDFont resource, in 1000-unit text space.
#[derive(Debug, Clone)]
pub struct CidMetrics {
    used: Vec<u8>,
    widths: Vec<f64>,
    widths1: Vec<f64>,
    v: Vec<(f64, f64)>,
    cid_to_gid: Vec<u32>,
    identity: bool,
}

impl CidMetrics {
    /// Tables for `cid_count` CIDs.
    pub fn new(cid_count: usize) -> Result<Self> {
        let mut cid_to_gid = try_filled(cid_count, 0u32)?;
        for (cid, gid) in cid_to_gid.iter_mut().enumerate() {
            *gid = cid as u32;
        }
        Ok(Self {
            used: try_filled(cid_count.div_ceil(8), 0u8)?,
            widths: try_filled(cid_count, 0.0)?,
            widths1: try_filled(cid_count, 0.0)?,
            v: try_filled(cid_count, (0.0, 0.0))?,
            cid_to_gid,
            identity: true,
        })
    }

    /// Number of CIDs the tables cover.
    pub fn len(&self) -> usize {
        self.widths.len()
    }

    /// True if the tables cover no CID.
    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    /// Grow every table so that `cid` is addressable.
    pub fn ensure(&mut self, cid: u32) -> Result<()> {
        let len = cid as usize + 1;
        let old = self.cid_to_gid.len();
        if len <= old {
            return Ok(());
        }
        log::debug!("CID {} beyond claimed count {}, growing tables", cid, old);
        try_grow(&mut self.used, len.div_ceil(8), 0)?;
        try_grow(&mut self.widths, len, 0.0)?;
        try_grow(&mut self.widths1, len, 0.0)?;
        try_grow(&mut self.v, len, (0.0, 0.0))?;
        try_grow(&mut self.cid_to_gid, len, 0)?;
        for (cid, gid) in self.cid_to_gid.iter_mut().enumerate().skip(old) {
            *gid = cid as u32;
        }
        Ok(())
    }

    /// Record a used CID. Metrics of an already used CID are kept.
    pub fn set_glyph(&mut self, cid: u32, gid: u32, width: f64, width1: f64, v: (f64, f64)) -> Result<()> {
        self.ensure(cid)?;
        if self.is_used(cid) {
            return Ok(());
        }
        let i = cid as usize;
        self.used[i / 8] |= 0x80 >> (cid & 7);
        self.widths[i] = width;
        self.widths1[i] = width1;
        self.v[i] = v;
        self.cid_to_gid[i] = gid;
        if gid != cid {
            self.identity = false;
        }
        Ok(())
    }

    /// True if `cid` has been used.
    pub fn is_used(&self, cid: u32) -> bool {
        self.used
            .get((cid / 8) as usize)
            .is_some_and(|b| b & (0x80 >> (cid & 7)) != 0)
    }

    /// Used CIDs in increasing order.
    pub fn used_cids(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.widths.len() as u32).filter(|&c| self.is_used(c))
    }

    /// Horizontal advance of a used CID.
    pub fn width(&self, cid: u32) -> Option<f64> {
        self.is_used(cid).then(|| self.widths[cid as usize])
    }

    /// Vertical advance and origin of a used CID.
    pub fn vertical(&self, cid: u32) -> Option<(f64, (f64, f64))> {
        self.is_used(cid)
            .then(|| (self.widths1[cid as usize], self.v[cid as usize]))
    }

    /// Default width: the most frequent used width, signed by the majority.
    pub fn default_width(&self) -> f64 {
        choose_default(self.used_cids().map(|c| self.widths[c as usize])).unwrap_or(DEFAULT_DW)
    }

    /// `/W` array entries for used CIDs whose width differs from `dw`.
    ///
    /// Consecutive CIDs share one `c [w1 w2 ...]` group.
    pub fn w_array(&self, dw: f64) -> Vec<Object> {
        let mut out = Vec::new();
        let mut run: Vec<Object> = Vec::new();
        let mut run_start = 0u32;
        let mut next = None;
        for cid in self.used_cids() {
            let w = self.widths[cid as usize];
            if same(w, dw) {
                continue;
            }
            if next != Some(cid) {
                flush_run(&mut out, run_start, &mut run);
                run_start = cid;
            }
            run.push(Object::number(w));
            next = Some(cid + 1);
        }
        flush_run(&mut out, run_start, &mut run);
        out
    }

    /// `/DW2` for vertical fonts.
    pub fn default_width2(&self) -> (f64, f64) {
        let w1 = choose_default(self.used_cids().map(|c| self.widths1[c as usize]))
            .unwrap_or(DEFAULT_DW2.1);
        (DEFAULT_DW2.0, w1)
    }

    /// `/W2` entries for used CIDs whose vertical metrics differ from the
    /// default `(vy, w1)` with `vx` at half the horizontal width.
    pub fn w2_array(&self, dw2: (f64, f64)) -> Vec<Object> {
        let mut out = Vec::new();
        let mut run: Vec<Object> = Vec::new();
        let mut run_start = 0u32;
        let mut next = None;
        for cid in self.used_cids() {
            let i = cid as usize;
            let (w1, (vx, vy)) = (self.widths1[i], self.v[i]);
            if same(w1, dw2.1) && same(vy, dw2.0) && same(vx, self.widths[i] / 2.0) {
                continue;
            }
            if next != Some(cid) {
                flush_run(&mut out, run_start, &mut run);
                run_start = cid;
            }
            run.extend([Object::number(w1), Object::number(vx), Object::number(vy)]);
            next = Some(cid + 1);
        }
        flush_run(&mut out, run_start, &mut run);
        out
    }

    /// True while every used CID maps to the same GID.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Binary CIDToGIDMap (2 bytes per CID, big-endian), or `None` for
    /// `/Identity`.
    pub fn cid_to_gid_map(&self) -> Result<Option<Vec<u8>>> {
        if self.identity {
            return Ok(None);
        }
        let mut out = Vec::new();
        out.try_reserve_exact(self.cid_to_gid.len() * 2)?;
        for (cid, &gid) in self.cid_to_gid.iter().enumerate() {
            let gid = if self.is_used(cid as u32) { gid } else { 0 };
            out.write_u16::<BigEndian>(gid.min(u16::MAX as u32) as u16)?;
        }
        Ok(Some(out))
    }
}

fn same(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn flush_run(out: &mut Vec<Object>, start: u32, run: &mut Vec<Object>) {
    if !run.is_empty() {
        out.push(Object::Integer(start as i64));
        out.push(Object::Array(std::mem::take(run)));
    }
}

/// Most frequent rounded magnitude among `widths`, with the majority sign.
///
/// Each bucket keeps the first width that landed in it, and that width is
/// returned so it compares equal to the entries [`CidMetrics::w_array`] skips.
/// At most [`DW_BUCKETS`] distinct values are counted; later values land in
/// an overflow bucket that never wins. The first value seen wins ties.
pub fn choose_default(widths: impl IntoIterator<Item = f64>) -> Option<f64> {
    // (rounded magnitude, first magnitude seen, count)
    let mut buckets: Vec<(f64, f64, usize)> = Vec::with_capacity(DW_BUCKETS);
    let mut overflow = 0usize;
    let mut positive = 0usize;
    let mut negative = 0usize;
    for w in widths {
        if w < 0.0 {
            negative += 1;
        } else {
            positive += 1;
        }
        let magnitude = w.abs().round();
        if let Some(i) = buckets.iter().position(|(v, _, _)| *v == magnitude) {
            buckets[i].2 += 1;
        } else if buckets.len() < DW_BUCKETS {
            buckets.push((magnitude, w.abs(), 1));
        } else {
            overflow += 1;
        }
    }
    if overflow > 0 {
        log::trace!("{} widths beyond the default-width histogram", overflow);
    }
    let mut best: Option<(f64, usize)> = None;
    for &(_, first, count) in &buckets {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((first, count));
        }
    }
    best.map(|(value, _)| if negative > positive { -value } else { value })
}
