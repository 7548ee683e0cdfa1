//! Per-`(x,z)` scratch buffer a world generator fills, one chunk column at a
//! time, producing the equi-level bitmap as a byproduct of the fill.
//!
//! A single `Column` is reused across every `(x,z)` in a chunk: the first
//! column filled becomes the reference that subsequent columns are diffed
//! against, so `clear()` resets the run cursor and decorations but keeps the
//! reference snapshot alive for the rest of the chunk fill.

use crate::block::BlockId;

/// One contiguous vertical run `[start_y, top_y)` of a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    block: BlockId,
    top_y: u16,
}

/// A single-cell overwrite applied after the run list is laid down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Decoration {
    block: BlockId,
    y: u16,
}

/// World height in voxels; columns above this are clamped away.
pub const WORLD_HEIGHT: u16 = 256;

pub struct Column {
    runs: Vec<Run>,
    decorations: Vec<Decoration>,
    /// Snapshot of the first column filled in the current chunk, used as the
    /// equi-level comparison baseline. `None` until the first `fill_chunk`.
    reference: Option<(Vec<Run>, Vec<Decoration>)>,
    /// Per-y mismatch delta against the reference, accumulated across every
    /// column filled since the last `fill_equilevels`.
    mismatch: Vec<i32>,
}

impl Default for Column {
    fn default() -> Self {
        Self::new()
    }
}

impl Column {
    #[must_use]
    pub fn new() -> Self {
        Self {
            runs: Vec::new(),
            decorations: Vec::new(),
            reference: None,
            mismatch: vec![0; WORLD_HEIGHT as usize],
        }
    }

    /// Append a run `[last_top_y, top_y)` of `block`. Clamped to
    /// `WORLD_HEIGHT`; dropped entirely if it wouldn't advance the stack.
    pub fn push(&mut self, block: BlockId, top_y: u16) {
        let top_y = top_y.min(WORLD_HEIGHT);
        let last = self.runs.last().map_or(0, |r| r.top_y);
        if top_y <= last {
            return;
        }
        self.runs.push(Run { block, top_y });
    }

    /// Record a point decoration at `y`, applied after all runs.
    pub fn overwrite(&mut self, block: BlockId, y: u16) {
        if y >= WORLD_HEIGHT {
            return;
        }
        self.decorations.push(Decoration { block, y });
    }

    /// Reset the run cursor and decorations for the next column. The
    /// equi-level reference snapshot, if any, survives this call.
    pub fn clear(&mut self) {
        self.runs.clear();
        self.decorations.clear();
    }

    /// Write this column's runs and decorations into `chunk.voxels[x,*,z]`
    /// and fold its mismatch contribution into the running equi-level
    /// counters. `first` marks the first column of a chunk fill, which seeds
    /// the reference snapshot instead of diffing against one.
    pub fn fill_chunk(&mut self, x: usize, z: usize, chunk: &mut dyn ColumnSink, first: bool) {
        self.seal();

        let mut y = 0u16;
        for run in &self.runs {
            for yy in y..run.top_y {
                chunk.set_voxel(x, yy as usize, z, run.block);
            }
            y = run.top_y;
        }
        for dec in &self.decorations {
            chunk.set_voxel(x, dec.y as usize, z, dec.block);
        }

        if first {
            self.reference = Some((self.runs.clone(), self.decorations.clone()));
        } else if let Some((ref_runs, ref_decs)) = self.reference.clone() {
            self.accumulate_mismatch(&ref_runs, &ref_decs);
        }
    }

    /// Extend the run list with an empty-block run up to `WORLD_HEIGHT` if
    /// the caller didn't already fill the whole column.
    fn seal(&mut self) {
        let last = self.runs.last().map_or(0, |r| r.top_y);
        if last < WORLD_HEIGHT {
            self.runs.push(Run { block: crate::block::AIR, top_y: WORLD_HEIGHT });
        }
    }

    /// Walk this column's runs in lockstep with the reference's, emitting a
    /// `+1`/`-1` delta at every y where the two start agreeing or
    /// disagreeing, then fold in each decoration's `+1`/`-1` pair.
    fn accumulate_mismatch(&mut self, ref_runs: &[Run], ref_decs: &[Decoration]) {
        let mut matched = true;
        let mut d_idx = 0usize;
        let mut r_idx = 0usize;
        let mut d_start = 0u16;
        let mut r_start = 0u16;

        while d_idx < self.runs.len() && r_idx < ref_runs.len() {
            let d_run = self.runs[d_idx];
            let r_run = ref_runs[r_idx];
            let now_matched = d_run.block == r_run.block;
            let level = d_start.max(r_start);

            if now_matched != matched {
                self.bump(level, if matched { 1 } else { -1 });
                matched = now_matched;
            }

            if d_run.top_y <= r_run.top_y {
                d_start = d_run.top_y;
                d_idx += 1;
            }
            if r_run.top_y <= d_run.top_y {
                r_start = r_run.top_y;
                r_idx += 1;
            }
        }

        for dec in &self.decorations {
            self.bump(dec.y, 1);
            if dec.y + 1 < WORLD_HEIGHT {
                self.bump(dec.y + 1, -1);
            }
        }
        for dec in ref_decs {
            self.bump(dec.y, 1);
            if dec.y + 1 < WORLD_HEIGHT {
                self.bump(dec.y + 1, -1);
            }
        }
    }

    fn bump(&mut self, y: u16, delta: i32) {
        if (y as usize) < self.mismatch.len() {
            self.mismatch[y as usize] += delta;
        }
    }

    /// Topmost `y+1` among this column's current runs/decorations whose
    /// block matches `pred`, or `0` if none do. A read-only query against
    /// whatever's been `push`ed/`overwrite`n since the last `clear()` —
    /// unlike `fill_chunk`, it never touches the reference snapshot or the
    /// mismatch counters, so it's safe to call on a column that's only ever
    /// sampled, never written into a chunk (the frontier strip sampler).
    #[must_use]
    pub fn tallest(&self, pred: impl Fn(BlockId) -> bool) -> u16 {
        let mut top = 0u16;
        for run in &self.runs {
            if pred(run.block) {
                top = run.top_y;
            }
        }
        for dec in &self.decorations {
            if pred(dec.block) {
                top = top.max(dec.y + 1);
            }
        }
        top
    }

    /// Integrate the accumulated per-y deltas into an equi-level bitmap:
    /// `out[y] = true` iff the running sum through `y` is zero.
    pub fn fill_equilevels(&mut self, out: &mut [bool]) {
        let mut running = 0i32;
        for y in 0..out.len().min(self.mismatch.len()) {
            running += self.mismatch[y];
            out[y] = running == 0;
        }
        self.mismatch.fill(0);
    }
}

/// The subset of `Chunk` that `Column::fill_chunk` needs to write into,
/// kept as a trait so this module doesn't depend on the chunk layout.
pub trait ColumnSink {
    fn set_voxel(&mut self, x: usize, y: usize, z: usize, block: BlockId);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::AIR;

    struct VecSink(Vec<BlockId>);
    impl VecSink {
        fn new() -> Self {
            Self(vec![AIR; WORLD_HEIGHT as usize])
        }
    }
    impl ColumnSink for VecSink {
        fn set_voxel(&mut self, _x: usize, y: usize, _z: usize, block: BlockId) {
            self.0[y] = block;
        }
    }

    #[test]
    fn push_drops_non_increasing_runs() {
        let mut col = Column::new();
        col.push(1, 10);
        col.push(2, 5);
        assert_eq!(col.runs.len(), 1);
        assert_eq!(col.runs[0].top_y, 10);
    }

    #[test]
    fn push_clamps_to_world_height() {
        let mut col = Column::new();
        col.push(1, 1000);
        assert_eq!(col.runs[0].top_y, WORLD_HEIGHT);
    }

    #[test]
    fn identical_columns_are_fully_equilevel() {
        let mut col = Column::new();
        let mut sink = VecSink::new();

        col.push(7, 1);
        col.fill_chunk(0, 0, &mut sink, true);
        col.clear();

        col.push(7, 1);
        col.fill_chunk(1, 0, &mut sink, false);

        let mut out = vec![false; WORLD_HEIGHT as usize];
        col.fill_equilevels(&mut out);
        assert!(out.iter().all(|&b| b));
    }

    #[test]
    fn differing_run_breaks_equilevel_at_that_height() {
        let mut col = Column::new();
        let mut sink = VecSink::new();

        col.push(7, 1);
        col.fill_chunk(0, 0, &mut sink, true);
        col.clear();

        col.push(9, 1);
        col.fill_chunk(1, 0, &mut sink, false);

        let mut out = vec![false; WORLD_HEIGHT as usize];
        col.fill_equilevels(&mut out);
        assert!(!out[0]);
    }

    #[test]
    fn decoration_breaks_equilevel_only_at_its_row() {
        let mut col = Column::new();
        let mut sink = VecSink::new();

        col.push(7, 5);
        col.fill_chunk(0, 0, &mut sink, true);
        col.clear();

        col.push(7, 5);
        col.overwrite(9, 2);
        col.fill_chunk(1, 0, &mut sink, false);

        let mut out = vec![false; WORLD_HEIGHT as usize];
        col.fill_equilevels(&mut out);
        assert!(out[0]);
        assert!(!out[2]);
        assert!(out[3]);
    }

    #[test]
    fn tallest_finds_topmost_matching_run_or_decoration() {
        let mut col = Column::new();
        col.push(7, 5);
        col.push(9, 8);
        col.overwrite(7, 9);
        assert_eq!(col.tallest(|b| b == 7), 10);
        assert_eq!(col.tallest(|b| b == 9), 8);
        assert_eq!(col.tallest(|b| b == 3), 0);
    }

    #[test]
    fn seal_fills_remaining_height_with_air() {
        let mut col = Column::new();
        let mut sink = VecSink::new();
        col.push(3, 2);
        col.fill_chunk(0, 0, &mut sink, true);
        assert_eq!(sink.0[2], AIR);
        assert_eq!(sink.0[WORLD_HEIGHT as usize - 1], AIR);
    }
}
