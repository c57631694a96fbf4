//! Per-run state shared by every matrix build and cluster allocation.

use crate::types::IntegerWidth;
use crate::utils::progress_bar_builder::ProgressBarBuilder;
use indicatif::ProgressBar;
use log::{debug, warn};
use std::collections::HashSet;

// Matrices smaller than this finish too fast for a progress bar to be useful.
const PROGRESS_MIN_ROWS: usize = 500;

/// Owns the run's sequence-id counter and saturation bookkeeping. One context
/// lives for a whole pipeline invocation and is threaded through the
/// recursive subclustering, so ids stay unique across every level.
#[derive(Debug)]
pub struct RunContext {
    width: IntegerWidth,
    next_sequence_id: u32,
    saturation_warned: HashSet<IntegerWidth>,
    saturated_cells: u64,
    saturation_warnings: u32,
    show_progress: bool,
}

impl RunContext {
    pub fn new(width: IntegerWidth) -> Self {
        Self {
            width,
            next_sequence_id: 0,
            saturation_warned: HashSet::new(),
            saturated_cells: 0,
            saturation_warnings: 0,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn width(&self) -> IntegerWidth {
        self.width
    }

    pub fn allocate_sequence_id(&mut self) -> u32 {
        let id = self.next_sequence_id;
        self.next_sequence_id += 1;
        id
    }

    /// Number of sequence ids handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next_sequence_id
    }

    /// Records that `raw` was clamped to the width maximum.
    pub(crate) fn note_saturation(&mut self, raw: u64) {
        self.saturated_cells += 1;
        if self.width.is_smallest() {
            return;
        }
        if self.saturation_warned.insert(self.width) {
            self.saturation_warnings += 1;
            warn!(
                "Distance {} exceeds {} capacity; saturating at {} (further occurrences are not reported)",
                raw,
                self.width.name(),
                self.width.max_value()
            );
        } else {
            debug!("Saturated distance {} at {}", raw, self.width.max_value());
        }
    }

    pub fn saturated_cells(&self) -> u64 {
        self.saturated_cells
    }

    /// Saturation warnings emitted so far; at most one per width.
    pub fn saturation_warnings(&self) -> u32 {
        self.saturation_warnings
    }

    pub(crate) fn row_progress(&self, rows: usize, message: impl Into<String>) -> ProgressBar {
        ProgressBarBuilder::new(message)
            .with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .with_length(rows as u64)
            .hidden(!self.show_progress || rows < PROGRESS_MIN_ROWS)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_ids_start_at_zero() {
        let mut ctx = RunContext::new(IntegerWidth::U8);
        assert_eq!(ctx.allocate_sequence_id(), 0);
        assert_eq!(ctx.allocate_sequence_id(), 1);
        assert_eq!(ctx.allocated(), 2);
    }

    #[test]
    fn smallest_width_saturates_silently() {
        let mut ctx = RunContext::new(IntegerWidth::U8);
        ctx.note_saturation(300);
        ctx.note_saturation(1_000);
        assert_eq!(ctx.saturated_cells(), 2);
        assert_eq!(ctx.saturation_warnings(), 0);
    }

    #[test]
    fn wider_widths_warn_once() {
        for width in [IntegerWidth::U16, IntegerWidth::U32] {
            let mut ctx = RunContext::new(width);
            let raw = width.max_value() as u64 + 1;
            ctx.note_saturation(raw);
            ctx.note_saturation(raw + 10);
            ctx.note_saturation(raw + 20);
            assert_eq!(ctx.saturated_cells(), 3);
            assert_eq!(ctx.saturation_warnings(), 1, "{}", width.name());
        }
    }
}
