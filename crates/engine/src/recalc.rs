//! Recalculation reporting.
//!
//! The evaluation plugin fills one `RecalcReport` per transaction that
//! touched formulas. It is exposed through getters and logged at debug.

use std::time::Instant;

use cellgrid_core::CellId;

use crate::formula::ErrorKind;

/// Maximum number of per-cell errors kept in a report.
const MAX_REPORTED_ERRORS: usize = 100;

/// Report from one recompute pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecalcReport {
    /// Time taken in microseconds.
    pub duration_us: u64,

    /// Number of formula cells that were evaluated.
    pub cells_recomputed: usize,

    /// Maximum dependency depth encountered among recomputed cells.
    /// A formula with no formula precedents has depth 1.
    pub max_depth: usize,

    /// True if cycles were detected. Cycle cells carry #CYCLE!.
    pub had_cycles: bool,

    /// Cells participating in cycles, sorted.
    pub cycle_cells: Vec<CellId>,

    /// Evaluated cells whose result is an error (truncated to first 100).
    pub errors: Vec<RecalcError>,
}

impl RecalcReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_error(&mut self, cell: CellId, kind: ErrorKind) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(RecalcError { cell, kind });
        }
    }

    pub(crate) fn finish(&mut self, started: Instant) {
        self.duration_us = started.elapsed().as_micros() as u64;
        self.cycle_cells.sort();
        self.had_cycles = !self.cycle_cells.is_empty();
    }

    /// Format as a concise one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} cells, depth={}, cycles={}, errors={}",
            self.cells_recomputed,
            self.max_depth,
            self.cycle_cells.len(),
            self.errors.len()
        )
    }

    /// Format as a one-line log entry.
    ///
    /// Format: `[recalc]  120us  14 cells  depth=3  cycles=0  errors=0`
    pub fn log_line(&self) -> String {
        format!(
            "[recalc] {:>5}us  {} cells  depth={}  cycles={}  errors={}",
            self.duration_us,
            self.cells_recomputed,
            self.max_depth,
            self.cycle_cells.len(),
            self.errors.len()
        )
    }
}

/// A formula that evaluated to an error during recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalcError {
    pub cell: CellId,
    pub kind: ErrorKind,
}
