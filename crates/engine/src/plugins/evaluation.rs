//! Formula evaluation: AST cache, dependency graph and evaluated values.
//!
//! Nothing is evaluated while commands apply. In `finalize` the plugin
//! reads the transaction's `ChangeSet`, re-registers the formulas whose
//! text or references may have changed, and recomputes the dirty closure
//! in dependency order. Cells on a cycle get `#CYCLE!` without being
//! evaluated.

use std::any::Any;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Instant;

use cellgrid_core::{CellId, Position, SheetId};
use rustc_hash::FxHashMap;

use crate::cell::CellValue;
use crate::command::Command;
use crate::dep_graph::{DepGraph, Step};
use crate::formula::cache::ParseResult;
use crate::formula::{evaluate, CellError, CellLookup, ErrorKind, FormulaCache, Reference, SheetRef, Value};
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};
use crate::recalc::RecalcReport;

#[derive(Debug, Clone)]
struct FormulaEntry {
    text: String,
    ast: ParseResult,
}

#[derive(Debug, Default)]
pub struct EvaluationPlugin {
    cache: FormulaCache,
    formulas: FxHashMap<CellId, FormulaEntry>,
    graph: DepGraph,
    values: FxHashMap<CellId, Value>,
    last_report: Option<RecalcReport>,
}

/// Reads literals from the core plugin and formula results from `values`.
struct Lookup<'v, 'g> {
    getters: Getters<'g>,
    values: &'v FxHashMap<CellId, Value>,
    cell: CellId,
}

impl CellLookup for Lookup<'_, '_> {
    fn current_sheet(&self) -> SheetId {
        self.cell.sheet
    }

    fn current_cell(&self) -> Position {
        self.cell.position()
    }

    fn resolve_sheet(&self, name: &str) -> Option<SheetId> {
        self.getters.sheet_id_by_name(name)
    }

    fn sheet_size(&self, sheet: SheetId) -> Option<(usize, usize)> {
        self.getters.sheet_size(sheet)
    }

    fn value(&self, sheet: SheetId, position: Position) -> Value {
        let cell = CellId::at(sheet, position);
        if let Some(v) = self.values.get(&cell) {
            return v.clone();
        }
        self.getters.cell_content(sheet, position).map(CellValue::literal).unwrap_or_default()
    }
}

impl EvaluationPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn forget(&mut self, cell: CellId) {
        self.formulas.remove(&cell);
        self.values.remove(&cell);
        self.graph.clear_cell(cell);
    }

    fn drop_sheet(&mut self, sheet: SheetId) {
        self.graph.remove_sheet(sheet);
        self.formulas.retain(|cell, _| cell.sheet != sheet);
        self.values.retain(|cell, _| cell.sheet != sheet);
    }

    /// Bring one cell's registration in line with the core plugin.
    fn sync(&mut self, cell: CellId, getters: &Getters<'_>) {
        let Some(text) = getters.cell_content(cell.sheet, cell.position()).and_then(CellValue::formula) else {
            self.forget(cell);
            return;
        };
        let ast = self.cache.get(text);
        let mut cells: Vec<CellId> = Vec::new();
        let mut ranges = Vec::new();
        if let Ok(expr) = &*ast {
            for reference in expr.references() {
                let sheet = match reference.sheet() {
                    SheetRef::Current => Some(cell.sheet),
                    SheetRef::Named(name) => getters.sheet_id_by_name(name),
                };
                // Unknown sheets evaluate to #REF!; re-synced when sheets change
                let Some(sheet) = sheet else { continue };
                match reference {
                    Reference::Cell { position, .. } => cells.push(CellId::at(sheet, position)),
                    Reference::Range { zone, .. } => ranges.push((sheet, zone)),
                }
            }
        }
        self.graph.replace_edges(cell, cells, ranges);
        self.formulas.insert(cell, FormulaEntry { text: text.to_string(), ast });
    }

    fn formulas_with_sheet_names(&self) -> Vec<CellId> {
        let mut out: Vec<CellId> = self
            .formulas
            .iter()
            .filter(|(_, f)| matches!(&*f.ast, Ok(expr) if expr.has_sheet_names()))
            .map(|(c, _)| *c)
            .collect();
        out.sort();
        out
    }

    fn recompute(&mut self, ctx: &mut ApplyContext<'_>) {
        let changes = ctx.changes().clone();
        let getters = ctx.getters;
        let started = Instant::now();
        let mut seeds: BTreeSet<CellId> = BTreeSet::new();

        if changes.full_recompute {
            self.formulas.clear();
            self.values.clear();
            self.graph = DepGraph::new();
            seeds.extend(getters.formula_cells().into_iter().map(|(cell, _)| cell));
        }
        for sheet in &changes.deleted_sheets {
            self.drop_sheet(*sheet);
        }
        let mut shifted: Vec<SheetId> = changes.structural.iter().map(|(s, _)| *s).collect();
        shifted.sort();
        shifted.dedup();
        for sheet in &shifted {
            self.drop_sheet(*sheet);
            seeds.extend(getters.formula_cells().into_iter().map(|(c, _)| c).filter(|c| c.sheet == *sheet));
        }
        if changes.sheets_changed || !shifted.is_empty() {
            seeds.extend(self.formulas_with_sheet_names());
        }
        seeds.extend(changes.cells.iter().copied());

        for cell in &seeds {
            self.sync(*cell, &getters);
        }

        let dirty = self.graph.dirty_closure(seeds.iter().copied());
        if dirty.is_empty() {
            return;
        }
        let report = self.evaluate_dirty(&dirty, getters, started);
        log::debug!("{}", report.log_line());
        self.last_report = Some(report);

        if self.cache.len() > 2 * self.formulas.len() + 64 {
            self.cache.prune();
        }
    }

    fn evaluate_dirty(&mut self, dirty: &BTreeSet<CellId>, getters: Getters<'_>, started: Instant) -> RecalcReport {
        let mut report = RecalcReport::new();
        let mut depth: FxHashMap<CellId, usize> = FxHashMap::default();

        for step in self.graph.schedule(dirty) {
            match step {
                Step::Evaluate(cell) => {
                    let Some(entry) = self.formulas.get(&cell) else { continue };
                    let ast = Rc::clone(&entry.ast);
                    let value = match &*ast {
                        Ok(expr) => {
                            let lookup = Lookup { getters, values: &self.values, cell };
                            match evaluate(expr, &lookup) {
                                Value::Empty => Value::Number(0.0),
                                v => v,
                            }
                        }
                        Err(message) => Value::Error(CellError::new(ErrorKind::BadExpression, message.clone())),
                    };
                    let d = 1 + self.graph.precedents(cell).iter().filter_map(|p| depth.get(p)).max().copied().unwrap_or(0);
                    depth.insert(cell, d);
                    report.max_depth = report.max_depth.max(d);
                    report.cells_recomputed += 1;
                    if let Some(kind) = value.error_kind() {
                        report.record_error(cell, kind);
                    }
                    self.values.insert(cell, value);
                }
                Step::Cycle(members) => {
                    for cell in members {
                        self.values.insert(cell, Value::Error(CellError::circular()));
                        report.record_error(cell, ErrorKind::Circular);
                        report.cycle_cells.push(cell);
                    }
                }
            }
        }
        report.finish(started);
        report
    }
}

impl Plugin for EvaluationPlugin {
    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        if let Command::EvaluateAll = cmd {
            ctx.changes_mut().full_recompute = true;
        }
    }

    fn finalize(&mut self, ctx: &mut ApplyContext<'_>) {
        if !ctx.changes().is_empty() {
            self.recompute(ctx);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> Getters<'a> {
    fn evaluation(&self) -> Option<&'a EvaluationPlugin> {
        self.plugin::<EvaluationPlugin>()
    }

    /// Evaluated value: formula result, or the literal content.
    pub fn evaluated_value(&self, sheet: SheetId, position: Position) -> Value {
        let cell = CellId::at(sheet, position);
        if let Some(v) = self.evaluation().and_then(|e| e.values.get(&cell)) {
            return v.clone();
        }
        match self.cell_content(sheet, position) {
            Some(CellValue::Formula(_)) => Value::Empty,
            Some(content) => content.literal(),
            None => Value::Empty,
        }
    }

    /// Report of the latest recompute pass.
    pub fn recalc_report(&self) -> Option<&'a RecalcReport> {
        self.evaluation().and_then(|e| e.last_report.as_ref())
    }

    /// Formulas that read `cell` directly or through a range.
    pub fn dependents(&self, cell: CellId) -> Vec<CellId> {
        self.evaluation().map(|e| e.graph.direct_dependents(cell)).unwrap_or_default()
    }

    /// Cells a formula reads directly (ranges not expanded).
    pub fn precedents(&self, cell: CellId) -> Vec<CellId> {
        self.evaluation().map(|e| e.graph.precedents(cell)).unwrap_or_default()
    }

    /// `(hits, misses)` of the formula cache.
    pub fn formula_cache_stats(&self) -> (u64, u64) {
        self.evaluation().map_or((0, 0), |e| e.cache.stats())
    }

    /// Registered formula text of a cell, as the evaluator sees it.
    pub fn registered_formula(&self, cell: CellId) -> Option<&'a str> {
        self.evaluation().and_then(|e| e.formulas.get(&cell)).map(|f| f.text.as_str())
    }
}
