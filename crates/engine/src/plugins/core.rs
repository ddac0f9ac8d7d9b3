//! Raw cell content.
//!
//! User input is interpreted here with the active locale. Formula text is
//! stored as typed; references are rewritten when rows or columns move and
//! when a referenced sheet is renamed.

use std::any::Any;
use std::collections::BTreeMap;

use cellgrid_core::{AxisChange, CellId, Position, SheetId, Zone};
use rustc_hash::FxHashMap;

use crate::cell::{parse_user_input, CellValue, FormatPatch, NumberFormat};
use crate::command::Command;
use crate::effects::Notification;
use crate::formula::parser::{format_formula, parse, Expr, SheetRef};
use crate::formula::refs::{rename_sheet_references, shift_for_axis_change};
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

type SheetCells = BTreeMap<Position, CellValue>;

#[derive(Debug, Clone, Default)]
pub struct CorePlugin {
    cells: FxHashMap<SheetId, SheetCells>,
}

impl CorePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, sheet: SheetId, position: Position) -> Option<&CellValue> {
        self.cells.get(&sheet).and_then(|cells| cells.get(&position))
    }

    /// Set content, recording the inverse. No-op when unchanged.
    fn set(&mut self, sheet: SheetId, position: Position, content: Option<CellValue>, ctx: &mut ApplyContext<'_>) {
        let old = self.get(sheet, position).cloned();
        if old == content {
            return;
        }
        ctx.record_inverse(Command::set_content(sheet, position, old));
        let cells = self.cells.entry(sheet).or_default();
        match content {
            Some(value) => cells.insert(position, value),
            None => cells.remove(&position),
        };
        ctx.mark_changed(CellId::at(sheet, position));
    }

    fn positions_in(&self, sheet: SheetId, zones: &[Zone]) -> Vec<Position> {
        let Some(cells) = self.cells.get(&sheet) else { return Vec::new() };
        let mut out: Vec<Position> = zones
            .iter()
            .flat_map(|z| {
                cells
                    .range(Position::new(z.top, 0)..=Position::new(z.bottom, usize::MAX))
                    .map(|(p, _)| *p)
                    .filter(move |p| z.contains(*p))
            })
            .collect();
        out.sort();
        out.dedup();
        out
    }

    fn update_cell(&mut self, sheet: SheetId, position: Position, content: &str, ctx: &mut ApplyContext<'_>) {
        let getters = ctx.getters;
        let format = getters.number_format(sheet, position);
        let parsed = parse_user_input(content, getters.locale(), format == NumberFormat::Text);

        if let Some(source) = parsed.as_ref().and_then(|p| p.value.formula()) {
            if let Err(message) = parse(source) {
                ctx.notify(Notification::error(
                    format!("Invalid formula in {}: {}", position, message),
                    getters.sticky_errors(),
                ));
            }
        }
        if let Some(implied) = parsed.as_ref().and_then(|p| p.implied_format) {
            if format == NumberFormat::General {
                ctx.queue(Command::SetFormatting {
                    sheet_id: sheet,
                    zones: vec![Zone::single(position)],
                    format: FormatPatch::number_format(implied),
                });
            }
        }
        self.set(sheet, position, parsed.map(|p| p.value), ctx);
    }

    fn trim_whitespace(&mut self, sheet: SheetId, zones: &[Zone], ctx: &mut ApplyContext<'_>) {
        let locale = ctx.getters.locale();
        let mut trimmed = 0;
        for position in self.positions_in(sheet, zones) {
            let Some(CellValue::Text(text)) = self.get(sheet, position) else { continue };
            let clean = text.trim();
            if clean.len() == text.len() {
                continue;
            }
            let value = parse_user_input(clean, locale, false).map(|p| p.value);
            self.set(sheet, position, value, ctx);
            trimmed += 1;
        }
        let text = if trimmed == 0 {
            "No selected cells had whitespace trimmed.".to_string()
        } else {
            format!("Trimmed whitespace from {} cells.", trimmed)
        };
        ctx.notify(Notification::info(text));
    }

    /// Rewrite every formula for which `rewrite` returns a different tree.
    /// Cells for which `skip` holds are left alone.
    fn rewrite_formulas(
        &mut self,
        ctx: &mut ApplyContext<'_>,
        skip: impl Fn(CellId) -> bool,
        rewrite: impl Fn(SheetId, &Expr) -> Expr,
    ) {
        let mut updates: Vec<(CellId, String)> = Vec::new();
        let mut sheets: Vec<&SheetId> = self.cells.keys().collect();
        sheets.sort();
        for sheet in sheets {
            for (position, value) in &self.cells[sheet] {
                let cell = CellId::at(*sheet, *position);
                let Some(source) = value.formula() else { continue };
                if skip(cell) {
                    continue;
                }
                let Ok(expr) = parse(source) else { continue };
                let new = rewrite(*sheet, &expr);
                if new != expr {
                    updates.push((cell, format_formula(&new)));
                }
            }
        }
        for (cell, text) in updates {
            self.set(cell.sheet, cell.position(), Some(CellValue::Formula(text)), ctx);
        }
    }

    fn apply_axis_change(&mut self, sheet: SheetId, change: AxisChange, ctx: &mut ApplyContext<'_>) {
        let name = ctx.getters.sheet_name(sheet).unwrap_or_default().to_string();
        self.rewrite_formulas(
            ctx,
            |cell| cell.sheet == sheet && change.map_position(cell.position()).is_none(),
            |formula_sheet, expr| {
                let targets = |r: &SheetRef| match r {
                    SheetRef::Current => formula_sheet == sheet,
                    SheetRef::Named(n) => n.eq_ignore_ascii_case(&name),
                };
                shift_for_axis_change(expr, &change, &targets)
            },
        );

        let Some(cells) = self.cells.remove(&sheet) else { return };
        let mut moved = SheetCells::new();
        for (position, value) in cells {
            match change.map_position(position) {
                Some(to) => {
                    moved.insert(to, value);
                }
                None => ctx.record_inverse(Command::set_content(sheet, position, Some(value))),
            }
        }
        self.cells.insert(sheet, moved);
    }

    fn rename_references(&mut self, sheet: SheetId, new: &str, ctx: &mut ApplyContext<'_>) {
        let Some(old) = ctx.changes().previous_name(sheet).map(str::to_string) else { return };
        self.rewrite_formulas(ctx, |_| false, |_, expr| rename_sheet_references(expr, &old, new));
    }
}

impl Plugin for CorePlugin {
    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        match cmd {
            Command::CreateSheet { sheet_id, .. } => {
                self.cells.entry(*sheet_id).or_default();
            }
            Command::DeleteSheet { sheet_id } => {
                if let Some(cells) = self.cells.remove(sheet_id) {
                    for (position, value) in cells {
                        ctx.record_inverse(Command::set_content(*sheet_id, position, Some(value)));
                    }
                }
            }
            Command::RenameSheet { sheet_id, name } => self.rename_references(*sheet_id, name, ctx),
            Command::InsertRows { .. }
            | Command::DeleteRows { .. }
            | Command::InsertCols { .. }
            | Command::DeleteCols { .. } => {
                if let Some((sheet, change)) = cmd.axis_change() {
                    self.apply_axis_change(sheet, change, ctx);
                }
            }
            Command::UpdateCell { sheet_id, position, content } => {
                self.update_cell(*sheet_id, *position, content, ctx);
            }
            Command::SetCellContent { sheet_id, position, content } => {
                self.set(*sheet_id, *position, content.clone(), ctx);
            }
            Command::DeleteContent { sheet_id, zones } => {
                for position in self.positions_in(*sheet_id, zones) {
                    self.set(*sheet_id, position, None, ctx);
                }
            }
            Command::TrimWhitespace { sheet_id, zones } => self.trim_whitespace(*sheet_id, zones, ctx),
            _ => {}
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> Getters<'a> {
    fn core(&self) -> Option<&'a CorePlugin> {
        self.plugin::<CorePlugin>()
    }

    /// Raw content of a cell. `None` for empty cells.
    pub fn cell_content(&self, sheet: SheetId, position: Position) -> Option<&'a CellValue> {
        self.core().and_then(|c| c.get(sheet, position))
    }

    /// Text shown in an editor for a cell: formula source or canonical literal.
    pub fn cell_text(&self, sheet: SheetId, position: Position) -> String {
        self.cell_content(sheet, position).map(CellValue::raw_display).unwrap_or_default()
    }

    /// Non-empty cells of a sheet in row-major order.
    pub fn cells(&self, sheet: SheetId) -> Vec<(Position, &'a CellValue)> {
        self.core()
            .and_then(|c| c.cells.get(&sheet))
            .map(|cells| cells.iter().map(|(p, v)| (*p, v)).collect())
            .unwrap_or_default()
    }

    /// Non-empty cells inside `zone`, row-major.
    pub fn cells_in_zone(&self, sheet: SheetId, zone: Zone) -> Vec<(Position, &'a CellValue)> {
        let Some(cells) = self.core().and_then(|c| c.cells.get(&sheet)) else { return Vec::new() };
        cells
            .range(Position::new(zone.top, 0)..=Position::new(zone.bottom, usize::MAX))
            .filter(|(p, _)| zone.contains(**p))
            .map(|(p, v)| (*p, v))
            .collect()
    }

    pub fn cell_count(&self, sheet: SheetId) -> usize {
        self.core().and_then(|c| c.cells.get(&sheet)).map_or(0, BTreeMap::len)
    }

    /// Every formula cell of every sheet, sorted by `CellId`.
    pub fn formula_cells(&self) -> Vec<(CellId, &'a str)> {
        let Some(core) = self.core() else { return Vec::new() };
        let mut out: Vec<(CellId, &'a str)> = core
            .cells
            .iter()
            .flat_map(|(sheet, cells)| {
                cells.iter().filter_map(move |(p, v)| v.formula().map(|f| (CellId::at(*sheet, *p), f)))
            })
            .collect();
        out.sort_by_key(|(cell, _)| *cell);
        out
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use cellgrid_config::Locale;

    use super::*;
    use crate::effects::EffectCollector;
    use crate::plugins::test_util::*;

    fn content(m: &crate::model::Model, a1: &str) -> Option<CellValue> {
        m.getters().cell_content(S1, pos(a1)).cloned()
    }

    #[test]
    fn test_update_cell_parses_input() {
        let mut m = model();
        set(&mut m, "A1", "10").unwrap();
        set(&mut m, "A2", "=A1+1").unwrap();
        set(&mut m, "A3", "true").unwrap();
        set(&mut m, "A4", "hello").unwrap();
        assert_eq!(content(&m, "A1"), Some(CellValue::Number(10.0)));
        assert_eq!(content(&m, "A2"), Some(CellValue::Formula("=A1+1".into())));
        assert_eq!(content(&m, "A3"), Some(CellValue::Boolean(true)));
        assert_eq!(content(&m, "A4"), Some(CellValue::Text("hello".into())));
        set(&mut m, "A4", "").unwrap();
        assert_eq!(content(&m, "A4"), None);
    }

    #[test]
    fn test_locale_number_input() {
        let mut m = model();
        m.dispatch(Command::UpdateLocale { locale: Locale::fr_fr() }).unwrap();
        set(&mut m, "A1", "1 234,5").unwrap();
        assert_eq!(content(&m, "A1"), Some(CellValue::Number(1234.5)));
    }

    #[test]
    fn test_date_input_queues_date_format() {
        let mut m = model();
        set(&mut m, "A1", "03/15/2024").unwrap();
        assert_eq!(content(&m, "A1"), Some(CellValue::Number(45366.0)));
        assert_eq!(m.getters().number_format(S1, pos("A1")), NumberFormat::Date);
        // One history entry for the value and its format
        m.undo().unwrap();
        assert_eq!(content(&m, "A1"), None);
        assert_eq!(m.getters().number_format(S1, pos("A1")), NumberFormat::General);
    }

    #[test]
    fn test_text_format_stores_verbatim() {
        let mut m = model();
        m.dispatch(Command::SetFormatting {
            sheet_id: S1,
            zones: vec![zone("A1")],
            format: FormatPatch::number_format(NumberFormat::Text),
        })
        .unwrap();
        set(&mut m, "A1", "=1+2").unwrap();
        assert_eq!(content(&m, "A1"), Some(CellValue::Text("=1+2".into())));
    }

    #[test]
    fn test_trim_whitespace_notifies() {
        let mut m = model();
        let collector = Rc::new(RefCell::new(EffectCollector::new()));
        m.set_notify(EffectCollector::sink(&collector));
        set(&mut m, "A1", "  padded ").unwrap();
        set(&mut m, "A2", " 42").unwrap();
        set(&mut m, "B1", "clean").unwrap();

        m.dispatch(Command::TrimWhitespace { sheet_id: S1, zones: vec![zone("A1:B2")] }).unwrap();
        assert_eq!(content(&m, "A1"), Some(CellValue::Text("padded".into())));
        assert_eq!(collector.borrow().texts(), vec!["Trimmed whitespace from 1 cells."]);

        m.dispatch(Command::TrimWhitespace { sheet_id: S1, zones: vec![zone("A1:B2")] }).unwrap();
        assert_eq!(collector.borrow().texts()[1], "No selected cells had whitespace trimmed.");
    }

    #[test]
    fn test_insert_rows_shifts_cells_and_references() {
        let mut m = model();
        set(&mut m, "A1", "1").unwrap();
        set(&mut m, "A3", "3").unwrap();
        set(&mut m, "B1", "=SUM(A1:A3)+$A$3").unwrap();
        m.dispatch(Command::InsertRows { sheet_id: S1, start: 1, count: 2 }).unwrap();
        assert_eq!(content(&m, "A5"), Some(CellValue::Number(3.0)));
        assert_eq!(content(&m, "A3"), None);
        assert_eq!(content(&m, "B1"), Some(CellValue::Formula("=SUM(A1:A5)+$A$5".into())));

        m.undo().unwrap();
        assert_eq!(content(&m, "A3"), Some(CellValue::Number(3.0)));
        assert_eq!(content(&m, "B1"), Some(CellValue::Formula("=SUM(A1:A3)+$A$3".into())));
    }

    #[test]
    fn test_delete_referenced_row_gives_ref_error_and_undo_restores_text() {
        let mut m = model();
        set(&mut m, "A2", "5").unwrap();
        set(&mut m, "B1", "=a2*2").unwrap();
        m.dispatch(Command::DeleteRows { sheet_id: S1, start: 1, count: 1 }).unwrap();
        assert_eq!(content(&m, "B1"), Some(CellValue::Formula("=#REF!*2".into())));
        m.undo().unwrap();
        assert_eq!(content(&m, "B1"), Some(CellValue::Formula("=a2*2".into())));
        assert_eq!(content(&m, "A2"), Some(CellValue::Number(5.0)));
    }

    #[test]
    fn test_rename_rewrites_qualified_references() {
        let mut m = model();
        let two = SheetId::from_raw(2);
        m.dispatch(Command::CreateSheet { sheet_id: two, name: "Data".into(), position: None, rows: None, cols: None })
            .unwrap();
        set(&mut m, "A1", "=data!A1+1").unwrap();
        m.dispatch(Command::RenameSheet { sheet_id: two, name: "My Data".into() }).unwrap();
        assert_eq!(content(&m, "A1"), Some(CellValue::Formula("='My Data'!A1+1".into())));
        m.undo().unwrap();
        assert_eq!(content(&m, "A1"), Some(CellValue::Formula("=data!A1+1".into())));
    }

    #[test]
    fn test_invalid_formula_notifies_error() {
        let mut m = model();
        let collector = Rc::new(RefCell::new(EffectCollector::new()));
        m.set_notify(EffectCollector::sink(&collector));
        set(&mut m, "A1", "=1+").unwrap();
        assert_eq!(content(&m, "A1"), Some(CellValue::Formula("=1+".into())));
        let notes = collector.borrow();
        assert_eq!(notes.len(), 1);
        assert!(notes.notifications()[0].sticky);
    }
}
