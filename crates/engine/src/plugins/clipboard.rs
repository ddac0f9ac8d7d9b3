//! Copy, cut and paste of cell zones.
//!
//! Copy and cut take a snapshot of content, evaluated values and formats.
//! Paste writes the snapshot through generated commands, so its undo is the
//! undo of those commands. A cut is consumed by its first paste.

use std::any::Any;

use cellgrid_core::{Position, SheetId, Zone};

use crate::cell::{CellFormat, CellValue};
use crate::command::{CancelledReason, Command};
use crate::formula::parser::{format_formula, parse};
use crate::formula::refs::offset_references;
use crate::formula::Value;
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardOperation {
    Copy,
    Cut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardCell {
    pub content: Option<CellValue>,
    pub value: Value,
    /// Display text at copy time
    pub text: String,
    pub format: CellFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardState {
    pub operation: ClipboardOperation,
    pub sheet: SheetId,
    pub zone: Zone,
    /// Row-major, `zone.size()` entries
    pub cells: Vec<ClipboardCell>,
}

impl ClipboardState {
    /// Tab-separated display text, one line per row.
    pub fn to_text(&self) -> String {
        self.cells
            .chunks(self.zone.cols())
            .map(|row| row.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\t"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClipboardPlugin {
    state: Option<ClipboardState>,
}

/// Stored value written by a values-only paste. Errors paste as their code.
fn literal_of(value: &Value) -> Option<CellValue> {
    match value {
        Value::Empty => None,
        Value::Number(n) => Some(CellValue::Number(*n)),
        Value::Text(s) => Some(CellValue::Text(s.clone())),
        Value::Boolean(b) => Some(CellValue::Boolean(*b)),
        Value::Error(e) => Some(CellValue::Text(e.kind.code().to_string())),
    }
}

/// Formula shifted by the paste offset. Texts that do not parse are kept.
fn offset_formula(source: &str, d_row: i64, d_col: i64) -> String {
    match parse(source) {
        Ok(expr) => format_formula(&offset_references(&expr, d_row, d_col)),
        Err(_) => source.to_string(),
    }
}

impl ClipboardPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(operation: ClipboardOperation, sheet: SheetId, zone: Zone, getters: &Getters<'_>) -> ClipboardState {
        let cells = zone
            .positions()
            .map(|p| ClipboardCell {
                content: getters.cell_content(sheet, p).cloned(),
                value: getters.evaluated_value(sheet, p),
                text: getters.formatted_value(sheet, p),
                format: getters.cell_format(sheet, p),
            })
            .collect();
        ClipboardState { operation, sheet, zone, cells }
    }

    fn paste(&mut self, sheet: SheetId, target: Position, values_only: bool, ctx: &mut ApplyContext<'_>) {
        let Some(state) = self.state.take() else { return };
        let source = state.zone;
        let target_zone = Zone::new(target.row, target.col, target.row + source.rows() - 1, target.col + source.cols() - 1);
        let cut = state.operation == ClipboardOperation::Cut;

        if cut {
            ctx.queue(Command::DeleteContent { sheet_id: state.sheet, zones: vec![source] });
            if !values_only {
                ctx.queue(Command::ClearFormatting { sheet_id: state.sheet, zones: vec![source] });
            }
        }

        let d_row = target.row as i64 - source.top as i64;
        let d_col = target.col as i64 - source.left as i64;
        let mut formats = Vec::new();
        for (cell, to) in state.cells.iter().zip(target_zone.positions()) {
            let content = if values_only {
                literal_of(&cell.value)
            } else {
                match &cell.content {
                    Some(CellValue::Formula(source)) if !cut => Some(CellValue::Formula(offset_formula(source, d_row, d_col))),
                    other => other.clone(),
                }
            };
            ctx.queue(Command::set_content(sheet, to, content));
            if !cell.format.is_default() {
                formats.push((to, cell.format.clone()));
            }
        }
        if !values_only {
            ctx.queue(Command::RestoreFormats { sheet_id: sheet, zone: Some(target_zone), formats });
        }
        log::debug!("paste {} from {} to {}", if cut { "cut" } else { "copy" }, source, target_zone);

        if !cut {
            self.state = Some(state);
        }
    }
}

impl Plugin for ClipboardPlugin {
    fn allow_dispatch(&self, cmd: &Command, getters: &Getters<'_>) -> Result<(), CancelledReason> {
        let Command::Paste { sheet_id, target, .. } = cmd else { return Ok(()) };
        let Some(state) = &self.state else { return Err(CancelledReason::EmptyClipboard) };
        let Some((rows, cols)) = getters.sheet_size(*sheet_id) else { return Ok(()) };
        // An anchor outside the sheet is reported by the sheet plugin
        let anchor_inside = target.row < rows && target.col < cols;
        let fits = target.row.checked_add(state.zone.rows()).map_or(false, |end| end <= rows)
            && target.col.checked_add(state.zone.cols()).map_or(false, |end| end <= cols);
        if anchor_inside && !fits {
            Err(CancelledReason::TargetOutOfSheet)
        } else {
            Ok(())
        }
    }

    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        match cmd {
            Command::Copy { sheet_id, zone } => {
                self.state = Some(Self::snapshot(ClipboardOperation::Copy, *sheet_id, *zone, &ctx.getters));
            }
            Command::Cut { sheet_id, zone } => {
                self.state = Some(Self::snapshot(ClipboardOperation::Cut, *sheet_id, *zone, &ctx.getters));
            }
            Command::Paste { sheet_id, target, values_only } => self.paste(*sheet_id, *target, *values_only, ctx),
            Command::DeleteSheet { sheet_id } => {
                if self.state.as_ref().map_or(false, |s| s.sheet == *sheet_id) {
                    self.state = None;
                }
            }
            _ => {
                let Some((sheet, change)) = cmd.axis_change() else { return };
                let Some(state) = self.state.as_mut().filter(|s| s.sheet == sheet) else { return };
                // A cut whose origin moved or vanished is no longer a move
                if state.operation == ClipboardOperation::Cut && change.map_zone(&state.zone) != Some(state.zone) {
                    state.operation = ClipboardOperation::Copy;
                }
            }
        }
    }

    fn checkpoint(&self) -> Option<Box<dyn Any>> {
        Some(Box::new(self.clone()))
    }

    fn restore(&mut self, checkpoint: Box<dyn Any>) {
        if let Ok(saved) = checkpoint.downcast::<Self>() {
            *self = *saved;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> Getters<'a> {
    pub fn clipboard(&self) -> Option<&'a ClipboardState> {
        self.plugin::<ClipboardPlugin>()?.state.as_ref()
    }

    pub fn has_clipboard(&self) -> bool {
        self.clipboard().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::FormatPatch;
    use crate::plugins::test_util::*;

    fn copy(m: &mut crate::model::Model, a1: &str) {
        m.dispatch(Command::Copy { sheet_id: S1, zone: zone(a1) }).unwrap();
    }

    fn paste(m: &mut crate::model::Model, a1: &str, values_only: bool) -> crate::command::DispatchResult {
        m.dispatch(Command::Paste { sheet_id: S1, target: pos(a1), values_only })
    }

    #[test]
    fn test_copy_paste_offsets_relative_references() {
        let mut m = model();
        set(&mut m, "A1", "3").unwrap();
        set(&mut m, "B1", "=A1*2+$A$1").unwrap();
        set(&mut m, "A3", "5").unwrap();
        copy(&mut m, "B1");
        paste(&mut m, "B3", false).unwrap();
        assert_eq!(m.getters().cell_text(S1, pos("B3")), "=A3*2+$A$1");
        assert_eq!(value(&m, "B3"), Value::Number(13.0));

        // The clipboard survives a copy-paste
        paste(&mut m, "C1", false).unwrap();
        assert_eq!(m.getters().cell_text(S1, pos("C1")), "=B1*2+$A$1");
    }

    #[test]
    fn test_paste_above_first_row_gives_ref_error() {
        let mut m = model();
        set(&mut m, "A2", "=A1").unwrap();
        copy(&mut m, "A2");
        paste(&mut m, "B1", false).unwrap();
        assert_eq!(m.getters().cell_text(S1, pos("B1")), "=#REF!");
    }

    #[test]
    fn test_cut_paste_moves_and_clears_origin() {
        let mut m = model();
        set(&mut m, "A1", "7").unwrap();
        set(&mut m, "A2", "=A1").unwrap();
        m.dispatch(Command::SetFormatting { sheet_id: S1, zones: vec![zone("A1")], format: FormatPatch { bold: Some(true), ..FormatPatch::default() } }).unwrap();
        m.dispatch(Command::Cut { sheet_id: S1, zone: zone("A1:A2") }).unwrap();
        paste(&mut m, "C1", false).unwrap();

        assert_eq!(m.getters().cell_content(S1, pos("A1")), None);
        assert!(!m.getters().cell_format(S1, pos("A1")).bold);
        assert!(m.getters().cell_format(S1, pos("C1")).bold);
        assert_eq!(m.getters().cell_text(S1, pos("C2")), "=A1");
        assert!(!m.getters().has_clipboard());
        assert_eq!(paste(&mut m, "E1", false).unwrap_err().reasons, vec![CancelledReason::EmptyClipboard]);

        m.undo().unwrap();
        assert_eq!(value(&m, "A2"), Value::Number(7.0));
        assert!(m.getters().cell_format(S1, pos("A1")).bold);
        assert_eq!(m.getters().cell_content(S1, pos("C1")), None);
    }

    #[test]
    fn test_values_only_paste() {
        let mut m = model();
        set(&mut m, "A1", "=1/0").unwrap();
        set(&mut m, "A2", "=2+2").unwrap();
        m.dispatch(Command::SetFormatting { sheet_id: S1, zones: vec![zone("A2")], format: FormatPatch { italic: Some(true), ..FormatPatch::default() } }).unwrap();
        copy(&mut m, "A1:A2");
        paste(&mut m, "B1", true).unwrap();
        assert_eq!(m.getters().cell_content(S1, pos("B1")), Some(&CellValue::Text("#DIV/0!".into())));
        assert_eq!(m.getters().cell_content(S1, pos("B2")), Some(&CellValue::Number(4.0)));
        assert!(!m.getters().cell_format(S1, pos("B2")).italic);
    }

    #[test]
    fn test_paste_overwrites_with_empty_cells() {
        let mut m = model();
        set(&mut m, "D4", "old").unwrap();
        copy(&mut m, "A1");
        paste(&mut m, "D4", false).unwrap();
        assert_eq!(m.getters().cell_content(S1, pos("D4")), None);
        m.undo().unwrap();
        assert_eq!(m.getters().cell_text(S1, pos("D4")), "old");
    }

    #[test]
    fn test_paste_must_fit_in_sheet() {
        let mut m = model();
        assert_eq!(paste(&mut m, "A1", false).unwrap_err().reasons, vec![CancelledReason::EmptyClipboard]);
        copy(&mut m, "A1:B2");
        assert_eq!(paste(&mut m, "Z100", false).unwrap_err().reasons, vec![CancelledReason::TargetOutOfSheet]);
        paste(&mut m, "Y99", false).unwrap();
    }

    #[test]
    fn test_clipboard_text() {
        let mut m = model();
        set(&mut m, "A1", "a").unwrap();
        set(&mut m, "B2", "=1+1").unwrap();
        copy(&mut m, "A1:B2");
        assert_eq!(m.getters().clipboard().unwrap().to_text(), "a\t\n\t2");
    }
}
