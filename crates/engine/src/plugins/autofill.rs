//! Autofill: extend a source zone into an adjacent target.
//!
//! The fill runs line by line along the fill direction. A line holding a
//! formula is copied as a cycle with references shifted to each target
//! cell; other lines continue their series pattern. Formats are copied as a
//! cycle.

use std::any::Any;

use cellgrid_core::{Position, SheetId, Zone};

use crate::cell::{CellFormat, CellValue};
use crate::command::{CancelledReason, Command};
use crate::formula::parser::{format_formula, parse};
use crate::formula::refs::offset_references;
use crate::formula::Value;
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};
use crate::series::detect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillDirection {
    Down,
    Up,
    Right,
    Left,
}

impl FillDirection {
    fn vertical(self) -> bool {
        matches!(self, FillDirection::Down | FillDirection::Up)
    }

    fn forward(self) -> bool {
        matches!(self, FillDirection::Down | FillDirection::Right)
    }
}

/// Direction and the cells to write. `target` may include the source.
pub fn fill_direction(source: &Zone, target: &Zone) -> Option<(FillDirection, Zone)> {
    let same_cols = target.left == source.left && target.right == source.right;
    let same_rows = target.top == source.top && target.bottom == source.bottom;
    let after = |end: usize, start: usize| end.checked_add(1) == Some(start);
    if same_cols {
        if after(source.bottom, target.top) || (target.top == source.top && target.bottom > source.bottom) {
            return Some((FillDirection::Down, Zone::new(source.bottom + 1, source.left, target.bottom, source.right)));
        }
        if after(target.bottom, source.top) || (target.bottom == source.bottom && target.top < source.top) {
            return Some((FillDirection::Up, Zone::new(target.top, source.left, source.top - 1, source.right)));
        }
    }
    if same_rows {
        if after(source.right, target.left) || (target.left == source.left && target.right > source.right) {
            return Some((FillDirection::Right, Zone::new(source.top, source.right + 1, source.bottom, target.right)));
        }
        if after(target.right, source.left) || (target.right == source.right && target.left < source.left) {
            return Some((FillDirection::Left, Zone::new(source.top, target.left, source.bottom, source.left - 1)));
        }
    }
    None
}

/// One generated cell.
#[derive(Debug, Clone, PartialEq)]
pub struct FilledCell {
    pub position: Position,
    pub content: Option<CellValue>,
    pub format: CellFormat,
}

fn kept_literal(value: Value) -> Option<CellValue> {
    match value {
        Value::Empty | Value::Error(_) => None,
        Value::Number(n) => Some(CellValue::Number(n)),
        Value::Text(s) => Some(CellValue::Text(s)),
        Value::Boolean(b) => Some(CellValue::Boolean(b)),
    }
}

/// Source and target positions of one line, in fill order. Source cells
/// run toward the target; targets run away from the source.
fn line_positions(direction: FillDirection, source: &Zone, extension: &Zone, line: usize) -> (Vec<Position>, Vec<Position>) {
    let (mut src, mut dst): (Vec<Position>, Vec<Position>) = if direction.vertical() {
        (
            (source.top..=source.bottom).map(|row| Position::new(row, line)).collect(),
            (extension.top..=extension.bottom).map(|row| Position::new(row, line)).collect(),
        )
    } else {
        (
            (source.left..=source.right).map(|col| Position::new(line, col)).collect(),
            (extension.left..=extension.right).map(|col| Position::new(line, col)).collect(),
        )
    };
    if !direction.forward() {
        src.reverse();
        dst.reverse();
    }
    (src, dst)
}

/// Cells written by filling `source` into `target`, if the target extends
/// the source in one direction.
pub fn compute_fill(getters: &Getters<'_>, sheet: SheetId, source: Zone, target: Zone) -> Option<Vec<FilledCell>> {
    let (direction, extension) = fill_direction(&source, &target)?;
    let lines = if direction.vertical() { source.left..=source.right } else { source.top..=source.bottom };
    let mut out = Vec::with_capacity(extension.size());

    for line in lines {
        let (src, dst) = line_positions(direction, &source, &extension, line);
        let contents: Vec<Option<&CellValue>> = src.iter().map(|p| getters.cell_content(sheet, *p)).collect();
        let formats: Vec<CellFormat> = src.iter().map(|p| getters.cell_format(sheet, *p)).collect();
        let has_formula = contents.iter().any(|c| c.map_or(false, CellValue::is_formula));
        let pattern = (!has_formula).then(|| {
            let values: Vec<Value> = contents.iter().map(|c| c.map(CellValue::literal).unwrap_or_default()).collect();
            detect(&values)
        });
        let n = src.len();

        for (j, to) in dst.into_iter().enumerate() {
            let index = j % n;
            let content = match &pattern {
                Some(pattern) => kept_literal(pattern.value_at((n + j) as i64)),
                None => match contents[index] {
                    Some(CellValue::Formula(formula)) => {
                        let from = src[index];
                        let d_row = to.row as i64 - from.row as i64;
                        let d_col = to.col as i64 - from.col as i64;
                        let shifted = match parse(formula) {
                            Ok(expr) => format_formula(&offset_references(&expr, d_row, d_col)),
                            Err(_) => formula.clone(),
                        };
                        Some(CellValue::Formula(shifted))
                    }
                    other => other.cloned(),
                },
            };
            out.push(FilledCell { position: to, content, format: formats[index].clone() });
        }
    }
    out.sort_by_key(|c| c.position);
    Some(out)
}

#[derive(Debug, Clone, Default)]
pub struct AutofillPlugin {
    last_fill: Option<(SheetId, Zone)>,
}

impl AutofillPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for AutofillPlugin {
    fn allow_dispatch(&self, cmd: &Command, _getters: &Getters<'_>) -> Result<(), CancelledReason> {
        match cmd {
            Command::AutoFill { source, target, .. } if fill_direction(source, target).is_none() => {
                Err(CancelledReason::InvalidAutofillTarget)
            }
            _ => Ok(()),
        }
    }

    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        match cmd {
            Command::AutoFill { sheet_id, source, target } => {
                let Some(cells) = compute_fill(&ctx.getters, *sheet_id, *source, *target) else { return };
                let Some((_, extension)) = fill_direction(source, target) else { return };
                let mut formats = Vec::new();
                for cell in cells {
                    if !cell.format.is_default() {
                        formats.push((cell.position, cell.format));
                    }
                    ctx.queue(Command::set_content(*sheet_id, cell.position, cell.content));
                }
                ctx.queue(Command::RestoreFormats { sheet_id: *sheet_id, zone: Some(extension), formats });
                log::debug!("autofill {} into {}", source, extension);
                self.last_fill = Some((*sheet_id, extension));
            }
            Command::DeleteSheet { sheet_id } => {
                if self.last_fill.map_or(false, |(s, _)| s == *sheet_id) {
                    self.last_fill = None;
                }
            }
            _ => {}
        }
    }

    fn checkpoint(&self) -> Option<Box<dyn Any>> {
        Some(Box::new(self.last_fill))
    }

    fn restore(&mut self, checkpoint: Box<dyn Any>) {
        if let Ok(last_fill) = checkpoint.downcast::<Option<(SheetId, Zone)>>() {
            self.last_fill = *last_fill;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> Getters<'a> {
    /// Cells an autofill would write, without applying it.
    pub fn autofill_preview(&self, sheet: SheetId, source: Zone, target: Zone) -> Option<Vec<FilledCell>> {
        compute_fill(self, sheet, source, target)
    }

    /// Zone written by the latest autofill.
    pub fn last_autofill(&self) -> Option<(SheetId, Zone)> {
        self.plugin::<AutofillPlugin>()?.last_fill
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::FormatPatch;
    use crate::plugins::test_util::*;

    fn fill(m: &mut crate::model::Model, source: &str, target: &str) -> crate::command::DispatchResult {
        m.dispatch(Command::AutoFill { sheet_id: S1, source: zone(source), target: zone(target) })
    }

    fn texts(m: &crate::model::Model, cells: &[&str]) -> Vec<String> {
        cells.iter().map(|a1| m.getters().cell_text(S1, pos(a1))).collect()
    }

    #[test]
    fn test_fill_direction() {
        assert_eq!(fill_direction(&zone("A1:A2"), &zone("A3:A5")), Some((FillDirection::Down, zone("A3:A5"))));
        assert_eq!(fill_direction(&zone("A1:A2"), &zone("A1:A5")), Some((FillDirection::Down, zone("A3:A5"))));
        assert_eq!(fill_direction(&zone("B5:B6"), &zone("B2:B4")), Some((FillDirection::Up, zone("B2:B4"))));
        assert_eq!(fill_direction(&zone("B2:C2"), &zone("D2:F2")), Some((FillDirection::Right, zone("D2:F2"))));
        assert_eq!(fill_direction(&zone("C1"), &zone("A1:C1")), Some((FillDirection::Left, zone("A1:B1"))));
        assert_eq!(fill_direction(&zone("A1"), &zone("B2")), None);
        assert_eq!(fill_direction(&zone("A1"), &zone("A1")), None);
        assert_eq!(fill_direction(&zone("A1"), &zone("A3:A4")), None);
    }

    #[test]
    fn test_numeric_series_down_and_up() {
        let mut m = model();
        set(&mut m, "A5", "10").unwrap();
        set(&mut m, "A6", "20").unwrap();
        fill(&mut m, "A5:A6", "A7:A8").unwrap();
        assert_eq!(texts(&m, &["A7", "A8"]), vec!["30", "40"]);
        fill(&mut m, "A5:A6", "A3:A4").unwrap();
        assert_eq!(texts(&m, &["A3", "A4"]), vec!["-10", "0"]);
    }

    #[test]
    fn test_single_number_copies_and_text_suffix_continues() {
        let mut m = model();
        set(&mut m, "A1", "7").unwrap();
        set(&mut m, "B1", "Item 1").unwrap();
        fill(&mut m, "A1:B1", "A2:B3").unwrap();
        assert_eq!(texts(&m, &["A2", "A3", "B2", "B3"]), vec!["7", "7", "Item 2", "Item 3"]);
    }

    #[test]
    fn test_formulas_shift_and_left_fill() {
        let mut m = model();
        set(&mut m, "A1", "1").unwrap();
        set(&mut m, "A2", "2").unwrap();
        set(&mut m, "B1", "=A1*10").unwrap();
        fill(&mut m, "B1", "B2").unwrap();
        assert_eq!(m.getters().cell_text(S1, pos("B2")), "=A2*10");
        assert_eq!(value(&m, "B2"), Value::Number(20.0));

        set(&mut m, "E1", "=D1+$A$1").unwrap();
        fill(&mut m, "E1", "C1:D1").unwrap();
        assert_eq!(texts(&m, &["C1", "D1"]), vec!["=B1+$A$1", "=C1+$A$1"]);
    }

    #[test]
    fn test_left_edge_reference_becomes_ref_error() {
        let mut m = model();
        set(&mut m, "B1", "=A1").unwrap();
        fill(&mut m, "B1", "A1").unwrap();
        assert_eq!(m.getters().cell_text(S1, pos("A1")), "=#REF!");
    }

    #[test]
    fn test_cycle_with_formats_and_undo() {
        let mut m = model();
        set(&mut m, "A1", "x").unwrap();
        set(&mut m, "A2", "y").unwrap();
        m.dispatch(Command::SetFormatting { sheet_id: S1, zones: vec![zone("A2")], format: FormatPatch { bold: Some(true), ..FormatPatch::default() } }).unwrap();
        fill(&mut m, "A1:A2", "A1:A5").unwrap();
        assert_eq!(texts(&m, &["A3", "A4", "A5"]), vec!["x", "y", "x"]);
        assert!(m.getters().cell_format(S1, pos("A4")).bold);
        assert!(!m.getters().cell_format(S1, pos("A5")).bold);
        assert_eq!(m.getters().last_autofill(), Some((S1, zone("A3:A5"))));

        m.undo().unwrap();
        assert_eq!(m.getters().cell_count(S1), 2);
        assert!(!m.getters().cell_format(S1, pos("A4")).bold);
    }

    #[test]
    fn test_invalid_target_rejected() {
        let mut m = model();
        let err = fill(&mut m, "A1:B2", "C3:D4").unwrap_err();
        assert_eq!(err.reasons, vec![CancelledReason::InvalidAutofillTarget]);
    }

    #[test]
    fn test_preview_matches_fill() {
        let mut m = model();
        set(&mut m, "A1", "Mon").unwrap();
        let preview = m.getters().autofill_preview(S1, zone("A1"), zone("A2:A3")).unwrap();
        let contents: Vec<_> = preview.into_iter().map(|c| c.content).collect();
        assert_eq!(contents, vec![Some(CellValue::Text("Tue".into())), Some(CellValue::Text("Wed".into()))]);
    }
}
