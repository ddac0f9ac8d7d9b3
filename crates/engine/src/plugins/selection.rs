//! Per-sheet selection: an anchor cell plus selected zones.

use std::any::Any;

use cellgrid_core::{Position, SheetId, Zone};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::command::Command;
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub anchor: Position,
    /// Non-empty; the last zone is the one being extended
    pub zones: Vec<Zone>,
    /// Moving end of the last zone
    #[serde(skip)]
    corner: Position,
}

impl Default for Selection {
    fn default() -> Self {
        Self::cell(Position::new(0, 0), Zone::single(Position::new(0, 0)))
    }
}

impl Selection {
    fn cell(anchor: Position, zone: Zone) -> Self {
        Self { anchor, zones: vec![zone], corner: anchor }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionPlugin {
    selections: FxHashMap<SheetId, Selection>,
}

/// Offset `p`, clamped to a `rows` x `cols` sheet.
fn clamped(p: Position, d_row: i64, d_col: i64, rows: usize, cols: usize) -> Position {
    let row = (p.row as i64).saturating_add(d_row).clamp(0, rows.saturating_sub(1) as i64) as usize;
    let col = (p.col as i64).saturating_add(d_col).clamp(0, cols.saturating_sub(1) as i64) as usize;
    Position::new(row, col)
}

impl SelectionPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn select(&mut self, sheet: SheetId, anchor: Position, getters: &Getters<'_>) {
        let zone = getters.expand_to_merges(sheet, Zone::single(anchor));
        self.selections.insert(sheet, Selection::cell(anchor, zone));
    }

    fn move_selection(&mut self, sheet: SheetId, d_row: i64, d_col: i64, extend: bool, getters: &Getters<'_>) {
        let (rows, cols) = getters.sheet_size(sheet).unwrap_or((1, 1));
        let current = self.selections.get(&sheet).cloned().unwrap_or_default();
        if extend {
            let corner = clamped(current.corner, d_row, d_col, rows, cols);
            let zone = getters.expand_to_merges(sheet, Zone::from_positions(current.anchor, corner));
            let mut zones = current.zones;
            zones.pop();
            zones.push(zone);
            self.selections.insert(sheet, Selection { anchor: current.anchor, zones, corner });
            return;
        }
        // Step out of the merge the anchor sits in
        let from = getters.merge_at(sheet, current.anchor).unwrap_or_else(|| Zone::single(current.anchor));
        let start = Position::new(
            if d_row > 0 { from.bottom } else { from.top },
            if d_col > 0 { from.right } else { from.left },
        );
        let mut target = clamped(start, d_row, d_col, rows, cols);
        if let Some(merge) = getters.merge_at(sheet, target) {
            target = merge.top_left();
        }
        if from.contains(target) {
            target = current.anchor;
        }
        self.select(sheet, target, getters);
    }

    fn remap(&mut self, sheet: SheetId, getters: &Getters<'_>, map: impl Fn(Zone) -> Option<Zone>) {
        let Some(current) = self.selections.get(&sheet) else { return };
        let (rows, cols) = getters.sheet_size(sheet).unwrap_or((1, 1));
        let zones: Vec<Zone> = current.zones.iter().filter_map(|z| map(*z)).filter_map(|z| z.clamp_to(rows, cols)).collect();
        let anchor = map(Zone::single(current.anchor)).map(|z| z.top_left());
        match (anchor, zones.is_empty()) {
            (Some(anchor), false) if zones.iter().any(|z| z.contains(anchor)) => {
                self.selections.insert(sheet, Selection { anchor, zones, corner: anchor });
            }
            (anchor, _) => {
                let fallback = anchor.unwrap_or_else(|| clamped(current.anchor, 0, 0, rows, cols));
                let fallback = clamped(fallback, 0, 0, rows, cols);
                self.select(sheet, fallback, getters);
            }
        }
    }
}

impl Plugin for SelectionPlugin {
    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        let getters = ctx.getters;
        match cmd {
            Command::SelectCell { sheet_id, position } => self.select(*sheet_id, *position, &getters),
            Command::SetSelection { sheet_id, anchor, zones } => {
                let mut zones: Vec<Zone> = zones.iter().map(|z| getters.expand_to_merges(*sheet_id, *z)).collect();
                if !zones.iter().any(|z| z.contains(*anchor)) {
                    zones.push(getters.expand_to_merges(*sheet_id, Zone::single(*anchor)));
                }
                self.selections.insert(*sheet_id, Selection { anchor: *anchor, zones, corner: *anchor });
            }
            Command::MoveSelection { sheet_id, d_row, d_col, extend } => {
                self.move_selection(*sheet_id, *d_row, *d_col, *extend, &getters)
            }
            Command::DeleteSheet { sheet_id } => {
                self.selections.remove(sheet_id);
            }
            Command::AddMerge { sheet_id, .. } | Command::RestoreMerges { sheet_id, .. } => {
                self.remap(*sheet_id, &getters, |z| Some(getters.expand_to_merges(*sheet_id, z)));
            }
            _ => {
                if let Some((sheet, change)) = cmd.axis_change() {
                    self.remap(sheet, &getters, |z| change.map_zone(&z));
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
    /// Selection of a sheet; `A1` when nothing was selected yet.
    pub fn selection(&self, sheet: SheetId) -> Selection {
        self.plugin::<SelectionPlugin>().and_then(|p| p.selections.get(&sheet)).cloned().unwrap_or_default()
    }

    pub fn selected_zones(&self, sheet: SheetId) -> Vec<Zone> {
        self.selection(sheet).zones
    }

    /// Anchor of the active sheet's selection.
    pub fn active_position(&self) -> (SheetId, Position) {
        let sheet = self.active_sheet();
        (sheet, self.selection(sheet).anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CancelledReason;
    use crate::plugins::test_util::*;

    fn select(m: &mut crate::model::Model, a1: &str) {
        m.dispatch(Command::SelectCell { sheet_id: S1, position: pos(a1) }).unwrap();
    }

    fn step(m: &mut crate::model::Model, d_row: i64, d_col: i64, extend: bool) {
        m.dispatch(Command::MoveSelection { sheet_id: S1, d_row, d_col, extend }).unwrap();
    }

    #[test]
    fn test_select_and_move_clamped() {
        let mut m = model();
        assert_eq!(m.getters().active_position(), (S1, pos("A1")));
        step(&mut m, -1, -1, false);
        assert_eq!(m.getters().selection(S1).anchor, pos("A1"));
        select(&mut m, "C3");
        step(&mut m, 1, 0, false);
        assert_eq!(m.getters().selected_zones(S1), vec![zone("C4")]);
        step(&mut m, 0, 1000, false);
        assert_eq!(m.getters().selection(S1).anchor, pos("Z4"));
        assert!(!m.can_undo());
    }

    #[test]
    fn test_extend_keeps_anchor() {
        let mut m = model();
        select(&mut m, "B2");
        step(&mut m, 2, 1, true);
        step(&mut m, 0, 1, true);
        let selection = m.getters().selection(S1);
        assert_eq!(selection.anchor, pos("B2"));
        assert_eq!(selection.zones, vec![zone("B2:D4")]);
    }

    #[test]
    fn test_selection_expands_over_merges() {
        let mut m = model();
        m.dispatch(Command::AddMerge { sheet_id: S1, zone: zone("B2:C3"), force: false }).unwrap();
        select(&mut m, "C3");
        assert_eq!(m.getters().selected_zones(S1), vec![zone("B2:C3")]);
        select(&mut m, "A2");
        step(&mut m, 0, 1, false);
        assert_eq!(m.getters().selection(S1).anchor, pos("B2"));
        step(&mut m, 0, 1, false);
        assert_eq!(m.getters().selection(S1).anchor, pos("D2"));
    }

    #[test]
    fn test_selection_follows_deleted_rows() {
        let mut m = model();
        m.dispatch(Command::SetSelection { sheet_id: S1, anchor: pos("A5"), zones: vec![zone("A5:B6")] }).unwrap();
        m.dispatch(Command::DeleteRows { sheet_id: S1, start: 0, count: 2 }).unwrap();
        let selection = m.getters().selection(S1);
        assert_eq!(selection.anchor, pos("A3"));
        assert_eq!(selection.zones, vec![zone("A3:B4")]);
    }

    #[test]
    fn test_out_of_sheet_selection_rejected() {
        let mut m = model();
        let err = m.dispatch(Command::SelectCell { sheet_id: S1, position: Position::new(500, 0) }).unwrap_err();
        assert_eq!(err.reasons, vec![CancelledReason::TargetOutOfSheet]);
    }
}
