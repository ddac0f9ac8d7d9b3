//! Sheet topology: order, names, dimensions, hidden headers, frozen panes
//! and the active sheet.
//!
//! This plugin also guards every sheet-scoped command: unknown sheet ids
//! and targets outside the sheet are rejected here, once, for all plugins.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use cellgrid_config::Settings;
use cellgrid_core::{Axis, AxisChange, ChangeKind, Position, SheetId, Zone};

use crate::command::{CancelledReason, Command};
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

const FORBIDDEN_NAME_CHARS: [char; 8] = ['[', ']', ':', '*', '?', '/', '\\', '\''];
const MAX_NAME_LEN: usize = 31;

/// Largest sheet dimensions reachable through inserts or creation.
pub const MAX_ROWS: usize = 1_048_576;
pub const MAX_COLS: usize = 16_384;

fn max_len(axis: Axis) -> usize {
    match axis {
        Axis::Row => MAX_ROWS,
        Axis::Col => MAX_COLS,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub hidden_rows: BTreeSet<usize>,
    pub hidden_cols: BTreeSet<usize>,
    pub frozen_rows: usize,
    pub frozen_cols: usize,
}

impl SheetData {
    fn new(name: String, rows: usize, cols: usize) -> Self {
        Self {
            name,
            rows,
            cols,
            hidden_rows: BTreeSet::new(),
            hidden_cols: BTreeSet::new(),
            frozen_rows: 0,
            frozen_cols: 0,
        }
    }

    fn len(&self, axis: Axis) -> usize {
        match axis {
            Axis::Row => self.rows,
            Axis::Col => self.cols,
        }
    }

    fn hidden(&self, axis: Axis) -> &BTreeSet<usize> {
        match axis {
            Axis::Row => &self.hidden_rows,
            Axis::Col => &self.hidden_cols,
        }
    }

    fn contains(&self, p: Position) -> bool {
        p.row < self.rows && p.col < self.cols
    }

    fn contains_zone(&self, z: &Zone) -> bool {
        self.contains(z.bottom_right())
    }
}

#[derive(Debug, Clone)]
pub struct SheetPlugin {
    order: Vec<SheetId>,
    sheets: BTreeMap<SheetId, SheetData>,
    active: SheetId,
    next_id: u64,
}

/// Valid names are 1-31 characters, not blank, none of `[]:*?/\'`.
pub fn is_valid_sheet_name(name: &str) -> bool {
    let len = name.chars().count();
    len > 0
        && len <= MAX_NAME_LEN
        && !name.contains(FORBIDDEN_NAME_CHARS)
        && !name.trim().is_empty()
}

/// Contiguous runs `(start, count)` of sorted indices.
pub(crate) fn runs(indices: impl IntoIterator<Item = usize>) -> Vec<(usize, usize)> {
    let mut out: Vec<(usize, usize)> = Vec::new();
    for i in indices {
        match out.last_mut() {
            Some((start, count)) if *start + *count == i => *count += 1,
            _ => out.push((i, 1)),
        }
    }
    out
}

impl SheetPlugin {
    pub fn new(settings: &Settings) -> Self {
        let first = SheetId::from_raw(1);
        let mut sheets = BTreeMap::new();
        sheets.insert(first, SheetData::new("Sheet1".to_string(), settings.default_rows, settings.default_cols));
        Self { order: vec![first], sheets, active: first, next_id: 2 }
    }

    fn name_taken(&self, name: &str, except: Option<SheetId>) -> bool {
        self.sheets.iter().any(|(id, s)| Some(*id) != except && s.name.eq_ignore_ascii_case(name))
    }

    fn check_name(&self, name: &str, except: Option<SheetId>) -> Result<(), CancelledReason> {
        if !is_valid_sheet_name(name) {
            Err(CancelledReason::InvalidSheetName)
        } else if self.name_taken(name, except) {
            Err(CancelledReason::DuplicateSheetName)
        } else {
            Ok(())
        }
    }

    fn check_command(&self, cmd: &Command) -> Result<(), CancelledReason> {
        if let Command::CreateSheet { sheet_id, name, position, rows, cols } = cmd {
            if self.sheets.contains_key(sheet_id) {
                return Err(CancelledReason::DuplicateSheetId);
            }
            self.check_name(name, None)?;
            if position.map_or(false, |p| p > self.order.len()) {
                return Err(CancelledReason::WrongSheetPosition);
            }
            let rows_ok = rows.map_or(true, |r| (1..=MAX_ROWS).contains(&r));
            let cols_ok = cols.map_or(true, |c| (1..=MAX_COLS).contains(&c));
            if !rows_ok || !cols_ok {
                return Err(CancelledReason::InvalidCount);
            }
            return Ok(());
        }

        let sheet = match cmd.sheet_id() {
            Some(id) => Some(self.sheets.get(&id).ok_or(CancelledReason::InvalidSheetId)?),
            None => None,
        };
        let Some(sheet) = sheet else { return Ok(()) };
        let in_sheet = |z: &Zone| if sheet.contains_zone(z) { Ok(()) } else { Err(CancelledReason::TargetOutOfSheet) };
        let all_in_sheet = |zones: &[Zone]| {
            if zones.is_empty() {
                return Err(CancelledReason::EmptyTarget);
            }
            zones.iter().try_for_each(|z| in_sheet(z))
        };

        match cmd {
            Command::DeleteSheet { .. } if self.order.len() <= 1 => Err(CancelledReason::NotEnoughSheets),
            Command::RenameSheet { sheet_id, name } => self.check_name(name, Some(*sheet_id)),
            Command::MoveSheet { sheet_id, delta } => {
                let index = self.index_of(*sheet_id) as i64;
                let target = index.saturating_add(*delta);
                if *delta == 0 || target < 0 || target >= self.order.len() as i64 {
                    Err(CancelledReason::WrongSheetPosition)
                } else {
                    Ok(())
                }
            }
            Command::InsertRows { .. }
            | Command::DeleteRows { .. }
            | Command::InsertCols { .. }
            | Command::DeleteCols { .. } => {
                let Some((_, change)) = cmd.axis_change() else { return Ok(()) };
                let len = sheet.len(change.axis);
                if change.count == 0 {
                    return Err(CancelledReason::InvalidCount);
                }
                let end = change.start.checked_add(change.count);
                match change.kind {
                    ChangeKind::Insert if change.start > len => Err(CancelledReason::TargetOutOfSheet),
                    ChangeKind::Insert if len.checked_add(change.count).map_or(true, |n| n > max_len(change.axis)) => {
                        Err(CancelledReason::InvalidCount)
                    }
                    ChangeKind::Delete if end.map_or(true, |end| end > len) => Err(CancelledReason::TargetOutOfSheet),
                    ChangeKind::Delete if change.count >= len => Err(CancelledReason::NotEnoughElements),
                    _ => Ok(()),
                }
            }
            Command::SetRowsHidden { start, count, hidden, .. } => self.check_hide(sheet, Axis::Row, *start, *count, *hidden),
            Command::SetColsHidden { start, count, hidden, .. } => self.check_hide(sheet, Axis::Col, *start, *count, *hidden),
            Command::FreezePanes { rows, cols, .. } => {
                if *rows >= sheet.rows || *cols >= sheet.cols {
                    Err(CancelledReason::TargetOutOfSheet)
                } else {
                    Ok(())
                }
            }
            Command::UpdateCell { position, .. }
            | Command::SetCellContent { position, .. }
            | Command::SelectCell { position, .. }
            | Command::Paste { target: position, .. } => in_sheet(&Zone::single(*position)),
            Command::SetSelection { anchor, zones, .. } => {
                all_in_sheet(zones)?;
                in_sheet(&Zone::single(*anchor))
            }
            Command::DeleteContent { zones, .. }
            | Command::TrimWhitespace { zones, .. }
            | Command::SetFormatting { zones, .. }
            | Command::ClearFormatting { zones, .. } => all_in_sheet(zones),
            Command::AddMerge { zone, .. }
            | Command::RemoveMerge { zone, .. }
            | Command::Copy { zone, .. }
            | Command::Cut { zone, .. }
            | Command::SetViewport { zone, .. } => in_sheet(zone),
            Command::RestoreFormats { zone: Some(zone), .. } => in_sheet(zone),
            Command::AutoFill { source, target, .. } => {
                in_sheet(source)?;
                in_sheet(target)
            }
            _ => Ok(()),
        }
    }

    fn check_hide(&self, sheet: &SheetData, axis: Axis, start: usize, count: usize, hidden: bool) -> Result<(), CancelledReason> {
        let len = sheet.len(axis);
        if count == 0 {
            return Err(CancelledReason::InvalidCount);
        }
        let Some(end) = start.checked_add(count).filter(|&end| end <= len) else {
            return Err(CancelledReason::TargetOutOfSheet);
        };
        if hidden {
            let existing = sheet.hidden(axis).iter().filter(|&&i| i < start || i >= end).count();
            if existing + count >= len {
                return Err(CancelledReason::TooManyHiddenElements);
            }
        }
        Ok(())
    }

    fn index_of(&self, sheet: SheetId) -> usize {
        self.order.iter().position(|s| *s == sheet).unwrap_or(0)
    }

    fn apply_axis_change(&mut self, sheet_id: SheetId, change: AxisChange, ctx: &mut ApplyContext<'_>) {
        let Some(sheet) = self.sheets.get_mut(&sheet_id) else { return };
        let (len, hidden, frozen) = match change.axis {
            Axis::Row => (&mut sheet.rows, &mut sheet.hidden_rows, &mut sheet.frozen_rows),
            Axis::Col => (&mut sheet.cols, &mut sheet.hidden_cols, &mut sheet.frozen_cols),
        };

        ctx.record_inverse(Command::from_axis_change(sheet_id, change.inverse()));
        let lost: Vec<usize> = hidden.iter().copied().filter(|&i| change.map_index(i).is_none()).collect();
        for (start, count) in runs(lost) {
            ctx.record_inverse(hide_command(sheet_id, change.axis, start, count, true));
        }

        let old_frozen = *frozen;
        *len = match change.kind {
            ChangeKind::Insert => *len + change.count,
            ChangeKind::Delete => *len - change.count,
        };
        *hidden = hidden.iter().filter_map(|&i| change.map_index(i)).collect();
        if old_frozen > 0 {
            *frozen = change.map_span(0, old_frozen - 1).map_or(0, |(_, hi)| hi + 1);
        }
        if *frozen != old_frozen {
            let (rows, cols) = match change.axis {
                Axis::Row => (old_frozen, sheet.frozen_cols),
                Axis::Col => (sheet.frozen_rows, old_frozen),
            };
            ctx.record_inverse(Command::FreezePanes { sheet_id, rows, cols });
        }
        ctx.changes_mut().structural.push((sheet_id, change));
    }

    fn set_hidden(&mut self, sheet_id: SheetId, axis: Axis, start: usize, count: usize, hidden: bool, ctx: &mut ApplyContext<'_>) {
        let Some(sheet) = self.sheets.get_mut(&sheet_id) else { return };
        let set = match axis {
            Axis::Row => &mut sheet.hidden_rows,
            Axis::Col => &mut sheet.hidden_cols,
        };
        let flipped: Vec<usize> = (start..start + count).filter(|i| set.contains(i) != hidden).collect();
        for (s, c) in runs(flipped.iter().copied()) {
            ctx.record_inverse(hide_command(sheet_id, axis, s, c, !hidden));
        }
        for i in flipped {
            if hidden {
                set.insert(i);
            } else {
                set.remove(&i);
            }
        }
    }
}

fn hide_command(sheet_id: SheetId, axis: Axis, start: usize, count: usize, hidden: bool) -> Command {
    match axis {
        Axis::Row => Command::SetRowsHidden { sheet_id, start, count, hidden },
        Axis::Col => Command::SetColsHidden { sheet_id, start, count, hidden },
    }
}

impl Plugin for SheetPlugin {
    fn allow_dispatch(&self, cmd: &Command, _getters: &Getters<'_>) -> Result<(), CancelledReason> {
        self.check_command(cmd)
    }

    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        match cmd {
            Command::CreateSheet { sheet_id, name, position, rows, cols } => {
                let (default_rows, default_cols) = ctx.getters.default_sheet_size();
                let data = SheetData::new(name.clone(), rows.unwrap_or(default_rows), cols.unwrap_or(default_cols));
                self.sheets.insert(*sheet_id, data);
                let index = position.unwrap_or(self.order.len()).min(self.order.len());
                self.order.insert(index, *sheet_id);
                self.next_id = self.next_id.max(sheet_id.raw() + 1);
                ctx.record_inverse(Command::DeleteSheet { sheet_id: *sheet_id });
                ctx.changes_mut().sheets_changed = true;
            }
            Command::DeleteSheet { sheet_id } => {
                let index = self.index_of(*sheet_id);
                let Some(data) = self.sheets.remove(sheet_id) else { return };
                self.order.remove(index);
                ctx.record_inverse(Command::CreateSheet {
                    sheet_id: *sheet_id,
                    name: data.name.clone(),
                    position: Some(index),
                    rows: Some(data.rows),
                    cols: Some(data.cols),
                });
                for (start, count) in runs(data.hidden_rows.iter().copied()) {
                    ctx.record_inverse(hide_command(*sheet_id, Axis::Row, start, count, true));
                }
                for (start, count) in runs(data.hidden_cols.iter().copied()) {
                    ctx.record_inverse(hide_command(*sheet_id, Axis::Col, start, count, true));
                }
                if data.frozen_rows > 0 || data.frozen_cols > 0 {
                    ctx.record_inverse(Command::FreezePanes {
                        sheet_id: *sheet_id,
                        rows: data.frozen_rows,
                        cols: data.frozen_cols,
                    });
                }
                if self.active == *sheet_id {
                    ctx.record_inverse(Command::ActivateSheet { sheet_id: *sheet_id });
                    if let Some(&next) = self.order.get(index.min(self.order.len().saturating_sub(1))) {
                        self.active = next;
                    }
                }
                let changes = ctx.changes_mut();
                changes.deleted_sheets.push(*sheet_id);
                changes.sheets_changed = true;
            }
            Command::RenameSheet { sheet_id, name } => {
                let Some(data) = self.sheets.get_mut(sheet_id) else { return };
                if data.name == *name {
                    return;
                }
                let old = std::mem::replace(&mut data.name, name.clone());
                ctx.record_inverse(Command::RenameSheet { sheet_id: *sheet_id, name: old.clone() });
                let changes = ctx.changes_mut();
                changes.renamed.push((*sheet_id, old, name.clone()));
                changes.sheets_changed = true;
            }
            Command::MoveSheet { sheet_id, delta } => {
                let index = self.index_of(*sheet_id);
                let target = (index as i64).saturating_add(*delta).clamp(0, self.order.len() as i64 - 1) as usize;
                let id = self.order.remove(index);
                self.order.insert(target, id);
                ctx.record_inverse(Command::MoveSheet { sheet_id: *sheet_id, delta: -delta });
                ctx.changes_mut().sheets_changed = true;
            }
            Command::ActivateSheet { sheet_id } => {
                self.active = *sheet_id;
            }
            Command::InsertRows { .. }
            | Command::DeleteRows { .. }
            | Command::InsertCols { .. }
            | Command::DeleteCols { .. } => {
                if let Some((sheet_id, change)) = cmd.axis_change() {
                    self.apply_axis_change(sheet_id, change, ctx);
                }
            }
            Command::SetRowsHidden { sheet_id, start, count, hidden } => {
                self.set_hidden(*sheet_id, Axis::Row, *start, *count, *hidden, ctx);
            }
            Command::SetColsHidden { sheet_id, start, count, hidden } => {
                self.set_hidden(*sheet_id, Axis::Col, *start, *count, *hidden, ctx);
            }
            Command::FreezePanes { sheet_id, rows, cols } => {
                let Some(data) = self.sheets.get_mut(sheet_id) else { return };
                if (data.frozen_rows, data.frozen_cols) != (*rows, *cols) {
                    ctx.record_inverse(Command::FreezePanes {
                        sheet_id: *sheet_id,
                        rows: data.frozen_rows,
                        cols: data.frozen_cols,
                    });
                    data.frozen_rows = *rows;
                    data.frozen_cols = *cols;
                }
            }
            _ => {}
        }
    }

    /// Activation and id allocation have no inverse.
    fn checkpoint(&self) -> Option<Box<dyn Any>> {
        Some(Box::new((self.active, self.next_id)))
    }

    fn restore(&mut self, checkpoint: Box<dyn Any>) {
        if let Ok(saved) = checkpoint.downcast::<(SheetId, u64)>() {
            (self.active, self.next_id) = *saved;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> Getters<'a> {
    fn sheets(&self) -> Option<&'a SheetPlugin> {
        self.plugin::<SheetPlugin>()
    }

    /// Sheet ids in display order.
    pub fn sheet_ids(&self) -> Vec<SheetId> {
        self.sheets().map(|p| p.order.clone()).unwrap_or_default()
    }

    pub fn sheet_exists(&self, sheet: SheetId) -> bool {
        self.sheets().map_or(false, |p| p.sheets.contains_key(&sheet))
    }

    pub fn sheet(&self, sheet: SheetId) -> Option<&'a SheetData> {
        self.sheets().and_then(|p| p.sheets.get(&sheet))
    }

    pub fn sheet_name(&self, sheet: SheetId) -> Option<&'a str> {
        self.sheet(sheet).map(|s| s.name.as_str())
    }

    /// Case-insensitive lookup by name.
    pub fn sheet_id_by_name(&self, name: &str) -> Option<SheetId> {
        self.sheets()?
            .sheets
            .iter()
            .find(|(_, s)| s.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
    }

    /// `(rows, cols)` of a sheet.
    pub fn sheet_size(&self, sheet: SheetId) -> Option<(usize, usize)> {
        self.sheet(sheet).map(|s| (s.rows, s.cols))
    }

    pub fn sheet_zone(&self, sheet: SheetId) -> Option<Zone> {
        self.sheet_size(sheet).map(|(rows, cols)| Zone::new(0, 0, rows - 1, cols - 1))
    }

    pub fn active_sheet(&self) -> SheetId {
        self.sheets().map_or(SheetId::from_raw(1), |p| p.active)
    }

    /// An id no existing or past sheet has used.
    pub fn next_sheet_id(&self) -> SheetId {
        SheetId::from_raw(self.sheets().map_or(2, |p| p.next_id))
    }

    pub fn is_row_hidden(&self, sheet: SheetId, row: usize) -> bool {
        self.sheet(sheet).map_or(false, |s| s.hidden_rows.contains(&row))
    }

    pub fn is_col_hidden(&self, sheet: SheetId, col: usize) -> bool {
        self.sheet(sheet).map_or(false, |s| s.hidden_cols.contains(&col))
    }

    /// `(rows, cols)` frozen at the top-left.
    pub fn frozen_panes(&self, sheet: SheetId) -> (usize, usize) {
        self.sheet(sheet).map_or((0, 0), |s| (s.frozen_rows, s.frozen_cols))
    }
}
