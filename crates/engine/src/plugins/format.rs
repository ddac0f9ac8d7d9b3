//! Per-cell formatting and display text.

use std::any::Any;
use std::collections::BTreeMap;

use cellgrid_core::{AxisChange, Position, SheetId, Zone};
use rustc_hash::FxHashMap;

use crate::cell::{format_value, CellFormat, FormatPatch, NumberFormat};
use crate::command::Command;
use crate::formula::Value;
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

type SheetFormats = BTreeMap<Position, CellFormat>;

#[derive(Debug, Clone, Default)]
pub struct FormatPlugin {
    formats: FxHashMap<SheetId, SheetFormats>,
}

/// Smallest zone covering all of `zones`.
fn bounding(zones: &[Zone]) -> Option<Zone> {
    let (first, rest) = zones.split_first()?;
    Some(rest.iter().fold(*first, |acc, z| acc.union(z)))
}

impl FormatPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, sheet: SheetId, zone: Option<Zone>) -> Vec<(Position, CellFormat)> {
        let Some(formats) = self.formats.get(&sheet) else { return Vec::new() };
        formats
            .iter()
            .filter(|(p, _)| zone.map_or(true, |z| z.contains(**p)))
            .map(|(p, f)| (*p, f.clone()))
            .collect()
    }

    /// Record a restore of `zone`, the whole sheet when `None`.
    fn record_restore(&self, sheet: SheetId, zone: Option<Zone>, ctx: &mut ApplyContext<'_>) {
        ctx.record_inverse(Command::RestoreFormats { sheet_id: sheet, zone, formats: self.snapshot(sheet, zone) });
    }

    fn patch(&mut self, sheet: SheetId, zones: &[Zone], patch: &FormatPatch, ctx: &mut ApplyContext<'_>) {
        let Some(area) = bounding(zones) else { return };
        self.record_restore(sheet, Some(area), ctx);
        let formats = self.formats.entry(sheet).or_default();
        for zone in zones {
            for position in zone.positions() {
                let mut format = formats.remove(&position).unwrap_or_default();
                patch.apply_to(&mut format);
                if !format.is_default() {
                    formats.insert(position, format);
                }
            }
        }
    }

    fn clear(&mut self, sheet: SheetId, zones: &[Zone], ctx: &mut ApplyContext<'_>) {
        let Some(area) = bounding(zones) else { return };
        let touched = self.snapshot(sheet, Some(area)).into_iter().any(|(p, _)| zones.iter().any(|z| z.contains(p)));
        if !touched {
            return;
        }
        self.record_restore(sheet, Some(area), ctx);
        if let Some(formats) = self.formats.get_mut(&sheet) {
            formats.retain(|p, _| !zones.iter().any(|z| z.contains(*p)));
        }
    }

    fn restore(&mut self, sheet: SheetId, zone: Option<Zone>, restored: &[(Position, CellFormat)], ctx: &mut ApplyContext<'_>) {
        self.record_restore(sheet, zone, ctx);
        let formats = self.formats.entry(sheet).or_default();
        match zone {
            Some(z) => formats.retain(|p, _| !z.contains(*p)),
            None => formats.clear(),
        }
        for (position, format) in restored {
            if !format.is_default() {
                formats.insert(*position, format.clone());
            }
        }
    }

    fn shift(&mut self, sheet: SheetId, change: AxisChange, ctx: &mut ApplyContext<'_>) {
        if self.formats.get(&sheet).map_or(true, BTreeMap::is_empty) {
            return;
        }
        self.record_restore(sheet, None, ctx);
        if let Some(formats) = self.formats.get_mut(&sheet) {
            *formats = std::mem::take(formats)
                .into_iter()
                .filter_map(|(p, f)| change.map_position(p).map(|p| (p, f)))
                .collect();
        }
    }
}

impl Plugin for FormatPlugin {
    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        match cmd {
            Command::SetFormatting { sheet_id, zones, format } => self.patch(*sheet_id, zones, format, ctx),
            Command::ClearFormatting { sheet_id, zones } => self.clear(*sheet_id, zones, ctx),
            Command::RestoreFormats { sheet_id, zone, formats } => self.restore(*sheet_id, *zone, formats, ctx),
            Command::DeleteSheet { sheet_id } => {
                if self.formats.get(sheet_id).map_or(false, |f| !f.is_empty()) {
                    self.record_restore(*sheet_id, None, ctx);
                }
                self.formats.remove(sheet_id);
            }
            _ => {
                if let Some((sheet, change)) = cmd.axis_change() {
                    self.shift(sheet, change, ctx);
                }
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> Getters<'a> {
    fn format_plugin(&self) -> Option<&'a FormatPlugin> {
        self.plugin::<FormatPlugin>()
    }

    /// Format of a cell; the default format when unformatted.
    pub fn cell_format(&self, sheet: SheetId, position: Position) -> CellFormat {
        self.format_plugin()
            .and_then(|p| p.formats.get(&sheet))
            .and_then(|f| f.get(&position))
            .cloned()
            .unwrap_or_default()
    }

    pub fn number_format(&self, sheet: SheetId, position: Position) -> NumberFormat {
        self.format_plugin()
            .and_then(|p| p.formats.get(&sheet))
            .and_then(|f| f.get(&position))
            .map_or(NumberFormat::General, |f| f.number_format)
    }

    /// Formatted cells of a sheet in row-major order.
    pub fn sheet_formats(&self, sheet: SheetId) -> Vec<(Position, CellFormat)> {
        self.format_plugin().map(|p| p.snapshot(sheet, None)).unwrap_or_default()
    }

    /// Text displayed for a cell: the evaluated value under its number format
    /// and the active locale.
    pub fn formatted_value(&self, sheet: SheetId, position: Position) -> String {
        match self.evaluated_value(sheet, position) {
            Value::Empty => String::new(),
            value => format_value(&value, &self.number_format(sheet, position), self.locale()),
        }
    }
}
