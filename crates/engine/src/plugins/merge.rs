//! Merged cell zones.
//!
//! Merges on one sheet never overlap. A merge displays its top-left cell;
//! the other cells' content is deleted when the merge is added, which is
//! why adding over content is rejected unless forced.

use std::any::Any;

use cellgrid_core::{Position, SheetId, Zone};
use rustc_hash::FxHashMap;

use crate::command::{CancelledReason, Command};
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

#[derive(Debug, Clone, Default)]
pub struct MergePlugin {
    merges: FxHashMap<SheetId, Vec<Zone>>,
}

/// The part of `zone` outside its top-left cell, as at most two zones.
fn covered_part(zone: &Zone) -> Vec<Zone> {
    let mut out = Vec::new();
    if zone.right > zone.left {
        out.push(Zone::new(zone.top, zone.left + 1, zone.top, zone.right));
    }
    if zone.bottom > zone.top {
        out.push(Zone::new(zone.top + 1, zone.left, zone.bottom, zone.right));
    }
    out
}

impl MergePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn sheet_merges(&self, sheet: SheetId) -> &[Zone] {
        self.merges.get(&sheet).map_or(&[], Vec::as_slice)
    }

    fn replace(&mut self, sheet: SheetId, mut merges: Vec<Zone>, ctx: &mut ApplyContext<'_>) {
        merges.sort_by_key(|z| (z.top, z.left));
        let old = self.merges.remove(&sheet).unwrap_or_default();
        if old != merges {
            ctx.record_inverse(Command::RestoreMerges { sheet_id: sheet, merges: old });
        }
        if !merges.is_empty() {
            self.merges.insert(sheet, merges);
        }
    }
}

impl Plugin for MergePlugin {
    fn allow_dispatch(&self, cmd: &Command, getters: &Getters<'_>) -> Result<(), CancelledReason> {
        match cmd {
            Command::AddMerge { sheet_id, zone, force } => {
                if zone.is_single_cell() {
                    return Err(CancelledReason::InvalidMergeZone);
                }
                if self.sheet_merges(*sheet_id).iter().any(|m| m.intersects(zone)) {
                    return Err(CancelledReason::MergeOverlap);
                }
                let top_left = zone.top_left();
                let destructive = getters.cells_in_zone(*sheet_id, *zone).iter().any(|(p, _)| *p != top_left);
                if destructive && !force {
                    return Err(CancelledReason::MergeIsDestructive);
                }
                Ok(())
            }
            Command::RemoveMerge { sheet_id, zone } if !self.sheet_merges(*sheet_id).contains(zone) => {
                Err(CancelledReason::MergeNotFound)
            }
            Command::RestoreMerges { merges, .. } => {
                let overlapping = merges.iter().enumerate().any(|(i, a)| merges[i + 1..].iter().any(|b| a.intersects(b)));
                if overlapping {
                    Err(CancelledReason::MergeOverlap)
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        match cmd {
            Command::AddMerge { sheet_id, zone, .. } => {
                let mut merges = self.sheet_merges(*sheet_id).to_vec();
                merges.push(*zone);
                self.replace(*sheet_id, merges, ctx);
                let covered = covered_part(zone);
                let has_content = covered.iter().any(|z| !ctx.getters.cells_in_zone(*sheet_id, *z).is_empty());
                if has_content {
                    log::debug!("merge {} clears covered content", zone);
                    ctx.queue(Command::DeleteContent { sheet_id: *sheet_id, zones: covered });
                }
            }
            Command::RemoveMerge { sheet_id, zone } => {
                let merges = self.sheet_merges(*sheet_id).iter().filter(|m| *m != zone).copied().collect();
                self.replace(*sheet_id, merges, ctx);
            }
            Command::RestoreMerges { sheet_id, merges } => self.replace(*sheet_id, merges.clone(), ctx),
            Command::DeleteSheet { sheet_id } => self.replace(*sheet_id, Vec::new(), ctx),
            _ => {
                let Some((sheet, change)) = cmd.axis_change() else { return };
                if self.sheet_merges(sheet).is_empty() {
                    return;
                }
                let merges = self
                    .sheet_merges(sheet)
                    .iter()
                    .filter_map(|z| change.map_zone(z))
                    .filter(|z| !z.is_single_cell())
                    .collect();
                self.replace(sheet, merges, ctx);
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> Getters<'a> {
    fn merge_plugin(&self) -> Option<&'a MergePlugin> {
        self.plugin::<MergePlugin>()
    }

    /// Merges of a sheet ordered by top-left cell.
    pub fn merges(&self, sheet: SheetId) -> Vec<Zone> {
        self.merge_plugin().map(|p| p.sheet_merges(sheet).to_vec()).unwrap_or_default()
    }

    /// The merge containing `position`, if any.
    pub fn merge_at(&self, sheet: SheetId, position: Position) -> Option<Zone> {
        self.merge_plugin()?.sheet_merges(sheet).iter().find(|z| z.contains(position)).copied()
    }

    /// True for cells hidden under a merge (every merged cell but the top-left).
    pub fn is_merge_covered(&self, sheet: SheetId, position: Position) -> bool {
        self.merge_at(sheet, position).map_or(false, |z| z.top_left() != position)
    }

    /// Grow `zone` until it cuts no merge.
    pub fn expand_to_merges(&self, sheet: SheetId, zone: Zone) -> Zone {
        let Some(plugin) = self.merge_plugin() else { return zone };
        let merges = plugin.sheet_merges(sheet);
        let mut out = zone;
        loop {
            let grown = merges.iter().filter(|m| m.intersects(&out)).fold(out, |acc, m| acc.union(m));
            if grown == out {
                return out;
            }
            out = grown;
        }
    }
}
