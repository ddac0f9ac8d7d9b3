//! Zones referenced by the formula being edited.

use std::any::Any;

use cellgrid_core::{SheetId, Zone};

use crate::command::Command;
use crate::formula::parser::scan_references;
use crate::formula::SheetRef;
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

/// Colors handed out in order of first appearance.
pub const HIGHLIGHT_PALETTE: [&str; 8] =
    ["#4285f4", "#ea4335", "#fbbc04", "#34a853", "#ff6d01", "#46bdc6", "#7baaf7", "#f07b72"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub sheet: SheetId,
    pub zone: Zone,
    pub color: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct HighlightPlugin {
    highlights: Vec<Highlight>,
}

impl HighlightPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn compute(getters: &Getters<'_>) -> Vec<Highlight> {
        let Some(edition) = getters.edition() else { return Vec::new() };
        let mut out: Vec<Highlight> = Vec::new();
        for reference in scan_references(&edition.content) {
            let sheet = match reference.sheet() {
                SheetRef::Current => Some(edition.sheet),
                SheetRef::Named(name) => getters.sheet_id_by_name(name),
            };
            let Some(sheet) = sheet else { continue };
            let Some((rows, cols)) = getters.sheet_size(sheet) else { continue };
            let Some(zone) = reference.zone().clamp_to(rows, cols) else { continue };
            if out.iter().any(|h| h.sheet == sheet && h.zone == zone) {
                continue;
            }
            let color = HIGHLIGHT_PALETTE[out.len() % HIGHLIGHT_PALETTE.len()];
            out.push(Highlight { sheet, zone, color });
        }
        out
    }
}

impl Plugin for HighlightPlugin {
    fn handle(&mut self, _cmd: &Command, _ctx: &mut ApplyContext<'_>) {}

    fn finalize(&mut self, ctx: &mut ApplyContext<'_>) {
        self.highlights = Self::compute(&ctx.getters);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> Getters<'a> {
    pub fn highlights(&self) -> &'a [Highlight] {
        self.plugin::<HighlightPlugin>().map_or(&[], |p| p.highlights.as_slice())
    }
}
