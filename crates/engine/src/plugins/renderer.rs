//! Render cache for the visible part of the active sheet.
//!
//! Each transaction rebuilds the cache from the getters, so it always agrees
//! with the model: display text, merged spans, effective style after
//! conditional formats.

use std::any::Any;

use cellgrid_core::{Position, SheetId, Zone};
use rustc_hash::FxHashMap;

use crate::cell::CellFormat;
use crate::command::Command;
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};
use crate::plugins::conditional_format::ConditionalStyle;

pub const DEFAULT_VIEWPORT_ROWS: usize = 40;
pub const DEFAULT_VIEWPORT_COLS: usize = 26;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCell {
    pub position: Position,
    pub text: String,
    pub style: CellFormat,
    /// Area covered when the cell anchors a merge
    pub span: Option<Zone>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCache {
    pub sheet: SheetId,
    pub viewport: Zone,
    /// Non-blank cells, row-major. Hidden headers are skipped.
    pub cells: Vec<RenderedCell>,
}

#[derive(Debug, Clone, Default)]
pub struct RendererPlugin {
    viewports: FxHashMap<SheetId, Zone>,
    cache: Option<RenderCache>,
}

fn apply_conditional(style: &mut CellFormat, conditional: &ConditionalStyle) {
    if let Some(bold) = conditional.bold {
        style.bold = bold;
    }
    if let Some(italic) = conditional.italic {
        style.italic = italic;
    }
    if let Some(strikethrough) = conditional.strikethrough {
        style.strikethrough = strikethrough;
    }
    if conditional.fill_color.is_some() {
        style.fill_color = conditional.fill_color.clone();
    }
    if conditional.text_color.is_some() {
        style.text_color = conditional.text_color.clone();
    }
}

impl RendererPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn viewport(&self, sheet: SheetId, rows: usize, cols: usize) -> Option<Zone> {
        match self.viewports.get(&sheet) {
            Some(zone) => zone.clamp_to(rows, cols),
            None if rows == 0 || cols == 0 => None,
            None => Some(Zone::new(0, 0, rows.min(DEFAULT_VIEWPORT_ROWS) - 1, cols.min(DEFAULT_VIEWPORT_COLS) - 1)),
        }
    }

    fn build(&self, getters: &Getters<'_>) -> Option<RenderCache> {
        let sheet = getters.active_sheet();
        let data = getters.sheet(sheet)?;
        let viewport = self.viewport(sheet, data.rows, data.cols)?;
        let merges: Vec<Zone> = getters.merges(sheet).into_iter().filter(|m| m.intersects(&viewport)).collect();

        let mut cells = Vec::new();
        for position in viewport.positions() {
            if data.hidden_rows.contains(&position.row) || data.hidden_cols.contains(&position.col) {
                continue;
            }
            let span = merges.iter().find(|m| m.contains(position)).copied();
            // A merge is drawn once, from its first visible cell
            let anchor = match span {
                Some(m) => {
                    let first = Position::new(m.top.max(viewport.top), m.left.max(viewport.left));
                    if position != first {
                        continue;
                    }
                    m.top_left()
                }
                None => position,
            };
            let text = getters.formatted_value(sheet, anchor);
            let mut style = getters.cell_format(sheet, anchor);
            if let Some(conditional) = getters.conditional_style(sheet, anchor) {
                apply_conditional(&mut style, conditional);
            }
            if text.is_empty() && style.is_default() && span.is_none() {
                continue;
            }
            cells.push(RenderedCell { position: anchor, text, style, span });
        }
        Some(RenderCache { sheet, viewport, cells })
    }
}

impl Plugin for RendererPlugin {
    fn handle(&mut self, cmd: &Command, _ctx: &mut ApplyContext<'_>) {
        match cmd {
            Command::SetViewport { sheet_id, zone } => {
                self.viewports.insert(*sheet_id, *zone);
            }
            Command::DeleteSheet { sheet_id } => {
                self.viewports.remove(sheet_id);
            }
            _ => {
                let Some((sheet, change)) = cmd.axis_change() else { return };
                let Some(zone) = self.viewports.get(&sheet).copied() else { return };
                match change.map_zone(&zone) {
                    Some(mapped) => self.viewports.insert(sheet, mapped),
                    None => self.viewports.remove(&sheet),
                };
            }
        }
    }

    fn finalize(&mut self, ctx: &mut ApplyContext<'_>) {
        self.cache = self.build(&ctx.getters);
    }

    fn checkpoint(&self) -> Option<Box<dyn Any>> {
        Some(Box::new(self.viewports.clone()))
    }

    fn restore(&mut self, checkpoint: Box<dyn Any>) {
        if let Ok(viewports) = checkpoint.downcast::<FxHashMap<SheetId, Zone>>() {
            self.viewports = *viewports;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> Getters<'a> {
    fn renderer(&self) -> Option<&'a RendererPlugin> {
        self.plugin::<RendererPlugin>()
    }

    /// Visible zone of a sheet, clamped to its current size.
    pub fn viewport(&self, sheet: SheetId) -> Option<Zone> {
        let (rows, cols) = self.sheet_size(sheet)?;
        self.renderer()?.viewport(sheet, rows, cols)
    }

    pub fn render_cache(&self) -> Option<&'a RenderCache> {
        self.renderer()?.cache.as_ref()
    }

    pub fn rendered_cell(&self, position: Position) -> Option<&'a RenderedCell> {
        self.render_cache()?.cells.iter().find(|c| c.position == position)
    }
}
