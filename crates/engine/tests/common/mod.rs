// Shared helpers for engine integration tests

#![allow(dead_code)]

use cellgrid_config::Settings;
use cellgrid_core::{Position, SheetId, Zone};
use cellgrid_engine::plugins::clipboard::ClipboardState;
use cellgrid_engine::plugins::conditional_format::ConditionalFormatRule;
use cellgrid_engine::plugins::edition::Edition;
use cellgrid_engine::plugins::figure::Figure;
use cellgrid_engine::plugins::find_replace::SearchMatch;
use cellgrid_engine::plugins::renderer::RenderCache;
use cellgrid_engine::plugins::selection::Selection;
use cellgrid_engine::plugins::selection_input::SelectionInput;
use cellgrid_engine::{CellFormat, CellValue, Command, DispatchResult, Model, Value};

pub const S1: SheetId = SheetId::from_raw(1);

pub fn model() -> Model {
    Model::new(Settings::default())
}

pub fn pos(a1: &str) -> Position {
    Position::parse(a1).unwrap()
}

pub fn zone(a1: &str) -> Zone {
    Zone::parse(a1).unwrap()
}

pub fn set(model: &mut Model, a1: &str, content: &str) -> DispatchResult {
    model.dispatch(Command::UpdateCell { sheet_id: S1, position: pos(a1), content: content.to_string() })
}

pub fn value(model: &Model, a1: &str) -> Value {
    model.getters().evaluated_value(S1, pos(a1))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetSnapshot {
    pub id: SheetId,
    pub name: String,
    pub size: Option<(usize, usize)>,
    pub cells: Vec<(Position, CellValue, Value)>,
    pub formats: Vec<(Position, CellFormat)>,
    pub merges: Vec<Zone>,
    pub conditional_formats: Vec<ConditionalFormatRule>,
    pub figures: Vec<Figure>,
}

/// Everything a host can observe about the workbook content.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub sheets: Vec<SheetSnapshot>,
    pub active: SheetId,
    pub locale: String,
}

pub fn snapshot(model: &Model) -> Snapshot {
    let getters = model.getters();
    let sheets = getters
        .sheet_ids()
        .into_iter()
        .map(|id| SheetSnapshot {
            id,
            name: getters.sheet_name(id).unwrap_or_default().to_string(),
            size: getters.sheet_size(id),
            cells: getters
                .cells(id)
                .into_iter()
                .map(|(p, content)| (p, content.clone(), getters.evaluated_value(id, p)))
                .collect(),
            formats: getters.sheet_formats(id),
            merges: getters.merges(id),
            conditional_formats: getters.conditional_formats(id),
            figures: getters.figures(id),
        })
        .collect();
    Snapshot { sheets, active: getters.active_sheet(), locale: getters.locale().code.clone() }
}

/// Selection input id the tests enable.
pub const INPUT: &str = "chart-range";

/// Workbook content plus the state undo leaves alone: selections,
/// composer, search, clipboard, inputs, viewports and caches.
#[derive(Debug, Clone, PartialEq)]
pub struct Observable {
    pub content: Snapshot,
    pub next_sheet_id: SheetId,
    pub selections: Vec<(SheetId, Selection, Option<Zone>)>,
    pub edition: Option<Edition>,
    pub search: (String, Vec<SearchMatch>, Option<(usize, SearchMatch)>),
    pub clipboard: Option<ClipboardState>,
    pub input: Option<SelectionInput>,
    pub focused_input: Option<(String, usize)>,
    pub last_autofill: Option<(SheetId, Zone)>,
    pub render_cache: Option<RenderCache>,
}

pub fn observable(model: &Model) -> Observable {
    let getters = model.getters();
    Observable {
        content: snapshot(model),
        next_sheet_id: getters.next_sheet_id(),
        selections: getters
            .sheet_ids()
            .into_iter()
            .map(|id| (id, getters.selection(id), getters.viewport(id)))
            .collect(),
        edition: getters.edition().cloned(),
        search: (
            getters.search_query().to_string(),
            getters.search_matches().to_vec(),
            getters.current_search_match(),
        ),
        clipboard: getters.clipboard().cloned(),
        input: getters.selection_input(INPUT).cloned(),
        focused_input: getters.focused_selection_input().map(|(id, index)| (id.to_string(), index)),
        last_autofill: getters.last_autofill(),
        render_cache: getters.render_cache().cloned(),
    }
}
