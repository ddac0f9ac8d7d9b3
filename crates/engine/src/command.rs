//! Commands: the only way to mutate a model.
//!
//! A command is a fully specified description of one intended mutation.
//! On the wire it is a JSON object tagged by `"type"`:
//!
//! ```json
//! {"type":"UPDATE_CELL","sheet_id":1,"position":"A1","content":"10"}
//! ```

use cellgrid_config::Locale;
use cellgrid_core::{Axis, AxisChange, ChangeKind, Position, SheetId, Zone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::{CellFormat, CellValue, FormatPatch};
use crate::plugins::conditional_format::ConditionalFormatRule;
use crate::plugins::figure::Figure;
use crate::plugins::find_replace::{SearchDirection, SearchOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    // Settings
    UpdateLocale {
        locale: Locale,
    },

    // Sheets
    CreateSheet {
        sheet_id: SheetId,
        name: String,
        /// Index in the sheet order, defaults to the end
        #[serde(default)]
        position: Option<usize>,
        #[serde(default)]
        rows: Option<usize>,
        #[serde(default)]
        cols: Option<usize>,
    },
    DeleteSheet {
        sheet_id: SheetId,
    },
    RenameSheet {
        sheet_id: SheetId,
        name: String,
    },
    MoveSheet {
        sheet_id: SheetId,
        delta: i64,
    },
    ActivateSheet {
        sheet_id: SheetId,
    },
    InsertRows {
        sheet_id: SheetId,
        start: usize,
        count: usize,
    },
    DeleteRows {
        sheet_id: SheetId,
        start: usize,
        count: usize,
    },
    InsertCols {
        sheet_id: SheetId,
        start: usize,
        count: usize,
    },
    DeleteCols {
        sheet_id: SheetId,
        start: usize,
        count: usize,
    },
    SetRowsHidden {
        sheet_id: SheetId,
        start: usize,
        count: usize,
        hidden: bool,
    },
    SetColsHidden {
        sheet_id: SheetId,
        start: usize,
        count: usize,
        hidden: bool,
    },
    FreezePanes {
        sheet_id: SheetId,
        rows: usize,
        cols: usize,
    },

    // Cells
    /// User input, interpreted with the active locale.
    UpdateCell {
        sheet_id: SheetId,
        position: Position,
        content: String,
    },
    /// Exact canonical content. `None` empties the cell.
    SetCellContent {
        sheet_id: SheetId,
        position: Position,
        #[serde(default)]
        content: Option<CellValue>,
    },
    DeleteContent {
        sheet_id: SheetId,
        zones: Vec<Zone>,
    },
    TrimWhitespace {
        sheet_id: SheetId,
        zones: Vec<Zone>,
    },

    // Evaluation
    EvaluateAll,

    // Merges
    AddMerge {
        sheet_id: SheetId,
        zone: Zone,
        #[serde(default)]
        force: bool,
    },
    RemoveMerge {
        sheet_id: SheetId,
        zone: Zone,
    },
    /// Replace every merge of the sheet.
    RestoreMerges {
        sheet_id: SheetId,
        merges: Vec<Zone>,
    },

    // Formatting
    SetFormatting {
        sheet_id: SheetId,
        zones: Vec<Zone>,
        format: FormatPatch,
    },
    ClearFormatting {
        sheet_id: SheetId,
        zones: Vec<Zone>,
    },
    /// Reset formats inside `zone` (the whole sheet when absent), then set `formats`.
    RestoreFormats {
        sheet_id: SheetId,
        #[serde(default)]
        zone: Option<Zone>,
        formats: Vec<(Position, CellFormat)>,
    },

    // Conditional formats
    AddConditionalFormat {
        sheet_id: SheetId,
        rule: ConditionalFormatRule,
    },
    RemoveConditionalFormat {
        sheet_id: SheetId,
        id: String,
    },
    RestoreConditionalFormats {
        sheet_id: SheetId,
        rules: Vec<ConditionalFormatRule>,
    },

    // Figures
    CreateFigure {
        sheet_id: SheetId,
        figure: Figure,
        #[serde(default)]
        index: Option<usize>,
    },
    UpdateFigure {
        sheet_id: SheetId,
        figure: Figure,
    },
    DeleteFigure {
        sheet_id: SheetId,
        id: String,
    },

    // Selection
    SelectCell {
        sheet_id: SheetId,
        position: Position,
    },
    SetSelection {
        sheet_id: SheetId,
        anchor: Position,
        zones: Vec<Zone>,
    },
    MoveSelection {
        sheet_id: SheetId,
        d_row: i64,
        d_col: i64,
        #[serde(default)]
        extend: bool,
    },

    // Selection inputs
    EnableSelectionInput {
        id: String,
        #[serde(default)]
        ranges: Vec<String>,
        #[serde(default)]
        max_ranges: Option<usize>,
    },
    DisableSelectionInput {
        id: String,
    },
    FocusSelectionInput {
        id: String,
        index: usize,
    },
    ChangeInputRange {
        id: String,
        index: usize,
        range: String,
    },
    AddInputRange {
        id: String,
    },
    RemoveInputRange {
        id: String,
        index: usize,
    },

    // Clipboard
    Copy {
        sheet_id: SheetId,
        zone: Zone,
    },
    Cut {
        sheet_id: SheetId,
        zone: Zone,
    },
    Paste {
        sheet_id: SheetId,
        target: Position,
        #[serde(default)]
        values_only: bool,
    },

    // Edition
    StartEdition {
        #[serde(default)]
        text: Option<String>,
    },
    SetCurrentContent {
        content: String,
    },
    StopEdition {
        #[serde(default)]
        cancel: bool,
    },

    // Autofill
    AutoFill {
        sheet_id: SheetId,
        source: Zone,
        target: Zone,
    },

    // Find & replace
    UpdateSearch {
        query: String,
        #[serde(default)]
        options: SearchOptions,
    },
    SelectSearchMatch {
        #[serde(default)]
        direction: SearchDirection,
    },
    ReplaceSearchMatch {
        replacement: String,
    },
    ReplaceAll {
        replacement: String,
    },
    ClearSearch,

    // Rendering
    SetViewport {
        sheet_id: SheetId,
        zone: Zone,
    },

    /// Several commands applied as one transaction and one history entry.
    Batch {
        commands: Vec<Command>,
    },
}

impl Command {
    /// Wire name, e.g. `"UPDATE_CELL"`.
    pub fn name(&self) -> &'static str {
        match self {
            Command::UpdateLocale { .. } => "UPDATE_LOCALE",
            Command::CreateSheet { .. } => "CREATE_SHEET",
            Command::DeleteSheet { .. } => "DELETE_SHEET",
            Command::RenameSheet { .. } => "RENAME_SHEET",
            Command::MoveSheet { .. } => "MOVE_SHEET",
            Command::ActivateSheet { .. } => "ACTIVATE_SHEET",
            Command::InsertRows { .. } => "INSERT_ROWS",
            Command::DeleteRows { .. } => "DELETE_ROWS",
            Command::InsertCols { .. } => "INSERT_COLS",
            Command::DeleteCols { .. } => "DELETE_COLS",
            Command::SetRowsHidden { .. } => "SET_ROWS_HIDDEN",
            Command::SetColsHidden { .. } => "SET_COLS_HIDDEN",
            Command::FreezePanes { .. } => "FREEZE_PANES",
            Command::UpdateCell { .. } => "UPDATE_CELL",
            Command::SetCellContent { .. } => "SET_CELL_CONTENT",
            Command::DeleteContent { .. } => "DELETE_CONTENT",
            Command::TrimWhitespace { .. } => "TRIM_WHITESPACE",
            Command::EvaluateAll => "EVALUATE_ALL",
            Command::AddMerge { .. } => "ADD_MERGE",
            Command::RemoveMerge { .. } => "REMOVE_MERGE",
            Command::RestoreMerges { .. } => "RESTORE_MERGES",
            Command::SetFormatting { .. } => "SET_FORMATTING",
            Command::ClearFormatting { .. } => "CLEAR_FORMATTING",
            Command::RestoreFormats { .. } => "RESTORE_FORMATS",
            Command::AddConditionalFormat { .. } => "ADD_CONDITIONAL_FORMAT",
            Command::RemoveConditionalFormat { .. } => "REMOVE_CONDITIONAL_FORMAT",
            Command::RestoreConditionalFormats { .. } => "RESTORE_CONDITIONAL_FORMATS",
            Command::CreateFigure { .. } => "CREATE_FIGURE",
            Command::UpdateFigure { .. } => "UPDATE_FIGURE",
            Command::DeleteFigure { .. } => "DELETE_FIGURE",
            Command::SelectCell { .. } => "SELECT_CELL",
            Command::SetSelection { .. } => "SET_SELECTION",
            Command::MoveSelection { .. } => "MOVE_SELECTION",
            Command::EnableSelectionInput { .. } => "ENABLE_SELECTION_INPUT",
            Command::DisableSelectionInput { .. } => "DISABLE_SELECTION_INPUT",
            Command::FocusSelectionInput { .. } => "FOCUS_SELECTION_INPUT",
            Command::ChangeInputRange { .. } => "CHANGE_INPUT_RANGE",
            Command::AddInputRange { .. } => "ADD_INPUT_RANGE",
            Command::RemoveInputRange { .. } => "REMOVE_INPUT_RANGE",
            Command::Copy { .. } => "COPY",
            Command::Cut { .. } => "CUT",
            Command::Paste { .. } => "PASTE",
            Command::StartEdition { .. } => "START_EDITION",
            Command::SetCurrentContent { .. } => "SET_CURRENT_CONTENT",
            Command::StopEdition { .. } => "STOP_EDITION",
            Command::AutoFill { .. } => "AUTO_FILL",
            Command::UpdateSearch { .. } => "UPDATE_SEARCH",
            Command::SelectSearchMatch { .. } => "SELECT_SEARCH_MATCH",
            Command::ReplaceSearchMatch { .. } => "REPLACE_SEARCH_MATCH",
            Command::ReplaceAll { .. } => "REPLACE_ALL",
            Command::ClearSearch => "CLEAR_SEARCH",
            Command::SetViewport { .. } => "SET_VIEWPORT",
            Command::Batch { .. } => "BATCH",
        }
    }

    /// Whether a committed command of this type creates a history entry.
    pub fn is_undoable(&self) -> bool {
        !matches!(
            self,
            Command::ActivateSheet { .. }
                | Command::EvaluateAll
                | Command::SelectCell { .. }
                | Command::SetSelection { .. }
                | Command::MoveSelection { .. }
                | Command::EnableSelectionInput { .. }
                | Command::DisableSelectionInput { .. }
                | Command::FocusSelectionInput { .. }
                | Command::ChangeInputRange { .. }
                | Command::AddInputRange { .. }
                | Command::RemoveInputRange { .. }
                | Command::Copy { .. }
                | Command::Cut { .. }
                | Command::StartEdition { .. }
                | Command::SetCurrentContent { .. }
                | Command::UpdateSearch { .. }
                | Command::SelectSearchMatch { .. }
                | Command::ClearSearch
                | Command::SetViewport { .. }
        )
    }

    /// Sheet the command targets, for sheet-scoped commands.
    pub fn sheet_id(&self) -> Option<SheetId> {
        match self {
            Command::CreateSheet { sheet_id, .. }
            | Command::DeleteSheet { sheet_id }
            | Command::RenameSheet { sheet_id, .. }
            | Command::MoveSheet { sheet_id, .. }
            | Command::ActivateSheet { sheet_id }
            | Command::InsertRows { sheet_id, .. }
            | Command::DeleteRows { sheet_id, .. }
            | Command::InsertCols { sheet_id, .. }
            | Command::DeleteCols { sheet_id, .. }
            | Command::SetRowsHidden { sheet_id, .. }
            | Command::SetColsHidden { sheet_id, .. }
            | Command::FreezePanes { sheet_id, .. }
            | Command::UpdateCell { sheet_id, .. }
            | Command::SetCellContent { sheet_id, .. }
            | Command::DeleteContent { sheet_id, .. }
            | Command::TrimWhitespace { sheet_id, .. }
            | Command::AddMerge { sheet_id, .. }
            | Command::RemoveMerge { sheet_id, .. }
            | Command::RestoreMerges { sheet_id, .. }
            | Command::SetFormatting { sheet_id, .. }
            | Command::ClearFormatting { sheet_id, .. }
            | Command::RestoreFormats { sheet_id, .. }
            | Command::AddConditionalFormat { sheet_id, .. }
            | Command::RemoveConditionalFormat { sheet_id, .. }
            | Command::RestoreConditionalFormats { sheet_id, .. }
            | Command::CreateFigure { sheet_id, .. }
            | Command::UpdateFigure { sheet_id, .. }
            | Command::DeleteFigure { sheet_id, .. }
            | Command::SelectCell { sheet_id, .. }
            | Command::SetSelection { sheet_id, .. }
            | Command::MoveSelection { sheet_id, .. }
            | Command::Copy { sheet_id, .. }
            | Command::Cut { sheet_id, .. }
            | Command::Paste { sheet_id, .. }
            | Command::AutoFill { sheet_id, .. }
            | Command::SetViewport { sheet_id, .. } => Some(*sheet_id),
            _ => None,
        }
    }

    /// Whether the command has a `force` flag that bypasses confirmable rejections.
    pub fn supports_force(&self) -> bool {
        matches!(self, Command::AddMerge { .. })
    }

    pub fn forced(&self) -> bool {
        matches!(self, Command::AddMerge { force: true, .. })
    }

    /// The same command with `force` set. Commands without the flag are returned unchanged.
    pub fn with_force(self) -> Command {
        match self {
            Command::AddMerge { sheet_id, zone, .. } => Command::AddMerge { sheet_id, zone, force: true },
            other => other,
        }
    }

    /// Structural change described by a row/column insert or delete.
    pub fn axis_change(&self) -> Option<(SheetId, AxisChange)> {
        let (sheet_id, axis, kind, start, count) = match *self {
            Command::InsertRows { sheet_id, start, count } => (sheet_id, Axis::Row, ChangeKind::Insert, start, count),
            Command::DeleteRows { sheet_id, start, count } => (sheet_id, Axis::Row, ChangeKind::Delete, start, count),
            Command::InsertCols { sheet_id, start, count } => (sheet_id, Axis::Col, ChangeKind::Insert, start, count),
            Command::DeleteCols { sheet_id, start, count } => (sheet_id, Axis::Col, ChangeKind::Delete, start, count),
            _ => return None,
        };
        Some((sheet_id, AxisChange { axis, kind, start, count }))
    }

    /// Command performing a structural change.
    pub fn from_axis_change(sheet_id: SheetId, change: AxisChange) -> Command {
        let AxisChange { start, count, .. } = change;
        match (change.axis, change.kind) {
            (Axis::Row, ChangeKind::Insert) => Command::InsertRows { sheet_id, start, count },
            (Axis::Row, ChangeKind::Delete) => Command::DeleteRows { sheet_id, start, count },
            (Axis::Col, ChangeKind::Insert) => Command::InsertCols { sheet_id, start, count },
            (Axis::Col, ChangeKind::Delete) => Command::DeleteCols { sheet_id, start, count },
        }
    }

    pub fn set_content(sheet_id: SheetId, position: Position, content: Option<CellValue>) -> Command {
        Command::SetCellContent { sheet_id, position, content }
    }
}

/// Why a command was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CancelledReason {
    #[error("sheet does not exist")]
    InvalidSheetId,
    #[error("a sheet with this id already exists")]
    DuplicateSheetId,
    #[error("a sheet with this name already exists")]
    DuplicateSheetName,
    #[error("invalid sheet name")]
    InvalidSheetName,
    #[error("a workbook needs at least one sheet")]
    NotEnoughSheets,
    #[error("sheet position out of range")]
    WrongSheetPosition,
    #[error("target is outside the sheet")]
    TargetOutOfSheet,
    #[error("no target zones given")]
    EmptyTarget,
    #[error("count must be at least 1")]
    InvalidCount,
    #[error("cannot delete every row or column")]
    NotEnoughElements,
    #[error("cannot hide every row or column")]
    TooManyHiddenElements,
    #[error("locale separators are invalid")]
    InvalidLocale,
    #[error("merging would delete the content of non top-left cells")]
    MergeIsDestructive,
    #[error("merge overlaps an existing merge")]
    MergeOverlap,
    #[error("a merge needs at least two cells")]
    InvalidMergeZone,
    #[error("no such merge")]
    MergeNotFound,
    #[error("clipboard is empty")]
    EmptyClipboard,
    #[error("no cell is being edited")]
    NotEditing,
    #[error("a conditional format with this id already exists")]
    DuplicateConditionalFormatId,
    #[error("invalid conditional format")]
    InvalidConditionalFormat,
    #[error("no such conditional format")]
    ConditionalFormatNotFound,
    #[error("a figure with this id already exists")]
    DuplicateFigureId,
    #[error("no such figure")]
    FigureNotFound,
    #[error("invalid chart definition")]
    InvalidChartDefinition,
    #[error("invalid figure geometry")]
    InvalidFigureGeometry,
    #[error("autofill target must extend the source in one direction")]
    InvalidAutofillTarget,
    #[error("no search match")]
    NoSearchMatch,
    #[error("unknown selection input or range")]
    UnknownSelectionInput,
    #[error("selection input already exists")]
    DuplicateSelectionInput,
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl CancelledReason {
    /// Reasons a human may override by confirming; the command is then re-issued with `force`.
    pub fn is_confirmable(&self) -> bool {
        matches!(self, CancelledReason::MergeIsDestructive)
    }

    /// Question asked on the confirmation channel.
    pub fn confirmation_message(&self) -> Option<&'static str> {
        match self {
            CancelledReason::MergeIsDestructive => {
                Some("Merging these cells will only preserve the top-leftmost value. Merge anyway?")
            }
            _ => None,
        }
    }
}

/// A rejected command with every reason reported by every plugin.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("command rejected: {}", join_reasons(.reasons))]
pub struct Cancelled {
    pub reasons: Vec<CancelledReason>,
}

fn join_reasons(reasons: &[CancelledReason]) -> String {
    reasons.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl Cancelled {
    pub fn new(reasons: Vec<CancelledReason>) -> Self {
        Self { reasons }
    }

    pub fn contains(&self, reason: &CancelledReason) -> bool {
        self.reasons.contains(reason)
    }

    /// True when every reason can be overridden by confirmation.
    pub fn is_confirmable(&self) -> bool {
        !self.reasons.is_empty() && self.reasons.iter().all(CancelledReason::is_confirmable)
    }
}

impl From<CancelledReason> for Cancelled {
    fn from(reason: CancelledReason) -> Self {
        Self { reasons: vec![reason] }
    }
}

pub type DispatchResult = Result<(), Cancelled>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let cmd = Command::UpdateCell {
            sheet_id: SheetId::from_raw(1),
            position: Position::new(0, 0),
            content: "10".into(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "UPDATE_CELL");
        assert_eq!(json["sheet_id"], 1);
        assert_eq!(json["position"], serde_json::json!({ "row": 0, "col": 0 }));

        let parsed: Command = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, cmd);
    }

    #[test]
    fn test_a1_positions_and_defaults() {
        let cmd: Command =
            serde_json::from_str(r#"{"type":"ADD_MERGE","sheet_id":1,"zone":"A1:B2"}"#).unwrap();
        assert_eq!(cmd, Command::AddMerge { sheet_id: SheetId::from_raw(1), zone: Zone::new(0, 0, 1, 1), force: false });
        assert!(cmd.supports_force());
        assert!(!cmd.forced());
        assert!(cmd.with_force().forced());
    }

    #[test]
    fn test_names_match_tags() {
        let cmds = [
            Command::EvaluateAll,
            Command::ClearSearch,
            Command::StopEdition { cancel: true },
            Command::Batch { commands: vec![] },
        ];
        for cmd in cmds {
            let json = serde_json::to_value(&cmd).unwrap();
            assert_eq!(json["type"], cmd.name());
        }
    }

    #[test]
    fn test_axis_change_round_trip() {
        let sheet = SheetId::from_raw(3);
        let cmd = Command::DeleteCols { sheet_id: sheet, start: 2, count: 4 };
        let (s, change) = cmd.axis_change().unwrap();
        assert_eq!(s, sheet);
        assert_eq!(Command::from_axis_change(s, change.inverse()), Command::InsertCols { sheet_id: sheet, start: 2, count: 4 });
    }

    #[test]
    fn test_undoable_classification() {
        assert!(!Command::SelectCell { sheet_id: SheetId::from_raw(1), position: Position::new(0, 0) }.is_undoable());
        assert!(!Command::EvaluateAll.is_undoable());
        assert!(Command::Paste { sheet_id: SheetId::from_raw(1), target: Position::new(0, 0), values_only: false }.is_undoable());
    }

    #[test]
    fn test_cancelled_display_and_confirmable() {
        let c = Cancelled::new(vec![CancelledReason::MergeIsDestructive]);
        assert!(c.is_confirmable());
        assert_eq!(c.to_string(), "command rejected: merging would delete the content of non top-left cells");

        let mixed = Cancelled::new(vec![CancelledReason::MergeIsDestructive, CancelledReason::MergeOverlap]);
        assert!(!mixed.is_confirmable());
        assert_eq!(
            serde_json::to_value(CancelledReason::InvalidPayload("x".into())).unwrap(),
            serde_json::json!({ "InvalidPayload": "x" })
        );
    }
}
