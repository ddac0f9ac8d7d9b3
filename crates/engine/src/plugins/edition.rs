//! Composer state: the text being typed into the active cell.

use std::any::Any;

use cellgrid_core::{Position, SheetId};

use crate::command::{CancelledReason, Command};
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edition {
    pub sheet: SheetId,
    pub position: Position,
    pub content: String,
    /// Cell text when the edition started
    pub initial: String,
}

#[derive(Debug, Clone, Default)]
pub struct EditionPlugin {
    edition: Option<Edition>,
}

impl EditionPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for EditionPlugin {
    fn allow_dispatch(&self, cmd: &Command, _getters: &Getters<'_>) -> Result<(), CancelledReason> {
        match cmd {
            Command::SetCurrentContent { .. } | Command::StopEdition { .. } if self.edition.is_none() => {
                Err(CancelledReason::NotEditing)
            }
            _ => Ok(()),
        }
    }

    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        match cmd {
            Command::StartEdition { text } => {
                let (sheet, anchor) = ctx.getters.active_position();
                let position = ctx.getters.merge_at(sheet, anchor).map_or(anchor, |m| m.top_left());
                let initial = ctx.getters.cell_text(sheet, position);
                let content = text.clone().unwrap_or_else(|| initial.clone());
                self.edition = Some(Edition { sheet, position, content, initial });
            }
            Command::SetCurrentContent { content } => {
                if let Some(edition) = self.edition.as_mut() {
                    edition.content = content.clone();
                }
            }
            Command::StopEdition { cancel } => {
                let Some(edition) = self.edition.take() else { return };
                if !cancel && edition.content != edition.initial {
                    ctx.queue(Command::UpdateCell {
                        sheet_id: edition.sheet,
                        position: edition.position,
                        content: edition.content,
                    });
                }
            }
            Command::DeleteSheet { sheet_id } => {
                if self.edition.as_ref().map_or(false, |e| e.sheet == *sheet_id) {
                    log::debug!("edited sheet deleted, edition cancelled");
                    self.edition = None;
                }
            }
            _ => {
                let Some((sheet, change)) = cmd.axis_change() else { return };
                let Some(edition) = self.edition.as_mut().filter(|e| e.sheet == sheet) else { return };
                match change.map_position(edition.position) {
                    Some(position) => edition.position = position,
                    None => self.edition = None,
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
    pub fn edition(&self) -> Option<&'a Edition> {
        self.plugin::<EditionPlugin>()?.edition.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.edition().is_some()
    }

    /// Composer text; empty when not editing.
    pub fn current_content(&self) -> &'a str {
        self.edition().map_or("", |e| e.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Value;
    use crate::plugins::test_util::*;

    fn start(m: &mut crate::model::Model, text: Option<&str>) {
        m.dispatch(Command::StartEdition { text: text.map(str::to_string) }).unwrap();
    }

    fn type_text(m: &mut crate::model::Model, content: &str) {
        m.dispatch(Command::SetCurrentContent { content: content.into() }).unwrap();
    }

    fn stop(m: &mut crate::model::Model, cancel: bool) {
        m.dispatch(Command::StopEdition { cancel }).unwrap();
    }

    #[test]
    fn test_commit_writes_active_cell() {
        let mut m = model();
        m.dispatch(Command::SelectCell { sheet_id: S1, position: pos("B2") }).unwrap();
        start(&mut m, None);
        assert_eq!(m.getters().edition().map(|e| e.position), Some(pos("B2")));
        type_text(&mut m, "=6*7");
        assert_eq!(m.getters().current_content(), "=6*7");
        stop(&mut m, false);
        assert!(!m.getters().is_editing());
        assert_eq!(value(&m, "B2"), Value::Number(42.0));

        m.undo().unwrap();
        assert_eq!(m.getters().cell_content(S1, pos("B2")), None);
    }

    #[test]
    fn test_cancel_keeps_cell() {
        let mut m = model();
        set(&mut m, "A1", "before").unwrap();
        start(&mut m, None);
        assert_eq!(m.getters().current_content(), "before");
        type_text(&mut m, "after");
        stop(&mut m, true);
        assert_eq!(m.getters().cell_text(S1, pos("A1")), "before");
        assert_eq!(m.history().undo_label(), Some("UPDATE_CELL"));
    }

    #[test]
    fn test_unchanged_commit_records_nothing() {
        let mut m = model();
        start(&mut m, Some(""));
        stop(&mut m, false);
        assert!(!m.can_undo());
    }

    #[test]
    fn test_not_editing_rejected() {
        let mut m = model();
        let err = m.dispatch(Command::StopEdition { cancel: false }).unwrap_err();
        assert_eq!(err.reasons, vec![CancelledReason::NotEditing]);
        let err = m.dispatch(Command::SetCurrentContent { content: "x".into() }).unwrap_err();
        assert_eq!(err.reasons, vec![CancelledReason::NotEditing]);
    }

    #[test]
    fn test_edition_follows_structure() {
        let mut m = model();
        m.dispatch(Command::SelectCell { sheet_id: S1, position: pos("A3") }).unwrap();
        start(&mut m, Some("moved"));
        m.dispatch(Command::InsertRows { sheet_id: S1, start: 0, count: 2 }).unwrap();
        assert_eq!(m.getters().edition().map(|e| e.position), Some(pos("A5")));
        m.dispatch(Command::DeleteRows { sheet_id: S1, start: 4, count: 1 }).unwrap();
        assert!(!m.getters().is_editing());
    }
}
