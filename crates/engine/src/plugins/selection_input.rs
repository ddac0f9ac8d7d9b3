//! Range-input fields, such as the data-range editor of a chart panel.
//!
//! An input holds one or more range texts. While an input range has focus,
//! selection changes write the selected zone into it.

use std::any::Any;
use std::collections::BTreeMap;

use cellgrid_core::{SheetId, Zone};

use crate::command::{CancelledReason, Command};
use crate::formula::parser::format_sheet_name;
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionInput {
    /// Sheet active when the input was enabled; zones elsewhere are sheet-qualified
    pub sheet: SheetId,
    pub ranges: Vec<String>,
    pub max_ranges: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionInputPlugin {
    inputs: BTreeMap<String, SelectionInput>,
    focus: Option<(String, usize)>,
}

impl SelectionInputPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn input(&self, id: &str) -> Result<&SelectionInput, CancelledReason> {
        self.inputs.get(id).ok_or(CancelledReason::UnknownSelectionInput)
    }

    fn range_index(&self, id: &str, index: usize) -> Result<(), CancelledReason> {
        if index < self.input(id)?.ranges.len() {
            Ok(())
        } else {
            Err(CancelledReason::UnknownSelectionInput)
        }
    }

    /// Write the last selected zone of `sheet` into the focused range.
    fn track_selection(&mut self, sheet: SheetId, getters: &Getters<'_>) {
        let Some((id, index)) = &self.focus else { return };
        let Some(input) = self.inputs.get_mut(id) else { return };
        let Some(zone) = getters.selected_zones(sheet).last().copied() else { return };
        let text = if sheet == input.sheet {
            zone.to_string()
        } else {
            let name = getters.sheet_name(sheet).unwrap_or_default();
            format!("{}!{}", format_sheet_name(name), zone)
        };
        if let Some(slot) = input.ranges.get_mut(*index) {
            *slot = text;
        }
    }
}

impl Plugin for SelectionInputPlugin {
    fn allow_dispatch(&self, cmd: &Command, _getters: &Getters<'_>) -> Result<(), CancelledReason> {
        match cmd {
            Command::EnableSelectionInput { id, ranges, max_ranges } => {
                if self.inputs.contains_key(id) {
                    return Err(CancelledReason::DuplicateSelectionInput);
                }
                match max_ranges {
                    Some(0) => Err(CancelledReason::InvalidCount),
                    Some(max) if ranges.len() > *max => Err(CancelledReason::InvalidCount),
                    _ => Ok(()),
                }
            }
            Command::DisableSelectionInput { id } => self.input(id).map(|_| ()),
            Command::FocusSelectionInput { id, index }
            | Command::ChangeInputRange { id, index, .. }
            | Command::RemoveInputRange { id, index } => self.range_index(id, *index),
            Command::AddInputRange { id } => {
                let input = self.input(id)?;
                match input.max_ranges {
                    Some(max) if input.ranges.len() >= max => Err(CancelledReason::InvalidCount),
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        let getters = ctx.getters;
        match cmd {
            Command::EnableSelectionInput { id, ranges, max_ranges } => {
                let ranges = if ranges.is_empty() { vec![String::new()] } else { ranges.clone() };
                self.inputs.insert(id.clone(), SelectionInput { sheet: getters.active_sheet(), ranges, max_ranges: *max_ranges });
            }
            Command::DisableSelectionInput { id } => {
                self.inputs.remove(id);
                if self.focus.as_ref().map_or(false, |(f, _)| f == id) {
                    self.focus = None;
                }
            }
            Command::FocusSelectionInput { id, index } => self.focus = Some((id.clone(), *index)),
            Command::ChangeInputRange { id, index, range } => {
                if let Some(slot) = self.inputs.get_mut(id).and_then(|i| i.ranges.get_mut(*index)) {
                    *slot = range.clone();
                }
            }
            Command::AddInputRange { id } => {
                if let Some(input) = self.inputs.get_mut(id) {
                    input.ranges.push(String::new());
                    self.focus = Some((id.clone(), input.ranges.len() - 1));
                }
            }
            Command::RemoveInputRange { id, index } => {
                let Some(input) = self.inputs.get_mut(id) else { return };
                if input.ranges.len() == 1 {
                    input.ranges[0].clear();
                } else {
                    input.ranges.remove(*index);
                }
                if let Some((focused, i)) = self.focus.take() {
                    self.focus = match (focused == *id, i.cmp(index)) {
                        (true, std::cmp::Ordering::Equal) => None,
                        (true, std::cmp::Ordering::Greater) => Some((focused, i - 1)),
                        _ => Some((focused, i)),
                    };
                }
            }
            Command::SelectCell { sheet_id, .. }
            | Command::SetSelection { sheet_id, .. }
            | Command::MoveSelection { sheet_id, .. } => self.track_selection(*sheet_id, &getters),
            _ => {}
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
    pub fn selection_input(&self, id: &str) -> Option<&'a SelectionInput> {
        self.plugin::<SelectionInputPlugin>()?.inputs.get(id)
    }

    /// Focused input id and range index.
    pub fn focused_selection_input(&self) -> Option<(&'a str, usize)> {
        let (id, index) = self.plugin::<SelectionInputPlugin>()?.focus.as_ref()?;
        Some((id.as_str(), *index))
    }

    /// Ranges of an input that parse, resolved to sheets. Invalid texts are skipped.
    pub fn input_zones(&self, id: &str) -> Vec<(SheetId, Zone)> {
        let Some(input) = self.selection_input(id) else { return Vec::new() };
        input
            .ranges
            .iter()
            .filter_map(|text| {
                let (sheet, zone) = match text.rsplit_once('!') {
                    Some((name, zone)) => {
                        let name = name.trim_matches('\'');
                        (self.sheet_id_by_name(name)?, zone)
                    }
                    None => (input.sheet, text.as_str()),
                };
                Zone::parse(zone).map(|z| (sheet, z))
            })
            .collect()
    }
}
