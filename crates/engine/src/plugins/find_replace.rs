//! Find and replace over displayed values, or over formula text.
//!
//! Matches are ordered by sheet order, then row-major, and refreshed after
//! every transaction while a search is active.

use std::any::Any;

use cellgrid_core::{Position, SheetId};
use serde::{Deserialize, Serialize};

use crate::command::{CancelledReason, Command};
use crate::effects::Notification;
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub match_case: bool,
    /// The whole cell text must equal the query
    pub exact_match: bool,
    /// Look at formula text instead of the displayed value of formula cells
    pub search_formulas: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDirection {
    #[default]
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    pub sheet: SheetId,
    pub position: Position,
}

#[derive(Debug, Clone, Default)]
pub struct FindReplacePlugin {
    query: String,
    options: SearchOptions,
    matches: Vec<SearchMatch>,
    current: Option<usize>,
}

fn fold(text: &str, match_case: bool) -> String {
    if match_case {
        text.to_string()
    } else {
        text.to_ascii_lowercase()
    }
}

/// Byte offsets of non-overlapping occurrences of `needle`.
fn occurrences(haystack: &str, needle: &str, options: &SearchOptions) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let (haystack, needle) = (fold(haystack, options.match_case), fold(needle, options.match_case));
    if options.exact_match {
        return if haystack == needle { vec![0] } else { Vec::new() };
    }
    haystack.match_indices(&needle).map(|(i, _)| i).collect()
}

/// `text` with every occurrence replaced, and the occurrence count.
fn replace_in(text: &str, query: &str, replacement: &str, options: &SearchOptions) -> (String, usize) {
    let found = occurrences(text, query, options);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for &start in &found {
        out.push_str(&text[last..start]);
        out.push_str(replacement);
        last = start + query.len();
    }
    out.push_str(&text[last..]);
    (out, found.len())
}

impl FindReplacePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text searched in a cell.
    fn searched_text(&self, getters: &Getters<'_>, m: &SearchMatch) -> String {
        let formula = getters.cell_content(m.sheet, m.position).map_or(false, |c| c.is_formula());
        if formula && self.options.search_formulas {
            getters.cell_text(m.sheet, m.position)
        } else {
            getters.formatted_value(m.sheet, m.position)
        }
    }

    fn refresh(&mut self, getters: &Getters<'_>) {
        let previous = self.current.and_then(|i| self.matches.get(i).copied());
        self.matches.clear();
        if self.query.is_empty() {
            self.current = None;
            return;
        }
        for sheet in getters.sheet_ids() {
            for (position, _) in getters.cells(sheet) {
                let candidate = SearchMatch { sheet, position };
                if !occurrences(&self.searched_text(getters, &candidate), &self.query, &self.options).is_empty() {
                    self.matches.push(candidate);
                }
            }
        }
        self.current = match previous {
            Some(m) => self
                .matches
                .iter()
                .position(|x| *x == m)
                .or_else(|| self.current.filter(|_| !self.matches.is_empty()).map(|i| i.min(self.matches.len() - 1))),
            None => None,
        };
    }

    fn select(&mut self, direction: SearchDirection, ctx: &mut ApplyContext<'_>) {
        let len = self.matches.len();
        if len == 0 {
            return;
        }
        let index = match (self.current, direction) {
            (None, SearchDirection::Next) => 0,
            (None, SearchDirection::Previous) => len - 1,
            (Some(i), SearchDirection::Next) => (i + 1) % len,
            (Some(i), SearchDirection::Previous) => (i + len - 1) % len,
        };
        self.current = Some(index);
        let m = self.matches[index];
        if ctx.getters.active_sheet() != m.sheet {
            ctx.queue(Command::ActivateSheet { sheet_id: m.sheet });
        }
        ctx.queue(Command::SelectCell { sheet_id: m.sheet, position: m.position });
    }

    /// Queue the replacement of one match. Formula cells are only rewritten
    /// when formulas are searched.
    fn replace(&self, m: &SearchMatch, replacement: &str, ctx: &mut ApplyContext<'_>) -> usize {
        let getters = ctx.getters;
        let formula = getters.cell_content(m.sheet, m.position).map_or(false, |c| c.is_formula());
        if formula && !self.options.search_formulas {
            return 0;
        }
        let (content, count) = replace_in(&self.searched_text(&getters, m), &self.query, replacement, &self.options);
        if count > 0 {
            ctx.queue(Command::UpdateCell { sheet_id: m.sheet, position: m.position, content });
        }
        count
    }
}

impl Plugin for FindReplacePlugin {
    fn allow_dispatch(&self, cmd: &Command, _getters: &Getters<'_>) -> Result<(), CancelledReason> {
        match cmd {
            Command::SelectSearchMatch { .. } | Command::ReplaceSearchMatch { .. } | Command::ReplaceAll { .. }
                if self.matches.is_empty() =>
            {
                Err(CancelledReason::NoSearchMatch)
            }
            _ => Ok(()),
        }
    }

    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        match cmd {
            Command::UpdateSearch { query, options } => {
                self.query = query.clone();
                self.options = options.clone();
                self.current = None;
                self.refresh(&ctx.getters);
            }
            Command::SelectSearchMatch { direction } => self.select(*direction, ctx),
            Command::ReplaceSearchMatch { replacement } => {
                let index = self.current.unwrap_or(0);
                if let Some(m) = self.matches.get(index).copied() {
                    self.current = Some(index);
                    let count = self.replace(&m, replacement, ctx);
                    ctx.notify(Notification::info(format!("Replaced {} occurrences", count)));
                }
            }
            Command::ReplaceAll { replacement } => {
                let matches = self.matches.clone();
                let total: usize = matches.iter().map(|m| self.replace(m, replacement, ctx)).sum();
                ctx.notify(Notification::info(format!("Replaced {} occurrences", total)));
            }
            Command::ClearSearch => *self = Self::default(),
            _ => {}
        }
    }

    fn finalize(&mut self, ctx: &mut ApplyContext<'_>) {
        if !self.query.is_empty() {
            self.refresh(&ctx.getters);
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
    fn find_replace(&self) -> Option<&'a FindReplacePlugin> {
        self.plugin::<FindReplacePlugin>()
    }

    pub fn search_query(&self) -> &'a str {
        self.find_replace().map_or("", |p| p.query.as_str())
    }

    pub fn search_matches(&self) -> &'a [SearchMatch] {
        self.find_replace().map_or(&[], |p| p.matches.as_slice())
    }

    /// Selected match and its index.
    pub fn current_search_match(&self) -> Option<(usize, SearchMatch)> {
        let plugin = self.find_replace()?;
        let index = plugin.current?;
        plugin.matches.get(index).map(|m| (index, *m))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::effects::EffectCollector;
    use crate::plugins::test_util::*;

    fn search(m: &mut crate::model::Model, query: &str, options: SearchOptions) {
        m.dispatch(Command::UpdateSearch { query: query.into(), options }).unwrap();
    }

    fn positions(m: &crate::model::Model) -> Vec<(SheetId, Position)> {
        m.getters().search_matches().iter().map(|x| (x.sheet, x.position)).collect()
    }

    #[test]
    fn test_matches_in_sheet_then_row_major_order() {
        let mut m = model();
        let s2 = SheetId::from_raw(2);
        m.dispatch(Command::CreateSheet { sheet_id: s2, name: "First".into(), position: Some(0), rows: None, cols: None }).unwrap();
        set(&mut m, "B1", "apple pie").unwrap();
        set(&mut m, "A2", "Apple").unwrap();
        set(&mut m, "C3", "pear").unwrap();
        m.dispatch(Command::UpdateCell { sheet_id: s2, position: pos("D9"), content: "pineapple".into() }).unwrap();

        search(&mut m, "apple", SearchOptions::default());
        assert_eq!(positions(&m), vec![(s2, pos("D9")), (S1, pos("B1")), (S1, pos("A2"))]);

        search(&mut m, "Apple", SearchOptions { match_case: true, ..SearchOptions::default() });
        assert_eq!(positions(&m), vec![(S1, pos("A2"))]);

        search(&mut m, "apple", SearchOptions { exact_match: true, ..SearchOptions::default() });
        assert_eq!(positions(&m), vec![(S1, pos("A2"))]);
    }

    #[test]
    fn test_displayed_values_or_formula_text() {
        let mut m = model();
        set(&mut m, "A1", "=40+2").unwrap();
        search(&mut m, "42", SearchOptions::default());
        assert_eq!(positions(&m), vec![(S1, pos("A1"))]);
        search(&mut m, "40", SearchOptions::default());
        assert!(positions(&m).is_empty());
        search(&mut m, "40", SearchOptions { search_formulas: true, ..SearchOptions::default() });
        assert_eq!(positions(&m), vec![(S1, pos("A1"))]);
    }

    #[test]
    fn test_navigation_wraps_and_selects() {
        let mut m = model();
        let s2 = SheetId::from_raw(2);
        m.dispatch(Command::CreateSheet { sheet_id: s2, name: "Two".into(), position: None, rows: None, cols: None }).unwrap();
        set(&mut m, "C3", "x").unwrap();
        m.dispatch(Command::UpdateCell { sheet_id: s2, position: pos("B2"), content: "x".into() }).unwrap();
        search(&mut m, "x", SearchOptions::default());

        m.dispatch(Command::SelectSearchMatch { direction: SearchDirection::Next }).unwrap();
        assert_eq!(m.getters().active_position(), (S1, pos("C3")));
        m.dispatch(Command::SelectSearchMatch { direction: SearchDirection::Next }).unwrap();
        assert_eq!(m.getters().active_position(), (s2, pos("B2")));
        m.dispatch(Command::SelectSearchMatch { direction: SearchDirection::Next }).unwrap();
        assert_eq!(m.getters().current_search_match().map(|(i, _)| i), Some(0));
        m.dispatch(Command::SelectSearchMatch { direction: SearchDirection::Previous }).unwrap();
        assert_eq!(m.getters().active_position(), (s2, pos("B2")));
        assert_eq!(m.history().undo_label(), Some("UPDATE_CELL"));
    }

    #[test]
    fn test_no_match_rejections() {
        let mut m = model();
        search(&mut m, "zzz", SearchOptions::default());
        for cmd in [
            Command::SelectSearchMatch { direction: SearchDirection::Next },
            Command::ReplaceSearchMatch { replacement: "y".into() },
            Command::ReplaceAll { replacement: "y".into() },
        ] {
            assert_eq!(m.dispatch(cmd).unwrap_err().reasons, vec![CancelledReason::NoSearchMatch]);
        }
    }

    #[test]
    fn test_replace_all_notifies_and_undoes() {
        let mut m = model();
        let collector = Rc::new(RefCell::new(EffectCollector::new()));
        m.set_notify(EffectCollector::sink(&collector));
        set(&mut m, "A1", "cat and cat").unwrap();
        set(&mut m, "A2", "Cat").unwrap();
        set(&mut m, "A3", "=\"cat\"").unwrap();
        search(&mut m, "cat", SearchOptions::default());
        assert_eq!(m.getters().search_matches().len(), 3);

        m.dispatch(Command::ReplaceAll { replacement: "dog".into() }).unwrap();
        assert_eq!(collector.borrow().texts(), vec!["Replaced 3 occurrences"]);
        assert_eq!(m.getters().cell_text(S1, pos("A1")), "dog and dog");
        assert_eq!(m.getters().cell_text(S1, pos("A2")), "dog");
        // Formula cells are left alone unless formulas are searched
        assert_eq!(m.getters().cell_text(S1, pos("A3")), "=\"cat\"");
        assert_eq!(m.getters().search_matches().len(), 1);

        m.undo().unwrap();
        assert_eq!(m.getters().cell_text(S1, pos("A1")), "cat and cat");
        assert_eq!(m.getters().search_matches().len(), 3);
    }

    #[test]
    fn test_replace_current_moves_on() {
        let mut m = model();
        set(&mut m, "A1", "one").unwrap();
        set(&mut m, "A2", "one").unwrap();
        search(&mut m, "one", SearchOptions::default());
        let collector = Rc::new(RefCell::new(EffectCollector::new()));
        m.set_notify(EffectCollector::sink(&collector));
        m.dispatch(Command::SelectSearchMatch { direction: SearchDirection::Next }).unwrap();
        m.dispatch(Command::ReplaceSearchMatch { replacement: "1".into() }).unwrap();
        assert_eq!(collector.borrow().texts(), vec!["Replaced 1 occurrences"]);
        assert_eq!(m.getters().cell_content(S1, pos("A1")), Some(&crate::cell::CellValue::Number(1.0)));
        assert_eq!(m.getters().current_search_match(), Some((0, SearchMatch { sheet: S1, position: pos("A2") })));

        m.dispatch(Command::ClearSearch).unwrap();
        assert!(m.getters().search_matches().is_empty());
        assert_eq!(m.getters().search_query(), "");
    }
}
