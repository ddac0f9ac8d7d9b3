//! Undo/Redo history of committed transactions.
//!
//! Entries store command lists only; replaying them is the model's job, so
//! undo and redo go through the same validation as any other dispatch.

use std::collections::VecDeque;

use crate::command::Command;

#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    /// Forward command, kept for labeling
    pub command: Command,
    /// Inverse commands, replayed in order to undo
    pub undo: Vec<Command>,
    /// Commands replayed to redo. Filled in when the entry is undone.
    pub redo: Vec<Command>,
}

#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_entries: usize,
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Record a committed command. Discards everything redoable.
    pub fn record(&mut self, command: Command, undo: Vec<Command>) {
        if undo.is_empty() {
            return;
        }
        self.redo_stack.clear();
        self.push_undo(HistoryEntry { command, undo, redo: Vec::new() });
    }

    fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo_stack.push_back(entry);

        // Limit history size
        while self.undo_stack.len() > self.max_entries {
            self.undo_stack.pop_front();
        }
    }

    /// Take the latest entry to undo.
    pub(crate) fn take_undo(&mut self) -> Option<HistoryEntry> {
        self.undo_stack.pop_back()
    }

    pub(crate) fn take_redo(&mut self) -> Option<HistoryEntry> {
        self.redo_stack.pop()
    }

    /// Put back an entry whose undo was rejected.
    pub(crate) fn restore_undo(&mut self, entry: HistoryEntry) {
        self.undo_stack.push_back(entry);
    }

    pub(crate) fn restore_redo(&mut self, entry: HistoryEntry) {
        self.redo_stack.push(entry);
    }

    /// An entry was undone; `redo` was recorded while replaying its undo list.
    pub(crate) fn undone(&mut self, mut entry: HistoryEntry, redo: Vec<Command>) {
        entry.redo = redo;
        self.redo_stack.push(entry);
    }

    /// An entry was redone; `undo` was recorded while replaying its redo list.
    pub(crate) fn redone(&mut self, mut entry: HistoryEntry, undo: Vec<Command>) {
        entry.undo = undo;
        entry.redo.clear();
        self.push_undo(entry);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Name of the command the next undo reverts.
    pub fn undo_label(&self) -> Option<&'static str> {
        self.undo_stack.back().map(|e| e.command.name())
    }

    pub fn redo_label(&self) -> Option<&'static str> {
        self.redo_stack.last().map(|e| e.command.name())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
