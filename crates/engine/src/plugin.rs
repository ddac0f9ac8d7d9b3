//! The plugin contract and the per-transaction context plugins apply into.

use std::any::Any;
use std::collections::BTreeSet;

use cellgrid_core::{AxisChange, CellId, SheetId};

use crate::command::{CancelledReason, Command};
use crate::effects::{Effect, Notification};
use crate::getters::Getters;

/// An independently owned partition of model state.
///
/// A plugin mutates only its own fields. It reads other plugins through
/// [`Getters`] and affects them only by queueing commands.
pub trait Plugin: Any {
    /// Accept or reject `cmd` against the current, unmutated state.
    fn allow_dispatch(&self, _cmd: &Command, _getters: &Getters<'_>) -> Result<(), CancelledReason> {
        Ok(())
    }

    /// Apply `cmd`. Earlier plugins have already applied it.
    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>);

    /// Called once per transaction after every command applied, in registration order.
    fn finalize(&mut self, _ctx: &mut ApplyContext<'_>) {}

    /// Save the state no recorded inverse restores (selection, composer,
    /// clipboard, ...). Taken before a transaction applies its first step.
    fn checkpoint(&self) -> Option<Box<dyn Any>> {
        None
    }

    /// Put back a [`Plugin::checkpoint`] when its transaction is rolled back.
    fn restore(&mut self, _checkpoint: Box<dyn Any>) {}

    fn as_any(&self) -> &dyn Any;
}

/// Facts announced to later plugins during one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Cells whose raw content changed (current coordinates)
    pub cells: BTreeSet<CellId>,
    /// Row/column inserts and deletes, in application order
    pub structural: Vec<(SheetId, AxisChange)>,
    pub deleted_sheets: Vec<SheetId>,
    /// `(sheet, old name, new name)`
    pub renamed: Vec<(SheetId, String, String)>,
    /// Sheets were created, deleted, renamed or moved
    pub sheets_changed: bool,
    pub locale_changed: bool,
    /// Every formula must be re-registered and evaluated
    pub full_recompute: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        *self == ChangeSet::default()
    }

    /// Old name of a sheet renamed in this transaction, latest rename first.
    pub fn previous_name(&self, sheet: SheetId) -> Option<&str> {
        self.renamed.iter().rev().find(|(s, _, _)| *s == sheet).map(|(_, old, _)| old.as_str())
    }
}

/// Mutable transaction state shared by every plugin.
#[derive(Debug, Default)]
pub(crate) struct TxState {
    pub changes: ChangeSet,
    /// Inverses recorded by the step being applied
    pub inverses: Vec<Command>,
    /// Commands queued by the step being applied
    pub queued: Vec<Command>,
    pub effects: Vec<Effect>,
}

/// What a plugin receives while applying or finalizing.
pub struct ApplyContext<'a> {
    /// Read access to every other plugin
    pub getters: Getters<'a>,
    tx: &'a mut TxState,
}

impl<'a> ApplyContext<'a> {
    pub(crate) fn new(getters: Getters<'a>, tx: &'a mut TxState) -> Self {
        Self { getters, tx }
    }

    /// Record a command that restores the state this plugin is about to change.
    pub fn record_inverse(&mut self, cmd: Command) {
        self.tx.inverses.push(cmd);
    }

    /// Run `cmd` right after the current command, in the same transaction.
    pub fn queue(&mut self, cmd: Command) {
        self.tx.queued.push(cmd);
    }

    /// Emit a notification, delivered only if the transaction commits.
    pub fn notify(&mut self, notification: Notification) {
        self.tx.effects.push(Effect::Notify(notification));
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.tx.changes
    }

    pub fn changes_mut(&mut self) -> &mut ChangeSet {
        &mut self.tx.changes
    }

    pub fn mark_changed(&mut self, cell: CellId) {
        self.tx.changes.cells.insert(cell);
    }
}
