//! The model: plugins, the dispatcher and history.
//!
//! One `dispatch` is one transaction. Every command in it (a `BATCH`
//! expands in place, queued follow-ups run right after their parent) is
//! validated by every plugin against the current state, then applied by
//! every plugin in registration order. If any step is rejected the steps
//! already applied are rolled back through their inverses and no effect is
//! delivered.

use std::any::Any;

use cellgrid_config::Settings;

use crate::command::{Cancelled, CancelledReason, Command, DispatchResult};
use crate::effects::{ConfirmCallback, Effect, Notification, NotifyCallback};
use crate::getters::Getters;
use crate::history::History;
use crate::plugin::{ApplyContext, Plugin, TxState};
use crate::registry::PluginRegistry;

/// One optional checkpoint per plugin, in registration order.
type Checkpoints = Vec<Option<Box<dyn Any>>>;

pub struct Model {
    names: Vec<&'static str>,
    plugins: Vec<Box<dyn Plugin>>,
    history: History,
    revision: u64,
    notify: Option<NotifyCallback>,
    confirm: Option<ConfirmCallback>,
}

impl Model {
    /// A model with the standard plugins and one empty sheet.
    pub fn new(settings: Settings) -> Self {
        Self::with_registry(&PluginRegistry::standard(), settings)
    }

    pub fn with_registry(registry: &PluginRegistry, settings: Settings) -> Self {
        let (names, plugins) = registry.build(&settings);
        Self {
            names,
            plugins,
            history: History::new(settings.history_max_entries),
            revision: 0,
            notify: None,
            confirm: None,
        }
    }

    /// Install the `notifyUI` channel.
    pub fn set_notify(&mut self, callback: NotifyCallback) {
        self.notify = Some(callback);
    }

    /// Install the confirmation channel used by [`Model::dispatch_with_confirmation`].
    pub fn set_confirm(&mut self, callback: ConfirmCallback) {
        self.confirm = Some(callback);
    }

    pub fn getters(&self) -> Getters<'_> {
        Getters::new(&self.plugins)
    }

    pub fn plugin_names(&self) -> &[&'static str] {
        &self.names
    }

    /// Bumped once per committed transaction.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Validate then apply `cmd` atomically.
    pub fn dispatch(&mut self, cmd: Command) -> DispatchResult {
        let undoable = cmd.is_undoable();
        let label = if undoable { Some(cmd.clone()) } else { None };
        let undo = self.transact(vec![cmd])?;
        if let Some(label) = label {
            self.history.record(label, undo);
        }
        Ok(())
    }

    /// Parse a JSON command and dispatch it.
    pub fn dispatch_json(&mut self, payload: &str) -> DispatchResult {
        let cmd: Command = serde_json::from_str(payload)
            .map_err(|e| Cancelled::from(CancelledReason::InvalidPayload(e.to_string())))?;
        self.dispatch(cmd)
    }

    /// Dispatch, and when the only obstacles are confirmable, ask the
    /// confirmation channel and re-issue the command with `force`.
    pub fn dispatch_with_confirmation(&mut self, cmd: Command) -> DispatchResult {
        let retry = if cmd.supports_force() && !cmd.forced() { Some(cmd.clone()) } else { None };
        let cancelled = match self.dispatch(cmd) {
            Ok(()) => return Ok(()),
            Err(c) => c,
        };
        let Some(retry) = retry.filter(|_| cancelled.is_confirmable()) else {
            return Err(cancelled);
        };
        let question = cancelled
            .reasons
            .iter()
            .find_map(CancelledReason::confirmation_message)
            .unwrap_or("Proceed anyway?");
        let consent = match self.confirm.as_mut() {
            Some(confirm) => confirm(question),
            None => false,
        };
        if consent {
            log::debug!("confirmed, re-dispatching {} with force", retry.name());
            self.dispatch(retry.with_force())
        } else {
            Err(cancelled)
        }
    }

    /// Revert the latest history entry through the dispatcher.
    pub fn undo(&mut self) -> DispatchResult {
        let entry = self.history.take_undo().ok_or(CancelledReason::NothingToUndo)?;
        match self.transact(entry.undo.clone()) {
            Ok(redo) => {
                self.history.undone(entry, redo);
                Ok(())
            }
            Err(cancelled) => {
                self.history.restore_undo(entry);
                Err(cancelled)
            }
        }
    }

    pub fn redo(&mut self) -> DispatchResult {
        let entry = self.history.take_redo().ok_or(CancelledReason::NothingToRedo)?;
        match self.transact(entry.redo.clone()) {
            Ok(undo) => {
                self.history.redone(entry, undo);
                Ok(())
            }
            Err(cancelled) => {
                self.history.restore_redo(entry);
                Err(cancelled)
            }
        }
    }

    /// Run `commands` as one transaction. Returns the undo list.
    fn transact(&mut self, commands: Vec<Command>) -> Result<Vec<Command>, Cancelled> {
        let mut tx = TxState::default();
        let mut steps: Vec<Vec<Command>> = Vec::new();
        let mut checkpoints: Option<Checkpoints> = None;
        let mut pending: Vec<Command> = commands.into_iter().rev().collect();

        while let Some(cmd) = pending.pop() {
            if let Command::Batch { commands } = cmd {
                pending.extend(commands.into_iter().rev());
                continue;
            }
            if let Err(cancelled) = self.validate(&cmd) {
                log::debug!("{} rejected: {}", cmd.name(), cancelled);
                self.rollback(&mut tx, &steps, checkpoints);
                return Err(cancelled);
            }
            if checkpoints.is_none() {
                checkpoints = Some(self.plugins.iter().map(|plugin| plugin.checkpoint()).collect());
            }
            self.apply(&cmd, &mut tx);
            steps.push(std::mem::take(&mut tx.inverses));
            pending.extend(std::mem::take(&mut tx.queued).into_iter().rev());
        }

        self.finalize(&mut tx);
        self.revision += 1;
        log::trace!("revision {} committed ({} steps)", self.revision, steps.len());
        self.deliver(std::mem::take(&mut tx.effects));

        Ok(steps.into_iter().rev().flatten().collect())
    }

    /// Poll every plugin; aggregate all reasons.
    fn validate(&self, cmd: &Command) -> DispatchResult {
        let getters = self.getters();
        let reasons: Vec<CancelledReason> =
            self.plugins.iter().filter_map(|plugin| plugin.allow_dispatch(cmd, &getters).err()).collect();
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(Cancelled::new(reasons))
        }
    }

    fn apply(&mut self, cmd: &Command, tx: &mut TxState) {
        for index in 0..self.plugins.len() {
            let (before, rest) = self.plugins.split_at_mut(index);
            if let Some((plugin, after)) = rest.split_first_mut() {
                let mut ctx = ApplyContext::new(Getters::split(before, after), tx);
                plugin.handle(cmd, &mut ctx);
            }
        }
    }

    fn finalize(&mut self, tx: &mut TxState) {
        for index in 0..self.plugins.len() {
            let (before, rest) = self.plugins.split_at_mut(index);
            if let Some((plugin, after)) = rest.split_first_mut() {
                let mut ctx = ApplyContext::new(Getters::split(before, after), tx);
                plugin.finalize(&mut ctx);
            }
        }
    }

    /// Undo applied steps, newest first, without validation, then put back
    /// every checkpoint. Derived state is refreshed by a finalize pass;
    /// effects are dropped.
    fn rollback(&mut self, tx: &mut TxState, steps: &[Vec<Command>], checkpoints: Option<Checkpoints>) {
        for inverse in steps.iter().rev().flatten() {
            self.apply(inverse, tx);
            tx.inverses.clear();
            tx.queued.clear();
        }
        for (plugin, checkpoint) in self.plugins.iter_mut().zip(checkpoints.into_iter().flatten()) {
            if let Some(checkpoint) = checkpoint {
                plugin.restore(checkpoint);
            }
        }
        self.finalize(tx);
        tx.effects.clear();
    }

    fn deliver(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notify(notification) => self.notify_ui(&notification),
            }
        }
    }

    fn notify_ui(&mut self, notification: &Notification) {
        match self.notify.as_mut() {
            Some(notify) => notify(notification),
            None => log::info!("{}", notification.text),
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("plugins", &self.names)
            .field("revision", &self.revision)
            .field("history", &self.history)
            .finish()
    }
}
