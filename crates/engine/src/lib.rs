//! Plugin-based spreadsheet engine: typed commands, two-phase dispatch,
//! formulas over a dependency graph, and undo/redo through the dispatcher.

pub mod cell;
pub mod command;
pub mod dep_graph;
pub mod effects;
pub mod formula;
pub mod getters;
pub mod history;
pub mod model;
pub mod plugin;
pub mod plugins;
pub mod recalc;
pub mod registry;
pub mod series;

pub use cell::{CellFormat, CellValue, FormatPatch};
pub use command::{Cancelled, CancelledReason, Command, DispatchResult};
pub use effects::{ConfirmCallback, EffectCollector, Notification, NotificationKind, NotifyCallback};
pub use formula::{CellError, ErrorKind, Value};
pub use getters::Getters;
pub use history::History;
pub use model::Model;
pub use plugin::{ApplyContext, Plugin};
pub use registry::{PluginRegistry, RegistryError};
