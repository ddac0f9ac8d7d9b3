//! The standard plugins, one module per state partition, in registration order.

pub mod settings;
pub mod sheet;
pub mod core;
pub mod evaluation;
pub mod merge;
pub mod format;
pub mod conditional_format;
pub mod figure;
pub mod selection;
pub mod selection_input;
pub mod clipboard;
pub mod edition;
pub mod highlight;
pub mod autofill;
pub mod find_replace;
pub mod renderer;
