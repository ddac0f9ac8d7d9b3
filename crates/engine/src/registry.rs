//! Ordered plugin registry.
//!
//! Registration order is part of the contract: a plugin sees the updated
//! state of every plugin registered before it while a command applies.

use cellgrid_config::Settings;
use thiserror::Error;

use crate::plugin::Plugin;
use crate::plugins::{
    autofill::AutofillPlugin, clipboard::ClipboardPlugin, conditional_format::ConditionalFormatPlugin,
    core::CorePlugin, edition::EditionPlugin, evaluation::EvaluationPlugin, figure::FigurePlugin,
    find_replace::FindReplacePlugin, format::FormatPlugin, highlight::HighlightPlugin, merge::MergePlugin,
    renderer::RendererPlugin, selection::SelectionPlugin, selection_input::SelectionInputPlugin,
    settings::SettingsPlugin, sheet::SheetPlugin,
};

/// Builds a plugin from the model's initial settings. Must not fail.
pub type PluginConstructor = fn(&Settings) -> Box<dyn Plugin>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("plugin '{0}' is already registered")]
    DuplicatePlugin(&'static str),
}

#[derive(Default, Clone)]
pub struct PluginRegistry {
    entries: Vec<(&'static str, PluginConstructor)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full plugin set in its fixed order.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.push("settings", |s| Box::new(SettingsPlugin::new(s)));
        registry.push("sheet", |s| Box::new(SheetPlugin::new(s)));
        registry.push("core", |_| Box::new(CorePlugin::new()));
        registry.push("evaluation", |_| Box::new(EvaluationPlugin::new()));
        registry.push("merge", |_| Box::new(MergePlugin::new()));
        registry.push("format", |_| Box::new(FormatPlugin::new()));
        registry.push("conditional_format", |_| Box::new(ConditionalFormatPlugin::new()));
        registry.push("figure", |_| Box::new(FigurePlugin::new()));
        registry.push("selection", |_| Box::new(SelectionPlugin::new()));
        registry.push("selection_input", |_| Box::new(SelectionInputPlugin::new()));
        registry.push("clipboard", |_| Box::new(ClipboardPlugin::new()));
        registry.push("edition", |_| Box::new(EditionPlugin::new()));
        registry.push("highlight", |_| Box::new(HighlightPlugin::new()));
        registry.push("autofill", |_| Box::new(AutofillPlugin::new()));
        registry.push("find_replace", |_| Box::new(FindReplacePlugin::new()));
        registry.push("renderer", |_| Box::new(RendererPlugin::new()));
        registry
    }

    fn push(&mut self, name: &'static str, ctor: PluginConstructor) {
        self.entries.push((name, ctor));
    }

    /// Append a plugin. Names are unique.
    pub fn register(&mut self, name: &'static str, ctor: PluginConstructor) -> Result<&mut Self, RegistryError> {
        if self.contains(name) {
            return Err(RegistryError::DuplicatePlugin(name));
        }
        self.push(name, ctor);
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| *n == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn build(&self, settings: &Settings) -> (Vec<&'static str>, Vec<Box<dyn Plugin>>) {
        let names = self.names();
        let plugins = self.entries.iter().map(|(_, ctor)| ctor(settings)).collect();
        (names, plugins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_order() {
        let registry = PluginRegistry::standard();
        assert_eq!(
            registry.names(),
            vec![
                "settings", "sheet", "core", "evaluation", "merge", "format", "conditional_format", "figure",
                "selection", "selection_input", "clipboard", "edition", "highlight", "autofill", "find_replace",
                "renderer",
            ]
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = PluginRegistry::standard();
        let err = registry.register("core", |_| Box::new(CorePlugin::new())).err();
        assert_eq!(err, Some(RegistryError::DuplicatePlugin("core")));
        assert_eq!(registry.len(), 16);
    }
}
