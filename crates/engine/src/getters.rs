//! Read-only query surface over every plugin.
//!
//! `Getters` only hands out shared borrows and owned copies. Each plugin
//! module adds its own query methods in an `impl Getters` block.

use crate::plugin::Plugin;

/// Borrowed view of registered plugins.
///
/// While a plugin applies a command it sees every other plugin through a
/// view split around itself.
#[derive(Clone, Copy)]
pub struct Getters<'a> {
    parts: [&'a [Box<dyn Plugin>]; 2],
}

impl<'a> Getters<'a> {
    pub(crate) fn new(plugins: &'a [Box<dyn Plugin>]) -> Self {
        Self { parts: [plugins, &[]] }
    }

    pub(crate) fn split(before: &'a [Box<dyn Plugin>], after: &'a [Box<dyn Plugin>]) -> Self {
        Self { parts: [before, after] }
    }

    /// The registered plugin of type `P`, if any is visible from here.
    pub fn plugin<P: Plugin>(&self) -> Option<&'a P> {
        self.parts
            .iter()
            .flat_map(|part| part.iter())
            .find_map(|plugin| plugin.as_any().downcast_ref::<P>())
    }
}

impl std::fmt::Debug for Getters<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Getters").field("plugins", &(self.parts[0].len() + self.parts[1].len())).finish()
    }
}
