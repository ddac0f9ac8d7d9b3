//! Engine settings and the active locale.

use std::any::Any;

use cellgrid_config::{Locale, Settings};

use crate::command::{CancelledReason, Command};
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

#[derive(Debug, Clone)]
pub struct SettingsPlugin {
    settings: Settings,
}

impl SettingsPlugin {
    pub fn new(settings: &Settings) -> Self {
        Self { settings: settings.clone() }
    }
}

impl Plugin for SettingsPlugin {
    fn allow_dispatch(&self, cmd: &Command, _getters: &Getters<'_>) -> Result<(), CancelledReason> {
        match cmd {
            Command::UpdateLocale { locale } if !locale.is_valid() => Err(CancelledReason::InvalidLocale),
            _ => Ok(()),
        }
    }

    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        if let Command::UpdateLocale { locale } = cmd {
            if *locale == self.settings.locale {
                return;
            }
            log::debug!("locale {} -> {}", self.settings.locale.code, locale.code);
            ctx.record_inverse(Command::UpdateLocale { locale: self.settings.locale.clone() });
            self.settings.locale = locale.clone();
            ctx.changes_mut().locale_changed = true;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> Getters<'a> {
    /// Active locale. Affects input parsing and display only.
    pub fn locale(&self) -> &'a Locale {
        static FALLBACK: std::sync::OnceLock<Locale> = std::sync::OnceLock::new();
        match self.plugin::<SettingsPlugin>() {
            Some(p) => &p.settings.locale,
            None => FALLBACK.get_or_init(Locale::default),
        }
    }

    /// Whether error notifications are sticky.
    pub fn sticky_errors(&self) -> bool {
        self.plugin::<SettingsPlugin>().map_or(true, |p| p.settings.sticky_errors)
    }

    pub fn default_sheet_size(&self) -> (usize, usize) {
        self.plugin::<SettingsPlugin>().map_or((100, 26), |p| (p.settings.default_rows, p.settings.default_cols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::test_util::*;

    #[test]
    fn test_update_locale_and_undo() {
        let mut m = model();
        assert_eq!(m.getters().locale().code, "en-US");
        m.dispatch(Command::UpdateLocale { locale: Locale::fr_fr() }).unwrap();
        assert_eq!(m.getters().locale().code, "fr-FR");
        m.undo().unwrap();
        assert_eq!(m.getters().locale().code, "en-US");
        m.redo().unwrap();
        assert_eq!(m.getters().locale().code, "fr-FR");
    }

    #[test]
    fn test_invalid_locale_rejected() {
        let mut m = model();
        let mut bad = Locale::en_us();
        bad.thousands_separator = '.';
        let err = m.dispatch(Command::UpdateLocale { locale: bad }).unwrap_err();
        assert_eq!(err.reasons, vec![CancelledReason::InvalidLocale]);
        assert_eq!(m.getters().locale().code, "en-US");
    }
}
