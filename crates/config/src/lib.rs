// Configuration loading

pub mod locale;
pub mod settings;

pub use locale::{DateFormat, Locale};
pub use settings::{ConfigError, Settings};
