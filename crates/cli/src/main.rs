// cellgrid - headless host for the spreadsheet engine

mod exit_codes;
mod logger;
mod replay;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cellgrid_config::{Locale, Settings};
use cellgrid_core::{Position, Zone};
use cellgrid_engine::{Command, Model, Value};
use clap::{Parser, Subcommand};

use exit_codes::{EXIT_REJECTED, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "cellgrid")]
#[command(about = "Spreadsheet engine host: replay command scripts, evaluate formulas")]
#[command(version)]
struct Cli {
    /// Log engine activity to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch every command of a JSON script
    #[command(after_help = "\
Examples:
  cellgrid replay build.json --print A1:C10
  cellgrid replay merge.json --yes
  cellgrid replay input.json --locale fr-FR --config ./settings.json")]
    Replay {
        /// JSON array of commands, e.g. [{\"type\":\"UPDATE_CELL\",...}]
        script: PathBuf,

        /// Accept every confirmation (destructive merges) without asking
        #[arg(long, short = 'y')]
        yes: bool,

        /// Print the evaluated values of a zone of the active sheet as TSV
        #[arg(long, value_name = "ZONE")]
        print: Option<String>,

        /// Locale used for input parsing and display (en-US, en-GB, fr-FR, de-DE)
        #[arg(long, value_name = "CODE", env = "CELLGRID_LOCALE")]
        locale: Option<String>,

        /// Settings file (defaults to the user config directory)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Evaluate a formula in an empty workbook
    #[command(after_help = "\
Examples:
  cellgrid eval '=SUM(1,2,3)'
  cellgrid eval '=1/4' --locale de-DE")]
    Eval {
        /// Formula to evaluate (must start with =)
        formula: String,

        #[arg(long, value_name = "CODE", env = "CELLGRID_LOCALE")]
        locale: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let result = match cli.command {
        Commands::Replay { script, yes, print, locale, config } => cmd_replay(&script, yes, print, locale, config),
        Commands::Eval { formula, locale } => cmd_eval(&formula, locale),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn load_settings(config: Option<&Path>, locale: Option<&str>) -> Result<Settings, CliError> {
    let mut settings = match config {
        Some(path) => {
            Settings::load_from(path).map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))?
        }
        None => Settings::load(),
    };
    if let Some(code) = locale {
        settings.locale = resolve_locale(code)?;
    }
    Ok(settings)
}

fn resolve_locale(code: &str) -> Result<Locale, CliError> {
    Locale::from_code(code).ok_or_else(|| {
        CliError::args(format!("unknown locale '{}'", code)).with_hint("known locales: en-US, en-GB, fr-FR, de-DE")
    })
}

fn cmd_replay(
    script: &Path,
    yes: bool,
    print: Option<String>,
    locale: Option<String>,
    config: Option<PathBuf>,
) -> Result<u8, CliError> {
    let print = print
        .map(|s| Zone::parse(&s).ok_or_else(|| CliError::args(format!("invalid zone '{}'", s)).with_hint("use A1 notation, e.g. A1:C10")))
        .transpose()?;
    let settings = load_settings(config.as_deref(), locale.as_deref())?;
    replay::run(replay::ReplayOptions { script, yes, print, settings })
}

fn cmd_eval(formula: &str, locale: Option<String>) -> Result<u8, CliError> {
    if !formula.trim_start().starts_with('=') {
        return Err(CliError::args("formula must start with =").with_hint(format!("try '={}'", formula)));
    }
    let mut settings = Settings::default();
    if let Some(code) = locale.as_deref() {
        settings.locale = resolve_locale(code)?;
    }
    let mut model = Model::new(settings);
    let sheet = model.getters().active_sheet();
    let position = Position::new(0, 0);
    model
        .dispatch(Command::UpdateCell { sheet_id: sheet, position, content: formula.to_string() })
        .map_err(|e| CliError::args(e.to_string()))?;

    println!("{}", model.getters().formatted_value(sheet, position));
    Ok(match model.getters().evaluated_value(sheet, position) {
        Value::Error(_) => EXIT_REJECTED,
        _ => EXIT_SUCCESS,
    })
}
