use cellgrid_config::Locale;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::formula::value::{format_number, Value};

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlignment {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// Text overflow behavior
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextOverflow {
    #[default]
    Clip,       // Text is clipped at cell boundary
    Wrap,       // Text wraps to multiple lines within the cell
    Overflow,   // Text overflows into adjacent empty cells
}

/// Number format type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    #[default]
    General,
    Number { decimals: u8 },
    Currency { decimals: u8 },
    Percent { decimals: u8 },
    /// Serial day number shown as a date in the locale's order
    Date,
    /// Input is stored verbatim as text
    Text,
}

/// Cell formatting options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CellFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub alignment: Alignment,
    pub vertical_alignment: VerticalAlignment,
    pub text_overflow: TextOverflow,
    pub number_format: NumberFormat,
    /// `#rrggbb`
    pub fill_color: Option<String>,
    pub text_color: Option<String>,
}

impl CellFormat {
    pub fn is_default(&self) -> bool {
        *self == CellFormat::default()
    }
}

/// Partial format: only `Some` fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FormatPatch {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strikethrough: Option<bool>,
    pub alignment: Option<Alignment>,
    pub vertical_alignment: Option<VerticalAlignment>,
    pub text_overflow: Option<TextOverflow>,
    pub number_format: Option<NumberFormat>,
    pub fill_color: Option<String>,
    pub text_color: Option<String>,
}

impl FormatPatch {
    pub fn number_format(format: NumberFormat) -> Self {
        Self { number_format: Some(format), ..Self::default() }
    }

    pub fn apply_to(&self, format: &mut CellFormat) {
        if let Some(v) = self.bold { format.bold = v; }
        if let Some(v) = self.italic { format.italic = v; }
        if let Some(v) = self.underline { format.underline = v; }
        if let Some(v) = self.strikethrough { format.strikethrough = v; }
        if let Some(v) = self.alignment { format.alignment = v; }
        if let Some(v) = self.vertical_alignment { format.vertical_alignment = v; }
        if let Some(v) = self.text_overflow { format.text_overflow = v; }
        if let Some(v) = self.number_format { format.number_format = v; }
        if let Some(v) = &self.fill_color { format.fill_color = Some(v.clone()); }
        if let Some(v) = &self.text_color { format.text_color = Some(v.clone()); }
    }
}

/// Raw cell content as stored by the core plugin. Empty cells are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    /// Formula source including the leading `=`
    Formula(String),
}

impl CellValue {
    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula(_))
    }

    pub fn formula(&self) -> Option<&str> {
        match self {
            CellValue::Formula(source) => Some(source),
            _ => None,
        }
    }

    /// Literal value for evaluation. Formulas are evaluated elsewhere.
    pub fn literal(&self) -> Value {
        match self {
            CellValue::Text(s) => Value::Text(s.clone()),
            CellValue::Number(n) => Value::Number(*n),
            CellValue::Boolean(b) => Value::Boolean(*b),
            CellValue::Formula(_) => Value::Empty,
        }
    }

    /// Canonical text shown in an editor: formula source, canonical numbers.
    pub fn raw_display(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Boolean(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
            CellValue::Formula(source) => source.clone(),
        }
    }
}

/// Result of interpreting what a user typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInput {
    pub value: CellValue,
    /// Number format implied by the input (a date or a percentage)
    pub implied_format: Option<NumberFormat>,
}

impl ParsedInput {
    fn plain(value: CellValue) -> Self {
        Self { value, implied_format: None }
    }
}

/// Interpret user input with the active locale.
///
/// Returns `None` for empty input. A cell formatted as `Text` keeps the
/// input verbatim; otherwise formulas, booleans, locale numbers,
/// percentages and locale dates are recognized, then plain text.
pub fn parse_user_input(input: &str, locale: &Locale, text_format: bool) -> Option<ParsedInput> {
    if input.is_empty() {
        return None;
    }
    if text_format {
        return Some(ParsedInput::plain(CellValue::Text(input.to_string())));
    }
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Some(ParsedInput::plain(CellValue::Text(input.to_string())));
    }
    if trimmed.starts_with('=') && trimmed.len() > 1 {
        return Some(ParsedInput::plain(CellValue::Formula(trimmed.to_string())));
    }
    if trimmed.eq_ignore_ascii_case("TRUE") {
        return Some(ParsedInput::plain(CellValue::Boolean(true)));
    }
    if trimmed.eq_ignore_ascii_case("FALSE") {
        return Some(ParsedInput::plain(CellValue::Boolean(false)));
    }
    if let Some(n) = locale.parse_number(trimmed) {
        return Some(ParsedInput::plain(CellValue::Number(n)));
    }
    if let Some(n) = trimmed.strip_suffix('%').and_then(|body| locale.parse_number(body)) {
        let decimals = decimals_in(trimmed, locale.decimal_separator);
        return Some(ParsedInput {
            value: CellValue::Number(n / 100.0),
            implied_format: Some(NumberFormat::Percent { decimals }),
        });
    }
    if let Some(date) = locale.parse_date(trimmed) {
        return Some(ParsedInput {
            value: CellValue::Number(date_to_serial(date)),
            implied_format: Some(NumberFormat::Date),
        });
    }
    Some(ParsedInput::plain(CellValue::Text(input.to_string())))
}

fn decimals_in(s: &str, separator: char) -> u8 {
    s.trim_end_matches('%')
        .rsplit_once(separator)
        .map_or(0, |(_, frac)| frac.len().min(10) as u8)
}

fn epoch() -> NaiveDate {
    // Serial 0 is 1899-12-30, so serial 1 is 1899-12-31 and 2024-01-01 is 45292
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Serial day number of a date.
pub fn date_to_serial(date: NaiveDate) -> f64 {
    (date - epoch()).num_days() as f64
}

/// Date of a serial day number; the fractional part (time) is ignored.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial.abs() > 3_000_000.0 {
        return None;
    }
    epoch().checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Display text of an evaluated value under a number format and locale.
pub fn format_value(value: &Value, format: &NumberFormat, locale: &Locale) -> String {
    let n = match value {
        Value::Number(n) => *n,
        other => return other.to_text(),
    };
    match format {
        NumberFormat::General | NumberFormat::Text => locale.format_number(n, None, false),
        NumberFormat::Number { decimals } => locale.format_number(n, Some(*decimals as usize), true),
        NumberFormat::Currency { decimals } => {
            let body = locale.format_number(n.abs(), Some(*decimals as usize), true);
            if n < 0.0 && body.chars().any(|c| c.is_ascii_digit() && c != '0') {
                format!("-${}", body)
            } else {
                format!("${}", body)
            }
        }
        NumberFormat::Percent { decimals } => {
            format!("{}%", locale.format_number(n * 100.0, Some(*decimals as usize), false))
        }
        NumberFormat::Date => match serial_to_date(n) {
            Some(date) => locale.format_date(date),
            None => locale.format_number(n, None, false),
        },
    }
}
