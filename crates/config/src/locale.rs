// Locale rules for parsing user input and formatting display values.
// Evaluation never consults these; values are stored locale-independently.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Order of date components when reading and printing dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// 2024-03-15
    #[default]
    Iso,
    /// 03/15/2024
    MonthDayYear,
    /// 15/03/2024
    DayMonthYear,
    /// 15.03.2024
    DayMonthYearDotted,
}

impl DateFormat {
    fn pattern(&self) -> &'static str {
        match self {
            DateFormat::Iso => "%Y-%m-%d",
            DateFormat::MonthDayYear => "%m/%d/%Y",
            DateFormat::DayMonthYear => "%d/%m/%Y",
            DateFormat::DayMonthYearDotted => "%d.%m.%Y",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Locale {
    /// BCP-47 style code, informational ("en-US")
    pub code: String,
    pub decimal_separator: char,
    pub thousands_separator: char,
    pub date_format: DateFormat,
}

impl Default for Locale {
    fn default() -> Self {
        Self::en_us()
    }
}

impl Locale {
    pub fn en_us() -> Self {
        Self {
            code: "en-US".to_string(),
            decimal_separator: '.',
            thousands_separator: ',',
            date_format: DateFormat::MonthDayYear,
        }
    }

    pub fn en_gb() -> Self {
        Self {
            code: "en-GB".to_string(),
            decimal_separator: '.',
            thousands_separator: ',',
            date_format: DateFormat::DayMonthYear,
        }
    }

    pub fn fr_fr() -> Self {
        Self {
            code: "fr-FR".to_string(),
            decimal_separator: ',',
            thousands_separator: ' ',
            date_format: DateFormat::DayMonthYear,
        }
    }

    pub fn de_de() -> Self {
        Self {
            code: "de-DE".to_string(),
            decimal_separator: ',',
            thousands_separator: '.',
            date_format: DateFormat::DayMonthYearDotted,
        }
    }

    /// Look up a built-in preset by code (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        [Self::en_us(), Self::en_gb(), Self::fr_fr(), Self::de_de()]
            .into_iter()
            .find(|l| l.code.eq_ignore_ascii_case(code))
    }

    /// Separators must differ and must not be characters that appear in numbers.
    pub fn is_valid(&self) -> bool {
        let bad = |c: char| c.is_ascii_digit() || c == '-' || c == '+';
        self.decimal_separator != self.thousands_separator
            && !bad(self.decimal_separator)
            && !bad(self.thousands_separator)
    }

    fn is_thousands(&self, c: char) -> bool {
        c == self.thousands_separator
            || (self.thousands_separator == ' ' && (c == '\u{a0}' || c == '\u{202f}'))
    }

    /// Parse a number written with this locale's separators.
    ///
    /// Grouping must be well formed ("1,234" but not "12,34"); scientific
    /// notation is accepted only with the canonical `.` decimal separator.
    pub fn parse_number(&self, input: &str) -> Option<f64> {
        let s = input.trim();
        if s.is_empty() {
            return None;
        }
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        if body.is_empty() {
            return None;
        }

        if self.decimal_separator == '.' && body.contains(['e', 'E']) {
            let n: f64 = body.parse().ok()?;
            return Some(if negative { -n } else { n });
        }

        let mut parts = body.splitn(2, self.decimal_separator);
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next();
        if let Some(frac) = frac_part {
            if frac.contains(self.decimal_separator) || !frac.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
        }
        if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
            return None;
        }

        let groups: Vec<&str> = int_part.split(|c| self.is_thousands(c)).collect();
        if groups.len() > 1 {
            let first_ok = (1..=3).contains(&groups[0].len());
            let rest_ok = groups[1..].iter().all(|g| g.len() == 3);
            if !first_ok || !rest_ok {
                return None;
            }
        }
        let digits: String = groups.concat();
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let canonical = match frac_part {
            Some(frac) => format!("{}.{}", if digits.is_empty() { "0" } else { &digits }, frac),
            None => digits,
        };
        let n: f64 = canonical.parse().ok()?;
        Some(if negative { -n } else { n })
    }

    /// Format a number with this locale's separators.
    ///
    /// `decimals: None` prints the shortest form (up to 10 fractional digits).
    pub fn format_number(&self, n: f64, decimals: Option<usize>, grouping: bool) -> String {
        if !n.is_finite() {
            return n.to_string();
        }
        let raw = match decimals {
            Some(d) => format!("{:.*}", d, round_half_away(n.abs(), d)),
            None if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n.abs() as i64),
            None => {
                let s = format!("{:.10}", n.abs());
                s.trim_end_matches('0').trim_end_matches('.').to_string()
            }
        };
        let (int_part, frac_part) = match raw.split_once('.') {
            Some((i, f)) => (i.to_string(), Some(f.to_string())),
            None => (raw.clone(), None),
        };

        let int_part = if grouping {
            let mut out = String::new();
            for (i, ch) in int_part.chars().enumerate() {
                if i > 0 && (int_part.len() - i) % 3 == 0 {
                    out.push(self.thousands_separator);
                }
                out.push(ch);
            }
            out
        } else {
            int_part
        };

        let mut out = String::new();
        let is_zero = raw.chars().all(|c| c == '0' || c == '.');
        if n < 0.0 && !is_zero {
            out.push('-');
        }
        out.push_str(&int_part);
        if let Some(frac) = frac_part {
            out.push(self.decimal_separator);
            out.push_str(&frac);
        }
        out
    }

    /// Parse a date. ISO dates are always accepted, then the locale order.
    pub fn parse_date(&self, input: &str) -> Option<NaiveDate> {
        let s = input.trim();
        if s.len() < 8 {
            return None;
        }
        NaiveDate::parse_from_str(s, DateFormat::Iso.pattern())
            .or_else(|_| NaiveDate::parse_from_str(s, self.date_format.pattern()))
            .ok()
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        date.format(self.date_format.pattern()).to_string()
    }
}

/// Round to `decimals` places, halves away from zero.
fn round_half_away(n: f64, decimals: usize) -> f64 {
    let scale = 10f64.powi(decimals.min(15) as i32);
    let rounded = (n * scale).round() / scale;
    if rounded.is_finite() {
        rounded
    } else {
        n
    }
}
