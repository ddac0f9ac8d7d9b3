//! Series patterns for autofill.
//!
//! A pattern is anchored at the first source value and `value_at(k)` is the
//! value `k` steps further. A source follows a pattern only when the pattern
//! reproduces every source value; anything else repeats as a cycle.
//!
//! - Two or more numbers: constant step
//! - A single number: copied
//! - Months, weekdays and quarters (`Q1`, `Q3 2026`): next list item, case kept
//! - Text with a numeric suffix (`Item 9`, `Row-007`): next number, zero padding kept
//! - Text with a short letter suffix (`Plan B`): next letter

use crate::formula::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinList {
    MonthsShort,
    MonthsLong,
    WeekdaysShort,
    WeekdaysLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Upper,
    Lower,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suffix {
    Number { width: Option<usize> },
    Letter { lowercase: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillPattern {
    /// Source values as a cycle
    Repeat(Vec<Value>),
    Linear { start: f64, step: f64 },
    List { list: BuiltinList, start: i64, step: i64, case: CaseMode },
    Suffixed { prefix: String, suffix: Suffix, start: i64, step: i64 },
    /// `start` counts quarters: `year * 4 + quarter - 1`, or `quarter - 1` without a year
    Quarter { start: i64, step: i64, with_year: bool },
}

const MONTHS_SHORT: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
const MONTHS_LONG: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October", "November",
    "December",
];
const WEEKDAYS_SHORT: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const WEEKDAYS_LONG: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

impl BuiltinList {
    const ALL: [BuiltinList; 4] =
        [BuiltinList::MonthsShort, BuiltinList::MonthsLong, BuiltinList::WeekdaysShort, BuiltinList::WeekdaysLong];

    fn items(self) -> &'static [&'static str] {
        match self {
            BuiltinList::MonthsShort => &MONTHS_SHORT,
            BuiltinList::MonthsLong => &MONTHS_LONG,
            BuiltinList::WeekdaysShort => &WEEKDAYS_SHORT,
            BuiltinList::WeekdaysLong => &WEEKDAYS_LONG,
        }
    }
}

impl FillPattern {
    /// Value `k` steps after the first source value.
    pub fn value_at(&self, k: i64) -> Value {
        match self {
            FillPattern::Repeat(values) if values.is_empty() => Value::Empty,
            FillPattern::Repeat(values) => values[k.rem_euclid(values.len() as i64) as usize].clone(),
            FillPattern::Linear { start, step } => Value::Number(start + step * k as f64),
            FillPattern::List { list, start, step, case } => {
                let items = list.items();
                let index = (start + step * k).rem_euclid(items.len() as i64) as usize;
                Value::Text(apply_case(items[index], *case))
            }
            FillPattern::Suffixed { prefix, suffix, start, step } => {
                let n = start.saturating_add(step.saturating_mul(k));
                let tail = match suffix {
                    Suffix::Number { width: Some(width) } if n >= 0 => format!("{:0>width$}", n, width = *width),
                    Suffix::Number { .. } => n.to_string(),
                    Suffix::Letter { lowercase: true } => index_to_letters(n).to_lowercase(),
                    Suffix::Letter { lowercase: false } => index_to_letters(n),
                };
                Value::Text(format!("{}{}", prefix, tail))
            }
            FillPattern::Quarter { start, step, with_year } => {
                let total = start.saturating_add(step.saturating_mul(k));
                let quarter = total.rem_euclid(4) + 1;
                if *with_year {
                    Value::Text(format!("Q{} {}", quarter, total.div_euclid(4)))
                } else {
                    Value::Text(format!("Q{}", quarter))
                }
            }
        }
    }
}

/// Pattern followed by `values`, in fill order.
pub fn detect(values: &[Value]) -> FillPattern {
    let candidate = match values {
        [Value::Text(text)] => single_text(text),
        [a, b, ..] => from_pair(a, b),
        _ => None,
    };
    match candidate {
        Some(pattern) if values.iter().enumerate().all(|(i, v)| same_value(&pattern.value_at(i as i64), v)) => pattern,
        _ => FillPattern::Repeat(values.to_vec()),
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => (x - y).abs() <= 1e-9 * x.abs().max(y.abs()).max(1.0),
        _ => a == b,
    }
}

fn single_text(text: &str) -> Option<FillPattern> {
    if let Some((start, with_year)) = parse_quarter(text) {
        return Some(FillPattern::Quarter { start, step: 1, with_year });
    }
    if let Some((list, start, case)) = find_in_list(text) {
        return Some(FillPattern::List { list, start, step: 1, case });
    }
    if let Some((prefix, start, width)) = trailing_number(text) {
        return Some(FillPattern::Suffixed { prefix, suffix: Suffix::Number { width }, start, step: 1 });
    }
    let (prefix, start, lowercase) = trailing_letter(text)?;
    Some(FillPattern::Suffixed { prefix, suffix: Suffix::Letter { lowercase }, start, step: 1 })
}

fn from_pair(a: &Value, b: &Value) -> Option<FillPattern> {
    let (t1, t2) = match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => return Some(FillPattern::Linear { start: *n1, step: n2 - n1 }),
        (Value::Text(t1), Value::Text(t2)) => (t1.as_str(), t2.as_str()),
        _ => return None,
    };

    if let (Some((q1, y1)), Some((q2, y2))) = (parse_quarter(t1), parse_quarter(t2)) {
        return (y1 == y2).then_some(FillPattern::Quarter { start: q1, step: q2 - q1, with_year: y1 });
    }
    if let (Some((l1, i1, case)), Some((l2, i2, _))) = (find_in_list(t1), find_in_list(t2)) {
        return (l1 == l2).then_some(FillPattern::List { list: l1, start: i1, step: i2 - i1, case });
    }
    if let (Some((p1, n1, width)), Some((p2, n2, _))) = (trailing_number(t1), trailing_number(t2)) {
        return (p1 == p2).then_some(FillPattern::Suffixed {
            prefix: p1,
            suffix: Suffix::Number { width },
            start: n1,
            step: n2 - n1,
        });
    }
    let ((p1, l1, lowercase), (p2, l2, _)) = (trailing_letter(t1)?, trailing_letter(t2)?);
    (p1 == p2).then_some(FillPattern::Suffixed { prefix: p1, suffix: Suffix::Letter { lowercase }, start: l1, step: l2 - l1 })
}

/// `(list, index, case)` of a list item, compared case-insensitively.
fn find_in_list(text: &str) -> Option<(BuiltinList, i64, CaseMode)> {
    let text = text.trim();
    let case = if text.chars().all(|c| !c.is_lowercase()) {
        CaseMode::Upper
    } else if text.chars().all(|c| !c.is_uppercase()) {
        CaseMode::Lower
    } else {
        CaseMode::Title
    };
    BuiltinList::ALL.into_iter().find_map(|list| {
        let index = list.items().iter().position(|item| item.eq_ignore_ascii_case(text))?;
        Some((list, index as i64, case))
    })
}

/// `Q1`..`Q4`, optionally followed by a year. Returns the quarter count and
/// whether a year was given.
fn parse_quarter(text: &str) -> Option<(i64, bool)> {
    let rest = text.trim().strip_prefix(['Q', 'q'])?;
    let mut parts = rest.split_whitespace();
    let quarter: i64 = parts.next()?.parse().ok()?;
    if !(1..=4).contains(&quarter) {
        return None;
    }
    match (parts.next(), parts.next()) {
        (None, _) => Some((quarter - 1, false)),
        (Some(year), None) => Some((year.parse::<i64>().ok()? * 4 + quarter - 1, true)),
        _ => None,
    }
}

/// `"Row-007"` gives `("Row-", 7, Some(3))`. The width is kept only for
/// zero-padded numbers.
fn trailing_number(text: &str) -> Option<(String, i64, Option<usize>)> {
    let digits = text.chars().rev().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let (prefix, number) = text.split_at(text.len() - digits);
    let value: i64 = number.parse().ok()?;
    let width = (number.len() > 1 && number.starts_with('0')).then_some(number.len());
    Some((prefix.to_string(), value, width))
}

/// `"Plan B"` gives `("Plan ", 2, false)`. The suffix is one letter, or up
/// to three capitals, after a separator.
fn trailing_letter(text: &str) -> Option<(String, i64, bool)> {
    let letters = text.chars().rev().take_while(char::is_ascii_alphabetic).count();
    if letters == 0 || letters > 3 {
        return None;
    }
    let (prefix, suffix) = text.split_at(text.len() - letters);
    if !prefix.ends_with([' ', '-', '_']) {
        return None;
    }
    let lowercase = suffix.chars().all(|c| c.is_ascii_lowercase());
    if letters > 1 && !suffix.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    Some((prefix.to_string(), letters_to_index(&suffix.to_ascii_uppercase()), lowercase))
}

/// `A` = 1, `Z` = 26, `AA` = 27
fn letters_to_index(letters: &str) -> i64 {
    letters.bytes().fold(0, |acc, b| acc * 26 + i64::from(b - b'A' + 1))
}

fn index_to_letters(n: i64) -> String {
    let mut n = n.max(1);
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    out.iter().rev().map(|&b| b as char).collect()
}

fn apply_case(text: &str, case: CaseMode) -> String {
    match case {
        CaseMode::Upper => text.to_uppercase(),
        CaseMode::Lower => text.to_lowercase(),
        CaseMode::Title => {
            let mut chars = text.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn next(values: &[Value], count: i64) -> Vec<Value> {
        let pattern = detect(values);
        let n = values.len() as i64;
        (0..count).map(|k| pattern.value_at(n + k)).collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(next(&[Value::Number(1.0), Value::Number(3.0)], 2), vec![Value::Number(5.0), Value::Number(7.0)]);
        assert_eq!(next(&[Value::Number(5.0)], 2), vec![Value::Number(5.0), Value::Number(5.0)]);
        // Uneven steps repeat
        let source = [Value::Number(1.0), Value::Number(2.0), Value::Number(4.0)];
        assert_eq!(next(&source, 4), vec![Value::Number(1.0), Value::Number(2.0), Value::Number(4.0), Value::Number(1.0)]);
        let fractions = [Value::Number(0.1), Value::Number(0.2), Value::Number(0.3)];
        assert!(matches!(detect(&fractions), FillPattern::Linear { .. }));
    }

    #[test]
    fn test_lists_keep_case() {
        assert_eq!(next(&[text("Nov")], 3), vec![text("Dec"), text("Jan"), text("Feb")]);
        assert_eq!(next(&[text("MONDAY")], 1), vec![text("TUESDAY")]);
        assert_eq!(next(&[text("mon"), text("wed")], 2), vec![text("fri"), text("sun")]);
        assert_eq!(next(&[text("Q3 2025")], 2), vec![text("Q4 2025"), text("Q1 2026")]);
        assert_eq!(next(&[text("Q4")], 1), vec![text("Q1")]);
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(next(&[text("Item 9")], 2), vec![text("Item 10"), text("Item 11")]);
        assert_eq!(next(&[text("Row-007")], 1), vec![text("Row-008")]);
        assert_eq!(next(&[text("v2"), text("v4")], 1), vec![text("v6")]);
        assert_eq!(next(&[text("Plan B")], 1), vec![text("Plan C")]);
        assert_eq!(next(&[text("Col Z")], 1), vec![text("Col AA")]);
        assert_eq!(next(&[text("step a")], 1), vec![text("step b")]);
    }

    #[test]
    fn test_plain_text_and_mixed_repeat() {
        assert_eq!(next(&[text("hello world")], 2), vec![text("hello world"), text("hello world")]);
        assert_eq!(next(&[text("a1"), text("b2")], 2), vec![text("a1"), text("b2")]);
        assert_eq!(next(&[Value::Number(1.0), text("x")], 1), vec![Value::Number(1.0)]);
        assert_eq!(next(&[], 1), vec![Value::Empty]);
    }
}
