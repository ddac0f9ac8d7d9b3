//! Conditional formatting rules.
//!
//! Rules are ordered per sheet; the first rule whose ranges contain a cell
//! and whose condition holds for the cell's evaluated value wins.

use std::any::Any;

use cellgrid_core::{AxisChange, Position, SheetId, Zone};
use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::command::{CancelledReason, Command};
use crate::formula::Value;
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellIsOperator {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Equal,
    NotEqual,
    Between,
    NotBetween,
}

impl CellIsOperator {
    fn operand_count(self) -> usize {
        match self {
            CellIsOperator::Between | CellIsOperator::NotBetween => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Numeric comparison against one or two thresholds
    CellIs { operator: CellIsOperator, values: Vec<OrderedFloat<f64>> },
    /// Case-insensitive substring of the value's text
    ContainsText { text: String },
    IsEmpty,
    IsError,
}

impl Condition {
    fn is_valid(&self) -> bool {
        match self {
            Condition::CellIs { operator, values } => {
                values.len() == operator.operand_count() && values.iter().all(|v| v.is_finite())
            }
            Condition::ContainsText { text } => !text.is_empty(),
            Condition::IsEmpty | Condition::IsError => true,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Condition::CellIs { operator, values } => {
                let Value::Number(n) = value else { return false };
                let n = OrderedFloat(*n);
                let a = values.first().copied().unwrap_or_default();
                let b = values.get(1).copied().unwrap_or_default();
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                match operator {
                    CellIsOperator::GreaterThan => n > a,
                    CellIsOperator::GreaterThanOrEqual => n >= a,
                    CellIsOperator::LessThan => n < a,
                    CellIsOperator::LessThanOrEqual => n <= a,
                    CellIsOperator::Equal => n == a,
                    CellIsOperator::NotEqual => n != a,
                    CellIsOperator::Between => lo <= n && n <= hi,
                    CellIsOperator::NotBetween => n < lo || n > hi,
                }
            }
            Condition::ContainsText { text } => {
                !value.is_empty() && value.to_text().to_lowercase().contains(&text.to_lowercase())
            }
            Condition::IsEmpty => matches!(value, Value::Empty) || matches!(value, Value::Text(s) if s.is_empty()),
            Condition::IsError => value.is_error(),
        }
    }
}

/// Style overlay applied when a rule matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionalStyle {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub strikethrough: Option<bool>,
    pub fill_color: Option<String>,
    pub text_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalFormatRule {
    pub id: String,
    pub ranges: Vec<Zone>,
    pub condition: Condition,
    pub style: ConditionalStyle,
}

fn is_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl ConditionalStyle {
    fn is_valid(&self) -> bool {
        [&self.fill_color, &self.text_color].into_iter().flatten().all(|c| is_color(c))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConditionalFormatPlugin {
    rules: FxHashMap<SheetId, Vec<ConditionalFormatRule>>,
}

impl ConditionalFormatPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn sheet_rules(&self, sheet: SheetId) -> &[ConditionalFormatRule] {
        self.rules.get(&sheet).map_or(&[], Vec::as_slice)
    }

    fn check_rule(rule: &ConditionalFormatRule, sheet: SheetId, getters: &Getters<'_>) -> Result<(), CancelledReason> {
        if rule.id.is_empty() || rule.ranges.is_empty() || !rule.condition.is_valid() || !rule.style.is_valid() {
            return Err(CancelledReason::InvalidConditionalFormat);
        }
        let (rows, cols) = getters.sheet_size(sheet).unwrap_or_default();
        if rule.ranges.iter().any(|z| z.bottom >= rows || z.right >= cols) {
            return Err(CancelledReason::TargetOutOfSheet);
        }
        Ok(())
    }

    fn replace(&mut self, sheet: SheetId, rules: Vec<ConditionalFormatRule>, ctx: &mut ApplyContext<'_>) {
        let old = self.rules.remove(&sheet).unwrap_or_default();
        if old != rules {
            ctx.record_inverse(Command::RestoreConditionalFormats { sheet_id: sheet, rules: old });
        }
        if !rules.is_empty() {
            self.rules.insert(sheet, rules);
        }
    }

    fn shift(&mut self, sheet: SheetId, change: AxisChange, ctx: &mut ApplyContext<'_>) {
        if self.sheet_rules(sheet).is_empty() {
            return;
        }
        let rules = self
            .sheet_rules(sheet)
            .iter()
            .filter_map(|rule| {
                let ranges: Vec<Zone> = rule.ranges.iter().filter_map(|z| change.map_zone(z)).collect();
                (!ranges.is_empty()).then(|| ConditionalFormatRule { ranges, ..rule.clone() })
            })
            .collect();
        self.replace(sheet, rules, ctx);
    }
}

impl Plugin for ConditionalFormatPlugin {
    fn allow_dispatch(&self, cmd: &Command, getters: &Getters<'_>) -> Result<(), CancelledReason> {
        match cmd {
            Command::AddConditionalFormat { sheet_id, rule } => {
                if self.sheet_rules(*sheet_id).iter().any(|r| r.id == rule.id) {
                    return Err(CancelledReason::DuplicateConditionalFormatId);
                }
                Self::check_rule(rule, *sheet_id, getters)
            }
            Command::RemoveConditionalFormat { sheet_id, id } => {
                if self.sheet_rules(*sheet_id).iter().any(|r| r.id == *id) {
                    Ok(())
                } else {
                    Err(CancelledReason::ConditionalFormatNotFound)
                }
            }
            Command::RestoreConditionalFormats { sheet_id, rules } => {
                rules.iter().try_for_each(|rule| Self::check_rule(rule, *sheet_id, getters))
            }
            _ => Ok(()),
        }
    }

    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        match cmd {
            Command::AddConditionalFormat { sheet_id, rule } => {
                let mut rules = self.sheet_rules(*sheet_id).to_vec();
                rules.push(rule.clone());
                self.replace(*sheet_id, rules, ctx);
            }
            Command::RemoveConditionalFormat { sheet_id, id } => {
                let rules = self.sheet_rules(*sheet_id).iter().filter(|r| r.id != *id).cloned().collect();
                self.replace(*sheet_id, rules, ctx);
            }
            Command::RestoreConditionalFormats { sheet_id, rules } => self.replace(*sheet_id, rules.clone(), ctx),
            Command::DeleteSheet { sheet_id } => self.replace(*sheet_id, Vec::new(), ctx),
            _ => {
                if let Some((sheet, change)) = cmd.axis_change() {
                    self.shift(sheet, change, ctx);
                }
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> Getters<'a> {
    /// Rules of a sheet in priority order.
    pub fn conditional_formats(&self, sheet: SheetId) -> Vec<ConditionalFormatRule> {
        self.plugin::<ConditionalFormatPlugin>().map(|p| p.sheet_rules(sheet).to_vec()).unwrap_or_default()
    }

    /// Style of the first rule matching the cell's evaluated value.
    pub fn conditional_style(&self, sheet: SheetId, position: Position) -> Option<&'a ConditionalStyle> {
        let plugin = self.plugin::<ConditionalFormatPlugin>()?;
        let mut candidates = plugin.sheet_rules(sheet).iter().filter(|r| r.ranges.iter().any(|z| z.contains(position))).peekable();
        candidates.peek()?;
        let value = self.evaluated_value(sheet, position);
        candidates.find(|r| r.condition.matches(&value)).map(|r| &r.style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::test_util::*;

    fn rule(id: &str, range: &str, condition: Condition, fill: &str) -> ConditionalFormatRule {
        ConditionalFormatRule {
            id: id.into(),
            ranges: vec![zone(range)],
            condition,
            style: ConditionalStyle { fill_color: Some(fill.into()), ..ConditionalStyle::default() },
        }
    }

    fn greater_than(n: f64) -> Condition {
        Condition::CellIs { operator: CellIsOperator::GreaterThan, values: vec![OrderedFloat(n)] }
    }

    fn fill(m: &crate::model::Model, a1: &str) -> Option<String> {
        m.getters().conditional_style(S1, pos(a1)).and_then(|s| s.fill_color.clone())
    }

    #[test]
    fn test_first_matching_rule_wins_on_evaluated_values() {
        let mut m = model();
        m.dispatch(Command::AddConditionalFormat { sheet_id: S1, rule: rule("big", "A1:A5", greater_than(100.0), "#ff0000") })
            .unwrap();
        m.dispatch(Command::AddConditionalFormat { sheet_id: S1, rule: rule("pos", "A1:A5", greater_than(0.0), "#00ff00") })
            .unwrap();
        set(&mut m, "A1", "500").unwrap();
        set(&mut m, "A2", "=A1/100").unwrap();
        set(&mut m, "B1", "500").unwrap();
        assert_eq!(fill(&m, "A1").as_deref(), Some("#ff0000"));
        assert_eq!(fill(&m, "A2").as_deref(), Some("#00ff00"));
        assert_eq!(fill(&m, "A3"), None);
        assert_eq!(fill(&m, "B1"), None);

        set(&mut m, "A1", "50").unwrap();
        assert_eq!(fill(&m, "A1").as_deref(), Some("#00ff00"));
        assert_eq!(fill(&m, "A2").as_deref(), Some("#00ff00"));
    }

    #[test]
    fn test_text_empty_and_error_conditions() {
        assert!(Condition::ContainsText { text: "ell".into() }.matches(&Value::Text("HELLO".into())));
        assert!(!Condition::ContainsText { text: "x".into() }.matches(&Value::Empty));
        assert!(Condition::IsEmpty.matches(&Value::Empty));
        assert!(Condition::IsError.matches(&Value::error(crate::formula::ErrorKind::DivisionByZero, "")));
        let between = Condition::CellIs { operator: CellIsOperator::Between, values: vec![OrderedFloat(10.0), OrderedFloat(1.0)] };
        assert!(between.matches(&Value::Number(5.0)));
        assert!(!between.matches(&Value::Number(11.0)));
        assert!(!between.matches(&Value::Text("5".into())));
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let mut m = model();
        let bad_arity = Condition::CellIs { operator: CellIsOperator::Between, values: vec![OrderedFloat(1.0)] };
        let err = m.dispatch(Command::AddConditionalFormat { sheet_id: S1, rule: rule("r", "A1", bad_arity, "#000000") });
        assert_eq!(err.unwrap_err().reasons, vec![CancelledReason::InvalidConditionalFormat]);
        let err = m.dispatch(Command::AddConditionalFormat { sheet_id: S1, rule: rule("r", "A1", Condition::IsEmpty, "red") });
        assert_eq!(err.unwrap_err().reasons, vec![CancelledReason::InvalidConditionalFormat]);

        m.dispatch(Command::AddConditionalFormat { sheet_id: S1, rule: rule("r", "A1", Condition::IsEmpty, "#000000") })
            .unwrap();
        let err = m.dispatch(Command::AddConditionalFormat { sheet_id: S1, rule: rule("r", "B1", Condition::IsError, "#000000") });
        assert_eq!(err.unwrap_err().reasons, vec![CancelledReason::DuplicateConditionalFormatId]);
        let err = m.dispatch(Command::RemoveConditionalFormat { sheet_id: S1, id: "missing".into() });
        assert_eq!(err.unwrap_err().reasons, vec![CancelledReason::ConditionalFormatNotFound]);
    }

    #[test]
    fn test_rules_follow_structure_and_undo() {
        let mut m = model();
        m.dispatch(Command::AddConditionalFormat { sheet_id: S1, rule: rule("r", "B2:B4", Condition::IsEmpty, "#000000") })
            .unwrap();
        m.dispatch(Command::InsertRows { sheet_id: S1, start: 0, count: 1 }).unwrap();
        assert_eq!(m.getters().conditional_formats(S1)[0].ranges, vec![zone("B3:B5")]);
        m.dispatch(Command::DeleteCols { sheet_id: S1, start: 1, count: 1 }).unwrap();
        assert!(m.getters().conditional_formats(S1).is_empty());
        m.undo().unwrap();
        m.undo().unwrap();
        assert_eq!(m.getters().conditional_formats(S1)[0].ranges, vec![zone("B2:B4")]);
        m.undo().unwrap();
        assert!(m.getters().conditional_formats(S1).is_empty());
    }
}
