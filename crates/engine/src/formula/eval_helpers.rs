// Shared helper functions for formula evaluation

use std::cmp::Ordering;

use cellgrid_core::{Position, Zone};

use super::eval::{evaluate, read_cell, read_range, CellLookup};
use super::parser::{Expr, SheetRef};
use super::value::{CellError, Value};

/// Compare two values.
/// Order: Numbers < Text < Booleans. Empty compares as 0 against numbers,
/// "" against text and FALSE against booleans. Text is case-insensitive.
pub(crate) fn value_compare(a: &Value, b: &Value) -> Ordering {
    fn type_rank(v: &Value) -> u8 {
        match v {
            Value::Number(_) | Value::Empty => 0,
            Value::Text(_) => 1,
            Value::Boolean(_) => 2,
            Value::Error(_) => 3,
        }
    }

    match (a, b) {
        (Value::Empty, Value::Text(s)) if s.is_empty() => Ordering::Equal,
        (Value::Empty, Value::Text(_)) => Ordering::Less,
        (Value::Text(s), Value::Empty) if s.is_empty() => Ordering::Equal,
        (Value::Text(_), Value::Empty) => Ordering::Greater,
        (Value::Empty, Value::Boolean(bb)) => false.cmp(bb),
        (Value::Boolean(ba), Value::Empty) => ba.cmp(&false),
        (Value::Text(sa), Value::Text(sb)) => sa.to_lowercase().cmp(&sb.to_lowercase()),
        (Value::Boolean(ba), Value::Boolean(bb)) => ba.cmp(bb),
        (Value::Number(_) | Value::Empty, Value::Number(_) | Value::Empty) => {
            let na = a.to_number().unwrap_or(0.0);
            let nb = b.to_number().unwrap_or(0.0);
            na.partial_cmp(&nb).unwrap_or(Ordering::Equal)
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Check the argument count, producing a #BAD_EXPR arity error.
pub(crate) fn expect_args(name: &str, args: &[Expr], min: usize, max: usize) -> Result<(), CellError> {
    if args.len() >= min && args.len() <= max {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else if max == usize::MAX {
        format!("at least {}", min)
    } else {
        format!("{} to {}", min, max)
    };
    Err(CellError::arity(name, &expected))
}

/// Sheet and zone of a reference argument, `None` for anything else.
pub(crate) fn reference_zone(expr: &Expr) -> Option<(&SheetRef, Zone)> {
    match expr {
        Expr::CellRef { sheet, col, row, .. } => Some((sheet, Zone::single(Position::new(*row, *col)))),
        Expr::Range { sheet, start_col, start_row, end_col, end_row, .. } => {
            Some((sheet, Zone::new(*start_row, *start_col, *end_row, *end_col)))
        }
        Expr::Group(inner) => reference_zone(inner),
        _ => None,
    }
}

pub(crate) fn number_arg<L: CellLookup + ?Sized>(expr: &Expr, lookup: &L) -> Result<f64, CellError> {
    evaluate(expr, lookup).to_number()
}

pub(crate) fn text_arg<L: CellLookup + ?Sized>(expr: &Expr, lookup: &L) -> Result<String, CellError> {
    match evaluate(expr, lookup) {
        Value::Error(e) => Err(e),
        v => Ok(v.to_text()),
    }
}

/// Integer argument with an optional default when omitted or empty.
pub(crate) fn int_arg<L: CellLookup + ?Sized>(
    args: &[Expr],
    index: usize,
    default: i64,
    lookup: &L,
) -> Result<i64, CellError> {
    match args.get(index) {
        None | Some(Expr::Empty) => Ok(default),
        Some(expr) => Ok(number_arg(expr, lookup)?.trunc() as i64),
    }
}

/// Values of every argument, with references expanded to their cells.
///
/// Referenced cells come back as stored (including `Empty`); direct
/// expressions are evaluated. Errors are returned as values.
pub(crate) fn collect_all_values<L: CellLookup + ?Sized>(args: &[Expr], lookup: &L) -> Vec<Value> {
    let mut values = Vec::new();
    for arg in args {
        match arg {
            Expr::Range { sheet, .. } => {
                let Some((_, zone)) = reference_zone(arg) else { continue };
                match read_range(sheet, zone, lookup) {
                    Ok(cells) => values.extend(cells),
                    Err(e) => values.push(Value::Error(e)),
                }
            }
            Expr::CellRef { sheet, col, row, .. } => values.push(read_cell(sheet, Position::new(*row, *col), lookup)),
            other => values.push(evaluate(other, lookup)),
        }
    }
    values
}

/// Numbers for aggregate functions (SUM, AVERAGE, ...).
///
/// Inside references only numbers count; text, booleans and blanks are
/// skipped. Direct arguments are coerced, so `SUM("3", TRUE)` is 4.
/// The first error found is returned.
pub(crate) fn collect_numbers<L: CellLookup + ?Sized>(args: &[Expr], lookup: &L) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for arg in args {
        let is_reference = reference_zone(arg).is_some();
        if is_reference {
            for value in collect_all_values(std::slice::from_ref(arg), lookup) {
                match value {
                    Value::Number(n) => numbers.push(n),
                    Value::Error(e) => return Err(e),
                    _ => {}
                }
            }
            continue;
        }
        match evaluate(arg, lookup) {
            Value::Empty => {}
            value => numbers.push(value.to_number()?),
        }
    }
    Ok(numbers)
}

/// Booleans for AND/OR. Text and blanks inside references are ignored.
pub(crate) fn collect_booleans<L: CellLookup + ?Sized>(args: &[Expr], lookup: &L) -> Result<Vec<bool>, CellError> {
    let mut out = Vec::new();
    for arg in args {
        let is_reference = reference_zone(arg).is_some();
        for value in collect_all_values(std::slice::from_ref(arg), lookup) {
            match value {
                Value::Error(e) => return Err(e),
                Value::Text(_) | Value::Empty if is_reference => {}
                v => out.push(v.to_bool()?),
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::eval::tests::TestLookup;
    use crate::formula::parser::parse;
    use crate::formula::value::ErrorKind;

    fn args(formula: &str) -> Vec<Expr> {
        match parse(formula).unwrap() {
            Expr::Function { args, .. } => args,
            other => panic!("expected a call, got {:?}", other),
        }
    }

    #[test]
    fn test_collect_numbers_skips_text_in_ranges() {
        let mut l = TestLookup::new();
        l.set("A1", Value::Number(1.0))
            .set("A2", Value::Text("x".into()))
            .set("A3", Value::Boolean(true))
            .set("A4", Value::Number(2.0));
        assert_eq!(collect_numbers(&args("=F(A1:A5)"), &l), Ok(vec![1.0, 2.0]));
        assert_eq!(collect_numbers(&args("=F(\"3\",TRUE)"), &l), Ok(vec![3.0, 1.0]));
        assert!(collect_numbers(&args("=F(\"x\")"), &l).is_err());
    }

    #[test]
    fn test_collect_numbers_propagates_errors() {
        let mut l = TestLookup::new();
        l.set("A2", Value::Error(CellError::div_zero()));
        let err = collect_numbers(&args("=F(A1:A3)"), &l).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
    }

    #[test]
    fn test_ranges_clamp_to_sheet() {
        let l = TestLookup::new();
        assert_eq!(collect_all_values(&args("=F(A99:A500)"), &l).len(), 2);
        let outside = collect_all_values(&args("=F(A200:A300)"), &l);
        assert_eq!(outside[0].error_kind(), Some(ErrorKind::BadReference));
    }

    #[test]
    fn test_value_compare() {
        assert_eq!(value_compare(&Value::Number(1.0), &Value::Text("a".into())), Ordering::Less);
        assert_eq!(value_compare(&Value::Text("B".into()), &Value::Text("a".into())), Ordering::Greater);
        assert_eq!(value_compare(&Value::Empty, &Value::Number(0.0)), Ordering::Equal);
        assert_eq!(value_compare(&Value::Empty, &Value::Boolean(false)), Ordering::Equal);
    }

    #[test]
    fn test_expect_args_message() {
        let err = expect_args("ABS", &[], 1, 1).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadExpression);
        assert_eq!(err.message, "ABS expects 1 argument(s)");
    }
}
