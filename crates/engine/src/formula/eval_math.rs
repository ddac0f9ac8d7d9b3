// Math functions: SUM, AVERAGE, MIN, MAX, COUNT, COUNTA, COUNTBLANK, PRODUCT,
// ABS, ROUND, ROUNDUP, ROUNDDOWN, INT, MOD, POWER, SQRT

use super::eval::{numeric, CellLookup};
use super::eval_helpers::{collect_all_values, collect_numbers, expect_args, int_arg, number_arg};
use super::parser::Expr;
use super::value::{CellError, ErrorKind, Value};

pub(crate) fn try_evaluate<L: CellLookup + ?Sized>(name: &str, args: &[Expr], lookup: &L) -> Option<Value> {
    let result = match name {
        "SUM" => numeric(collect_numbers(args, lookup).map(|vals| vals.iter().sum())),
        "AVERAGE" => match collect_numbers(args, lookup) {
            Ok(vals) if vals.is_empty() => Value::Error(CellError::new(
                ErrorKind::DivisionByZero,
                "AVERAGE requires at least one value",
            )),
            Ok(vals) => numeric(Ok(vals.iter().sum::<f64>() / vals.len() as f64)),
            Err(e) => Value::Error(e),
        },
        "MIN" => numeric(
            collect_numbers(args, lookup)
                .map(|vals| if vals.is_empty() { 0.0 } else { vals.iter().cloned().fold(f64::INFINITY, f64::min) }),
        ),
        "MAX" => numeric(
            collect_numbers(args, lookup)
                .map(|vals| if vals.is_empty() { 0.0 } else { vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max) }),
        ),
        "PRODUCT" => numeric(
            collect_numbers(args, lookup)
                .map(|vals| if vals.is_empty() { 0.0 } else { vals.iter().product() }),
        ),
        "COUNT" => {
            // Errors and text are simply not counted
            let values = collect_all_values(args, lookup);
            let count = values.iter().filter(|v| matches!(v, Value::Number(_))).count();
            Value::Number(count as f64)
        }
        "COUNTA" => {
            let values = collect_all_values(args, lookup);
            let count = values.iter().filter(|v| !v.is_empty()).count();
            Value::Number(count as f64)
        }
        "COUNTBLANK" => {
            if let Err(e) = expect_args(name, args, 1, usize::MAX) {
                return Some(Value::Error(e));
            }
            let values = collect_all_values(args, lookup);
            let count = values
                .iter()
                .filter(|v| matches!(v, Value::Empty) || matches!(v, Value::Text(s) if s.is_empty()))
                .count();
            Value::Number(count as f64)
        }
        "ABS" => unary(name, args, lookup, |n| Ok(n.abs())),
        "INT" => unary(name, args, lookup, |n| Ok(n.floor())),
        "SQRT" => unary(name, args, lookup, |n| {
            if n < 0.0 {
                Err(CellError::new(ErrorKind::InvalidNumber, "SQRT of a negative number"))
            } else {
                Ok(n.sqrt())
            }
        }),
        "ROUND" | "ROUNDUP" | "ROUNDDOWN" => {
            if let Err(e) = expect_args(name, args, 1, 2) {
                return Some(Value::Error(e));
            }
            let digits = match int_arg(args, 1, 0, lookup) {
                Ok(d) => d.clamp(-15, 15) as i32,
                Err(e) => return Some(Value::Error(e)),
            };
            numeric(number_arg(&args[0], lookup).map(|n| {
                let factor = 10f64.powi(digits.abs());
                let scaled = if digits >= 0 { n * factor } else { n / factor };
                let rounded = match name {
                    "ROUND" => scaled.round(),
                    // Away from zero
                    "ROUNDUP" => scaled.abs().ceil() * scaled.signum(),
                    _ => scaled.trunc(),
                };
                if digits >= 0 { rounded / factor } else { rounded * factor }
            }))
        }
        "MOD" => binary(name, args, lookup, |n, d| {
            if d == 0.0 {
                return Err(CellError::div_zero());
            }
            // Result takes the sign of the divisor
            Ok(n - d * (n / d).floor())
        }),
        "POWER" => binary(name, args, lookup, |base, exp| {
            if base == 0.0 && exp < 0.0 {
                return Err(CellError::div_zero());
            }
            Ok(base.powf(exp))
        }),
        _ => return None,
    };
    Some(result)
}

fn unary<L: CellLookup + ?Sized>(
    name: &str,
    args: &[Expr],
    lookup: &L,
    f: impl Fn(f64) -> Result<f64, CellError>,
) -> Value {
    if let Err(e) = expect_args(name, args, 1, 1) {
        return Value::Error(e);
    }
    numeric(number_arg(&args[0], lookup).and_then(f))
}

fn binary<L: CellLookup + ?Sized>(
    name: &str,
    args: &[Expr],
    lookup: &L,
    f: impl Fn(f64, f64) -> Result<f64, CellError>,
) -> Value {
    if let Err(e) = expect_args(name, args, 2, 2) {
        return Value::Error(e);
    }
    let a = match number_arg(&args[0], lookup) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    numeric(number_arg(&args[1], lookup).and_then(|b| f(a, b)))
}
