// Text functions: CONCATENATE, CONCAT, LEN, UPPER, LOWER, TRIM, LEFT, RIGHT,
// MID, EXACT

use super::eval::CellLookup;
use super::eval_helpers::{collect_all_values, expect_args, int_arg, text_arg};
use super::parser::Expr;
use super::value::{CellError, Value};

pub(crate) fn try_evaluate<L: CellLookup + ?Sized>(name: &str, args: &[Expr], lookup: &L) -> Option<Value> {
    let result = match name {
        "CONCATENATE" | "CONCAT" => {
            if let Err(e) = expect_args(name, args, 1, usize::MAX) {
                return Some(Value::Error(e));
            }
            let mut out = String::new();
            for value in collect_all_values(args, lookup) {
                match value {
                    Value::Error(e) => return Some(Value::Error(e)),
                    v => out.push_str(&v.to_text()),
                }
            }
            Value::Text(out)
        }
        "LEN" => map_text(name, args, lookup, |s| Value::Number(s.chars().count() as f64)),
        "UPPER" => map_text(name, args, lookup, |s| Value::Text(s.to_uppercase())),
        "LOWER" => map_text(name, args, lookup, |s| Value::Text(s.to_lowercase())),
        // Collapses inner runs of spaces too
        "TRIM" => map_text(name, args, lookup, |s| Value::Text(s.split_whitespace().collect::<Vec<_>>().join(" "))),
        "LEFT" | "RIGHT" => {
            if let Err(e) = expect_args(name, args, 1, 2) {
                return Some(Value::Error(e));
            }
            let text = match text_arg(&args[0], lookup) {
                Ok(s) => s,
                Err(e) => return Some(Value::Error(e)),
            };
            let count = match count_arg(args, 1, 1, lookup) {
                Ok(n) => n,
                Err(e) => return Some(Value::Error(e)),
            };
            let chars: Vec<char> = text.chars().collect();
            let count = count.min(chars.len());
            let taken: String = if name == "LEFT" {
                chars[..count].iter().collect()
            } else {
                chars[chars.len() - count..].iter().collect()
            };
            Value::Text(taken)
        }
        "MID" => {
            if let Err(e) = expect_args(name, args, 3, 3) {
                return Some(Value::Error(e));
            }
            let text = match text_arg(&args[0], lookup) {
                Ok(s) => s,
                Err(e) => return Some(Value::Error(e)),
            };
            let start = match int_arg(args, 1, 1, lookup) {
                Ok(n) if n >= 1 => (n - 1) as usize,
                Ok(_) => return Some(Value::Error(CellError::type_mismatch("MID start must be at least 1"))),
                Err(e) => return Some(Value::Error(e)),
            };
            let count = match count_arg(args, 2, 0, lookup) {
                Ok(n) => n,
                Err(e) => return Some(Value::Error(e)),
            };
            Value::Text(text.chars().skip(start).take(count).collect())
        }
        "EXACT" => {
            if let Err(e) = expect_args(name, args, 2, 2) {
                return Some(Value::Error(e));
            }
            match (text_arg(&args[0], lookup), text_arg(&args[1], lookup)) {
                (Ok(a), Ok(b)) => Value::Boolean(a == b),
                (Err(e), _) | (_, Err(e)) => Value::Error(e),
            }
        }
        _ => return None,
    };
    Some(result)
}

fn map_text<L: CellLookup + ?Sized>(name: &str, args: &[Expr], lookup: &L, f: impl Fn(&str) -> Value) -> Value {
    if let Err(e) = expect_args(name, args, 1, 1) {
        return Value::Error(e);
    }
    match text_arg(&args[0], lookup) {
        Ok(s) => f(&s),
        Err(e) => Value::Error(e),
    }
}

/// Non-negative character count argument.
fn count_arg<L: CellLookup + ?Sized>(args: &[Expr], index: usize, default: i64, lookup: &L) -> Result<usize, CellError> {
    let n = int_arg(args, index, default, lookup)?;
    usize::try_from(n).map_err(|_| CellError::type_mismatch("Character count must not be negative"))
}
