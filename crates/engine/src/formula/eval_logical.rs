// Logical functions: IF, IFERROR, IFNA, AND, OR, NOT, ISERROR, ISNA,
// ISNUMBER, ISTEXT, ISBLANK, NA, TRUE, FALSE

use super::eval::{evaluate, CellLookup};
use super::eval_helpers::{collect_booleans, expect_args};
use super::parser::Expr;
use super::value::{CellError, ErrorKind, Value};

pub(crate) fn try_evaluate<L: CellLookup + ?Sized>(name: &str, args: &[Expr], lookup: &L) -> Option<Value> {
    let result = match name {
        "IF" => {
            if let Err(e) = expect_args(name, args, 2, 3) {
                return Some(Value::Error(e));
            }
            let condition = match evaluate(&args[0], lookup).to_bool() {
                Ok(b) => b,
                Err(e) => return Some(Value::Error(e)),
            };
            if condition {
                evaluate(&args[1], lookup)
            } else if let Some(otherwise) = args.get(2) {
                evaluate(otherwise, lookup)
            } else {
                Value::Boolean(false)
            }
        }
        "IFERROR" | "IFNA" => {
            if let Err(e) = expect_args(name, args, 2, 2) {
                return Some(Value::Error(e));
            }
            let value = evaluate(&args[0], lookup);
            let trapped = match value.error_kind() {
                Some(ErrorKind::NotAvailable) => true,
                Some(_) => name == "IFERROR",
                None => false,
            };
            if trapped {
                evaluate(&args[1], lookup)
            } else {
                value
            }
        }
        "AND" | "OR" => {
            if let Err(e) = expect_args(name, args, 1, usize::MAX) {
                return Some(Value::Error(e));
            }
            match collect_booleans(args, lookup) {
                Ok(values) if values.is_empty() => {
                    Value::Error(CellError::type_mismatch(format!("{} found no logical values", name)))
                }
                Ok(values) if name == "AND" => Value::Boolean(values.iter().all(|b| *b)),
                Ok(values) => Value::Boolean(values.iter().any(|b| *b)),
                Err(e) => Value::Error(e),
            }
        }
        "NOT" => {
            if let Err(e) = expect_args(name, args, 1, 1) {
                return Some(Value::Error(e));
            }
            match evaluate(&args[0], lookup).to_bool() {
                Ok(b) => Value::Boolean(!b),
                Err(e) => Value::Error(e),
            }
        }
        "ISERROR" | "ISNA" | "ISNUMBER" | "ISTEXT" | "ISBLANK" => {
            if let Err(e) = expect_args(name, args, 1, 1) {
                return Some(Value::Error(e));
            }
            let value = evaluate(&args[0], lookup);
            let answer = match name {
                "ISERROR" => value.is_error(),
                "ISNA" => value.error_kind() == Some(ErrorKind::NotAvailable),
                "ISNUMBER" => matches!(value, Value::Number(_)),
                "ISTEXT" => matches!(value, Value::Text(_)),
                _ => value.is_empty(),
            };
            Value::Boolean(answer)
        }
        "NA" => {
            if let Err(e) = expect_args(name, args, 0, 0) {
                return Some(Value::Error(e));
            }
            Value::error(ErrorKind::NotAvailable, "Value not available")
        }
        "TRUE" | "FALSE" => {
            if let Err(e) = expect_args(name, args, 0, 0) {
                return Some(Value::Error(e));
            }
            Value::Boolean(name == "TRUE")
        }
        _ => return None,
    };
    Some(result)
}

#[cfg(test)]
mod tests {
    use crate::formula::eval::tests::TestLookup;
    use crate::formula::value::{CellError, ErrorKind, Value};

    #[test]
    fn test_if() {
        let mut l = TestLookup::new();
        l.set("A1", Value::Number(5.0));
        assert_eq!(l.eval("=IF(A1>3,\"big\",\"small\")"), Value::Text("big".into()));
        assert_eq!(l.eval("=IF(A1>9,\"big\")"), Value::Boolean(false));
        assert_eq!(l.eval("=IF(\"maybe\",1,2)").error_kind(), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn test_iferror_traps_every_kind() {
        let mut l = TestLookup::new();
        l.set("A1", Value::Text("hello".into()));
        assert_eq!(l.eval("=IFERROR(A1+1,-1)"), Value::Number(-1.0));
        assert_eq!(l.eval("=IFERROR(1/0,\"div\")"), Value::Text("div".into()));
        assert_eq!(l.eval("=IFERROR(Nope!A1,0)"), Value::Number(0.0));
        assert_eq!(l.eval("=IFERROR(7,0)"), Value::Number(7.0));
    }

    #[test]
    fn test_ifna_traps_only_not_available() {
        let l = TestLookup::new();
        assert_eq!(l.eval("=IFNA(NA(),\"none\")"), Value::Text("none".into()));
        assert_eq!(l.eval("=IFNA(1/0,\"none\")").error_kind(), Some(ErrorKind::DivisionByZero));
    }

    #[test]
    fn test_and_or_not() {
        let mut l = TestLookup::new();
        l.set("A1", Value::Boolean(true))
            .set("A2", Value::Text("skip me".into()))
            .set("A3", Value::Number(0.0));
        assert_eq!(l.eval("=AND(A1:A3)"), Value::Boolean(false));
        assert_eq!(l.eval("=OR(A1:A3)"), Value::Boolean(true));
        assert_eq!(l.eval("=AND(TRUE,1)"), Value::Boolean(true));
        assert_eq!(l.eval("=NOT(A3)"), Value::Boolean(true));
        assert_eq!(l.eval("=AND(B1:B3)").error_kind(), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn test_is_functions() {
        let mut l = TestLookup::new();
        l.set("A1", Value::Error(CellError::circular()))
            .set("A2", Value::Number(3.0))
            .set("A3", Value::Text("t".into()));
        assert_eq!(l.eval("=ISERROR(A1)"), Value::Boolean(true));
        assert_eq!(l.eval("=ISNA(A1)"), Value::Boolean(false));
        assert_eq!(l.eval("=ISNA(NA())"), Value::Boolean(true));
        assert_eq!(l.eval("=ISNUMBER(A2)"), Value::Boolean(true));
        assert_eq!(l.eval("=ISTEXT(A3)"), Value::Boolean(true));
        assert_eq!(l.eval("=ISBLANK(A4)"), Value::Boolean(true));
        assert_eq!(l.eval("=ISBLANK(A3)"), Value::Boolean(false));
    }

    #[test]
    fn test_boolean_functions() {
        let l = TestLookup::new();
        assert_eq!(l.eval("=TRUE()"), Value::Boolean(true));
        assert_eq!(l.eval("=FALSE()"), Value::Boolean(false));
        assert_eq!(l.eval("=NA(1)").error_kind(), Some(ErrorKind::BadExpression));
    }
}
