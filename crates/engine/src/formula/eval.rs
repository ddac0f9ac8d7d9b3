// Formula evaluator - evaluates parsed expressions against a cell lookup.
// Sheet names resolve at evaluation time; an unknown sheet is #REF!.

use std::cmp::Ordering;

use cellgrid_core::{Position, SheetId, Zone};

use super::eval_helpers::{expect_args, reference_zone, value_compare};
use super::parser::{Expr, Op, SheetRef, UnaryOp};
use super::value::{CellError, ErrorKind, Value};

pub trait CellLookup {
    /// Sheet holding the formula being evaluated.
    fn current_sheet(&self) -> SheetId;

    /// Position of the formula being evaluated (for ROW()/COLUMN() without args).
    fn current_cell(&self) -> Position;

    fn resolve_sheet(&self, name: &str) -> Option<SheetId>;

    /// `(rows, cols)` of a sheet, `None` when it does not exist.
    fn sheet_size(&self, sheet: SheetId) -> Option<(usize, usize)>;

    /// Literal or evaluated value of a cell. Empty cells are `Value::Empty`.
    fn value(&self, sheet: SheetId, position: Position) -> Value;
}

pub(crate) fn resolve_sheet<L: CellLookup + ?Sized>(sheet: &SheetRef, lookup: &L) -> Result<SheetId, CellError> {
    match sheet {
        SheetRef::Current => Ok(lookup.current_sheet()),
        SheetRef::Named(name) => lookup
            .resolve_sheet(name)
            .ok_or_else(|| CellError::bad_reference(format!("Unknown sheet '{}'", name))),
    }
}

/// Read a single cell, rejecting positions outside the sheet.
pub(crate) fn read_cell<L: CellLookup + ?Sized>(sheet: &SheetRef, position: Position, lookup: &L) -> Value {
    let sheet_id = match resolve_sheet(sheet, lookup) {
        Ok(id) => id,
        Err(e) => return Value::Error(e),
    };
    match lookup.sheet_size(sheet_id) {
        Some((rows, cols)) if position.row < rows && position.col < cols => lookup.value(sheet_id, position),
        _ => Value::Error(CellError::bad_reference(format!("{} is outside the sheet", position))),
    }
}

/// Every cell of a range, row-major, clamped to the sheet's current size.
pub(crate) fn read_range<L: CellLookup + ?Sized>(sheet: &SheetRef, zone: Zone, lookup: &L) -> Result<Vec<Value>, CellError> {
    let sheet_id = resolve_sheet(sheet, lookup)?;
    let (rows, cols) = lookup
        .sheet_size(sheet_id)
        .ok_or_else(|| CellError::bad_reference("Unknown sheet"))?;
    let clamped = zone
        .clamp_to(rows, cols)
        .ok_or_else(|| CellError::bad_reference(format!("{} is outside the sheet", zone)))?;
    Ok(clamped.positions().map(|p| lookup.value(sheet_id, p)).collect())
}

pub fn evaluate<L: CellLookup + ?Sized>(expr: &Expr, lookup: &L) -> Value {
    match expr {
        Expr::Empty => Value::Empty,
        Expr::Number(n) => Value::Number(*n),
        Expr::Text(s) => Value::Text(s.clone()),
        Expr::Boolean(b) => Value::Boolean(*b),
        Expr::Error(kind) => Value::error(*kind, "Error literal"),
        Expr::Name(name) => Value::error(ErrorKind::NameNotFound, format!("Unknown name {}", name)),
        Expr::CellRef { sheet, col, row, .. } => read_cell(sheet, Position::new(*row, *col), lookup),
        Expr::Range { .. } => {
            // Ranges can't be evaluated directly, only within functions
            Value::Error(CellError::type_mismatch("Range must be used in a function"))
        }
        Expr::Group(inner) => evaluate(inner, lookup),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, lookup);
            match op {
                UnaryOp::Plus => value,
                UnaryOp::Neg => numeric(value.to_number().map(|n| -n)),
                UnaryOp::Percent => numeric(value.to_number().map(|n| n / 100.0)),
            }
        }
        Expr::Function { name, args } => evaluate_function(name, args, lookup),
        Expr::BinaryOp { op, left, right } => {
            let left_result = evaluate(left, lookup);
            let right_result = evaluate(right, lookup);

            // Check for errors first, left before right
            if let Value::Error(e) = left_result {
                return Value::Error(e);
            }
            if let Value::Error(e) = right_result {
                return Value::Error(e);
            }

            match op {
                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow => {
                    let (a, b) = match (left_result.to_number(), right_result.to_number()) {
                        (Ok(a), Ok(b)) => (a, b),
                        (Err(e), _) | (_, Err(e)) => return Value::Error(e),
                    };
                    let result = match op {
                        Op::Add => a + b,
                        Op::Sub => a - b,
                        Op::Mul => a * b,
                        Op::Div if b == 0.0 => return Value::Error(CellError::div_zero()),
                        Op::Div => a / b,
                        _ => {
                            if a == 0.0 && b < 0.0 {
                                return Value::Error(CellError::div_zero());
                            }
                            a.powf(b)
                        }
                    };
                    numeric(Ok(result))
                }

                Op::Lt | Op::Gt | Op::Eq | Op::LtEq | Op::GtEq | Op::NotEq => {
                    let ord = value_compare(&left_result, &right_result);
                    let result = match op {
                        Op::Lt => ord == Ordering::Less,
                        Op::Gt => ord == Ordering::Greater,
                        Op::Eq => ord == Ordering::Equal,
                        Op::LtEq => ord != Ordering::Greater,
                        Op::GtEq => ord != Ordering::Less,
                        _ => ord != Ordering::Equal,
                    };
                    Value::Boolean(result)
                }

                Op::Concat => Value::Text(format!("{}{}", left_result.to_text(), right_result.to_text())),
            }
        }
    }
}

/// Wrap a numeric result, turning NaN/infinity into #NUM!.
pub(crate) fn numeric(result: Result<f64, CellError>) -> Value {
    match result {
        Ok(n) if n.is_finite() => Value::Number(n),
        Ok(_) => Value::error(ErrorKind::InvalidNumber, "Numeric result out of range"),
        Err(e) => Value::Error(e),
    }
}

fn evaluate_function<L: CellLookup + ?Sized>(name: &str, args: &[Expr], lookup: &L) -> Value {
    if let Some(result) = super::eval_math::try_evaluate(name, args, lookup) {
        return result;
    }
    if let Some(result) = super::eval_logical::try_evaluate(name, args, lookup) {
        return result;
    }
    if let Some(result) = super::eval_text::try_evaluate(name, args, lookup) {
        return result;
    }

    match name {
        "ROW" | "COLUMN" => {
            if let Err(e) = expect_args(name, args, 0, 1) {
                return Value::Error(e);
            }
            let position = match args.first() {
                None => lookup.current_cell(),
                Some(arg) => match reference_zone(arg) {
                    Some((_, zone)) => zone.top_left(),
                    None => return Value::Error(CellError::type_mismatch(format!("{} expects a reference", name))),
                },
            };
            let index = if name == "ROW" { position.row } else { position.col };
            Value::Number((index + 1) as f64)
        }
        _ => Value::error(ErrorKind::NameNotFound, format!("Unknown function {}", name)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::formula::parser::parse;
    use rustc_hash::FxHashMap;

    /// In-memory lookup: one or two sheets of 100x26 cells.
    pub(crate) struct TestLookup {
        pub cells: FxHashMap<(SheetId, Position), Value>,
        pub sheets: Vec<(SheetId, String)>,
        pub at: Position,
    }

    impl TestLookup {
        pub fn new() -> Self {
            Self {
                cells: FxHashMap::default(),
                sheets: vec![(SheetId::from_raw(1), "Sheet1".to_string()), (SheetId::from_raw(2), "Data".to_string())],
                at: Position::new(9, 9),
            }
        }

        pub fn set(&mut self, a1: &str, value: Value) -> &mut Self {
            let (sheet, addr) = match a1.split_once('!') {
                Some((name, addr)) => (self.resolve_sheet(name).unwrap(), addr),
                None => (SheetId::from_raw(1), a1),
            };
            self.cells.insert((sheet, Position::parse(addr).unwrap()), value);
            self
        }

        pub fn eval(&self, formula: &str) -> Value {
            evaluate(&parse(formula).unwrap(), self)
        }
    }

    impl CellLookup for TestLookup {
        fn current_sheet(&self) -> SheetId {
            SheetId::from_raw(1)
        }

        fn current_cell(&self) -> Position {
            self.at
        }

        fn resolve_sheet(&self, name: &str) -> Option<SheetId> {
            self.sheets.iter().find(|(_, n)| n.eq_ignore_ascii_case(name)).map(|(id, _)| *id)
        }

        fn sheet_size(&self, sheet: SheetId) -> Option<(usize, usize)> {
            self.sheets.iter().any(|(id, _)| *id == sheet).then_some((100, 26))
        }

        fn value(&self, sheet: SheetId, position: Position) -> Value {
            self.cells.get(&(sheet, position)).cloned().unwrap_or_default()
        }
    }

    fn kind(v: Value) -> Option<ErrorKind> {
        v.error_kind()
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        let mut l = TestLookup::new();
        l.set("A1", Value::Number(10.0));
        assert_eq!(l.eval("=A1+1"), Value::Number(11.0));
        assert_eq!(l.eval("=2+3*4"), Value::Number(14.0));
        assert_eq!(l.eval("=(2+3)*4"), Value::Number(20.0));
        assert_eq!(l.eval("=-2^2"), Value::Number(4.0));
        assert_eq!(l.eval("=50%*A1"), Value::Number(5.0));
        assert_eq!(l.eval("=B1+1"), Value::Number(1.0));
    }

    #[test]
    fn test_text_operand_is_type_mismatch() {
        let mut l = TestLookup::new();
        l.set("A1", Value::Text("hello".into()));
        assert_eq!(kind(l.eval("=A1+1")), Some(ErrorKind::TypeMismatch));
        l.set("A2", Value::Text("4".into()));
        assert_eq!(l.eval("=A2*2"), Value::Number(8.0));
    }

    #[test]
    fn test_error_kinds_are_distinct_and_propagate() {
        let mut l = TestLookup::new();
        l.set("A1", Value::Number(0.0));
        assert_eq!(kind(l.eval("=1/A1")), Some(ErrorKind::DivisionByZero));
        assert_eq!(kind(l.eval("=(1/A1)+\"x\"")), Some(ErrorKind::DivisionByZero));
        assert_eq!(kind(l.eval("=Nowhere!A1")), Some(ErrorKind::BadReference));
        assert_eq!(kind(l.eval("=A1000")), Some(ErrorKind::BadReference));
        assert_eq!(kind(l.eval("=FOO(1)")), Some(ErrorKind::NameNotFound));
        assert_eq!(kind(l.eval("=revenue")), Some(ErrorKind::NameNotFound));
        assert_eq!(kind(l.eval("=#N/A+1")), Some(ErrorKind::NotAvailable));
        assert_eq!(kind(l.eval("=(-1)^0.5")), Some(ErrorKind::InvalidNumber));
        assert_eq!(kind(l.eval("=A1:A3")), Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn test_cross_sheet_reads() {
        let mut l = TestLookup::new();
        l.set("Data!B2", Value::Number(7.0));
        assert_eq!(l.eval("=data!B2*2"), Value::Number(14.0));
    }

    #[test]
    fn test_comparisons() {
        let mut l = TestLookup::new();
        l.set("A1", Value::Text("abc".into()));
        assert_eq!(l.eval("=A1=\"ABC\""), Value::Boolean(true));
        assert_eq!(l.eval("=1<2"), Value::Boolean(true));
        assert_eq!(l.eval("=B9=0"), Value::Boolean(true));
        assert_eq!(l.eval("=B9=\"\""), Value::Boolean(true));
        // Numbers sort before text
        assert_eq!(l.eval("=5<\"a\""), Value::Boolean(true));
        assert_eq!(l.eval("=TRUE<>FALSE"), Value::Boolean(true));
    }

    #[test]
    fn test_concat() {
        let mut l = TestLookup::new();
        l.set("A1", Value::Number(1.5));
        assert_eq!(l.eval("=\"x\"&A1&TRUE"), Value::Text("x1.5TRUE".into()));
    }

    #[test]
    fn test_row_and_column() {
        let l = TestLookup::new();
        assert_eq!(l.eval("=ROW()"), Value::Number(10.0));
        assert_eq!(l.eval("=COLUMN(C5)"), Value::Number(3.0));
        assert_eq!(l.eval("=ROW(B3:D9)"), Value::Number(3.0));
        assert_eq!(kind(l.eval("=ROW(1)")), Some(ErrorKind::TypeMismatch));
        assert_eq!(kind(l.eval("=ROW(A1,A2)")), Some(ErrorKind::BadExpression));
    }
}
