//! Evaluated values and typed evaluation errors.

use serde::{Deserialize, Serialize};

/// Kind of an evaluation error. Kinds survive propagation unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The cell participates in a reference cycle
    Circular,
    /// Reference to a deleted cell, an unknown sheet, or outside the sheet
    BadReference,
    /// Wrong argument or operand type
    TypeMismatch,
    DivisionByZero,
    /// Unknown function or name
    NameNotFound,
    NotAvailable,
    /// Numeric result out of domain (sqrt of a negative, ...)
    InvalidNumber,
    /// Formula text that does not parse, or a call with the wrong arity
    BadExpression,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Circular,
        ErrorKind::BadReference,
        ErrorKind::TypeMismatch,
        ErrorKind::DivisionByZero,
        ErrorKind::NameNotFound,
        ErrorKind::NotAvailable,
        ErrorKind::InvalidNumber,
        ErrorKind::BadExpression,
    ];

    /// Display code, also accepted as a literal inside formulas.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Circular => "#CYCLE!",
            ErrorKind::BadReference => "#REF!",
            ErrorKind::TypeMismatch => "#VALUE!",
            ErrorKind::DivisionByZero => "#DIV/0!",
            ErrorKind::NameNotFound => "#NAME?",
            ErrorKind::NotAvailable => "#N/A",
            ErrorKind::InvalidNumber => "#NUM!",
            ErrorKind::BadExpression => "#BAD_EXPR",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code().eq_ignore_ascii_case(code))
    }
}

/// An error value: the kind plus a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CellError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn circular() -> Self {
        Self::new(ErrorKind::Circular, "Circular reference")
    }

    pub fn bad_reference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadReference, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn div_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero, "Division by zero")
    }

    pub fn arity(function: &str, expected: &str) -> Self {
        Self::new(ErrorKind::BadExpression, format!("{} expects {} argument(s)", function, expected))
    }
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind.code())
    }
}

/// The scalar result of evaluating a cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
}

impl Value {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Value::Error(CellError::new(kind, message))
    }

    /// Numeric coercion. Text coerces only when it is a canonical number;
    /// locale never applies here.
    pub fn to_number(&self) -> Result<f64, CellError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Empty => Ok(0.0),
            Value::Text(s) if s.is_empty() => Ok(0.0),
            Value::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n),
                _ => Err(CellError::type_mismatch(format!("Cannot convert '{}' to number", s))),
            },
            Value::Error(e) => Err(e.clone()),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
            Value::Empty => String::new(),
            Value::Error(e) => e.kind.code().to_string(),
        }
    }

    pub fn to_bool(&self) -> Result<bool, CellError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Empty => Ok(false),
            Value::Text(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(CellError::type_mismatch(format!("Cannot convert '{}' to boolean", s)))
                }
            }
            Value::Error(e) => Err(e.clone()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Canonical, locale-independent number text.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
