// Formula parsing and evaluation

pub mod parser;
pub mod eval;
pub mod refs;
pub mod cache;
pub mod value;

pub(crate) mod eval_helpers;
pub(crate) mod eval_math;
pub(crate) mod eval_text;
pub(crate) mod eval_logical;

pub use cache::FormulaCache;
pub use eval::{evaluate, CellLookup};
pub use parser::{format_formula, parse, Expr, SheetRef};
pub use refs::Reference;
pub use value::{CellError, ErrorKind, Value};
