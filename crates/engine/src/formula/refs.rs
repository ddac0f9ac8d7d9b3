//! Reference extraction and rewriting on formula trees.
//!
//! Extraction feeds the dependency graph; rewriting keeps formula text valid
//! when rows/columns move, content is pasted elsewhere, or a sheet is renamed.

use cellgrid_core::{AxisChange, Axis, Position, Zone};

use super::parser::{Expr, SheetRef};
use super::value::ErrorKind;

/// A reference read by a formula, before sheet names are resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Cell { sheet: SheetRef, position: Position },
    /// Kept unexpanded; members are enumerated only during evaluation.
    Range { sheet: SheetRef, zone: Zone },
}

impl Reference {
    pub fn sheet(&self) -> &SheetRef {
        match self {
            Reference::Cell { sheet, .. } | Reference::Range { sheet, .. } => sheet,
        }
    }

    pub fn zone(&self) -> Zone {
        match self {
            Reference::Cell { position, .. } => Zone::single(*position),
            Reference::Range { zone, .. } => *zone,
        }
    }
}

impl Expr {
    /// All references in order of appearance. Duplicates are kept; the
    /// graph deduplicates when it builds edges.
    pub fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<Reference>) {
        match self {
            Expr::CellRef { sheet, col, row, .. } => {
                out.push(Reference::Cell { sheet: sheet.clone(), position: Position::new(*row, *col) });
            }
            Expr::Range { sheet, start_col, start_row, end_col, end_row, .. } => {
                out.push(Reference::Range {
                    sheet: sheet.clone(),
                    zone: Zone::new(*start_row, *start_col, *end_row, *end_col),
                });
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            Expr::Unary { operand, .. } => operand.collect_references(out),
            Expr::Group(inner) => inner.collect_references(out),
            Expr::Number(_)
            | Expr::Text(_)
            | Expr::Boolean(_)
            | Expr::Error(_)
            | Expr::Name(_)
            | Expr::Empty => {}
        }
    }

    /// True when any reference is qualified with a sheet name.
    pub fn has_sheet_names(&self) -> bool {
        self.references().iter().any(|r| matches!(r.sheet(), SheetRef::Named(_)))
    }
}

/// Rebuild `expr`, passing every `CellRef` and `Range` node through `f`.
fn map_refs(expr: &Expr, f: &mut dyn FnMut(&Expr) -> Expr) -> Expr {
    match expr {
        Expr::CellRef { .. } | Expr::Range { .. } => f(expr),
        Expr::Function { name, args } => Expr::Function {
            name: name.clone(),
            args: args.iter().map(|a| map_refs(a, f)).collect(),
        },
        Expr::BinaryOp { op, left, right } => Expr::BinaryOp {
            op: *op,
            left: Box::new(map_refs(left, f)),
            right: Box::new(map_refs(right, f)),
        },
        Expr::Unary { op, operand } => Expr::Unary { op: *op, operand: Box::new(map_refs(operand, f)) },
        Expr::Group(inner) => Expr::Group(Box::new(map_refs(inner, f))),
        other => other.clone(),
    }
}

/// Shift references through a row/column insertion or deletion.
///
/// `targets` says whether a reference's sheet is the one that changed.
/// Absolute and relative components move alike. A reference whose target
/// was deleted becomes `#REF!`; a range shrinks and becomes `#REF!` only
/// when fully deleted.
pub fn shift_for_axis_change(expr: &Expr, change: &AxisChange, targets: &dyn Fn(&SheetRef) -> bool) -> Expr {
    map_refs(expr, &mut |node| match node {
        Expr::CellRef { sheet, col, row, col_abs, row_abs } if targets(sheet) => {
            match change.map_position(Position::new(*row, *col)) {
                Some(p) => Expr::CellRef { sheet: sheet.clone(), col: p.col, row: p.row, col_abs: *col_abs, row_abs: *row_abs },
                None => Expr::Error(ErrorKind::BadReference),
            }
        }
        Expr::Range { sheet, start_col, start_row, end_col, end_row, start_col_abs, start_row_abs, end_col_abs, end_row_abs }
            if targets(sheet) =>
        {
            let (lo, hi) = match change.axis {
                Axis::Row => (*start_row, *end_row),
                Axis::Col => (*start_col, *end_col),
            };
            match change.map_span(lo, hi) {
                None => Expr::Error(ErrorKind::BadReference),
                Some((lo, hi)) => {
                    let (start_row, end_row, start_col, end_col) = match change.axis {
                        Axis::Row => (lo, hi, *start_col, *end_col),
                        Axis::Col => (*start_row, *end_row, lo, hi),
                    };
                    Expr::Range {
                        sheet: sheet.clone(),
                        start_col,
                        start_row,
                        end_col,
                        end_row,
                        start_col_abs: *start_col_abs,
                        start_row_abs: *start_row_abs,
                        end_col_abs: *end_col_abs,
                        end_row_abs: *end_row_abs,
                    }
                }
            }
        }
        other => other.clone(),
    })
}

/// Move relative reference components by an offset (paste, autofill).
/// Absolute components stay. A reference pushed off the grid becomes `#REF!`.
pub fn offset_references(expr: &Expr, d_row: i64, d_col: i64) -> Expr {
    let shift = |index: usize, delta: i64, abs: bool| -> Option<usize> {
        if abs {
            return Some(index);
        }
        let moved = i64::try_from(index).ok()?.checked_add(delta)?;
        usize::try_from(moved).ok()
    };

    map_refs(expr, &mut |node| match node {
        Expr::CellRef { sheet, col, row, col_abs, row_abs } => {
            match (shift(*col, d_col, *col_abs), shift(*row, d_row, *row_abs)) {
                (Some(col), Some(row)) => Expr::CellRef { sheet: sheet.clone(), col, row, col_abs: *col_abs, row_abs: *row_abs },
                _ => Expr::Error(ErrorKind::BadReference),
            }
        }
        Expr::Range { sheet, start_col, start_row, end_col, end_row, start_col_abs, start_row_abs, end_col_abs, end_row_abs } => {
            let corners = (
                shift(*start_col, d_col, *start_col_abs),
                shift(*start_row, d_row, *start_row_abs),
                shift(*end_col, d_col, *end_col_abs),
                shift(*end_row, d_row, *end_row_abs),
            );
            let (Some(c1), Some(r1), Some(c2), Some(r2)) = corners else {
                return Expr::Error(ErrorKind::BadReference);
            };
            // A mix of absolute and relative corners can cross over
            let (start_col, end_col, start_col_abs, end_col_abs) = if c1 <= c2 {
                (c1, c2, *start_col_abs, *end_col_abs)
            } else {
                (c2, c1, *end_col_abs, *start_col_abs)
            };
            let (start_row, end_row, start_row_abs, end_row_abs) = if r1 <= r2 {
                (r1, r2, *start_row_abs, *end_row_abs)
            } else {
                (r2, r1, *end_row_abs, *start_row_abs)
            };
            Expr::Range {
                sheet: sheet.clone(),
                start_col,
                start_row,
                end_col,
                end_row,
                start_col_abs,
                start_row_abs,
                end_col_abs,
                end_row_abs,
            }
        }
        other => other.clone(),
    })
}

/// Point references qualified with `old` (case-insensitive) at `new`.
pub fn rename_sheet_references(expr: &Expr, old: &str, new: &str) -> Expr {
    let rename = |sheet: &SheetRef| match sheet {
        SheetRef::Named(name) if name.eq_ignore_ascii_case(old) => SheetRef::Named(new.to_string()),
        other => other.clone(),
    };
    map_refs(expr, &mut |node| match node {
        Expr::CellRef { sheet, col, row, col_abs, row_abs } => {
            Expr::CellRef { sheet: rename(sheet), col: *col, row: *row, col_abs: *col_abs, row_abs: *row_abs }
        }
        Expr::Range { sheet, start_col, start_row, end_col, end_row, start_col_abs, start_row_abs, end_col_abs, end_row_abs } => {
            Expr::Range {
                sheet: rename(sheet),
                start_col: *start_col,
                start_row: *start_row,
                end_col: *end_col,
                end_row: *end_row,
                start_col_abs: *start_col_abs,
                start_row_abs: *start_row_abs,
                end_col_abs: *end_col_abs,
                end_row_abs: *end_row_abs,
            }
        }
        other => other.clone(),
    })
}
